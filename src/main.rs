use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use model::cli::{parse_args, RunOptions};
use model::narrativegraph::ContentGraph;
use model::observation;
use model::output;
use model::socialgraph::SocialGraph;
use model::submodels::parameters::Parameters;
use model::topology::{self, Topology};

fn build_topology<R: Rng>(
    kind: &str,
    size: usize,
    degree: usize,
    branching: usize,
    rng: &mut R,
) -> Result<Topology, String> {
    match kind {
        "linear" => Ok(topology::linear(size)),
        "star" => Ok(topology::star(size)),
        "lattice" => Ok(topology::ring_lattice(size, degree)),
        "tree" => topology::balanced_tree(size, branching),
        "regular" => topology::random_regular(size, degree, rng),
        other => Err(format!("unknown topology {:?}", other)),
    }
}

fn main() -> Result<(), String> {
    let mut p = Parameters::default();
    let mut run_options = RunOptions::default();
    let mut o = observation::Settings {
        log_every: 1,
        log_coverage: 0,
    };
    {
        let mut parser = parse_args(&mut p, &mut run_options, &mut o);
        parser.parse_args_or_exit();
    }
    if !run_options.config.is_empty() {
        p = Parameters::from_file(std::path::Path::new(&run_options.config))
            .map_err(|e| e.to_string())?;
    }
    run_options.apply_policy_overrides(&mut p);

    println!("Starting…");
    let mut rng = ChaCha8Rng::seed_from_u64(run_options.rng_seed);
    let story = ContentGraph::new(build_topology(
        &run_options.story_topology,
        run_options.story_size,
        run_options.degree,
        run_options.branching,
        &mut rng,
    )?);
    let social = SocialGraph::new(build_topology(
        &run_options.social_topology,
        run_options.social_size,
        run_options.degree,
        run_options.branching,
        &mut rng,
    )?);

    let summary = model::run(&story, &social, &p, None, &mut rng, &o).map_err(|e| e.to_string())?;

    let directory = output::unique_directory(&p.filestub)?;
    output::store_records_csv(&summary.records, &directory.join("results.csv"))?;
    output::store_parameters(&p, &directory)?;
    output::store_graph(story.graph(), &directory.join("story_graph.json"))?;
    output::store_graph(social.graph(), &directory.join("social_graph.json"))?;

    for (trial, outcome) in summary.outcomes.iter().enumerate() {
        println!("Trial {:}: {:?}", trial, outcome);
    }
    println!("Results in {:?}", directory);
    Ok(())
}
