/*!
Release-order sweep: run the simulation once for every permutation of the
item release times on a linear narrative, pooling all result records into a
single combined log for downstream comparison of orderings.
 */

use itertools::Itertools;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use model::cli::{parse_args, RunOptions};
use model::narrativegraph::ContentGraph;
use model::observation;
use model::output;
use model::socialgraph::SocialGraph;
use model::submodels::parameters::Parameters;
use model::{topology, Record, Timestep};

fn main() -> Result<(), String> {
    let mut p = Parameters::default();
    let mut run_options = RunOptions {
        story_topology: "linear".to_string(),
        story_size: 5,
        social_topology: "linear".to_string(),
        social_size: 1,
        ..RunOptions::default()
    };
    let mut o = observation::Settings {
        log_every: 0,
        log_coverage: 0,
    };
    {
        let mut parser = parse_args(&mut p, &mut run_options, &mut o);
        parser.parse_args_or_exit();
    }

    run_options.apply_policy_overrides(&mut p);
    let story = ContentGraph::new(topology::linear(run_options.story_size));
    let social = SocialGraph::new(topology::linear(run_options.social_size));
    let mut rng = ChaCha8Rng::seed_from_u64(run_options.rng_seed);

    let n = story.len();
    let mut pooled: Vec<Record> = vec![];
    for ordering in (0..n as Timestep).permutations(n) {
        println!("Running release order {:?}", ordering);
        p.release_times = ordering;
        let summary =
            model::run(&story, &social, &p, None, &mut rng, &o).map_err(|e| e.to_string())?;
        pooled.extend(summary.records);
    }

    std::fs::create_dir_all("data").map_err(|e| e.to_string())?;
    let stem = format!(
        "data/combined_results_social{:}_story{:}",
        social.len(),
        story.len()
    );
    let mut path = std::path::PathBuf::from(format!("{:}.csv", stem));
    let mut counter = 0;
    while path.exists() {
        counter += 1;
        path = std::path::PathBuf::from(format!("{:}_{:}.csv", stem, counter));
    }
    output::store_records_csv(&pooled, &path)?;
    println!("Results in {:?}", path);
    Ok(())
}
