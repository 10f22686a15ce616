use argparse::{ArgumentParser, Collect, Store, StoreOption};

use crate::observation::Settings;
use crate::submodels::parameters::{Combination, Parameters, SocialKernel};
use crate::Timestep;

/// Everything the command line controls that is not a model parameter: where
/// the configuration comes from, how the two graphs are built, and the seed
/// of the random source.
pub struct RunOptions {
    /// JSON parameter file; empty means built-in defaults.
    pub config: String,
    pub rng_seed: u64,
    pub social_topology: String,
    pub social_size: usize,
    /// Neighbors per side in the ring lattice, or the degree of the random
    /// regular graph.
    pub degree: usize,
    pub story_topology: String,
    pub story_size: usize,
    /// Children per node of the balanced tree.
    pub branching: usize,
    /// Release-time override; empty means the configured schedule stands.
    pub release_times: Vec<Timestep>,
    /// Convex blending weight; overrides the combination policy.
    pub alpha: Option<f64>,
    /// Social steepness; overrides the peer-pressure kernel.
    pub i_scale: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> RunOptions {
        RunOptions {
            config: "".to_string(),
            rng_seed: 42,
            social_topology: "lattice".to_string(),
            social_size: 50,
            degree: 4,
            story_topology: "tree".to_string(),
            story_size: 10,
            branching: 2,
            release_times: vec![],
            alpha: None,
            i_scale: None,
        }
    }
}

impl RunOptions {
    /// Apply the explicit policy overrides onto the parameters, after any
    /// configuration file has been loaded. `--alpha` selects the convex
    /// combination, `--i-scale` the symmetric peer-pressure kernel.
    pub fn apply_policy_overrides(&self, p: &mut Parameters) {
        if !self.release_times.is_empty() {
            p.release_times = self.release_times.clone();
        }
        if let Some(alpha) = self.alpha {
            p.combination = Combination::Convex { alpha };
        }
        if let Some(i_scale) = self.i_scale {
            p.social = SocialKernel::Symmetric { i_scale };
        }
    }
}

pub fn parse_args<'a>(
    p: &'a mut Parameters,
    run: &'a mut RunOptions,
    o: &'a mut Settings,
) -> ArgumentParser<'a> {
    let mut parser = ArgumentParser::new();
    parser.set_description("Run a narrative adoption simulation");
    parser.refer(&mut run.config).add_option(
        &["--config"],
        Store,
        "JSON parameter file, overriding the built-in defaults",
    );
    parser.refer(&mut run.rng_seed).add_option(
        &["--rng-seed"],
        Store,
        "seed for the reproducible random source",
    );
    parser.refer(&mut p.beta).add_option(
        &["--beta"],
        Store,
        "baseline narrative relevance of a live item",
    );
    parser.refer(&mut p.gamma).add_option(
        &["--gamma"],
        Store,
        "weight of the graph-proximity boost",
    );
    parser.refer(&mut p.x_0).add_option(
        &["--x-0"],
        Store,
        "inflection shift of the narrative sigmoid",
    );
    parser
        .refer(&mut p.x_s)
        .add_option(&["--x-s"], Store, "slope of the narrative sigmoid");
    parser.refer(&mut p.seed_count).add_option(
        &["--seed-count"],
        Store,
        "items pre-adopted per agent at trial start",
    );
    parser.refer(&mut p.trial_count).add_option(
        &["--trials"],
        Store,
        "number of independently seeded trials",
    );
    parser.refer(&mut p.timestep_budget).add_option(
        &["--steps"],
        Store,
        "timesteps to simulate per trial",
    );
    parser.refer(&mut run.alpha).add_option(
        &["--alpha"],
        StoreOption,
        "narrative weight of the convex blend (the social weight is 1 - alpha)",
    );
    parser.refer(&mut run.i_scale).add_option(
        &["--i-scale"],
        StoreOption,
        "steepness of the symmetric peer-pressure kernel",
    );
    parser.refer(&mut run.release_times).add_option(
        &["--release"],
        Collect,
        "release time of the next item (repeatable; a short list is padded \
         by replicating its last entry)",
    );
    parser.refer(&mut run.social_topology).add_option(
        &["--social"],
        Store,
        "social topology: lattice, linear, star, tree or regular",
    );
    parser.refer(&mut run.social_size).add_option(
        &["--social-size"],
        Store,
        "number of agents",
    );
    parser.refer(&mut run.degree).add_option(
        &["--degree"],
        Store,
        "lattice neighbors per side, or regular-graph degree",
    );
    parser.refer(&mut run.story_topology).add_option(
        &["--story"],
        Store,
        "content topology: lattice, linear, star, tree or regular",
    );
    parser.refer(&mut run.story_size).add_option(
        &["--story-size"],
        Store,
        "number of story items",
    );
    parser.refer(&mut run.branching).add_option(
        &["--branching"],
        Store,
        "children per node of the balanced tree",
    );
    parser.refer(&mut p.filestub).add_option(
        &["--filestub"],
        Store,
        "stem of the output directory under data/",
    );
    parser.refer(&mut o.log_every).add_option(
        &["--log-every"],
        Store,
        "period of trial banners, 0 to silence",
    );
    parser.refer(&mut o.log_coverage).add_option(
        &["--log-coverage"],
        Store,
        "period of per-timestep coverage lines, 0 to silence",
    );
    parser
}

#[test]
fn test_policy_overrides_apply() {
    let mut p = Parameters::default();
    let run = RunOptions {
        alpha: Some(0.8),
        i_scale: Some(3.0),
        release_times: vec![0, 4],
        ..RunOptions::default()
    };
    run.apply_policy_overrides(&mut p);
    assert_eq!(p.combination, Combination::Convex { alpha: 0.8 });
    assert_eq!(p.social, SocialKernel::Symmetric { i_scale: 3.0 });
    assert_eq!(p.release_times, vec![0, 4]);
    // Absent options leave the configuration untouched.
    let before = p.clone();
    RunOptions::default().apply_policy_overrides(&mut p);
    assert_eq!(p.combination, before.combination);
    assert_eq!(p.release_times, before.release_times);
}
