use crate::narrativegraph::{ContentGraph, FieldCache};
use crate::schedule::BroadcastSchedule;
use crate::socialgraph::SocialGraph;
use crate::submodels::adoption::{combine, decide_adoption};
use crate::submodels::influence::{narrative_influence, social_influence};
use crate::submodels::parameters::{
    Combination, Gating, Parameters, Relevance, SocialKernel, VisibilityKernel,
};
use crate::submodels::seeding::seed_partition;
use crate::*;

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn quiet() -> observation::Settings {
    observation::Settings {
        log_every: 0,
        log_coverage: 0,
    }
}

fn small_world(n_agents: usize, n_items: usize) -> (ContentGraph, SocialGraph) {
    (
        ContentGraph::new(topology::linear(n_items)),
        SocialGraph::new(topology::linear(n_agents)),
    )
}

#[test]
pub fn test_social_influence_is_monotone_and_bounded() {
    let symmetric = SocialKernel::Symmetric { i_scale: 2.0 };
    let shifted = SocialKernel::LogShifted {
        i_scale: 2.0,
        i_shift: 1.0,
    };
    for kernel in &[symmetric, shifted] {
        let mut previous = -1.0;
        for k in 0..50 {
            let i = social_influence(kernel, k);
            // The mathematical bound is open, but the sigmoid saturates to
            // exactly 1.0 in f64 for large arguments.
            assert!((0.0..=1.0).contains(&i));
            assert!(i >= previous, "must not shrink as neighbors adopt");
            previous = i;
        }
    }
    // Zero adopting neighbors is the neutral baseline of the symmetric kernel.
    assert!(social_influence(&symmetric, 0).abs() < 1e-12);
}

#[test]
pub fn test_narrative_influence_grows_with_proximity() {
    let content = ContentGraph::new(topology::linear(6));
    let kernel = VisibilityKernel::InverseDistance;
    let field = content.distance_field(0);
    // Holding a direct neighbor of the candidate beats holding a far item.
    let near = narrative_influence(&kernel, 1.0, 1.0, 1.0, 5.0, [1].iter().copied(), &field, 6);
    let far = narrative_influence(&kernel, 1.0, 1.0, 1.0, 5.0, [5].iter().copied(), &field, 6);
    assert!(near > far);
    assert!((0. ..1.).contains(&near));
    assert!((0. ..1.).contains(&far));
    // An expired item contributes exactly nothing.
    let gone = narrative_influence(&kernel, 0.0, 1.0, 1.0, 5.0, [1].iter().copied(), &field, 6);
    assert_eq!(gone, 0.);
}

#[test]
pub fn test_unreachable_items_contribute_nothing() {
    let mut graph = topology::linear(2);
    graph.add_node(());
    let content = ContentGraph::new(graph);
    let field = content.distance_field(0);
    let with_orphan = narrative_influence(
        &VisibilityKernel::InverseDistance,
        1.0,
        1.0,
        1.0,
        5.0,
        [1, 2].iter().copied(),
        &field,
        3,
    );
    let without = narrative_influence(
        &VisibilityKernel::InverseDistance,
        1.0,
        1.0,
        1.0,
        5.0,
        [1].iter().copied(),
        &field,
        3,
    );
    assert!((with_orphan - without).abs() < 1e-12);
}

#[test]
pub fn test_field_of_vision_truncates() {
    let content = ContentGraph::new(topology::linear(6));
    let field = content.distance_field(0);
    let wide = VisibilityKernel::FieldOfVision { phi: 5 };
    let narrow = VisibilityKernel::FieldOfVision { phi: 2 };
    // Item 5 lies at distance 5, outside a radius of 2.
    let seen = narrative_influence(&wide, 1.0, 1.0, 1.0, 5.0, [5].iter().copied(), &field, 6);
    let unseen = narrative_influence(&narrow, 1.0, 1.0, 1.0, 5.0, [5].iter().copied(), &field, 6);
    let nothing = narrative_influence(&narrow, 1.0, 1.0, 1.0, 5.0, std::iter::empty(), &field, 6);
    assert!(seen > unseen);
    assert!((unseen - nothing).abs() < 1e-12);
}

#[test]
pub fn test_combined_probability_gets_a_floor() {
    let policy = Combination::Convex { alpha: 0.5 };
    assert_eq!(combine(&policy, 0., 0., None), EPSILON_FLOOR);
    assert!((combine(&policy, 0.4, 0.8, None) - 0.6).abs() < 1e-12);
}

#[test]
pub fn test_weighted_sum_normalizes() {
    let policy = Combination::WeightedSum {
        w_narrative: 1.0,
        w_social: 1.0,
        w_alignment: 2.0,
    };
    // Full alignment in [-1, 1] maps to 1 after rescaling.
    let p = combine(&policy, 1.0, 1.0, Some(1.0));
    assert!((p - 1.0).abs() < 1e-12);
    // Missing alignment is neutral.
    let q = combine(&policy, 0.0, 0.0, None);
    assert!((q - 0.25).abs() < 1e-12);
}

#[test]
pub fn test_already_adopted_is_a_sentinel() {
    let mut rng = ChaCha8Rng::seed_from_u64(0);
    let agent = Agent::new(0, 3, &[1]);
    let policy = Combination::Convex { alpha: 0.5 };
    assert_eq!(
        decide_adoption(&agent, 1, 0.2, 0.2, None, &policy, &mut rng),
        (true, 1.0, 1.0, 1.0)
    );
    let (_, prob, w, i) = decide_adoption(&agent, 0, 0.2, 0.4, None, &policy, &mut rng);
    assert!((prob - 0.3).abs() < 1e-12);
    assert!((w - 0.2).abs() < 1e-12);
    assert!((i - 0.4).abs() < 1e-12);
}

#[test]
pub fn test_trial_banners_follow_their_period() {
    let o = observation::Settings {
        log_every: 2,
        log_coverage: 0,
    };
    assert!(o.banner_due(0));
    assert!(!o.banner_due(1));
    assert!(o.banner_due(2));
    assert!(!quiet().banner_due(0));
}

#[test]
pub fn test_seed_partition_covers_before_repeating() {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    // 4 agents * 2 seeds = 8 = exactly the item count.
    let seeds = seed_partition(4, 8, 2, &mut rng);
    let mut all: Vec<usize> = seeds.iter().flatten().copied().collect();
    all.sort_unstable();
    assert_eq!(all, (0..8).collect::<Vec<_>>());
    // With more demand than items, every item appears before any third copy.
    let seeds = seed_partition(5, 4, 2, &mut rng);
    let mut counts = vec![0; 4];
    for item in seeds.iter().flatten() {
        counts[*item] += 1;
    }
    assert!(counts.iter().all(|&c| c == 2 || c == 3));
}

#[test]
pub fn test_seeding_within_one_trial() {
    let (content, social) = small_world(3, 4);
    let mut p = Parameters::default();
    p.seed_count = 2;
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let agents = initialization(&content, &social, &p, None, &mut rng);
    assert_eq!(agents.len(), 3);
    for agent in &agents {
        assert_eq!(agent.adoption_count(), 2);
    }
}

#[test]
pub fn test_no_intra_step_cascades() {
    // Two agents on a line, one item nobody holds. The narrative term is
    // saturated, so adoptions do happen in the first timestep, and the
    // social kernel is so steep that a single adopting neighbor would show
    // as a social term near 1. Yet every decision logged at t=0 must have
    // seen zero adopting neighbors: adoptions of the running timestep are
    // invisible until the commit.
    let (content, social) = small_world(2, 1);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.beta = 1000.0;
    p.x_s = 1000.0;
    p.social = SocialKernel::Symmetric { i_scale: 100.0 };
    p.timestep_budget = 50;
    let mut rng = ChaCha8Rng::seed_from_u64(3);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    let decided_at_zero: Vec<&Record> = summary
        .records
        .iter()
        .filter(|r| r.timestep == 0 && r.prob.is_some())
        .collect();
    assert_eq!(decided_at_zero.len(), 2);
    for r in decided_at_zero {
        assert_eq!(r.social, Some(0.0), "decisions at t=0 saw the seeded state");
    }
}

#[test]
pub fn test_adoption_is_monotone() {
    let (content, social) = small_world(3, 4);
    let p = Parameters::default();
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    // Once a pair is logged adopted, it stays adopted forever after.
    let mut adopted_since: rustc_hash::FxHashMap<(usize, usize), Timestep> =
        rustc_hash::FxHashMap::default();
    for r in &summary.records {
        if let Some(&t) = adopted_since.get(&(r.agent, r.item)) {
            if r.timestep > t {
                assert!(r.adopted, "adoption must never revert");
            }
        } else if r.adopted {
            adopted_since.insert((r.agent, r.item), r.timestep);
        }
    }
}

#[test]
pub fn test_run_is_reproducible() {
    let (content, social) = small_world(4, 5);
    let mut p = Parameters::default();
    p.trial_count = 2;
    p.timestep_budget = 20;
    let o = quiet();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let first = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    let second = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    assert_eq!(first.records, second.records);
    assert_eq!(first.outcomes, second.outcomes);
}

#[test]
pub fn test_certain_adoption_converges_immediately() {
    let (content, social) = small_world(3, 2);
    let mut p = Parameters::default();
    // A narrative term that saturates for every live item, taken alone.
    p.combination = Combination::Convex { alpha: 1.0 };
    p.beta = 1000.0;
    p.x_s = 1000.0;
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    assert_eq!(summary.outcomes, vec![Outcome::Converged(0)]);
}

#[test]
pub fn test_hopeless_runs_exhaust_the_budget() {
    let (content, social) = small_world(2, 3);
    let mut p = Parameters::default();
    p.seed_count = 0;
    // Social-only blending with no adopting neighbors leaves only the floor.
    p.combination = Combination::Convex { alpha: 0.0 };
    p.timestep_budget = 30;
    let mut rng = ChaCha8Rng::seed_from_u64(13);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    assert_eq!(summary.outcomes, vec![Outcome::Exhausted]);
    // Every decided record carries the floor probability.
    for r in summary.records.iter().filter(|r| r.prob.is_some()) {
        assert!(r.prob.unwrap() <= EPSILON_FLOOR);
        assert!(!r.adopted);
    }
}

#[test]
pub fn test_pending_items_are_logged_without_decision() {
    let (content, social) = small_world(2, 3);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.release_times = vec![0, 5, 5];
    p.timestep_budget = 3;
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    for r in summary.records.iter().filter(|r| r.item > 0) {
        assert!(r.timestep < 3);
        assert!(!r.adopted);
        assert_eq!(r.prob, None, "unreleased items must not be decided on");
    }
}

#[test]
pub fn test_age_window_drops_items_from_the_log() {
    let (content, social) = small_world(2, 1);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.relevance = Relevance::AgeWindow {
        max_item_relevance: 2,
    };
    // Make adoption essentially impossible so the window closes on everyone.
    p.combination = Combination::Convex { alpha: 0.0 };
    p.timestep_budget = 10;
    let mut rng = ChaCha8Rng::seed_from_u64(19);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    let last_logged = summary.records.iter().map(|r| r.timestep).max();
    assert_eq!(last_logged, Some(2), "expired items leave no further rows");
}

#[test]
pub fn test_viral_gating_needs_a_carrier() {
    // One end of a three-agent line holds the item; under viral gating only
    // the middle agent borders a carrier, so only the middle agent gets a
    // probability at all. The far end cannot even be tempted.
    let content = ContentGraph::new(topology::linear(1));
    let social = SocialGraph::new(topology::linear(3));
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.gating = Gating::Viral;
    let broadcasts = BroadcastSchedule::from_release_times(&[0], 1).unwrap();
    let cache = FieldCache::default();
    let mut rng = ChaCha8Rng::seed_from_u64(23);
    let mut records = vec![];
    let mut agents: Vec<Agent> = (0..3).map(|id| Agent::new(id, 1, &[])).collect();
    agents[0].set_adopted(0);
    let pending = crate::step_decide(
        &agents,
        &content,
        &social,
        &broadcasts,
        &p,
        0,
        0,
        &cache,
        &mut rng,
        &mut records,
    );
    let decided: Vec<usize> = records
        .iter()
        .filter(|r| r.prob.is_some())
        .map(|r| r.agent)
        .collect();
    assert_eq!(decided, vec![1]);
    assert!(pending.iter().all(|&(agent, _)| agent == 1));
    // The untouched pair is still on the record, as a non-decision.
    assert!(records
        .iter()
        .any(|r| r.agent == 2 && !r.adopted && r.prob.is_none()));
}

#[test]
pub fn test_two_agent_walkthrough() {
    // Two connected agents, a single live item held by neither: with the
    // defaults (beta 1, gamma 1, x_0 1, x_s 5, alpha 0.5) the narrative
    // sigmoid sits at sigmoid(5 * (1 + 0 - 1)) = 0.5 and the social term at
    // 0, giving a combined probability of 0.25.
    let (content, social) = small_world(2, 1);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.timestep_budget = 1;
    let mut rng = ChaCha8Rng::seed_from_u64(29);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    for r in summary.records.iter().filter(|r| r.timestep == 0) {
        assert!((r.prob.unwrap() - 0.25).abs() < 1e-12);
        assert!((r.narrative.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(r.social, Some(0.0));
    }
}

#[test]
pub fn test_seeded_neighbor_nearly_compels_adoption() {
    // Two agents on a line, one item, one seeded adopter. With a saturated
    // narrative term and a steep social kernel, the unseeded agent's very
    // first decision is nearly certain to adopt.
    let content = ContentGraph::new(topology::linear(1));
    let social = SocialGraph::new(topology::linear(2));
    let mut p = Parameters::default();
    p.beta = 2.0;
    p.social = SocialKernel::Symmetric { i_scale: 100.0 };
    let broadcasts = BroadcastSchedule::from_release_times(&[0], 1).unwrap();
    let cache = FieldCache::default();
    let mut rng = ChaCha8Rng::seed_from_u64(41);
    let mut records = vec![];
    let mut agents: Vec<Agent> = (0..2).map(|id| Agent::new(id, 1, &[])).collect();
    agents[0].set_adopted(0);
    crate::step_decide(
        &agents,
        &content,
        &social,
        &broadcasts,
        &p,
        0,
        0,
        &cache,
        &mut rng,
        &mut records,
    );
    let r = records.iter().find(|r| r.agent == 1).unwrap();
    assert!((0.95..=1.0).contains(&r.prob.unwrap()));
    assert!(r.narrative.unwrap() > 0.99);
    assert!(r.social.unwrap() > 0.99);
}

#[test]
pub fn test_rebroadcast_schedule_is_honored() {
    let (content, social) = small_world(1, 2);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.rebroadcasts = Some(vec![vec![0], vec![0, 4]]);
    p.relevance = Relevance::LinearDecay { delta: 0.4 };
    p.combination = Combination::Convex { alpha: 0.0 };
    p.timestep_budget = 6;
    let mut rng = ChaCha8Rng::seed_from_u64(31);
    let o = quiet();
    // Mostly a smoke test that the occurrence-list path validates and runs.
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    assert_eq!(summary.outcomes.len(), 1);
}

#[test]
pub fn test_short_rebroadcast_list_is_refused_up_front() {
    // One occurrence list for a three-item narrative must fail before the
    // first trial, not blow up inside it.
    let (content, social) = small_world(2, 3);
    let mut p = Parameters::default();
    p.rebroadcasts = Some(vec![vec![0]]);
    let mut rng = ChaCha8Rng::seed_from_u64(43);
    let o = quiet();
    assert!(run(&content, &social, &p, None, &mut rng, &o).is_err());
}

#[test]
pub fn test_expired_items_stop_logging_even_when_adopted() {
    // Each agent is seeded with one of the two items and the relevance
    // window closes right after the first timestep. From then on not even
    // the settled adopted pairs may leave a row.
    let (content, social) = small_world(2, 2);
    let mut p = Parameters::default();
    p.seed_count = 1;
    p.relevance = Relevance::AgeWindow {
        max_item_relevance: 0,
    };
    // A flat social kernel and alpha = 0 keep the unseeded pairs at the
    // floor, so nothing else adopts.
    p.combination = Combination::Convex { alpha: 0.0 };
    p.social = SocialKernel::Symmetric { i_scale: 0.0 };
    p.timestep_budget = 5;
    let mut rng = ChaCha8Rng::seed_from_u64(47);
    let o = quiet();
    let summary = run(&content, &social, &p, None, &mut rng, &o).unwrap();
    assert!(summary.records.iter().any(|r| r.adopted));
    assert_eq!(summary.records.iter().map(|r| r.timestep).max(), Some(0));
}

#[test]
pub fn test_bad_configurations_are_refused() {
    let mut p = Parameters::default();
    p.combination = Combination::Convex { alpha: 1.5 };
    assert!(p.validate().is_err());
    let mut p = Parameters::default();
    p.trial_count = 0;
    assert!(p.validate().is_err());
    let mut p = Parameters::default();
    p.release_times = vec![];
    assert!(p.validate().is_err());
    let mut p = Parameters::default();
    p.visibility = VisibilityKernel::FieldOfVision { phi: 0 };
    assert!(p.validate().is_err());
    assert!(Parameters::default().validate().is_ok());
}

#[test]
pub fn test_alignment_rows_reach_the_blend() {
    let (content, social) = small_world(2, 1);
    let mut p = Parameters::default();
    p.seed_count = 0;
    p.visibility = VisibilityKernel::GraphNormalized;
    p.combination = Combination::WeightedSum {
        w_narrative: 0.0,
        w_social: 0.0,
        w_alignment: 1.0,
    };
    p.timestep_budget = 1;
    let alignments = vec![vec![1.0], vec![-1.0]];
    let mut rng = ChaCha8Rng::seed_from_u64(37);
    let o = quiet();
    let summary = run(&content, &social, &p, Some(&alignments), &mut rng, &o).unwrap();
    let probs: rustc_hash::FxHashMap<usize, f64> = summary
        .records
        .iter()
        .filter(|r| r.timestep == 0 && r.prob.is_some())
        .map(|r| (r.agent, r.prob.unwrap()))
        .collect();
    // Full agreement adopts surely, full disagreement only via the floor.
    assert!((probs[&0] - 1.0).abs() < 1e-12);
    assert!(probs[&1] <= EPSILON_FLOOR);
}
