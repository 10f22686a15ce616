/*!
Model Description
=================

This model description loosely follows the ODD (Overview, Design concept,
Details) protocol (Grimm et al., 2006; Grimm et al., 2010), to the extent
useful in Rust source code: the source is commented using natural-language
descriptions of the submodels, and the reference documentation is generated
from this file.

# 1. Purpose

The model describes how a population of interconnected agents comes to adopt
the items of a narrative (story beats, claims, rumors) over discrete time.
Two forces compete: the visibility of an item inside the narrative structure,
and peer pressure inside a social network. The model is used to explore how
broadcast timing, content layout, and network topology affect diffusion speed
and final coverage.

The narrative force is a complex-contagion-style visibility term: an item is
easier to adopt the closer it sits, in the content graph, to items the agent
already holds. The social force is a threshold-flavoured peer term driven by
the number of adopting neighbors. Both are squashed through logistic kernels
and blended into a single adoption probability; one uniform draw per agent,
item and timestep decides.

 */

use bitvec::prelude::*;
use rand::prelude::*;
use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

pub mod cli;
pub mod narrativegraph;
pub mod schedule;
pub mod socialgraph;
pub mod topology;

#[cfg(test)]
mod tests;

use narrativegraph::{cached_field, ContentGraph, FieldCache};
use schedule::{BroadcastSchedule, Liveness};
use socialgraph::SocialGraph;
use submodels::parameters::{ConfigError, Gating, Parameters};

/**

# 2. Entities, state variables, and scales

The model consists of agents interacting on two fixed undirected graphs in
discrete time: a content graph over story items, whose distances measure
narrative proximity, and a social graph over the agents themselves. A
timestep has no imposed real-world duration; it is simply the granularity at
which broadcasts happen and decisions are re-made.

 */
pub type Timestep = u32;

/// Items are nodes of the content graph.
pub type ItemId = petgraph::graph::NodeIndex<usize>;
/// Agents are nodes of the social graph.
pub type AgentId = petgraph::graph::NodeIndex<usize>;

/// Substituted for a combined influence of exactly zero, so that no agent is
/// ever permanently stuck just because all influence terms cancel.
pub const EPSILON_FLOOR: f64 = 1e-9;

/**
## 2.1 Agents

The decision-making entities. An agent owns exactly one piece of mutable
state, one adoption flag per story item. Flags only ever flip false to true;
adoption is irreversible, and the flag vector is re-seeded at the start of
every trial.

Agents may additionally carry a static, externally supplied alignment score
per item in [-1, 1], for experiments where topical agreement matters more
than narrative proximity.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: usize,
    adopted: BitVec,
    pub alignment: Option<Vec<f64>>,
}

impl Agent {
    pub fn new(id: usize, n_items: usize, seed_adoptions: &[usize]) -> Agent {
        let mut adopted = bitvec![0; n_items];
        for &item in seed_adoptions {
            adopted.set(item, true);
        }
        Agent {
            id,
            adopted,
            alignment: None,
        }
    }

    pub fn is_adopted(&self, item: usize) -> bool {
        self.adopted[item]
    }

    /// Idempotent, and never called with intent to revert.
    pub fn set_adopted(&mut self, item: usize) {
        self.adopted.set(item, true);
    }

    /// The source set for narrative-distance queries.
    pub fn adopted_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.adopted.iter_ones()
    }

    pub fn adoption_count(&self) -> usize {
        self.adopted.count_ones()
    }

    /// The per-agent convergence signal.
    pub fn all_adopted(&self) -> bool {
        self.adopted.all()
    }
}

/**
## 2.2 Result records

Every visited (agent, item) pair leaves one immutable log entry per timestep.
Pairs that were settled without a probability computation, because the item
was already adopted or not yet broadcast, carry empty influence fields; items
past a hard relevance cutoff leave no entry at all.
 */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub agent: usize,
    pub timestep: Timestep,
    pub item: usize,
    pub adopted: bool,
    pub prob: Option<f64>,
    pub narrative: Option<f64>,
    pub social: Option<f64>,
    pub trial: usize,
}

impl Record {
    fn settled(agent: usize, timestep: Timestep, item: usize, adopted: bool, trial: usize) -> Record {
        Record {
            agent,
            timestep,
            item,
            adopted,
            prob: None,
            narrative: None,
            social: None,
            trial,
        }
    }
}

/// How a trial ended. Running out of timesteps without full adoption is a
/// perfectly normal result, just a different one from early convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Every agent held every item after the commit of this timestep.
    Converged(Timestep),
    /// The timestep budget ran out first.
    Exhausted,
}

/**
## 2.3 State

The mutable state of one trial: the agent population and the current
timestep. The graphs, the broadcast schedule and the parameters live outside
and are read-only for the trial's whole duration.
 */
pub struct State {
    pub agents: Vec<Agent>,
    pub t: Timestep,
    pub trial: usize,
}

/**

# 3. Process overview and scheduling

A timestep has two strictly separated parts.

The deciding part visits every agent and every considered item and computes
the adoption decision against the population state as it was at the end of
the previous timestep. Nothing is mutated: an adoption committed in timestep
t is invisible to every other decision of timestep t, so there are no
intra-step cascades and the result does not depend on the order in which
agents are visited. Decisions are buffered.

The committing part applies the buffered adoptions in a single pass. It only
ever sets flags to true, so it is order-independent as well.

 */
fn step<R: Rng>(
    state: &mut State,
    content: &ContentGraph,
    social: &SocialGraph,
    broadcasts: &BroadcastSchedule,
    p: &Parameters,
    cache: &FieldCache,
    rng: &mut R,
    records: &mut Vec<Record>,
) {
    let pending = step_decide(
        &state.agents,
        content,
        social,
        broadcasts,
        p,
        state.t,
        state.trial,
        cache,
        rng,
        records,
    );
    step_commit(&mut state.agents, pending);
}

/**
The deciding phase only reads shared state, so its expensive, purely
structural part, the per-item distance fields over the content graph, is
filled into a shared cache in parallel up front. The probability draws
themselves stay sequential in (agent, item) order, which makes a run with a
fixed random seed exactly reproducible.

Gating comes in two mutually exclusive flavours. Under broadcast gating (the
default) an item is considered once the schedule has made it live, and its
baseline relevance theta comes from the configured relevance policy. Under
viral gating the schedule is ignored: an item is considered exactly when at
least one social neighbor already holds it, at full baseline relevance.
 */
#[allow(clippy::too_many_arguments)]
fn step_decide<R: Rng>(
    agents: &[Agent],
    content: &ContentGraph,
    social: &SocialGraph,
    broadcasts: &BroadcastSchedule,
    p: &Parameters,
    t: Timestep,
    trial: usize,
    cache: &FieldCache,
    rng: &mut R,
    records: &mut Vec<Record>,
) -> Vec<(usize, usize)> {
    let n_items = content.len();
    let liveness: Vec<Liveness> = (0..n_items)
        .map(|item| broadcasts.liveness(item, t, &p.relevance))
        .collect();
    let wanted: Vec<usize> = match p.gating {
        Gating::Broadcast => (0..n_items)
            .filter(|&item| liveness[item] == Liveness::Live)
            .collect(),
        Gating::Viral => (0..n_items).collect(),
    };
    wanted.par_iter().for_each(|&item| {
        cached_field(cache, content, item);
    });

    let mut pending: Vec<(usize, usize)> = vec![];
    for agent in agents {
        for item in 0..n_items {
            // An expired item leaves no row at all, adopted or not.
            if p.gating == Gating::Broadcast && liveness[item] == Liveness::Expired {
                continue;
            }
            if agent.is_adopted(item) {
                records.push(Record::settled(agent.id, t, item, true, trial));
                continue;
            }
            let theta = match p.gating {
                Gating::Viral => {
                    let circulating = social
                        .neighbors(agent.id)
                        .any(|n| agents[n].is_adopted(item));
                    if !circulating {
                        records.push(Record::settled(agent.id, t, item, false, trial));
                        continue;
                    }
                    p.beta
                }
                Gating::Broadcast => match liveness[item] {
                    Liveness::Pending => {
                        records.push(Record::settled(agent.id, t, item, false, trial));
                        continue;
                    }
                    Liveness::Expired => continue,
                    Liveness::Live => broadcasts.theta(item, t, p.beta, &p.relevance),
                },
            };
            let field = cached_field(cache, content, item);
            let w = submodels::influence::narrative_influence(
                &p.visibility,
                theta,
                p.gamma,
                p.x_0,
                p.x_s,
                agent.adopted_set(),
                &field,
                n_items,
            );
            let adopting_neighbors = social
                .neighbors(agent.id)
                .filter(|&n| agents[n].is_adopted(item))
                .count();
            let i = submodels::influence::social_influence(&p.social, adopting_neighbors);
            let alignment = agent.alignment.as_ref().map(|a| (1. + a[item]) / 2.);
            let (adopted, prob, w, i) = submodels::adoption::decide_adoption(
                agent,
                item,
                w,
                i,
                alignment,
                &p.combination,
                rng,
            );
            records.push(Record {
                agent: agent.id,
                timestep: t,
                item,
                adopted,
                prob: Some(prob),
                narrative: Some(w),
                social: Some(i),
                trial,
            });
            if adopted {
                pending.push((agent.id, item));
            }
        }
    }
    pending
}

/// Apply the buffered adoptions. A single writer, and monotone, so the order
/// of the buffer does not matter.
fn step_commit(agents: &mut [Agent], pending: Vec<(usize, usize)>) {
    for (agent, item) in pending {
        agents[agent].set_adopted(item);
    }
}

/**

# 4. Design concepts

## 4.1 Stochasticity

There is exactly one source of randomness in a running trial: the single
uniform draw in [0, 1) per undecided (agent, item) pair and timestep. Draws
are independent; any correlation between agents' adoptions emerges through
the influence terms, which read the neighbors' previous-step state. The
random source is injected by the caller, so a seeded generator reproduces a
run bit for bit. The other stochastic element, the seed-adoption partition,
uses the same injected source before the first timestep.

## 4.2 Observation

The pooled record log is the model's primary output; everything else, trial
banners and per-timestep coverage printing, is optional eyeballing
controlled by `observation::Settings`.

 */
pub mod observation {
    use crate::{Agent, Timestep};

    pub struct Settings {
        /// Period of trial banners; 0 silences them.
        pub log_every: Timestep,
        /// Period of per-timestep coverage lines; 0 silences them.
        pub log_coverage: Timestep,
    }

    impl Settings {
        /// Trial banners fire on every `log_every`-th trial, counting from
        /// the first.
        pub fn banner_due(&self, trial: usize) -> bool {
            self.log_every > 0 && trial % self.log_every as usize == 0
        }
    }

    pub fn print_coverage(t: Timestep, agents: &[Agent]) {
        let adoptions: usize = agents.iter().map(Agent::adoption_count).sum();
        let saturated = agents.iter().filter(|a| a.all_adopted()).count();
        println!(
            "t: {:}, adoptions: {:}, saturated: {:}/{:}",
            t,
            adoptions,
            saturated,
            agents.len()
        );
    }
}

/**

# 5. Initialization

Agents are (re)constructed at the start of every trial. Each receives
`seed_count` items already adopted, handed out by an explicit
draw-without-replacement partition of the item set across agents (Submodel
7.3): no item is seeded twice before every item has been seeded once.
Alignment rows, where an experiment uses them, are attached here as well.

 */
pub fn initialization<R: Rng>(
    content: &ContentGraph,
    social: &SocialGraph,
    p: &Parameters,
    alignments: Option<&[Vec<f64>]>,
    rng: &mut R,
) -> Vec<Agent> {
    let seeds = submodels::seeding::seed_partition(social.len(), content.len(), p.seed_count, rng);
    (0..social.len())
        .map(|id| {
            let mut agent = Agent::new(id, content.len(), &seeds[id]);
            if let Some(rows) = alignments {
                agent.alignment = rows.get(id).cloned();
            }
            agent
        })
        .collect()
}

/**

# 6. The trial loop

One trial alternates deciding and committing until either every agent holds
every item (convergence, with early stop) or the timestep budget is
exhausted. Both ends are regular terminal states and are reported
distinguishably.

 */
#[allow(clippy::too_many_arguments)]
pub fn run_trial<R: Rng>(
    content: &ContentGraph,
    social: &SocialGraph,
    broadcasts: &BroadcastSchedule,
    p: &Parameters,
    trial: usize,
    alignments: Option<&[Vec<f64>]>,
    cache: &FieldCache,
    rng: &mut R,
    records: &mut Vec<Record>,
    o: &observation::Settings,
) -> Outcome {
    let mut state = State {
        agents: initialization(content, social, p, alignments, rng),
        t: 0,
        trial,
    };
    loop {
        step(
            &mut state, content, social, broadcasts, p, cache, rng, records,
        );
        if (o.log_coverage > 0) && (state.t % o.log_coverage == 0) {
            observation::print_coverage(state.t, &state.agents);
        }
        if state.agents.iter().all(Agent::all_adopted) {
            return Outcome::Converged(state.t);
        }
        state.t += 1;
        if state.t >= p.timestep_budget {
            return Outcome::Exhausted;
        }
    }
}

pub struct RunSummary {
    /// One pooled log across all trials, tagged by trial index.
    pub records: Vec<Record>,
    pub outcomes: Vec<Outcome>,
}

/**
A full run: validate the configuration once, derive the broadcast schedule,
then run `trial_count` independently re-seeded trials back to back, pooling
all result records into one log handed back to the caller. Distance fields
are cached across trials; the graphs never change.
 */
pub fn run<R: Rng>(
    content: &ContentGraph,
    social: &SocialGraph,
    p: &Parameters,
    alignments: Option<&[Vec<f64>]>,
    rng: &mut R,
    o: &observation::Settings,
) -> Result<RunSummary, ConfigError> {
    p.validate()?;
    let broadcasts = match &p.rebroadcasts {
        Some(occurrences) => {
            BroadcastSchedule::from_occurrences(occurrences.clone(), content.len())?
        }
        None => BroadcastSchedule::from_release_times(&p.release_times, content.len())?,
    };
    let cache = FieldCache::default();
    let mut records: Vec<Record> = vec![];
    let mut outcomes: Vec<Outcome> = Vec::with_capacity(p.trial_count);
    for trial in 0..p.trial_count {
        if o.banner_due(trial) {
            println!("Running trial {:}...", trial + 1);
        }
        let outcome = run_trial(
            content,
            social,
            &broadcasts,
            p,
            trial,
            alignments,
            &cache,
            rng,
            &mut records,
            o,
        );
        if o.banner_due(trial) {
            println!("{:?}", outcome);
        }
        outcomes.push(outcome);
    }
    Ok(RunSummary { records, outcomes })
}

/**

# 7. Submodels

 */
pub mod submodels {
    /**
    ## 7.1 Influence kernels

    Both influence terms are pure functions of the previous-step adoption
    state, squashed through logistic curves so that they stay inside their
    advertised bounds for any finite input.
     */
    pub mod influence {
        use crate::submodels::parameters::{SocialKernel, VisibilityKernel};

        pub fn sigmoid(x: f64) -> f64 {
            1. / (1. + (-x).exp())
        }

        /**
        Peer pressure from the number of the agent's neighbors that already
        hold the item. The symmetric variant maps a count of zero to a
        neutral baseline of 0 and saturates towards 1; the log-shifted
        variant saturates more gradually and allows a configurable
        inflection point.
         */
        pub fn social_influence(kernel: &SocialKernel, adopting_neighbors: usize) -> f64 {
            let k = adopting_neighbors as f64;
            match kernel {
                SocialKernel::Symmetric { i_scale } => 2. * sigmoid(i_scale * k) - 1.,
                SocialKernel::LogShifted { i_scale, i_shift } => {
                    sigmoid(i_scale * ((1. + k).ln() - i_shift))
                }
            }
        }

        /**
        Visibility of a candidate item from the agent's already-adopted
        items. Distances come from a precomputed field over the content
        graph; unreachable items contribute nothing, since partial
        connectivity is an expected configuration, not an error. An item
        whose baseline relevance `theta` has decayed to zero contributes
        exactly 0, skipping the computation entirely.

        The raw visibility weight is summed according to the configured
        kernel and then squashed as sigmoid(x_s * (theta + gamma * raw -
        x_0)), bounded to (0, 1). The graph-normalized kernel is the odd one
        out: it divides the inverse-distance sum by the item count and
        returns it unsquashed, for use with the weighted-sum combination
        where an alignment term is meant to dominate.
         */
        #[allow(clippy::too_many_arguments)]
        pub fn narrative_influence(
            kernel: &VisibilityKernel,
            theta: f64,
            gamma: f64,
            x_0: f64,
            x_s: f64,
            adopted: impl Iterator<Item = usize>,
            field: &[Option<u32>],
            n_items: usize,
        ) -> f64 {
            if theta <= 0. {
                return 0.;
            }
            let mut raw = 0.;
            for source in adopted {
                let d = match field.get(source).copied().flatten() {
                    None => continue,
                    Some(0) => continue,
                    Some(d) => f64::from(d),
                };
                raw += match kernel {
                    VisibilityKernel::InverseDistance | VisibilityKernel::GraphNormalized => 1. / d,
                    VisibilityKernel::FieldOfVision { phi } => {
                        if d <= f64::from(*phi) {
                            1. / d
                        } else {
                            0.
                        }
                    }
                    VisibilityKernel::SharpenedLocality { xi } => 1. / d.powf(*xi),
                    VisibilityKernel::ExponentialDecay { .. } => (-d).exp(),
                };
            }
            match kernel {
                VisibilityKernel::GraphNormalized => raw / n_items as f64,
                VisibilityKernel::ExponentialDecay { tau } => {
                    sigmoid(x_s * (theta + gamma * sigmoid(raw - tau) - x_0))
                }
                _ => sigmoid(x_s * (theta + gamma * raw - x_0)),
            }
        }
    }

    /**
    ## 7.2 Adoption decision

    The influence terms are blended by the configured combination policy and
    tested against one uniform draw.
     */
    pub mod adoption {
        use crate::submodels::parameters::Combination;
        use crate::{Agent, EPSILON_FLOOR};
        use rand::prelude::*;

        /**
        Blend narrative, social and (optionally) alignment influence into an
        adoption probability. A missing alignment counts as neutral. A
        combined influence of exactly zero is replaced by a small positive
        floor; certain non-adoption would leave an agent permanently stuck
        whenever all terms cancel.
         */
        pub fn combine(policy: &Combination, w: f64, i: f64, alignment: Option<f64>) -> f64 {
            let p = match policy {
                Combination::Convex { alpha } => alpha * w + (1. - alpha) * i,
                Combination::WeightedSum {
                    w_narrative,
                    w_social,
                    w_alignment,
                } => {
                    let a = alignment.unwrap_or(0.5);
                    (w_narrative * w + w_social * i + w_alignment * a)
                        / (w_narrative + w_social + w_alignment)
                }
            };
            if p == 0. {
                EPSILON_FLOOR
            } else {
                p
            }
        }

        /**
        Decide whether the agent adopts the item. For an item the agent
        already holds, all reported values are conventionally 1.0, a
        sentinel meaning "already decided, nothing was computed". Otherwise
        the adoption happens iff a single uniform sample in [0, 1) falls at
        or below the combined probability.
         */
        pub fn decide_adoption<R: Rng>(
            agent: &Agent,
            item: usize,
            w: f64,
            i: f64,
            alignment: Option<f64>,
            policy: &Combination,
            rng: &mut R,
        ) -> (bool, f64, f64, f64) {
            if agent.is_adopted(item) {
                return (true, 1.0, 1.0, 1.0);
            }
            let prob = combine(policy, w, i, alignment);
            (rng.gen::<f64>() <= prob, prob, w, i)
        }
    }

    /**
    ## 7.3 Seed partitioning

    Distribute seed adoptions across agents by drawing without replacement:
    a shuffled pool of all items is consumed `seeds_per_agent` at a time and
    replenished with a freshly shuffled full copy whenever it runs short.
    Every item is seeded once before any item is seeded twice.
     */
    pub mod seeding {
        use rand::prelude::*;

        pub fn seed_partition<R: Rng>(
            n_agents: usize,
            n_items: usize,
            seeds_per_agent: usize,
            rng: &mut R,
        ) -> Vec<Vec<usize>> {
            let mut pool: Vec<usize> = vec![];
            (0..n_agents)
                .map(|_| {
                    if pool.len() < seeds_per_agent && n_items > 0 {
                        let mut fresh: Vec<usize> = (0..n_items).collect();
                        fresh.shuffle(rng);
                        pool.extend(fresh);
                    }
                    let take = seeds_per_agent.min(pool.len());
                    pool.drain(..take).collect()
                })
                .collect()
        }
    }

    /**
    ## 7.4 Parameters

    All knobs of the model, including the pluggable policies, as one plain
    record. Policies are small tagged variants dispatched once per decision.
    A configuration is validated before any trial starts; a bad one never
    reaches the simulation.
     */
    pub mod parameters {
        use crate::Timestep;
        use serde_derive::{Deserialize, Serialize};
        use thiserror::Error;

        #[derive(Debug, Error)]
        pub enum ConfigError {
            #[error("could not read configuration: {0}")]
            Io(#[from] std::io::Error),
            #[error("could not parse configuration: {0}")]
            Parse(#[from] serde_json::Error),
            #[error("invalid value for {field}: {reason}")]
            Invalid {
                field: &'static str,
                reason: String,
            },
        }

        /// Peer-pressure squashing kernel.
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum SocialKernel {
            /// 2 sigmoid(i_scale k) - 1, in [0, 1) for k >= 0.
            Symmetric { i_scale: f64 },
            /// sigmoid(i_scale (ln(1 + k) - i_shift)), in (0, 1).
            LogShifted { i_scale: f64, i_shift: f64 },
        }

        /// How adopted-item distances combine into a raw visibility weight.
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum VisibilityKernel {
            /// Sum of inverse distances.
            InverseDistance,
            /// Inverse distances up to a maximum radius phi; beyond it an
            /// adopted item contributes nothing.
            FieldOfVision { phi: u32 },
            /// Inverse distances raised to the exponent xi, for a sharper
            /// locality preference.
            SharpenedLocality { xi: f64 },
            /// Exponentially decayed distances, recentered by a secondary
            /// sigmoid around the threshold tau.
            ExponentialDecay { tau: f64 },
            /// Inverse-distance sum divided by the item count, unsquashed.
            /// For the alignment experiments, where the weighted-sum
            /// combination normalizes instead.
            GraphNormalized,
        }

        /// Baseline-relevance policy for a broadcast item.
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum Relevance {
            /// Full beta for as long as the item is live.
            Constant,
            /// beta - delta per timestep since the most recent broadcast,
            /// clamped at zero; re-broadcasting restores full beta.
            LinearDecay { delta: f64 },
            /// beta (1 - age/(max+1)); past max_item_relevance timesteps
            /// since first release the item is dropped from consideration
            /// entirely.
            AgeWindow { max_item_relevance: Timestep },
        }

        /// How the influence terms blend into one probability.
        #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum Combination {
            /// alpha narrative + (1 - alpha) social.
            Convex { alpha: f64 },
            /// Independent weights for narrative, social and alignment,
            /// normalized by their sum.
            WeightedSum {
                w_narrative: f64,
                w_social: f64,
                w_alignment: f64,
            },
        }

        /// What makes an item considerable at all. The two variants are
        /// alternatives; they are never combined.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(tag = "kind", rename_all = "snake_case")]
        pub enum Gating {
            /// The broadcast schedule decides (the default).
            Broadcast,
            /// An item spreads only through neighbors that already hold it;
            /// the schedule is ignored.
            Viral,
        }

        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(deny_unknown_fields)]
        pub struct Parameters {
            /// Baseline narrative relevance of a freshly broadcast item.
            pub beta: f64,
            /// Weight of the graph-proximity boost on top of beta.
            pub gamma: f64,
            /// Inflection shift of the narrative sigmoid.
            pub x_0: f64,
            /// Slope of the narrative sigmoid.
            pub x_s: f64,
            /// Items pre-adopted per agent at trial start.
            pub seed_count: usize,
            /// Independently re-seeded repetitions of the simulation.
            pub trial_count: usize,
            /// Unconditional stop per trial.
            pub timestep_budget: Timestep,
            /// Dense per-item release times; padded by replicating the last
            /// entry when shorter than the item count.
            pub release_times: Vec<Timestep>,
            /// Full broadcast occurrences per item, for re-broadcast
            /// experiments. Takes precedence over `release_times`.
            #[serde(default)]
            pub rebroadcasts: Option<Vec<Vec<Timestep>>>,
            /// Stem of the output directory.
            pub filestub: String,
            pub social: SocialKernel,
            pub visibility: VisibilityKernel,
            pub relevance: Relevance,
            pub combination: Combination,
            pub gating: Gating,
        }

        impl Default for Parameters {
            fn default() -> Parameters {
                Parameters {
                    beta: 1.0,
                    gamma: 1.0,
                    x_0: 1.0,
                    x_s: 5.0,
                    seed_count: 1,
                    trial_count: 1,
                    timestep_budget: 100,
                    release_times: vec![0],
                    rebroadcasts: None,
                    filestub: "diffusion".to_string(),
                    social: SocialKernel::Symmetric { i_scale: 5.0 },
                    visibility: VisibilityKernel::InverseDistance,
                    relevance: Relevance::Constant,
                    combination: Combination::Convex { alpha: 0.5 },
                    gating: Gating::Broadcast,
                }
            }
        }

        impl Parameters {
            /// Load from a JSON file. Unknown fields and missing required
            /// fields are construction-time failures, as is anything
            /// `validate` rejects.
            pub fn from_file(path: &std::path::Path) -> Result<Parameters, ConfigError> {
                let text = std::fs::read_to_string(path)?;
                let p: Parameters = serde_json::from_str(&text)?;
                p.validate()?;
                Ok(p)
            }

            pub fn validate(&self) -> Result<(), ConfigError> {
                fn invalid(field: &'static str, reason: String) -> ConfigError {
                    ConfigError::Invalid { field, reason }
                }
                if self.trial_count == 0 {
                    return Err(invalid("trial_count", "need at least one trial".to_string()));
                }
                if self.timestep_budget == 0 {
                    return Err(invalid(
                        "timestep_budget",
                        "need at least one timestep".to_string(),
                    ));
                }
                if self.rebroadcasts.is_none() && self.release_times.is_empty() {
                    return Err(invalid(
                        "release_times",
                        "no release time supplied".to_string(),
                    ));
                }
                match self.combination {
                    Combination::Convex { alpha } => {
                        if !(0. ..=1.).contains(&alpha) {
                            return Err(invalid(
                                "alpha",
                                format!("must lie in [0, 1], got {:}", alpha),
                            ));
                        }
                    }
                    Combination::WeightedSum {
                        w_narrative,
                        w_social,
                        w_alignment,
                    } => {
                        for (name, w) in &[
                            ("w_narrative", w_narrative),
                            ("w_social", w_social),
                            ("w_alignment", w_alignment),
                        ] {
                            if *w < 0. || !w.is_finite() {
                                return Err(invalid(
                                    "combination",
                                    format!("{:} must be finite and non-negative", name),
                                ));
                            }
                        }
                        if w_narrative + w_social + w_alignment == 0. {
                            return Err(invalid(
                                "combination",
                                "the weights must not all be zero".to_string(),
                            ));
                        }
                    }
                }
                match self.social {
                    SocialKernel::Symmetric { i_scale } => {
                        if !i_scale.is_finite() || i_scale < 0. {
                            return Err(invalid(
                                "i_scale",
                                "must be finite and non-negative".to_string(),
                            ));
                        }
                    }
                    SocialKernel::LogShifted { i_scale, i_shift } => {
                        if !i_scale.is_finite() || i_scale < 0. || !i_shift.is_finite() {
                            return Err(invalid(
                                "i_scale",
                                "scale and shift must be finite, scale non-negative".to_string(),
                            ));
                        }
                    }
                }
                match self.visibility {
                    VisibilityKernel::FieldOfVision { phi } => {
                        if phi == 0 {
                            return Err(invalid(
                                "phi",
                                "a field of vision of radius 0 sees nothing".to_string(),
                            ));
                        }
                    }
                    VisibilityKernel::SharpenedLocality { xi } => {
                        if !xi.is_finite() {
                            return Err(invalid("xi", "must be finite".to_string()));
                        }
                    }
                    VisibilityKernel::ExponentialDecay { tau } => {
                        if !tau.is_finite() {
                            return Err(invalid("tau", "must be finite".to_string()));
                        }
                    }
                    _ => {}
                }
                if let Relevance::LinearDecay { delta } = self.relevance {
                    if !delta.is_finite() || delta < 0. {
                        return Err(invalid(
                            "delta",
                            "must be finite and non-negative".to_string(),
                        ));
                    }
                }
                for v in &[self.beta, self.gamma, self.x_0, self.x_s] {
                    if !v.is_finite() {
                        return Err(invalid(
                            "parameters",
                            "beta, gamma, x_0 and x_s must be finite".to_string(),
                        ));
                    }
                }
                Ok(())
            }
        }
    }
}

/**

# 8. Output

Persistence of the pooled record log, the parameters, and graph snapshots.
The simulation core never touches the file system; these helpers are called
by the binaries after a run.

 */
pub mod output {
    use crate::submodels::parameters::Parameters;
    use crate::Record;
    use std::fs::File;
    use std::io::prelude::*;
    use std::path::{Path, PathBuf};

    /// `data/<stub>`, or `data/<stub>_1`, `data/<stub>_2`, … if taken.
    /// Creates the directory.
    pub fn unique_directory(stub: &str) -> Result<PathBuf, String> {
        let base = Path::new("data");
        let mut candidate = base.join(stub);
        let mut counter = 0;
        while candidate.exists() {
            counter += 1;
            candidate = base.join(format!("{:}_{:}", stub, counter));
        }
        std::fs::create_dir_all(&candidate).map_err(|e| e.to_string())?;
        Ok(candidate)
    }

    fn cell(value: &Option<f64>) -> String {
        match value {
            None => String::new(),
            Some(x) => format!("{:}", x),
        }
    }

    pub fn store_records_csv(records: &[Record], path: &Path) -> Result<(), String> {
        let file = File::create(path).map_err(|e| e.to_string())?;
        let mut out = std::io::BufWriter::new(file);
        writeln!(
            out,
            "agent,timestep,story_item,adopted,prob,Narrative,Social,Trial"
        )
        .map_err(|e| e.to_string())?;
        for r in records {
            writeln!(
                out,
                "{:},{:},{:},{:},{},{},{},{:}",
                r.agent,
                r.timestep,
                r.item,
                r.adopted,
                cell(&r.prob),
                cell(&r.narrative),
                cell(&r.social),
                r.trial
            )
            .map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    /// A JSON copy for machines and a key=value dump for eyeballing.
    pub fn store_parameters(p: &Parameters, directory: &Path) -> Result<(), String> {
        let file = File::create(directory.join("parameters.json")).map_err(|e| e.to_string())?;
        serde_json::to_writer_pretty(file, p).map_err(|e| e.to_string())?;

        let value = serde_json::to_value(p).map_err(|e| e.to_string())?;
        let file = File::create(directory.join("parameters.txt")).map_err(|e| e.to_string())?;
        let mut out = std::io::BufWriter::new(file);
        if let serde_json::Value::Object(entries) = value {
            for (key, v) in entries {
                writeln!(out, "{:}={:}", key, v).map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }

    pub fn store_graph<G: serde::Serialize>(graph: &G, path: &Path) -> Result<(), String> {
        let file = File::create(path).map_err(|e| e.to_string())?;
        serde_json::to_writer_pretty(file, graph).map_err(|e| e.to_string())
    }
}
