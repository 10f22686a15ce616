use serde_derive::{Deserialize, Serialize};

use crate::submodels::parameters::{ConfigError, Relevance};
use crate::Timestep;

/**
An item can be visible because it was just broadcast, still visible but
fading, or gone for good. The three cases need to be distinguishable: a
pending item is logged as a non-decision, an expired item is not iterated at
all.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    /// Not broadcast yet.
    Pending,
    /// Broadcast and inside its relevance window.
    Live,
    /// Past the hard age cutoff; dropped from consideration entirely.
    Expired,
}

/**
The broadcast schedule records every broadcast occurrence per item, in
ascending order. An item may be broadcast more than once; where a decay
policy is in play, the most recent broadcast at or before the current
timestep is the one that governs the item's remaining relevance.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastSchedule {
    broadcasts: Vec<Vec<Timestep>>,
}

impl BroadcastSchedule {
    /**
    Build a schedule from a dense per-item release-time list. A list shorter
    than the item count is padded by replicating the last supplied release
    time, so every item always has one. An empty list for a non-empty
    narrative is a configuration mistake and refused up front.
     */
    pub fn from_release_times(
        release_times: &[Timestep],
        n_items: usize,
    ) -> Result<BroadcastSchedule, ConfigError> {
        if n_items == 0 {
            return Ok(BroadcastSchedule { broadcasts: vec![] });
        }
        let last = match release_times.last() {
            None => {
                return Err(ConfigError::Invalid {
                    field: "release_times",
                    reason: "empty release-time list for a non-empty narrative".to_string(),
                })
            }
            Some(t) => *t,
        };
        let broadcasts = (0..n_items)
            .map(|i| vec![release_times.get(i).copied().unwrap_or(last)])
            .collect();
        Ok(BroadcastSchedule { broadcasts })
    }

    /// Build a re-broadcast-aware schedule from the full list of broadcast
    /// occurrences per item. The list must cover every item exactly; a
    /// mismatch with the narrative size is refused before any trial starts.
    pub fn from_occurrences(
        occurrences: Vec<Vec<Timestep>>,
        n_items: usize,
    ) -> Result<BroadcastSchedule, ConfigError> {
        if occurrences.len() != n_items {
            return Err(ConfigError::Invalid {
                field: "rebroadcasts",
                reason: format!(
                    "{:} occurrence lists for {:} items",
                    occurrences.len(),
                    n_items
                ),
            });
        }
        let mut broadcasts = occurrences;
        for (item, times) in broadcasts.iter_mut().enumerate() {
            if times.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "rebroadcasts",
                    reason: format!("item {:} has no broadcast occurrence", item),
                });
            }
            times.sort_unstable();
        }
        Ok(BroadcastSchedule { broadcasts })
    }

    pub fn len(&self) -> usize {
        self.broadcasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.broadcasts.is_empty()
    }

    pub fn first_broadcast(&self, item: usize) -> Timestep {
        self.broadcasts[item][0]
    }

    /// The most recent broadcast at or before `now`, if any.
    pub fn last_broadcast_at_or_before(&self, item: usize, now: Timestep) -> Option<Timestep> {
        self.broadcasts[item]
            .iter()
            .rev()
            .find(|&&b| b <= now)
            .copied()
    }

    /// The items first entering circulation exactly at `now`.
    pub fn released_at(&self, now: Timestep) -> Vec<usize> {
        (0..self.broadcasts.len())
            .filter(|&i| self.first_broadcast(i) == now)
            .collect()
    }

    pub fn liveness(&self, item: usize, now: Timestep, relevance: &Relevance) -> Liveness {
        let first = self.first_broadcast(item);
        if first > now {
            return Liveness::Pending;
        }
        match relevance {
            Relevance::AgeWindow { max_item_relevance } => {
                if now - first > *max_item_relevance {
                    Liveness::Expired
                } else {
                    Liveness::Live
                }
            }
            _ => Liveness::Live,
        }
    }

    /**
    The baseline narrative relevance of a live item. Under the constant
    policy this is the full `beta`; under linear decay it shrinks with the
    time since the most recent broadcast, snapping back to full `beta`
    exactly when the item is re-broadcast; under the age window it shrinks
    with the age since first broadcast. Never negative.
     */
    pub fn theta(&self, item: usize, now: Timestep, beta: f64, relevance: &Relevance) -> f64 {
        match relevance {
            Relevance::Constant => beta,
            Relevance::LinearDecay { delta } => match self.last_broadcast_at_or_before(item, now) {
                None => 0.,
                Some(last) => (beta - delta * f64::from(now - last)).max(0.),
            },
            Relevance::AgeWindow { max_item_relevance } => {
                let age = now - self.first_broadcast(item);
                beta * (1. - f64::from(age) / f64::from(max_item_relevance + 1)).max(0.)
            }
        }
    }
}

#[test]
fn test_release_times_are_padded() {
    let schedule = BroadcastSchedule::from_release_times(&[0, 2], 5).unwrap();
    assert_eq!(schedule.first_broadcast(0), 0);
    assert_eq!(schedule.first_broadcast(1), 2);
    assert_eq!(schedule.first_broadcast(4), 2);
    assert_eq!(schedule.released_at(0), vec![0]);
    assert_eq!(schedule.released_at(2), vec![1, 2, 3, 4]);
}

#[test]
fn test_empty_release_list_is_refused() {
    assert!(BroadcastSchedule::from_release_times(&[], 3).is_err());
    assert!(BroadcastSchedule::from_release_times(&[], 0).is_ok());
    assert!(BroadcastSchedule::from_occurrences(vec![vec![0], vec![]], 2).is_err());
}

#[test]
fn test_occurrence_list_must_cover_every_item() {
    assert!(BroadcastSchedule::from_occurrences(vec![vec![0]], 3).is_err());
    assert!(BroadcastSchedule::from_occurrences(vec![vec![0], vec![1], vec![2]], 2).is_err());
    assert!(BroadcastSchedule::from_occurrences(vec![vec![0], vec![1]], 2).is_ok());
}

#[test]
fn test_linear_decay_resets_on_rebroadcast() {
    let schedule = BroadcastSchedule::from_occurrences(vec![vec![0, 5]], 1).unwrap();
    let policy = Relevance::LinearDecay { delta: 0.3 };
    assert!((schedule.theta(0, 0, 1.0, &policy) - 1.0).abs() < 1e-12);
    assert!((schedule.theta(0, 2, 1.0, &policy) - 0.4).abs() < 1e-12);
    // Decayed to nothing before the second broadcast, restored at it.
    assert_eq!(schedule.theta(0, 4, 1.0, &policy), 0.);
    assert!((schedule.theta(0, 5, 1.0, &policy) - 1.0).abs() < 1e-12);
    assert!((schedule.theta(0, 6, 1.0, &policy) - 0.7).abs() < 1e-12);
}

#[test]
fn test_age_window_hard_cutoff() {
    let schedule = BroadcastSchedule::from_release_times(&[3], 1).unwrap();
    let policy = Relevance::AgeWindow {
        max_item_relevance: 2,
    };
    assert_eq!(schedule.liveness(0, 2, &policy), Liveness::Pending);
    assert_eq!(schedule.liveness(0, 3, &policy), Liveness::Live);
    assert_eq!(schedule.liveness(0, 5, &policy), Liveness::Live);
    assert_eq!(schedule.liveness(0, 6, &policy), Liveness::Expired);
    // Inside the window theta shrinks linearly with age but stays positive.
    assert!((schedule.theta(0, 3, 1.0, &policy) - 1.0).abs() < 1e-12);
    assert!(schedule.theta(0, 5, 1.0, &policy) > 0.);
    assert!(schedule.theta(0, 5, 1.0, &policy) < schedule.theta(0, 4, 1.0, &policy));
}
