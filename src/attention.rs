//! Attention values: short- and long-term importance driving eviction.
//!
//! Every tracked atom carries an [`Importance`] pair. Short-term importance
//! (STI) spikes on events and decays quickly; long-term importance (LTI)
//! accumulates slowly — each decay tick, STI feeds LTI with probability equal
//! to the current STI, so atoms that stay hot consolidate.
//!
//! The eviction score blends a recency-discounted STI with LTI and scales by
//! truth confidence, so a well-evidenced but idle fact outlives a speculative
//! one touched at the same time.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SpaceConfig;
use crate::truth::Truth;

/// Attention-relevant events that boost an atom's short-term importance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoostEvent {
    /// The atom was read (read implies relevance).
    Access,
    /// The atom's truth value was revised.
    Revision,
    /// The atom arrived from a perception channel.
    Perception,
    /// The atom became a chaining goal.
    GoalFocus,
}

/// Short-/long-term importance pair, both in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Importance {
    pub short_term: f32,
    pub long_term: f32,
}

impl Importance {
    /// Importance for a freshly interned atom.
    pub fn initial(config: &SpaceConfig) -> Self {
        Self {
            short_term: config.initial_sti.clamp(0.0, 1.0),
            long_term: config.initial_lti.clamp(0.0, 1.0),
        }
    }

    /// Apply an additive event boost, saturating at 1.0.
    pub fn boost(&self, event: BoostEvent, config: &SpaceConfig) -> Importance {
        let amount = match event {
            BoostEvent::Access => config.boost_access,
            BoostEvent::Revision => config.boost_revision,
            BoostEvent::Perception => config.boost_perception,
            BoostEvent::GoalFocus => config.boost_goal,
        };
        Importance {
            short_term: (self.short_term + amount).min(1.0),
            long_term: self.long_term,
        }
    }

    /// One maintenance tick: multiplicative decay on both components, with the
    /// probabilistic STI→LTI feed sampled before STI decays.
    pub fn decay<R: Rng>(&self, config: &SpaceConfig, rng: &mut R) -> Importance {
        let mut long_term = self.long_term;
        if rng.r#gen::<f32>() < self.short_term {
            long_term = (long_term + config.lti_feed).min(1.0);
        }
        Importance {
            short_term: self.short_term * config.sti_decay,
            long_term: long_term * config.lti_decay,
        }
    }

    /// Recency-free blend of the two components, used to rank forward-chaining
    /// candidates.
    pub fn salience(&self, config: &SpaceConfig) -> f32 {
        let total = config.sti_weight + config.lti_weight;
        if total <= f32::EPSILON {
            return 0.0;
        }
        (config.sti_weight * self.short_term + config.lti_weight * self.long_term) / total
    }
}

/// The mutable metadata attached 1:1 to each tracked atom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtomValue {
    pub truth: Truth,
    pub importance: Importance,
    /// Logical tick of the last touch.
    pub accessed_at: u64,
    /// Optimistic-concurrency counter, bumped on every published revision.
    pub revision: u64,
}

impl AtomValue {
    /// Value for a freshly interned atom.
    pub fn initial(truth: Truth, config: &SpaceConfig, now: u64) -> Self {
        Self {
            truth,
            importance: Importance::initial(config),
            accessed_at: now,
            revision: 0,
        }
    }

    /// Recency-weighted eviction score. Higher scores survive longer.
    ///
    /// `(w_sti * sti * recency + w_lti * lti) * confidence`, where recency is
    /// `1 / (1 + age * recency_rate)`.
    pub fn eviction_score(&self, now: u64, config: &SpaceConfig) -> f32 {
        let age = now.saturating_sub(self.accessed_at) as f32;
        let recency = 1.0 / (1.0 + age * config.recency_rate);
        let blend = config.sti_weight * self.importance.short_term * recency
            + config.lti_weight * self.importance.long_term;
        blend * self.truth.confidence(config.sensitivity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn boost_saturates_at_one() {
        let config = SpaceConfig::default();
        let imp = Importance {
            short_term: 0.95,
            long_term: 0.1,
        };
        let boosted = imp.boost(BoostEvent::Perception, &config);
        assert_eq!(boosted.short_term, 1.0);
        assert_eq!(boosted.long_term, 0.1);
    }

    #[test]
    fn decay_shrinks_sti() {
        let config = SpaceConfig::default();
        let mut rng = StdRng::seed_from_u64(7);
        let imp = Importance {
            short_term: 0.8,
            long_term: 0.2,
        };
        let decayed = imp.decay(&config, &mut rng);
        assert!(decayed.short_term < imp.short_term);
    }

    #[test]
    fn hot_atoms_consolidate_into_lti() {
        let config = SpaceConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut imp = Importance {
            short_term: 1.0,
            long_term: 0.0,
        };
        // STI of 1.0 means the feed fires on every tick.
        for _ in 0..10 {
            imp.short_term = 1.0;
            imp = imp.decay(&config, &mut rng);
        }
        assert!(imp.long_term > 0.2, "lti = {}", imp.long_term);
    }

    #[test]
    fn cold_atoms_do_not_consolidate() {
        let config = SpaceConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let mut imp = Importance {
            short_term: 0.0,
            long_term: 0.0,
        };
        for _ in 0..50 {
            imp = imp.decay(&config, &mut rng);
        }
        assert_eq!(imp.long_term, 0.0);
    }

    #[test]
    fn eviction_score_decreases_with_age() {
        let config = SpaceConfig::default();
        let value = AtomValue::initial(Truth::new(0.9, 10.0), &config, 0);
        let fresh = value.eviction_score(0, &config);
        let stale = value.eviction_score(100, &config);
        assert!(stale < fresh);
    }

    #[test]
    fn eviction_score_scales_with_confidence() {
        let config = SpaceConfig::default();
        let weak = AtomValue::initial(Truth::new(0.9, 0.5), &config, 0);
        let strong = AtomValue::initial(Truth::new(0.9, 50.0), &config, 0);
        assert!(
            strong.eviction_score(0, &config) > weak.eviction_score(0, &config)
        );
    }

    #[test]
    fn salience_blends_components() {
        let config = SpaceConfig::default();
        let imp = Importance {
            short_term: 1.0,
            long_term: 0.0,
        };
        let s = imp.salience(&config);
        assert!(s > 0.0 && s < 1.0);
    }
}
