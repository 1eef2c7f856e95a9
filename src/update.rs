//! Closed-form mastery update rules.
//!
//! Two behavior-keyed variants map (prior mastery, observed answer,
//! parameters) to an updated mastery probability in [0, 1]:
//!
//! - procedural: a knowledge-tracing Bayes step on guess/slip followed by a
//!   learn transition,
//! - declarative: an additive step in logit space scaled by gamma (success)
//!   or delta (failure).

use crate::error::Result;
use crate::types::{clamp_unit, logit, sigmoid, ExerciseParams, KcParams};
use serde::{Deserialize, Serialize};

/// Full parameter set of one update: the component's calibrated parameters
/// merged with the evidence parameters of the answered exercise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub learn: f64,
    pub guess: f64,
    pub slip: f64,
    pub delta: f64,
    pub gamma: f64,
}

impl UpdateParams {
    /// Merge calibrated component parameters with per-exercise guess/slip.
    pub fn merge(kc: &KcParams, exercise: &ExerciseParams) -> Self {
        Self {
            learn: kc.learn,
            guess: exercise.guess,
            slip: exercise.slip,
            delta: kc.delta,
            gamma: kc.gamma,
        }
    }

    /// Check every parameter against its valid interval.
    pub fn validate(&self) -> Result<()> {
        crate::error::check_range("learn", self.learn, 0.0, 1.0)?;
        crate::error::check_range("guess", self.guess, 0.0, 1.0)?;
        crate::error::check_range("slip", self.slip, 0.0, 1.0)?;
        crate::error::check_range("delta", self.delta, -2.0, 0.0)?;
        crate::error::check_range("gamma", self.gamma, 0.0, 5.0)?;
        Ok(())
    }
}

/// Knowledge-tracing update for a procedural component.
///
/// A Bayes step conditions the prior on the answer through guess and slip,
/// then the learn transition gives the learner a chance to reach mastery
/// regardless of the outcome.
pub fn update_procedural(p: f64, success: bool, params: &UpdateParams) -> f64 {
    let (guess, slip, learn) = (params.guess, params.slip, params.learn);
    let conditioned = if success {
        let denom = p * (1.0 - slip) + (1.0 - p) * guess;
        if denom <= f64::EPSILON {
            p
        } else {
            p * (1.0 - slip) / denom
        }
    } else {
        let denom = p * slip + (1.0 - p) * (1.0 - guess);
        if denom <= f64::EPSILON {
            p
        } else {
            p * slip / denom
        }
    };
    clamp_unit(conditioned + (1.0 - conditioned) * learn)
}

/// Logistic-odds update for a declarative component.
///
/// The prior moves in logit space: a success adds gamma scaled by how
/// unexpected it was, a failure adds delta scaled by how expected a success
/// was.
pub fn update_declarative(p: f64, success: bool, params: &UpdateParams) -> f64 {
    let (guess, delta, gamma) = (params.guess, params.delta, params.gamma);
    let mut theta = logit(p);
    let expected = guess + (1.0 - guess) * sigmoid(theta);
    if success {
        theta += gamma * (1.0 - expected);
    } else {
        theta += delta * expected;
    }
    sigmoid(theta)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(learn: f64, guess: f64, slip: f64) -> UpdateParams {
        UpdateParams {
            learn,
            guess,
            slip,
            delta: -0.9,
            gamma: 2.2,
        }
    }

    #[test]
    fn test_procedural_success_never_below_bayes_step() {
        // The learn transition can only push the conditioned value up.
        for p in [0.0, 0.1, 0.3, 0.5, 0.7, 0.9, 1.0] {
            for g in [0.0, 0.1, 0.25, 0.5] {
                for s in [0.0, 0.1, 0.25, 0.5] {
                    let with_learn = update_procedural(p, true, &params(0.3, g, s));
                    let bayes_only = update_procedural(p, true, &params(0.0, g, s));
                    assert!(
                        with_learn >= bayes_only - 1e-12,
                        "p={} g={} s={}: {} < {}",
                        p,
                        g,
                        s,
                        with_learn,
                        bayes_only
                    );
                    assert!((0.0..=1.0).contains(&with_learn));
                }
            }
        }
    }

    #[test]
    fn test_procedural_certain_mastery_is_stable() {
        // learn=0, guess=slip=0, p=1, success: already-certain mastery stays
        // exactly certain.
        let updated = update_procedural(1.0, true, &params(0.0, 0.0, 0.0));
        assert_eq!(updated, 1.0);
    }

    #[test]
    fn test_procedural_failure_lowers_estimate() {
        let updated = update_procedural(0.8, false, &params(0.0, 0.1, 0.1));
        assert!(
            updated < 0.8,
            "a failure with low learn must lower mastery, got {}",
            updated
        );
    }

    #[test]
    fn test_procedural_learn_raises_failure_outcome() {
        let low = update_procedural(0.5, false, &params(0.1, 0.2, 0.1));
        let high = update_procedural(0.5, false, &params(0.4, 0.2, 0.1));
        assert!(
            high > low,
            "larger learn must strictly raise the post-failure estimate"
        );
    }

    #[test]
    fn test_declarative_moves_with_outcome() {
        let p = 0.4;
        let up = update_declarative(p, true, &params(0.0, 0.1, 0.0));
        let down = update_declarative(p, false, &params(0.0, 0.1, 0.0));
        assert!(up > p, "success must raise mastery: {} <= {}", up, p);
        assert!(down < p, "failure must lower mastery: {} >= {}", down, p);
    }

    #[test]
    fn test_declarative_finite_at_extremes() {
        for success in [true, false] {
            for p in [0.0, 1.0] {
                let updated = update_declarative(p, success, &params(0.0, 0.25, 0.1));
                assert!(updated.is_finite());
                assert!((0.0..=1.0).contains(&updated));
            }
        }
    }

    #[test]
    fn test_merge_and_validate() {
        let kc = crate::types::KcParams::default();
        let exercise = ExerciseParams {
            guess: 0.25,
            slip: 0.1,
        };
        let merged = UpdateParams::merge(&kc, &exercise);
        assert_eq!(merged.guess, 0.25);
        assert_eq!(merged.learn, kc.learn);
        merged.validate().unwrap();

        let bad = UpdateParams {
            delta: 0.5,
            ..merged
        };
        assert!(bad.validate().is_err(), "positive delta must be rejected");
    }
}
