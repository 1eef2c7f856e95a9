//! Offline parameter calibration.
//!
//! For every knowledge component, the update-rule parameters are fitted by
//! least squares against a synthetic expected-score curve: representative
//! answer patterns on the component's exercise family are pushed through
//! [`LearnerGraph::predict_evaluation`] and the squared distance to the
//! expected score is minimized with a bounded, seeded random search.

use crate::error::{GraphError, Result};
use crate::learner::{Evaluation, LearnerGraph};
use crate::types::{Answer, Behavior, KcId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Which answer patterns represent an exercise family during calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    /// The full combinatorial truth table, 2^n patterns. Used for
    /// procedural components.
    Exhaustive,
    /// The n + 1 monotone patterns where pattern i ends with i successes.
    /// Used for declarative components.
    Monotone,
}

/// Enumerate representative answer patterns over `n` exercises.
pub fn representative_answers(n: usize, mode: PatternMode) -> Vec<Vec<bool>> {
    match mode {
        PatternMode::Exhaustive => crate::graph::truth_table(n),
        PatternMode::Monotone => (0..=n)
            .map(|i| {
                let mut pattern = vec![false; n - i];
                pattern.extend(std::iter::repeat(true).take(i));
                pattern
            })
            .collect(),
    }
}

/// Expected score of a procedural component: a weighted average that favors
/// later answers, so a learner who warms up scores higher than one who
/// fades.
pub fn expected_procedural_score(answers: &[bool]) -> f64 {
    let n = answers.len();
    if n == 0 {
        return 0.0;
    }
    let weight = |j: usize| 0.2 + 0.6 * j as f64 / n as f64;
    let weighted: f64 = answers
        .iter()
        .enumerate()
        .map(|(j, &a)| if a { weight(j) } else { 0.0 })
        .sum();
    let total: f64 = (0..n).map(weight).sum();
    weighted / total
}

/// Expected score of a declarative component: the plain success rate.
pub fn expected_declarative_score(answers: &[bool]) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    answers.iter().filter(|&&a| a).count() as f64 / answers.len() as f64
}

/// Bounds and budget of the calibration search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Trial budget per knowledge component.
    pub max_trials: usize,
    /// Seed of the search RNG; a fixed seed makes calibration reproducible.
    pub seed: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            max_trials: 500,
            seed: 0x6d61_7374,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_trials == 0 {
            return Err(GraphError::Configuration(
                "max_trials must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl LearnerGraph {
    /// Fit the update-rule parameters of every component of the domain.
    ///
    /// Procedural components fit `learn` in [0, 1] on the exhaustive
    /// patterns against the weighted expected score; declarative components
    /// fit `delta` in [-2, 0] and `gamma` in [0, 5] on the monotone patterns
    /// against the plain average. A component with an empty exercise family
    /// gets zeroed parameters.
    pub fn initialize_params(&mut self, config: &CalibrationConfig) -> Result<()> {
        config.validate()?;
        let graph = Arc::clone(self.domain());
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        for kc in graph.knowledge_components() {
            if kc.exercise_family().is_empty() {
                match kc.behavior() {
                    Behavior::Procedural => self.set_learn_param(kc.id(), 0.0)?,
                    Behavior::Declarative => {
                        self.set_delta_param(kc.id(), 0.0)?;
                        self.set_gamma_param(kc.id(), 0.0)?;
                    }
                }
                continue;
            }
            match kc.behavior() {
                Behavior::Procedural => self.fit_learn(kc.id(), config, &mut rng)?,
                Behavior::Declarative => self.fit_delta_gamma(kc.id(), config, &mut rng)?,
            }
        }
        Ok(())
    }

    /// Evaluations and target scores for one component's patterns.
    fn calibration_set(
        &self,
        kc: KcId,
        mode: PatternMode,
        expected: fn(&[bool]) -> f64,
    ) -> Result<Vec<(Evaluation, f64)>> {
        let graph = self.domain();
        let component = graph.kc_by_id(kc).ok_or_else(|| {
            GraphError::Construction(format!("KC #{} not in the domain graph", kc))
        })?;
        let family = component.exercise_family();
        let set = representative_answers(family.len(), mode)
            .into_iter()
            .map(|pattern| {
                let answers = family
                    .exercises()
                    .iter()
                    .zip(&pattern)
                    .map(|(ex, &success)| (ex.id(), Answer::from(success)))
                    .collect();
                let target = expected(&pattern);
                (Evaluation::new(0, family.id(), self.learner_id(), answers), target)
            })
            .collect();
        Ok(set)
    }

    /// Sum of squared distances between predicted mastery and the target
    /// score over the calibration set, with the current parameters.
    fn calibration_sse(&mut self, set: &[(Evaluation, f64)]) -> Result<f64> {
        let mut sse = 0.0;
        for (evaluation, target) in set {
            let predicted = self.predict_evaluation(evaluation)?;
            sse += (predicted - target).powi(2);
        }
        Ok(sse)
    }

    fn fit_learn(&mut self, kc: KcId, config: &CalibrationConfig, rng: &mut ChaCha8Rng) -> Result<()> {
        let set = self.calibration_set(kc, PatternMode::Exhaustive, expected_procedural_score)?;
        let mut best = (self.params(kc)?.learn, f64::INFINITY);
        for _ in 0..config.max_trials {
            let candidate = rng.gen_range(0.0..=1.0);
            self.set_learn_param(kc, candidate)?;
            let sse = self.calibration_sse(&set)?;
            if sse < best.1 {
                best = (candidate, sse);
            }
        }
        crate::error::check_range("learn", best.0, 0.0, 1.0)?;
        self.set_learn_param(kc, best.0)?;
        info!(kc_id = kc, learn = best.0, sse = best.1, "calibrated procedural KC");
        Ok(())
    }

    fn fit_delta_gamma(
        &mut self,
        kc: KcId,
        config: &CalibrationConfig,
        rng: &mut ChaCha8Rng,
    ) -> Result<()> {
        let set = self.calibration_set(kc, PatternMode::Monotone, expected_declarative_score)?;
        let params = self.params(kc)?;
        let mut best = ((params.delta, params.gamma), f64::INFINITY);
        for _ in 0..config.max_trials {
            let delta = rng.gen_range(-2.0..=0.0);
            let gamma = rng.gen_range(0.0..=5.0);
            self.set_delta_param(kc, delta)?;
            self.set_gamma_param(kc, gamma)?;
            let sse = self.calibration_sse(&set)?;
            if sse < best.1 {
                best = ((delta, gamma), sse);
            }
        }
        crate::error::check_range("delta", best.0 .0, -2.0, 0.0)?;
        crate::error::check_range("gamma", best.0 .1, 0.0, 5.0)?;
        self.set_delta_param(kc, best.0 .0)?;
        self.set_gamma_param(kc, best.0 .1)?;
        info!(
            kc_id = kc,
            delta = best.0 .0,
            gamma = best.0 .1,
            sse = best.1,
            "calibrated declarative KC"
        );
        Ok(())
    }
}
