//! Common types and constants shared across the crate.

use serde::{Deserialize, Serialize};

/// Identifier of a knowledge component.
pub type KcId = u64;
/// Identifier of an exercise.
pub type ExerciseId = u64;
/// Identifier of an exercise family.
pub type ExerciseFamilyId = u64;
/// Identifier of a learner.
pub type LearnerId = u64;

/// Default mastery probability before any evidence.
pub const DEFAULT_PRIOR: f64 = 0.2;
/// Default learn parameter for procedural components.
pub const DEFAULT_LEARN: f64 = 0.1;
/// Default delta parameter for declarative components.
pub const DEFAULT_DELTA: f64 = -0.9;
/// Default gamma parameter for declarative components.
pub const DEFAULT_GAMMA: f64 = 2.2;
/// Weight of the prior when diffusion runs with dynamic smoothing.
pub const SMOOTHING_ALPHA: f64 = 0.8;

pub(crate) const EPSILON: f64 = 1e-9;

/// How a knowledge component responds to exercise evidence.
///
/// Procedural components follow a knowledge-tracing update (guess/slip/learn),
/// declarative components a logistic-odds update (guess/delta/gamma). The
/// behavior is fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    Declarative,
    Procedural,
}

/// One answer to one exercise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub success: bool,
    /// Time spent on the exercise, in seconds.
    pub duration_s: f64,
}

impl Answer {
    pub fn new(success: bool, duration_s: f64) -> Self {
        Self {
            success,
            duration_s,
        }
    }
}

impl From<bool> for Answer {
    fn from(success: bool) -> Self {
        Self {
            success,
            duration_s: 0.0,
        }
    }
}

/// Calibrated per-component update parameters.
///
/// `learn` drives the procedural rule, `delta`/`gamma` the declarative one.
/// All three are stored for every component so a pool default can be copied
/// wholesale; only the relevant subset is read at update time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KcParams {
    pub learn: f64,
    pub delta: f64,
    pub gamma: f64,
}

impl Default for KcParams {
    fn default() -> Self {
        Self {
            learn: DEFAULT_LEARN,
            delta: DEFAULT_DELTA,
            gamma: DEFAULT_GAMMA,
        }
    }
}

/// Per-exercise evidence parameters (probability of a lucky correct answer,
/// probability of an unlucky incorrect one).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExerciseParams {
    pub guess: f64,
    pub slip: f64,
}

/// Per-component mutable learner state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcState {
    /// Current mastery probability, in [0, 1].
    pub m_pba: f64,
    pub params: KcParams,
    /// One-way flag: set the first time a local diagnosis runs on the
    /// component, never reset.
    pub diagnosed: bool,
}

impl Default for KcState {
    fn default() -> Self {
        Self {
            m_pba: DEFAULT_PRIOR,
            params: KcParams::default(),
            diagnosed: false,
        }
    }
}

/// Clamp a value into [0, 1].
pub fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Logistic function.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Inverse of the logistic function. The input is pulled away from exact
/// 0 and 1 so the result stays finite.
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(EPSILON, 1.0 - EPSILON);
    (p / (1.0 - p)).ln()
}
