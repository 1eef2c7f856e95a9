//! # mastery-algo - adaptive-learning diffusion engine
//!
//! This crate estimates, per learner, the probability of mastering each
//! topic ("knowledge component") in a prerequisite graph, updates that
//! estimate from exercise evidence, and propagates updated beliefs to
//! related topics through the prerequisite structure.
//!
//! Algorithms:
//!
//! - **Knowledge tracing** - closed-form Bayesian mastery updates, one rule
//!   per component behavior (procedural / declarative)
//! - **Link model** - directed prerequisite edges carrying conditional
//!   probability tables, with structural graph queries
//! - **Diffusion** - threshold and CPT-weighted propagation policies over
//!   the prerequisite graph
//! - **Calibration** - bounded stochastic least-squares fitting of each
//!   component's update parameters against expected-score curves
//!
//! ## Module structure
//!
//! - [`types`] - shared ids, parameters and constants
//! - [`error`] - error taxonomy
//! - [`domain`] - exercises, exercise families, knowledge components
//! - [`graph`] - prerequisite links and truth-table indexing
//! - [`update`] - the closed-form mastery update rules
//! - [`learner`] - per-learner state, evaluations, learner pools
//! - [`diffusion`] - propagation algorithms and policies
//! - [`calibrate`] - offline parameter calibration
//! - [`export`] - read-only snapshots for external inference backends
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use mastery_algo::{
//!     Answer, Behavior, DomainGraph, Evaluation, Exercise, ExerciseFamily,
//!     KnowledgeComponent, LearnerGraph, LinkModel,
//! };
//!
//! // One component, one exercise, no prerequisites.
//! let family = ExerciseFamily::new(
//!     10,
//!     "fractions drills",
//!     vec![Exercise::new(101, "quiz", 0.25, 0.1).unwrap()],
//! );
//! let kc = KnowledgeComponent::new(1, "fractions", Behavior::Procedural, family);
//! let domain = Arc::new(DomainGraph::new(vec![kc], LinkModel::new()).unwrap());
//!
//! let mut graph = LearnerGraph::new(7, domain);
//! let evaluation = Evaluation::new(1, 10, 7, vec![(101, Answer::from(true))]);
//! graph.process_evaluation(&evaluation, true, false).unwrap();
//! assert!(graph.mastering_probability(1).unwrap() > 0.2);
//! ```

pub mod calibrate;
pub mod diffusion;
pub mod domain;
pub mod error;
pub mod export;
pub mod graph;
pub mod learner;
pub mod types;
pub mod update;

pub use calibrate::{
    expected_declarative_score, expected_procedural_score, representative_answers,
    CalibrationConfig, PatternMode,
};
pub use diffusion::{DiffusionPolicy, Scope, Smoothing};
pub use domain::{DomainGraph, Exercise, ExerciseFamily, KnowledgeComponent};
pub use error::{GraphError, Result};
pub use export::{KcSnapshot, NetworkSnapshot};
pub use graph::{bools_to_index, index_to_bools, truth_table, Link, LinkDirection, LinkModel};
pub use learner::{Evaluation, LearnerGraph, LearnerPool, DEFAULT_LEARNER_ID};
pub use types::{
    Answer, Behavior, ExerciseFamilyId, ExerciseId, ExerciseParams, KcId, KcParams, KcState,
    LearnerId,
};
pub use update::{update_declarative, update_procedural, UpdateParams};
