//! Diffusion: propagating an updated mastery estimate along prerequisite
//! links.
//!
//! Two independent families, both starting from one evaluated component and
//! recursing outward:
//!
//! - threshold diffusion, a cheap heuristic that ignores the conditional
//!   probability tables,
//! - CPT-weighted diffusion, which combines neighbor masteries with the
//!   link's probability vector, optionally smoothed against the prior.
//!
//! The prerequisite graph is assumed acyclic. Every traversal carries an
//! explicit visited set, so a diamond is processed once and a genuine cycle
//! is reported as [`GraphError::Cycle`] instead of recursing forever.

use crate::error::{GraphError, Result};
use crate::graph::{truth_table, Link};
use crate::learner::{Evaluation, LearnerGraph};
use crate::types::{clamp_unit, KcId, SMOOTHING_ALPHA};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// How a CPT-combined value replaces the prior estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Smoothing {
    /// Take the combined value as is.
    Static,
    /// Bias toward the prior: mastery already acquired is sticky.
    Dynamic,
}

impl Smoothing {
    fn apply(self, prior: f64, combined: f64) -> f64 {
        match self {
            Smoothing::Static => combined,
            Smoothing::Dynamic => {
                SMOOTHING_ALPHA * (prior + (1.0 - prior) * combined)
                    + (1.0 - SMOOTHING_ALPHA) * combined
            }
        }
    }
}

/// Where the child-directed pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Fan out toward children from the evaluated component only.
    Local,
    /// Fan out toward children from every root of the link model.
    RootFanout,
}

/// One CPT-weighted propagation policy: a parent pass from the evaluated
/// component, then a child pass whose start is chosen by `scope`, each pass
/// with its own smoothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffusionPolicy {
    pub parents_smoothing: Smoothing,
    pub children_smoothing: Smoothing,
    pub scope: Scope,
}

impl DiffusionPolicy {
    /// The six historical numbered models as points of the policy product.
    pub fn from_model(model: u8) -> Result<Self> {
        let policy = match model {
            1 => Self::new(Smoothing::Static, Smoothing::Static, Scope::RootFanout),
            2 => Self::new(Smoothing::Dynamic, Smoothing::Static, Scope::RootFanout),
            3 => Self::new(Smoothing::Dynamic, Smoothing::Dynamic, Scope::RootFanout),
            4 => Self::new(Smoothing::Static, Smoothing::Static, Scope::Local),
            5 => Self::new(Smoothing::Dynamic, Smoothing::Static, Scope::Local),
            6 => Self::new(Smoothing::Dynamic, Smoothing::Dynamic, Scope::Local),
            _ => {
                return Err(GraphError::Configuration(format!(
                    "unknown diffusion model {}, expected 1..=6",
                    model
                )))
            }
        };
        Ok(policy)
    }

    pub fn new(parents_smoothing: Smoothing, children_smoothing: Smoothing, scope: Scope) -> Self {
        Self {
            parents_smoothing,
            children_smoothing,
            scope,
        }
    }
}

/// Traversal guard: `visited` deduplicates diamonds, `path` is the active
/// recursion path used to detect cycles.
#[derive(Default)]
struct Traversal {
    visited: HashSet<KcId>,
    path: HashSet<KcId>,
}

impl Traversal {
    /// Returns false when the component was already processed; errors when
    /// it is currently being processed (a cycle).
    fn enter(&mut self, kc: KcId) -> Result<bool> {
        if self.path.contains(&kc) {
            return Err(GraphError::Cycle(kc));
        }
        if !self.visited.insert(kc) {
            return Ok(false);
        }
        self.path.insert(kc);
        Ok(true)
    }

    fn leave(&mut self, kc: KcId) {
        self.path.remove(&kc);
    }
}

/// Weight of every truth assignment over `masteries`: the product, over each
/// component, of its mastery if true in the assignment, else its complement.
/// Row order matches the link probability vector's index order.
fn assignment_weights(masteries: &[f64]) -> Vec<f64> {
    truth_table(masteries.len())
        .into_iter()
        .map(|row| {
            row.iter()
                .zip(masteries)
                .map(|(&bit, &m)| if bit { m } else { 1.0 - m })
                .product()
        })
        .collect()
}

impl LearnerGraph {
    /// CPT combination for one link: the dot product of the assignment
    /// weights over the linked components with the link's probability
    /// vector.
    fn combine_over_link(&self, link: &Link) -> Result<f64> {
        let masteries: Vec<f64> = link
            .linked()
            .iter()
            .map(|&kc| self.mastering_probability(kc))
            .collect::<Result<_>>()?;
        let weights = assignment_weights(&masteries);
        let combined = weights
            .iter()
            .zip(link.probability_vector())
            .map(|(w, p)| w * p)
            .sum();
        Ok(clamp_unit(combined))
    }

    /// Threshold pass toward children then parents (the heuristic global
    /// diagnosis).
    pub fn diffuse_from(&mut self, kc: KcId) -> Result<()> {
        self.diffuse_to_children(kc)?;
        self.diffuse_to_parents(kc)
    }

    /// Threshold diffusion toward children: a weak source (mastery < 0.5)
    /// caps each child at half the source mastery; a strong source leaves
    /// children unchanged. Recurses through the whole descendant set.
    pub fn diffuse_to_children(&mut self, kc: KcId) -> Result<()> {
        let mut traversal = Traversal::default();
        self.threshold_children_step(kc, &mut traversal)
    }

    fn threshold_children_step(&mut self, kc: KcId, traversal: &mut Traversal) -> Result<()> {
        if !traversal.enter(kc)? {
            return Ok(());
        }
        let graph = Arc::clone(self.domain());
        let children = graph.link_model().children(kc);
        if !children.is_empty() {
            let m_pba = self.mastering_probability(kc)?;
            for &child in children {
                if m_pba < 0.5 {
                    let capped = self.mastering_probability(child)?.min(0.5 * m_pba);
                    self.set_mastering_probability(child, capped)?;
                    debug!(source = kc, child, capped, "threshold cap applied");
                }
                self.threshold_children_step(child, traversal)?;
            }
        }
        traversal.leave(kc);
        Ok(())
    }

    /// Threshold diffusion toward parents: when a parent has a child with
    /// mastery above 0.5, the parent is raised to `max + 0.5 * (1 - max)`
    /// where `max` is its best child. Recurses through the ancestor set.
    pub fn diffuse_to_parents(&mut self, kc: KcId) -> Result<()> {
        let mut traversal = Traversal::default();
        self.threshold_parents_step(kc, &mut traversal)
    }

    fn threshold_parents_step(&mut self, kc: KcId, traversal: &mut Traversal) -> Result<()> {
        if !traversal.enter(kc)? {
            return Ok(());
        }
        let graph = Arc::clone(self.domain());
        for &parent in graph.link_model().parents(kc) {
            let max_child = graph
                .link_model()
                .children(parent)
                .iter()
                .map(|&child| self.mastering_probability(child))
                .collect::<Result<Vec<f64>>>()?
                .into_iter()
                .fold(f64::NEG_INFINITY, f64::max);
            if max_child > 0.5 {
                let raised = max_child + 0.5 * (1.0 - max_child);
                self.set_mastering_probability(parent, clamp_unit(raised))?;
                debug!(source = kc, parent, raised, "threshold raise applied");
            }
            self.threshold_parents_step(parent, traversal)?;
        }
        traversal.leave(kc);
        Ok(())
    }

    /// CPT-weighted diffusion toward parents. Each parent's new mastery is
    /// the combination over its full child set through its from-children
    /// link; a parent without such a link keeps its estimate.
    pub fn bayesian_diffuse_to_parents(&mut self, kc: KcId, smoothing: Smoothing) -> Result<()> {
        let mut traversal = Traversal::default();
        self.bayesian_parents_step(kc, smoothing, &mut traversal)
    }

    fn bayesian_parents_step(
        &mut self,
        kc: KcId,
        smoothing: Smoothing,
        traversal: &mut Traversal,
    ) -> Result<()> {
        if !traversal.enter(kc)? {
            return Ok(());
        }
        let graph = Arc::clone(self.domain());
        for &parent in graph.link_model().parents(kc) {
            if let Some(link) = graph.link_model().link_from_children(parent) {
                let combined = self.combine_over_link(link)?;
                let prior = self.mastering_probability(parent)?;
                let updated = clamp_unit(smoothing.apply(prior, combined));
                self.set_mastering_probability(parent, updated)?;
                debug!(source = kc, parent, updated, "bayesian parent update");
            }
            self.bayesian_parents_step(parent, smoothing, traversal)?;
        }
        traversal.leave(kc);
        Ok(())
    }

    /// CPT-weighted diffusion toward children, symmetric to
    /// [`Self::bayesian_diffuse_to_parents`] through each child's
    /// from-parents link.
    pub fn bayesian_diffuse_to_children(&mut self, kc: KcId, smoothing: Smoothing) -> Result<()> {
        let mut traversal = Traversal::default();
        self.bayesian_children_step(kc, smoothing, &mut traversal)
    }

    fn bayesian_children_step(
        &mut self,
        kc: KcId,
        smoothing: Smoothing,
        traversal: &mut Traversal,
    ) -> Result<()> {
        if !traversal.enter(kc)? {
            return Ok(());
        }
        let graph = Arc::clone(self.domain());
        for &child in graph.link_model().children(kc) {
            if let Some(link) = graph.link_model().link_from_parents(child) {
                let combined = self.combine_over_link(link)?;
                let prior = self.mastering_probability(child)?;
                let updated = clamp_unit(smoothing.apply(prior, combined));
                self.set_mastering_probability(child, updated)?;
                debug!(source = kc, child, updated, "bayesian child update");
            }
            self.bayesian_children_step(child, smoothing, traversal)?;
        }
        traversal.leave(kc);
        Ok(())
    }

    /// Local diagnosis of the evaluation, then the CPT-weighted propagation
    /// selected by `policy`: parents from the evaluated component, children
    /// from the component itself or from every root.
    pub fn run_diffusion_policy(
        &mut self,
        evaluation: &Evaluation,
        policy: DiffusionPolicy,
    ) -> Result<()> {
        let graph = Arc::clone(self.domain());
        let kc = graph.kc_for_family(evaluation.family_id()).ok_or_else(|| {
            GraphError::Construction(format!(
                "evaluation #{} references unknown exercise family #{}",
                evaluation.id(),
                evaluation.family_id()
            ))
        })?;
        self.process_evaluation(evaluation, true, false)?;
        self.bayesian_diffuse_to_parents(kc.id(), policy.parents_smoothing)?;
        match policy.scope {
            Scope::Local => {
                self.bayesian_diffuse_to_children(kc.id(), policy.children_smoothing)?;
            }
            Scope::RootFanout => {
                for root in graph.link_model().roots() {
                    self.bayesian_diffuse_to_children(root, policy.children_smoothing)?;
                }
            }
        }
        Ok(())
    }
}
