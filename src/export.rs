//! Read-only network snapshot for external inference backends.
//!
//! An exact-inference collaborator (e.g. a time-sliced Bayesian network)
//! needs the link probability vectors and calibrated parameters, keyed by
//! component id, to rebuild an equivalent probabilistic network. The
//! snapshot is a plain serializable value; mutating it never touches the
//! learner graph it was taken from.

use crate::error::Result;
use crate::learner::LearnerGraph;
use crate::types::{Behavior, KcId, KcParams, LearnerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything an external backend needs to know about one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KcSnapshot {
    pub id: KcId,
    pub name: String,
    pub behavior: Behavior,
    /// Mastery probability at snapshot time.
    pub prior: f64,
    pub params: KcParams,
    pub parents: Vec<KcId>,
    /// Conditional probability vector of the from-parents link, empty when
    /// the component has none.
    pub from_parents_vector: Vec<f64>,
    pub children: Vec<KcId>,
    /// Conditional probability vector of the from-children link, empty when
    /// the component has none.
    pub from_children_vector: Vec<f64>,
}

/// A learner's full network state, keyed by component id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub learner_id: LearnerId,
    pub kcs: BTreeMap<KcId, KcSnapshot>,
}

impl NetworkSnapshot {
    pub fn from_graph(graph: &LearnerGraph) -> Result<Self> {
        let domain = graph.domain();
        let link_model = domain.link_model();
        let mut kcs = BTreeMap::new();
        for kc in domain.knowledge_components() {
            let snapshot = KcSnapshot {
                id: kc.id(),
                name: kc.name().to_string(),
                behavior: kc.behavior(),
                prior: graph.mastering_probability(kc.id())?,
                params: graph.params(kc.id())?,
                parents: link_model.parents(kc.id()).to_vec(),
                from_parents_vector: link_model
                    .link_from_parents(kc.id())
                    .map(|link| link.probability_vector().to_vec())
                    .unwrap_or_default(),
                children: link_model.children(kc.id()).to_vec(),
                from_children_vector: link_model
                    .link_from_children(kc.id())
                    .map(|link| link.probability_vector().to_vec())
                    .unwrap_or_default(),
            };
            kcs.insert(kc.id(), snapshot);
        }
        Ok(Self {
            learner_id: graph.learner_id(),
            kcs,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
