//! Prerequisite links and the link model.
//!
//! A `Link` associates one knowledge component with the ordered set of its
//! parents (its prerequisites) or its children, together with a conditional
//! probability vector of length 2^k indexed by the truth assignment over the
//! linked components. The `LinkModel` owns all links of one domain graph and
//! answers structural queries (parents, children, roots, transitive
//! closures).

use crate::error::{GraphError, Result};
use crate::types::KcId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Enumerate all truth assignments over `n` booleans, in index order:
/// row `i` is the binary expansion of `i`, most-significant bit first.
pub fn truth_table(n: usize) -> Vec<Vec<bool>> {
    (0..1usize << n).map(|i| index_to_bools(i, n)).collect()
}

/// Encode a truth assignment as an unsigned integer, MSB first.
pub fn bools_to_index(bits: &[bool]) -> usize {
    bits.iter().fold(0, |acc, &b| (acc << 1) | usize::from(b))
}

/// Decode an index back into a fixed-width truth assignment, MSB first.
/// Inverse of [`bools_to_index`].
pub fn index_to_bools(index: usize, width: usize) -> Vec<bool> {
    (0..width).map(|i| (index >> (width - 1 - i)) & 1 == 1).collect()
}

/// Whether a link lists the prerequisites (parents) of its component or the
/// components it is a prerequisite of (children).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    FromParents,
    FromChildren,
}

/// A directed prerequisite association carrying a conditional probability
/// table.
///
/// Entry `i` of the probability vector holds the probability of mastering
/// the governed component given the truth assignment decoded from `i`
/// (MSB = first linked component). The vector length is always exactly
/// 2^|linked|.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    kc_id: KcId,
    direction: LinkDirection,
    linked: Vec<KcId>,
    probability_vector: Vec<f64>,
}

impl Link {
    /// Link from a component to its ordered parent list. The default vector
    /// is all zeros except the "all parents mastered" entry at 0.5 (baseline
    /// before calibration).
    pub fn from_parents(kc_id: KcId, parents: Vec<KcId>) -> Self {
        let probability_vector = Self::default_vector(LinkDirection::FromParents, parents.len());
        Self {
            kc_id,
            direction: LinkDirection::FromParents,
            linked: parents,
            probability_vector,
        }
    }

    /// Link from a component to its ordered child list. The default vector is
    /// all ones except the "no child mastered" entry at 0.5.
    pub fn from_children(kc_id: KcId, children: Vec<KcId>) -> Self {
        let probability_vector = Self::default_vector(LinkDirection::FromChildren, children.len());
        Self {
            kc_id,
            direction: LinkDirection::FromChildren,
            linked: children,
            probability_vector,
        }
    }

    fn default_vector(direction: LinkDirection, k: usize) -> Vec<f64> {
        let len = 1usize << k;
        match direction {
            LinkDirection::FromParents => {
                let mut vec = vec![0.0; len];
                vec[len - 1] = 0.5;
                vec
            }
            LinkDirection::FromChildren => {
                let mut vec = vec![1.0; len];
                vec[0] = 0.5;
                vec
            }
        }
    }

    pub fn kc_id(&self) -> KcId {
        self.kc_id
    }

    pub fn direction(&self) -> LinkDirection {
        self.direction
    }

    /// Ordered linked components.
    pub fn linked(&self) -> &[KcId] {
        &self.linked
    }

    pub fn probability_vector(&self) -> &[f64] {
        &self.probability_vector
    }

    /// Add a component to the linked set. The probability vector is
    /// re-derived as the full default vector for the new count; entries
    /// declared before growing are discarded.
    pub fn grow(&mut self, kc: KcId) {
        if self.linked.contains(&kc) {
            return;
        }
        let fresh = Self::default_vector(self.direction, self.linked.len());
        if self.probability_vector != fresh {
            warn!(
                kc_id = self.kc_id,
                "growing a link with declared probabilities: vector reset to defaults"
            );
        }
        self.linked.push(kc);
        self.probability_vector = Self::default_vector(self.direction, self.linked.len());
    }

    /// Replace the whole probability vector. Its length must be exactly
    /// 2^|linked|.
    pub fn set_probability_vector(&mut self, vector: Vec<f64>) -> Result<()> {
        let expected = 1usize << self.linked.len();
        if vector.len() != expected {
            return Err(GraphError::Construction(format!(
                "probability vector for KC #{} must have length {}, got {}",
                self.kc_id,
                expected,
                vector.len()
            )));
        }
        for &p in &vector {
            crate::error::check_range("conditional probability", p, 0.0, 1.0)?;
        }
        self.probability_vector = vector;
        Ok(())
    }

    /// Declare one conditional probability. The condition must assign a truth
    /// value to every linked component, no more, no less.
    pub fn declare_probability(
        &mut self,
        probability: f64,
        condition: &HashMap<KcId, bool>,
    ) -> Result<()> {
        let keys: HashSet<KcId> = condition.keys().copied().collect();
        let linked: HashSet<KcId> = self.linked.iter().copied().collect();
        if keys != linked {
            return Err(GraphError::Construction(format!(
                "condition for KC #{} must cover exactly its linked components",
                self.kc_id
            )));
        }
        crate::error::check_range("conditional probability", probability, 0.0, 1.0)?;
        let bits: Vec<bool> = self.linked.iter().map(|kc| condition[kc]).collect();
        self.probability_vector[bools_to_index(&bits)] = probability;
        Ok(())
    }
}

/// The two possible links of one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KcLinks {
    pub from_parents: Option<Link>,
    pub from_children: Option<Link>,
}

/// All prerequisite links of one domain graph.
///
/// At most one parent link and one child link per component: multiple
/// parents or children live inside one link's ordered list, never as
/// separate link objects. A component absent from the model simply has no
/// parents and no children.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkModel {
    links: HashMap<KcId, KcLinks>,
}

impl LinkModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_links(links: Vec<Link>) -> Self {
        let mut model = Self::new();
        for link in links {
            model.add_link(link);
        }
        model
    }

    /// Insert a link, replacing any existing link of the same direction for
    /// the same component.
    pub fn add_link(&mut self, link: Link) {
        let entry = self.links.entry(link.kc_id()).or_default();
        match link.direction() {
            LinkDirection::FromParents => entry.from_parents = Some(link),
            LinkDirection::FromChildren => entry.from_children = Some(link),
        }
    }

    /// Remove one direction's link of a component.
    pub fn remove_link(&mut self, kc: KcId, direction: LinkDirection) -> Option<Link> {
        let entry = self.links.get_mut(&kc)?;
        match direction {
            LinkDirection::FromParents => entry.from_parents.take(),
            LinkDirection::FromChildren => entry.from_children.take(),
        }
    }

    pub fn link_from_parents(&self, kc: KcId) -> Option<&Link> {
        self.links.get(&kc)?.from_parents.as_ref()
    }

    pub fn link_from_children(&self, kc: KcId) -> Option<&Link> {
        self.links.get(&kc)?.from_children.as_ref()
    }

    /// Ordered parents of a component, empty when none are declared.
    pub fn parents(&self, kc: KcId) -> &[KcId] {
        self.link_from_parents(kc)
            .map(|link| link.linked())
            .unwrap_or(&[])
    }

    /// Ordered children of a component, empty when none are declared.
    pub fn children(&self, kc: KcId) -> &[KcId] {
        self.link_from_children(kc)
            .map(|link| link.linked())
            .unwrap_or(&[])
    }

    /// Components of the model with no parent link, sorted by id.
    pub fn roots(&self) -> Vec<KcId> {
        let mut roots: Vec<KcId> = self
            .links
            .iter()
            .filter(|(_, links)| links.from_parents.is_none())
            .map(|(&kc, _)| kc)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Every component reachable through parent links from any of `kcs`,
    /// deduplicated. Cycle-safe: each component is expanded once.
    pub fn all_ancestors(&self, kcs: &[KcId]) -> HashSet<KcId> {
        self.closure(kcs, |kc| self.parents(kc))
    }

    /// Every component reachable through child links from any of `kcs`,
    /// deduplicated. Cycle-safe: each component is expanded once.
    pub fn all_descendants(&self, kcs: &[KcId]) -> HashSet<KcId> {
        self.closure(kcs, |kc| self.children(kc))
    }

    fn closure<'a, F>(&'a self, kcs: &[KcId], neighbors: F) -> HashSet<KcId>
    where
        F: Fn(KcId) -> &'a [KcId],
    {
        let mut seen = HashSet::new();
        let mut stack: Vec<KcId> = kcs.to_vec();
        while let Some(kc) = stack.pop() {
            for &next in neighbors(kc) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
