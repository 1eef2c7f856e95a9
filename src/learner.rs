//! Per-learner state: evaluations, the learner graph and the learner pool.
//!
//! A `LearnerGraph` holds one learner's mutable mastery state over a shared
//! domain graph. A local diagnosis folds one evaluation's answers through the
//! component's update rule; global diagnosis (diffusion) lives in the
//! `diffusion` module. A `LearnerPool` owns the calibrated default graph and
//! hands every joining learner a deep copy of it.

use crate::domain::{DomainGraph, KnowledgeComponent};
use crate::error::{GraphError, Result};
use crate::types::{
    Answer, ExerciseFamilyId, ExerciseId, ExerciseParams, KcId, KcParams, KcState, LearnerId,
};
use crate::update::UpdateParams;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Id of the pool's default learner, whose graph carries the calibrated
/// parameters every other learner starts from.
pub const DEFAULT_LEARNER_ID: LearnerId = 0;

/// One learner's answers to the exercises of one family. Immutable; the
/// answer order is the order the updates are applied in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    id: u64,
    family_id: ExerciseFamilyId,
    learner_id: LearnerId,
    answers: Vec<(ExerciseId, Answer)>,
}

impl Evaluation {
    pub fn new(
        id: u64,
        family_id: ExerciseFamilyId,
        learner_id: LearnerId,
        answers: Vec<(ExerciseId, Answer)>,
    ) -> Self {
        Self {
            id,
            family_id,
            learner_id,
            answers,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn family_id(&self) -> ExerciseFamilyId {
        self.family_id
    }

    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    pub fn answers(&self) -> &[(ExerciseId, Answer)] {
        &self.answers
    }
}

/// One learner's mastery state over a domain graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerGraph {
    learner_id: LearnerId,
    #[serde(skip)]
    graph: Arc<DomainGraph>,
    state: HashMap<KcId, KcState>,
}

impl LearnerGraph {
    /// Fresh graph with default state (prior 0.2, default parameters) for
    /// every component of the domain.
    pub fn new(learner_id: LearnerId, graph: Arc<DomainGraph>) -> Self {
        let state = graph
            .knowledge_components()
            .iter()
            .map(|kc| (kc.id(), KcState::default()))
            .collect();
        Self {
            learner_id,
            graph,
            state,
        }
    }

    pub fn learner_id(&self) -> LearnerId {
        self.learner_id
    }

    pub fn domain(&self) -> &Arc<DomainGraph> {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }

    fn state_of(&self, kc: KcId) -> Result<&KcState> {
        self.state
            .get(&kc)
            .ok_or_else(|| GraphError::Construction(format!("KC #{} not in the learner graph", kc)))
    }

    fn state_of_mut(&mut self, kc: KcId) -> Result<&mut KcState> {
        self.state
            .get_mut(&kc)
            .ok_or_else(|| GraphError::Construction(format!("KC #{} not in the learner graph", kc)))
    }

    pub fn mastering_probability(&self, kc: KcId) -> Result<f64> {
        Ok(self.state_of(kc)?.m_pba)
    }

    pub fn set_mastering_probability(&mut self, kc: KcId, m_pba: f64) -> Result<()> {
        crate::error::check_range("mastery probability", m_pba, 0.0, 1.0)?;
        self.state_of_mut(kc)?.m_pba = m_pba;
        Ok(())
    }

    pub fn params(&self, kc: KcId) -> Result<KcParams> {
        Ok(self.state_of(kc)?.params)
    }

    pub fn diagnosed(&self, kc: KcId) -> Result<bool> {
        Ok(self.state_of(kc)?.diagnosed)
    }

    pub fn set_learn_param(&mut self, kc: KcId, learn: f64) -> Result<()> {
        crate::error::check_range("learn", learn, 0.0, 1.0)?;
        self.state_of_mut(kc)?.params.learn = learn;
        Ok(())
    }

    pub fn set_delta_param(&mut self, kc: KcId, delta: f64) -> Result<()> {
        crate::error::check_range("delta", delta, -2.0, 0.0)?;
        self.state_of_mut(kc)?.params.delta = delta;
        Ok(())
    }

    pub fn set_gamma_param(&mut self, kc: KcId, gamma: f64) -> Result<()> {
        crate::error::check_range("gamma", gamma, 0.0, 5.0)?;
        self.state_of_mut(kc)?.params.gamma = gamma;
        Ok(())
    }

    /// Merge the exercise's guess/slip into the component's calibrated
    /// parameters and overwrite the stored mastery with the rule's output.
    /// The answer may be a full [`Answer`] or a plain success boolean.
    pub fn apply_update(
        &mut self,
        kc_id: KcId,
        answer: impl Into<Answer>,
        exercise_params: ExerciseParams,
    ) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let kc = graph.kc_by_id(kc_id).ok_or_else(|| {
            GraphError::Construction(format!("KC #{} not in the domain graph", kc_id))
        })?;
        let state = self.state_of_mut(kc_id)?;
        let params = UpdateParams::merge(&state.params, &exercise_params);
        params.validate()?;
        state.m_pba = kc.update_mastery(state.m_pba, answer.into().success, &params);
        Ok(())
    }

    /// Local diagnosis plus optional threshold diffusion for one evaluation.
    ///
    /// Local diagnosis applies one update per answered exercise, in the
    /// evaluation's answer order, then sets the component's one-way
    /// `diagnosed` flag. Global diagnosis runs the threshold diffusion
    /// toward children then parents.
    pub fn process_evaluation(
        &mut self,
        evaluation: &Evaluation,
        local_diagnosis: bool,
        global_diagnosis: bool,
    ) -> Result<()> {
        let graph = Arc::clone(&self.graph);
        let kc = graph.kc_for_family(evaluation.family_id()).ok_or_else(|| {
            GraphError::Construction(format!(
                "evaluation #{} references unknown exercise family #{}",
                evaluation.id(),
                evaluation.family_id()
            ))
        })?;
        if local_diagnosis {
            self.compute_diagnosis(kc, evaluation.answers())?;
            self.state_of_mut(kc.id())?.diagnosed = true;
        }
        if global_diagnosis {
            self.diffuse_from(kc.id())?;
        }
        Ok(())
    }

    /// Fold a batch of evaluations sequentially. A malformed evaluation is
    /// logged and skipped; the rest of the batch still runs. Structural
    /// failures (a graph cycle, a corrupt parameter) abort the batch.
    pub fn process_evaluations(
        &mut self,
        evaluations: &[Evaluation],
        local_diagnosis: bool,
        global_diagnosis: bool,
    ) -> Result<()> {
        for evaluation in evaluations {
            match self.process_evaluation(evaluation, local_diagnosis, global_diagnosis) {
                Ok(()) => {}
                Err(GraphError::Construction(msg)) => {
                    warn!(
                        evaluation_id = evaluation.id(),
                        "skipping malformed evaluation: {msg}"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Predicted mastery after the evaluation, with the prior state restored
    /// afterward. Usable as a pure black-box objective.
    pub fn predict_evaluation(&mut self, evaluation: &Evaluation) -> Result<f64> {
        let graph = Arc::clone(&self.graph);
        let kc = graph.kc_for_family(evaluation.family_id()).ok_or_else(|| {
            GraphError::Construction(format!(
                "evaluation #{} references unknown exercise family #{}",
                evaluation.id(),
                evaluation.family_id()
            ))
        })?;
        let prior = self.mastering_probability(kc.id())?;
        let outcome = self.compute_diagnosis(kc, evaluation.answers());
        let updated = self.mastering_probability(kc.id())?;
        self.set_mastering_probability(kc.id(), prior)?;
        outcome?;
        Ok(updated)
    }

    fn compute_diagnosis(
        &mut self,
        kc: &KnowledgeComponent,
        answers: &[(ExerciseId, Answer)],
    ) -> Result<()> {
        for (exercise_id, answer) in answers {
            let exercise = kc
                .exercise_family()
                .exercise_by_id(*exercise_id)
                .ok_or_else(|| {
                    GraphError::Construction(format!(
                        "exercise #{} not in family #{}",
                        exercise_id,
                        kc.exercise_family().id()
                    ))
                })?;
            self.apply_update(kc.id(), *answer, exercise.params())?;
        }
        debug!(
            kc_id = kc.id(),
            m_pba = self.mastering_probability(kc.id())?,
            "local diagnosis applied"
        );
        Ok(())
    }
}

/// A group of learners sharing one domain and one calibrated parameter set.
///
/// The pool's default learner graph is calibrated offline; every learner
/// joining the pool starts from a deep copy of it, so no mutable state is
/// ever shared across learners.
#[derive(Debug)]
pub struct LearnerPool {
    graph: Arc<DomainGraph>,
    default_graph: LearnerGraph,
    learners: HashMap<LearnerId, LearnerGraph>,
}

impl LearnerPool {
    pub fn new(graph: Arc<DomainGraph>) -> Self {
        let default_graph = LearnerGraph::new(DEFAULT_LEARNER_ID, Arc::clone(&graph));
        Self {
            graph,
            default_graph,
            learners: HashMap::new(),
        }
    }

    pub fn domain(&self) -> &Arc<DomainGraph> {
        &self.graph
    }

    pub fn default_graph(&self) -> &LearnerGraph {
        &self.default_graph
    }

    pub fn default_graph_mut(&mut self) -> &mut LearnerGraph {
        &mut self.default_graph
    }

    /// Create the learner's graph as a deep copy of the calibrated default.
    pub fn join(&mut self, learner_id: LearnerId) -> Result<&mut LearnerGraph> {
        if learner_id == DEFAULT_LEARNER_ID {
            return Err(GraphError::Construction(format!(
                "learner id {} is reserved for the pool default",
                DEFAULT_LEARNER_ID
            )));
        }
        if self.learners.contains_key(&learner_id) {
            return Err(GraphError::Construction(format!(
                "learner #{} already belongs to the pool",
                learner_id
            )));
        }
        let mut graph = self.default_graph.clone();
        graph.learner_id = learner_id;
        Ok(self.learners.entry(learner_id).or_insert(graph))
    }

    pub fn learner(&self, learner_id: LearnerId) -> Option<&LearnerGraph> {
        self.learners.get(&learner_id)
    }

    pub fn learner_mut(&mut self, learner_id: LearnerId) -> Option<&mut LearnerGraph> {
        self.learners.get_mut(&learner_id)
    }

    /// Drop a learner; their graph is destroyed with them.
    pub fn remove(&mut self, learner_id: LearnerId) -> Option<LearnerGraph> {
        self.learners.remove(&learner_id)
    }

    pub fn learner_ids(&self) -> Vec<LearnerId> {
        let mut ids: Vec<LearnerId> = self.learners.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.learners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.learners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Exercise, ExerciseFamily};
    use crate::graph::{Link, LinkModel};
    use crate::types::Behavior;

    fn two_kc_domain() -> Arc<DomainGraph> {
        let fam_a = ExerciseFamily::new(
            10,
            "fam-a",
            vec![
                Exercise::new(101, "quiz", 0.25, 0.1).unwrap(),
                Exercise::new(102, "quiz", 0.25, 0.1).unwrap(),
            ],
        );
        let fam_b = ExerciseFamily::new(
            20,
            "fam-b",
            vec![Exercise::new(201, "quiz", 0.2, 0.1).unwrap()],
        );
        let kcs = vec![
            KnowledgeComponent::new(1, "a", Behavior::Procedural, fam_a),
            KnowledgeComponent::new(2, "b", Behavior::Declarative, fam_b),
        ];
        let links = LinkModel::with_links(vec![
            Link::from_children(1, vec![2]),
            Link::from_parents(2, vec![1]),
        ]);
        Arc::new(DomainGraph::new(kcs, links).unwrap())
    }

    fn eval_on_a(successes: &[bool]) -> Evaluation {
        let answers = successes
            .iter()
            .enumerate()
            .map(|(i, &s)| (101 + i as u64, Answer::from(s)))
            .collect();
        Evaluation::new(1, 10, 7, answers)
    }

    #[test]
    fn test_local_diagnosis_updates_and_flags() {
        let mut graph = LearnerGraph::new(7, two_kc_domain());
        assert!(!graph.diagnosed(1).unwrap());

        graph
            .process_evaluation(&eval_on_a(&[true, true]), true, false)
            .unwrap();

        assert!(graph.diagnosed(1).unwrap(), "diagnosed flag must be set");
        assert!(
            graph.mastering_probability(1).unwrap() > 0.2,
            "two successes must raise mastery above the prior"
        );
        // The other component is untouched by a purely local diagnosis.
        assert_eq!(graph.mastering_probability(2).unwrap(), 0.2);
    }

    #[test]
    fn test_predict_restores_state() {
        let mut graph = LearnerGraph::new(7, two_kc_domain());
        let prior = graph.mastering_probability(1).unwrap();

        let predicted = graph.predict_evaluation(&eval_on_a(&[true, true])).unwrap();

        assert!(predicted > prior);
        assert_eq!(
            graph.mastering_probability(1).unwrap(),
            prior,
            "prediction must restore the prior state"
        );
        assert!(!graph.diagnosed(1).unwrap());
    }

    #[test]
    fn test_malformed_evaluation_does_not_abort_batch() {
        let mut graph = LearnerGraph::new(7, two_kc_domain());
        let batch = vec![
            Evaluation::new(1, 999, 7, vec![(1, Answer::from(true))]),
            eval_on_a(&[true, true]),
        ];

        graph.process_evaluations(&batch, true, false).unwrap();

        assert!(
            graph.mastering_probability(1).unwrap() > 0.2,
            "the well-formed evaluation must still be processed"
        );
    }

    #[test]
    fn test_unknown_exercise_is_malformed() {
        let mut graph = LearnerGraph::new(7, two_kc_domain());
        let bad = Evaluation::new(1, 10, 7, vec![(555, Answer::from(true))]);
        assert!(matches!(
            graph.process_evaluation(&bad, true, false),
            Err(GraphError::Construction(_))
        ));
    }

    #[test]
    fn test_pool_join_deep_copies() {
        let mut pool = LearnerPool::new(two_kc_domain());
        pool.default_graph_mut().set_learn_param(1, 0.42).unwrap();

        pool.join(7).unwrap();
        // Mutating the learner must not touch the pool default.
        pool.learner_mut(7)
            .unwrap()
            .set_mastering_probability(1, 0.9)
            .unwrap();

        assert_eq!(pool.learner(7).unwrap().params(1).unwrap().learn, 0.42);
        assert_eq!(
            pool.default_graph().mastering_probability(1).unwrap(),
            0.2,
            "learner mutation leaked into the pool default"
        );
    }

    #[test]
    fn test_pool_rejects_reserved_and_duplicate_ids() {
        let mut pool = LearnerPool::new(two_kc_domain());
        assert!(pool.join(DEFAULT_LEARNER_ID).is_err());
        pool.join(7).unwrap();
        assert!(pool.join(7).is_err());
        assert_eq!(pool.learner_ids(), vec![7]);

        assert!(pool.remove(7).is_some());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_set_mastering_probability_validates() {
        let mut graph = LearnerGraph::new(7, two_kc_domain());
        assert!(graph.set_mastering_probability(1, 1.2).is_err());
        assert!(graph.set_mastering_probability(99, 0.5).is_err());
    }
}
