//! Domain entities: exercises, exercise families, knowledge components and
//! the domain graph that ties them to the link model.

use crate::error::{GraphError, Result};
use crate::graph::LinkModel;
use crate::learner::Evaluation;
use crate::types::{
    Answer, Behavior, ExerciseFamilyId, ExerciseId, ExerciseParams, KcId, LearnerId,
};
use crate::update::{update_declarative, update_procedural, UpdateParams};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// One exercise with its evidence parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    id: ExerciseId,
    kind: String,
    guess: f64,
    slip: f64,
}

impl Exercise {
    /// Guess and slip must lie in [0, 0.5]: an exercise where luck beats
    /// knowledge carries no evidence.
    pub fn new(id: ExerciseId, kind: impl Into<String>, guess: f64, slip: f64) -> Result<Self> {
        crate::error::check_range("guess", guess, 0.0, 0.5)?;
        crate::error::check_range("slip", slip, 0.0, 0.5)?;
        Ok(Self {
            id,
            kind: kind.into(),
            guess,
            slip,
        })
    }

    pub fn id(&self) -> ExerciseId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn params(&self) -> ExerciseParams {
        ExerciseParams {
            guess: self.guess,
            slip: self.slip,
        }
    }
}

/// The ordered set of exercises evaluating one knowledge component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseFamily {
    id: ExerciseFamilyId,
    name: String,
    exercises: Vec<Exercise>,
}

impl ExerciseFamily {
    pub fn new(id: ExerciseFamilyId, name: impl Into<String>, exercises: Vec<Exercise>) -> Self {
        Self {
            id,
            name: name.into(),
            exercises,
        }
    }

    pub fn id(&self) -> ExerciseFamilyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn exercises(&self) -> &[Exercise] {
        &self.exercises
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }

    /// Add exercises, skipping ids already present.
    pub fn add_exercises(&mut self, exercises: Vec<Exercise>) {
        for exercise in exercises {
            if self.exercise_by_id(exercise.id()).is_none() {
                self.exercises.push(exercise);
            }
        }
    }

    pub fn exercise_by_id(&self, id: ExerciseId) -> Option<&Exercise> {
        self.exercises.iter().find(|ex| ex.id == id)
    }

    /// Build an evaluation with a uniform random success on every exercise.
    pub fn random_evaluation<R: Rng>(&self, rng: &mut R, learner_id: LearnerId) -> Evaluation {
        let answers = self
            .exercises
            .iter()
            .map(|ex| (ex.id, Answer::from(rng.gen_bool(0.5))))
            .collect();
        Evaluation::new(0, self.id, learner_id, answers)
    }
}

/// An atomic unit of domain knowledge.
///
/// Identity and behavior are fixed at construction; the component owns the
/// exercise family that evaluates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeComponent {
    id: KcId,
    name: String,
    behavior: Behavior,
    exercise_family: ExerciseFamily,
}

impl KnowledgeComponent {
    pub fn new(
        id: KcId,
        name: impl Into<String>,
        behavior: Behavior,
        exercise_family: ExerciseFamily,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            behavior,
            exercise_family,
        }
    }

    pub fn id(&self) -> KcId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    pub fn exercise_family(&self) -> &ExerciseFamily {
        &self.exercise_family
    }

    /// Apply the behavior's closed-form update rule.
    pub fn update_mastery(&self, p: f64, success: bool, params: &UpdateParams) -> f64 {
        match self.behavior {
            Behavior::Procedural => update_procedural(p, success, params),
            Behavior::Declarative => update_declarative(p, success, params),
        }
    }
}

/// The expert model of one learning domain: its knowledge components and the
/// prerequisite link model over them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomainGraph {
    knowledge_components: Vec<KnowledgeComponent>,
    link_model: LinkModel,
}

impl DomainGraph {
    /// Component ids must be unique.
    pub fn new(knowledge_components: Vec<KnowledgeComponent>, link_model: LinkModel) -> Result<Self> {
        let mut graph = Self {
            knowledge_components: Vec::new(),
            link_model,
        };
        for kc in knowledge_components {
            graph.add_kc(kc)?;
        }
        Ok(graph)
    }

    pub fn add_kc(&mut self, kc: KnowledgeComponent) -> Result<()> {
        if self.kc_by_id(kc.id()).is_some() {
            return Err(GraphError::Construction(format!(
                "duplicate knowledge component id #{}",
                kc.id()
            )));
        }
        self.knowledge_components.push(kc);
        Ok(())
    }

    pub fn knowledge_components(&self) -> &[KnowledgeComponent] {
        &self.knowledge_components
    }

    pub fn link_model(&self) -> &LinkModel {
        &self.link_model
    }

    pub fn set_link_model(&mut self, link_model: LinkModel) {
        self.link_model = link_model;
    }

    pub fn kc_ids(&self) -> Vec<KcId> {
        self.knowledge_components.iter().map(|kc| kc.id()).collect()
    }

    pub fn kc_by_id(&self, id: KcId) -> Option<&KnowledgeComponent> {
        self.knowledge_components.iter().find(|kc| kc.id() == id)
    }

    pub fn kc_by_name(&self, name: &str) -> Option<&KnowledgeComponent> {
        self.knowledge_components.iter().find(|kc| kc.name() == name)
    }

    /// The component evaluated by a given exercise family.
    pub fn kc_for_family(&self, family_id: ExerciseFamilyId) -> Option<&KnowledgeComponent> {
        self.knowledge_components
            .iter()
            .find(|kc| kc.exercise_family().id() == family_id)
    }

    pub fn len(&self) -> usize {
        self.knowledge_components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knowledge_components.is_empty()
    }
}
