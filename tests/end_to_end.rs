//! End-to-end flow: build a domain, calibrate the pool default, let a
//! learner join, process evidence with diffusion, and export the network.

use std::sync::Arc;

use mastery_algo::{
    Answer, Behavior, CalibrationConfig, DiffusionPolicy, DomainGraph, Evaluation, Exercise,
    ExerciseFamily, KnowledgeComponent, LearnerPool, Link, LinkModel, NetworkSnapshot, Smoothing,
};

/// fractions -> ratios -> percentages, one procedural and one declarative
/// component along the chain.
fn sample_domain() -> Arc<DomainGraph> {
    let fractions = KnowledgeComponent::new(
        1,
        "fractions",
        Behavior::Procedural,
        ExerciseFamily::new(
            10,
            "fractions drills",
            vec![
                Exercise::new(101, "quiz", 0.25, 0.1).unwrap(),
                Exercise::new(102, "quiz", 0.2, 0.1).unwrap(),
            ],
        ),
    );
    let ratios = KnowledgeComponent::new(
        2,
        "ratios",
        Behavior::Declarative,
        ExerciseFamily::new(
            20,
            "ratios drills",
            vec![Exercise::new(201, "quiz", 0.25, 0.1).unwrap()],
        ),
    );
    let percentages = KnowledgeComponent::new(
        3,
        "percentages",
        Behavior::Procedural,
        ExerciseFamily::new(
            30,
            "percentages drills",
            vec![Exercise::new(301, "quiz", 0.25, 0.1).unwrap()],
        ),
    );

    let mut ratios_from_parents = Link::from_parents(2, vec![1]);
    ratios_from_parents
        .set_probability_vector(vec![0.05, 0.6])
        .unwrap();
    let links = LinkModel::with_links(vec![
        Link::from_children(1, vec![2]),
        ratios_from_parents,
        Link::from_children(2, vec![3]),
        Link::from_parents(3, vec![2]),
    ]);

    Arc::new(DomainGraph::new(vec![fractions, ratios, percentages], links).unwrap())
}

#[test]
fn test_pool_calibration_and_learner_flow() {
    let mut pool = LearnerPool::new(sample_domain());

    let config = CalibrationConfig {
        max_trials: 60,
        seed: 42,
    };
    pool.default_graph_mut().initialize_params(&config).unwrap();

    let default_learn = pool.default_graph().params(1).unwrap().learn;
    assert!((0.0..=1.0).contains(&default_learn));

    // The joining learner inherits the calibrated parameters by deep copy.
    pool.join(7).unwrap();
    let learner = pool.learner_mut(7).unwrap();
    assert_eq!(learner.params(1).unwrap().learn, default_learn);

    // A strong evaluation on fractions, processed with threshold diffusion.
    let evaluation = Evaluation::new(
        1,
        10,
        7,
        vec![(101, Answer::from(true)), (102, Answer::from(true))],
    );
    learner.process_evaluation(&evaluation, true, true).unwrap();

    assert!(learner.diagnosed(1).unwrap());
    assert!(
        learner.mastering_probability(1).unwrap() > 0.2,
        "two successes must raise fractions above the prior"
    );

    // The pool default is untouched by learner activity.
    assert_eq!(
        pool.default_graph().mastering_probability(1).unwrap(),
        0.2
    );
}

#[test]
fn test_policy_diffusion_reaches_the_whole_chain() {
    let mut pool = LearnerPool::new(sample_domain());
    pool.join(7).unwrap();
    let learner = pool.learner_mut(7).unwrap();

    // Certain mastery of fractions, then CPT propagation: ratios must land
    // exactly on its "parent mastered" conditional probability.
    learner.set_mastering_probability(1, 1.0).unwrap();
    learner
        .bayesian_diffuse_to_children(1, Smoothing::Static)
        .unwrap();

    assert_eq!(learner.mastering_probability(2).unwrap(), 0.6);
    // percentages was rebuilt through its (default) from-parents link too.
    let percentages = learner.mastering_probability(3).unwrap();
    assert!((0.0..=1.0).contains(&percentages));
}

#[test]
fn test_run_policy_then_export() {
    let mut pool = LearnerPool::new(sample_domain());
    pool.join(7).unwrap();
    let learner = pool.learner_mut(7).unwrap();

    let evaluation = Evaluation::new(1, 20, 7, vec![(201, Answer::from(true))]);
    learner
        .run_diffusion_policy(&evaluation, DiffusionPolicy::from_model(2).unwrap())
        .unwrap();

    let snapshot = NetworkSnapshot::from_graph(learner).unwrap();
    assert_eq!(snapshot.learner_id, 7);
    assert_eq!(snapshot.kcs.len(), 3);
    assert_eq!(snapshot.kcs[&2].parents, vec![1]);
    assert_eq!(snapshot.kcs[&2].from_parents_vector, vec![0.05, 0.6]);

    let json = snapshot.to_json().unwrap();
    assert!(json.contains("\"percentages\""));
}
