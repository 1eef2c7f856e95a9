//! Property-Based Tests for the diffusion engine
//!
//! Tests the following invariants:
//! - Bit-encoding round-trip: decode(encode(bits)) == bits for any width
//! - Update rules map [0, 1] into [0, 1] for any valid parameter set
//! - Procedural success with learn is never below the pure Bayes step
//! - CPT combination of unit-interval vectors stays in the unit interval

use proptest::prelude::*;

use mastery_algo::{
    bools_to_index, index_to_bools, update_declarative, update_procedural, UpdateParams,
};

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_unit() -> impl Strategy<Value = f64> {
    (0u64..=1000u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_half_unit() -> impl Strategy<Value = f64> {
    (0u64..=500u64).prop_map(|v| v as f64 / 1000.0)
}

fn arb_params() -> impl Strategy<Value = UpdateParams> {
    (
        arb_unit(),                     // learn
        arb_half_unit(),                // guess
        arb_half_unit(),                // slip
        (-2000i64..=0i64),              // delta * 1000
        (0u64..=5000u64),               // gamma * 1000
    )
        .prop_map(|(learn, guess, slip, delta, gamma)| UpdateParams {
            learn,
            guess,
            slip,
            delta: delta as f64 / 1000.0,
            gamma: gamma as f64 / 1000.0,
        })
}

proptest! {
    #[test]
    fn prop_bit_round_trip(bits in proptest::collection::vec(any::<bool>(), 0..12)) {
        let index = bools_to_index(&bits);
        prop_assert_eq!(index_to_bools(index, bits.len()), bits);
    }

    #[test]
    fn prop_index_round_trip(width in 0usize..10, raw in any::<usize>()) {
        let index = raw % (1usize << width);
        let bits = index_to_bools(index, width);
        prop_assert_eq!(bits.len(), width);
        prop_assert_eq!(bools_to_index(&bits), index);
    }

    #[test]
    fn prop_procedural_stays_in_unit_interval(
        p in arb_unit(),
        success in any::<bool>(),
        params in arb_params(),
    ) {
        let updated = update_procedural(p, success, &params);
        prop_assert!(updated.is_finite());
        prop_assert!((0.0..=1.0).contains(&updated), "got {}", updated);
    }

    #[test]
    fn prop_declarative_stays_in_unit_interval(
        p in arb_unit(),
        success in any::<bool>(),
        params in arb_params(),
    ) {
        let updated = update_declarative(p, success, &params);
        prop_assert!(updated.is_finite());
        prop_assert!((0.0..=1.0).contains(&updated), "got {}", updated);
    }

    #[test]
    fn prop_learn_never_lowers_success_outcome(
        p in arb_unit(),
        params in arb_params(),
    ) {
        let without_learn = update_procedural(p, true, &UpdateParams { learn: 0.0, ..params });
        let with_learn = update_procedural(p, true, &params);
        prop_assert!(
            with_learn >= without_learn - 1e-12,
            "learn={} lowered the outcome: {} < {}",
            params.learn,
            with_learn,
            without_learn
        );
    }
}
