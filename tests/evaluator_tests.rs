//! Evaluator operation tests
//!
//! Exercises the optional and random operations directly, without going
//! through source text.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use primer::interp::{Environment, Evaluator, RandomSource, Value};

fn evaluator(seed: u64) -> Evaluator {
    Evaluator::with_random(Arc::new(RandomSource::seeded(seed)))
}

// ==================== Interpolation ====================

#[test]
fn test_interpolate_arithmetic() {
    let mut env = Environment::new();
    let out = evaluator(0)
        .interpolate("Hello {2+3} World", &mut env)
        .unwrap();
    assert_eq!(out, "Hello 5 World");
}

#[test]
fn test_interpolate_literal_braces() {
    let mut env = Environment::new();
    let out = evaluator(0).interpolate("{{not code}}", &mut env).unwrap();
    assert_eq!(out, "{not code}");
}

#[test]
fn test_interpolate_reads_environment() {
    let mut env = Environment::new();
    env.define(
        "name",
        primer::interp::Binding::new(Value::str("Munich"), false, None),
    );
    let out = evaluator(0)
        .interpolate("Welcome to {name}!", &mut env)
        .unwrap();
    assert_eq!(out, "Welcome to Munich!");
}

#[test]
fn test_interpolate_unknown_name() {
    let mut env = Environment::new();
    let err = evaluator(0)
        .interpolate("Hi {stranger}", &mut env)
        .unwrap_err();
    assert_eq!(err.kind(), "UnboundNameError");
}

#[test]
fn test_interpolate_unclosed_brace() {
    let mut env = Environment::new();
    let err = evaluator(0).interpolate("Hi {2+", &mut env).unwrap_err();
    assert_eq!(err.kind(), "ParseError");
}

// ==================== Random ====================

#[test]
fn test_random_int_observes_both_endpoints() {
    let ev = evaluator(11);
    let draws: Vec<i64> = (0..1000).map(|_| ev.random_int(1, 3).unwrap()).collect();
    assert!(draws.iter().all(|n| (1..=3).contains(n)));
    assert!(draws.contains(&1));
    assert!(draws.contains(&3));
}

#[test]
fn test_random_int_single_value() {
    assert_eq!(evaluator(0).random_int(5, 5).unwrap(), 5);
}

#[test]
fn test_random_int_empty_range() {
    let err = evaluator(0).random_int(3, 1).unwrap_err();
    assert_eq!(err.kind(), "RangeError");
}

#[test]
fn test_random_float_empty_range() {
    let ev = evaluator(0);
    assert_eq!(ev.random_float(1.0, 1.0).unwrap_err().kind(), "RangeError");
    assert_eq!(ev.random_float(3.0, 1.0).unwrap_err().kind(), "RangeError");
    assert_eq!(
        ev.random_float(0.0, f64::INFINITY).unwrap_err().kind(),
        "RangeError"
    );
}

#[test]
fn test_seeded_evaluators_agree() {
    let a = evaluator(99);
    let b = evaluator(99);
    for _ in 0..20 {
        assert_eq!(
            a.random_float(1.0, 3.0).unwrap(),
            b.random_float(1.0, 3.0).unwrap()
        );
    }
}

#[test]
fn test_random_element() {
    let ev = evaluator(5);
    assert!(ev.random_element(&[]).is_nil());

    let items = vec![Value::Int(1), Value::Int(2), Value::Int(3)];
    match ev.random_element(&items) {
        Value::Optional(Some(inner)) => assert!(items.contains(&inner)),
        other => panic!("Expected a present element, got {}", other),
    }
}

#[test]
fn test_shuffle_is_permutation() {
    let ev = evaluator(5);
    let items: Vec<Value> = (0..10).map(Value::Int).collect();
    let mut shuffled = ev.shuffle(&items);
    assert_eq!(shuffled.len(), items.len());
    shuffled.sort_by_key(|v| v.as_int());
    assert_eq!(shuffled, items);
}

// ==================== Optionals ====================

#[test]
fn test_force_unwrap_absent() {
    let err = evaluator(0).force_unwrap(Value::nil()).unwrap_err();
    assert_eq!(err.kind(), "NilUnwrapError");
}

#[test]
fn test_force_unwrap_non_optional() {
    let err = evaluator(0).force_unwrap(Value::Int(1)).unwrap_err();
    assert_eq!(err.kind(), "TypeError");
}

#[test]
fn test_coalesce_non_optional_unchanged() {
    assert_eq!(
        evaluator(0).coalesce(Value::str("x"), Value::str("y")),
        Value::str("x")
    );
}

#[test]
fn test_optional_chain_wraps_once() {
    let ev = evaluator(0);
    let present = Value::some(Value::str("Munich"));

    let plain = ev
        .optional_chain(present.clone(), |v| Ok(Value::Int(v.as_str().unwrap().len() as i64)))
        .unwrap();
    assert_eq!(plain, Value::some(Value::Int(6)));

    // An optional result is not wrapped again
    let flat = ev.optional_chain(present, |_| Ok(Value::nil())).unwrap();
    assert_eq!(flat, Value::nil());
}

#[test]
fn test_optional_chain_propagates_error() {
    let ev = evaluator(0);
    let err = ev
        .optional_chain(Value::some(Value::Int(1)), |v| ev.force_unwrap(v))
        .unwrap_err();
    assert_eq!(err.kind(), "TypeError");
}

#[test]
fn test_optional_chain_through_absent_step() {
    let ev = evaluator(0);
    let mut later_called = false;
    let result = ev
        .optional_chain(Value::some(Value::Int(1)), |_| {
            ev.optional_chain(Value::nil(), |_| {
                later_called = true;
                Ok(Value::Int(0))
            })
        })
        .unwrap();
    assert!(result.is_nil());
    assert!(!later_called);
}

// ==================== Properties ====================

fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i64>().prop_map(Value::Int),
        any::<bool>().prop_map(Value::Bool),
        "[a-z]{0,8}".prop_map(Value::Str),
        (-1.0e6..1.0e6f64).prop_map(Value::Float),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_int_within_bounds(low in -1000i64..1000, width in 0i64..1000, seed in any::<u64>()) {
        let high = low + width;
        let n = evaluator(seed).random_int(low, high).unwrap();
        prop_assert!(low <= n && n <= high);
    }

    #[test]
    fn random_float_never_reaches_high(low in -1.0e6..1.0e6f64, width in 1.0e-3..1.0e6f64, seed in any::<u64>()) {
        let high = low + width;
        let ev = evaluator(seed);
        for _ in 0..16 {
            let x = ev.random_float(low, high).unwrap();
            prop_assert!(low <= x && x < high);
        }
    }

    #[test]
    fn random_int_rejects_inverted(low in -1000i64..1000, gap in 1i64..1000) {
        prop_assert!(evaluator(0).random_int(low, low - gap).is_err());
    }

    #[test]
    fn force_unwrap_returns_inner(v in arb_value()) {
        let ev = evaluator(0);
        prop_assert_eq!(ev.force_unwrap(Value::some(v.clone())).unwrap(), v);
    }

    #[test]
    fn coalesce_laws(v in arb_value(), d in arb_value()) {
        let ev = evaluator(0);
        prop_assert_eq!(ev.coalesce(Value::nil(), d.clone()), d.clone());
        prop_assert_eq!(ev.coalesce(Value::some(v.clone()), d), v);
    }

    #[test]
    fn optional_chain_laws(v in arb_value()) {
        let ev = evaluator(0);
        let describe = |x: Value| Ok(Value::Str(x.to_string()));

        prop_assert!(ev.optional_chain(Value::nil(), describe).unwrap().is_nil());
        prop_assert_eq!(
            ev.optional_chain(Value::some(v.clone()), describe).unwrap(),
            Value::some(Value::Str(v.to_string()))
        );
    }

    #[test]
    fn into_optional_wraps_once(v in arb_value()) {
        let once = v.clone().into_optional();
        prop_assert_eq!(once.clone().into_optional(), once);
    }
}
