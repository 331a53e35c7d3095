//! Evaluation behaviour of complete expressions.

use std::collections::HashMap;
use std::thread;

use sift_expr::{
    Bindings, EvaluationError, Expression, ExpressionError, MalformedKind, Value, eval,
};

fn eval_ok(input: &str) -> Value {
    Expression::new(input)
        .evaluate()
        .unwrap_or_else(|err| panic!("`{input}` should evaluate: {err}"))
}

fn eval_with(input: &str, bindings: &[(&str, Value)]) -> Result<Value, ExpressionError> {
    let mut expr = Expression::new(input);
    expr.bind_all(bindings.iter().cloned());
    expr.evaluate()
}

fn truthy(input: &str, bindings: &[(&str, Value)]) -> bool {
    match eval_with(input, bindings) {
        Ok(Value::Boolean(result)) => result,
        other => panic!("`{input}` should evaluate to a boolean, got {other:?}"),
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

#[test]
fn multiplication_before_addition() {
    assert_eq!(eval_ok("5 + 3 * 2"), Value::Number(11.0));
}

#[test]
fn parentheses_group() {
    assert_eq!(eval_ok("(5 + 3) * 2"), Value::Number(16.0));
}

#[test]
fn subtraction_and_division_chain_left() {
    assert_eq!(eval_ok("10 - 4 - 3"), Value::Number(3.0));
    assert_eq!(eval_ok("8 / 4 / 2"), Value::Number(1.0));
    assert_eq!(eval_ok("2 - 3 + 4"), Value::Number(3.0));
}

#[test]
fn division_by_zero_is_an_error() {
    let err = Expression::new("1 / 0").evaluate().unwrap_err();
    assert_eq!(
        err,
        ExpressionError::Evaluation(EvaluationError::DivisionByZero)
    );
    assert!(err.is_evaluation());
}

#[test]
fn numeric_strings_take_part_in_arithmetic() {
    let result = eval_with("qty * 2", &[("qty", Value::from("21"))]).unwrap();
    assert_eq!(result, Value::Number(42.0));
}

#[test]
fn arithmetic_on_non_numeric_values_fails() {
    let err = eval_with("name + 1", &[("name", Value::from("bob"))]).unwrap_err();
    assert_eq!(
        err,
        ExpressionError::Evaluation(EvaluationError::InvalidOperand {
            op: "add",
            left: "string",
            right: "number",
        })
    );

    let err = eval_with("flag * 2", &[("flag", Value::Boolean(true))]).unwrap_err();
    assert!(matches!(
        err,
        ExpressionError::Evaluation(EvaluationError::InvalidOperand { op: "mul", .. })
    ));
}

// =============================================================================
// Comparison
// =============================================================================

#[test]
fn loose_equality_between_numbers_and_strings() {
    assert!(truthy("status = 2", &[("status", Value::from(2))]));
    assert!(truthy("status = 2", &[("status", Value::from("2"))]));
    assert!(truthy("status = 2", &[("status", Value::from(" 2.0 "))]));
    assert!(!truthy("status = 2", &[("status", Value::from("two"))]));
    assert!(truthy("status != 3", &[("status", Value::from("2"))]));
    assert!(truthy("status <> 3", &[("status", Value::from("2"))]));
}

#[test]
fn loose_equality_with_booleans_and_null() {
    assert!(truthy("flag = true", &[("flag", Value::from(1))]));
    assert!(truthy("flag = false", &[("flag", Value::from(""))]));
    assert!(truthy("owner = null", &[("owner", Value::Null)]));
    assert!(truthy("owner = null", &[("owner", Value::from(""))]));
    assert!(!truthy("owner = null", &[("owner", Value::from("ann"))]));
}

#[test]
fn string_equality_is_case_sensitive() {
    assert!(truthy("name = 'Ann'", &[("name", Value::from("Ann"))]));
    assert!(!truthy("name = 'ann'", &[("name", Value::from("Ann"))]));
}

#[test]
fn ordering_is_numeric_when_both_sides_are_numeric() {
    assert!(truthy("age > 9", &[("age", Value::from("10"))]));
    assert!(truthy("age >= 10", &[("age", Value::from(10))]));
    assert!(truthy("age <= 10", &[("age", Value::from(10))]));
    assert!(!truthy("age < 10", &[("age", Value::from(10))]));
}

#[test]
fn ordering_is_lexical_otherwise() {
    assert!(truthy("name < 'bob'", &[("name", Value::from("alice"))]));
    assert!(truthy("code > 'A9'", &[("code", Value::from("B1"))]));
}

#[test]
fn ordering_lists_is_an_error() {
    let err = eval_with("tags > 1", &[("tags", Value::from(vec!["a"]))]).unwrap_err();
    assert!(matches!(
        err,
        ExpressionError::Evaluation(EvaluationError::InvalidOperand { op: "compare", .. })
    ));
}

#[test]
fn contains_is_case_insensitive_substring() {
    assert_eq!(eval_ok("'John' ~= 'oh'"), Value::Boolean(true));
    assert_eq!(eval_ok("'John' ~= 'JO'"), Value::Boolean(true));
    assert_eq!(eval_ok("'John' ~= 'x'"), Value::Boolean(false));
}

#[test]
fn contains_on_lists_tests_membership() {
    let tags = Value::from(vec!["urgent", "billing"]);
    assert!(truthy("tags ~= 'urgent'", &[("tags", tags.clone())]));
    assert!(!truthy("tags ~= 'urg'", &[("tags", tags.clone())]));
    // A needle that still carries its quotes is matched without them.
    assert!(truthy(
        "tags ~= needle",
        &[("tags", tags), ("needle", Value::from("\"billing\""))]
    ));

    let ids = Value::from(vec![1, 2, 3]);
    assert!(truthy("ids ~= 2", &[("ids", ids.clone())]));
    assert!(truthy("ids ~= '3'", &[("ids", ids)]));
}

#[test]
fn starts_with_is_case_insensitive() {
    assert_eq!(eval_ok("'Johnson' *= 'john'"), Value::Boolean(true));
    assert_eq!(eval_ok("'Johnson' *= 'son'"), Value::Boolean(false));
}

#[test]
fn ends_with_is_case_sensitive() {
    assert_eq!(eval_ok("'Johnson' =* 'son'"), Value::Boolean(true));
    assert_eq!(eval_ok("'Johnson' =* 'SON'"), Value::Boolean(false));
}

#[test]
fn string_tests_use_the_text_of_numbers() {
    assert!(truthy("zip *= 90", &[("zip", Value::from(90210))]));
}

// =============================================================================
// Logical
// =============================================================================

#[test]
fn logical_operators_use_truthiness() {
    assert_eq!(eval_ok("1 && 'x'"), Value::Boolean(true));
    assert_eq!(eval_ok("0 || ''"), Value::Boolean(false));
    assert_eq!(eval_ok("null || 2 > 1"), Value::Boolean(true));
}

#[test]
fn logical_operators_chain_left_without_precedence_between_them() {
    // (true || true) && false
    assert_eq!(eval_ok("true || true && false"), Value::Boolean(false));
    // (false && true) || true
    assert_eq!(eval_ok("false && true || true"), Value::Boolean(true));
}

#[test]
fn logical_operators_do_not_short_circuit() {
    let err = Expression::new("false && missing = 1")
        .evaluate()
        .unwrap_err();
    assert_eq!(
        err,
        ExpressionError::Evaluation(EvaluationError::UndefinedVariable("missing".into()))
    );

    let err = Expression::new("true || missing").evaluate().unwrap_err();
    assert!(err.is_evaluation());
}

// =============================================================================
// Variables and resolver
// =============================================================================

#[test]
fn unknown_variable_without_resolver_fails() {
    let err = Expression::new("unknown_var = 1").evaluate().unwrap_err();
    assert_eq!(
        err,
        ExpressionError::Evaluation(EvaluationError::UndefinedVariable("unknown_var".into()))
    );
}

#[test]
fn resolver_supplies_unknown_variables() {
    let mut expr = Expression::new("unknown_var = 1");
    expr.set_resolver(|name: &str| (name == "unknown_var").then(|| Value::from(1)));
    assert_eq!(expr.evaluate().unwrap(), Value::Boolean(true));

    expr.set_text("other_var = 1");
    assert!(expr.evaluate().unwrap_err().is_evaluation());
}

#[test]
fn resolver_is_only_asked_for_unbound_names() {
    let mut expr = Expression::new("a + b");
    expr.bind("a", 1);
    expr.set_resolver(|name: &str| {
        assert_eq!(name, "b", "bound variables must not reach the resolver");
        Some(Value::from(2))
    });
    assert_eq!(expr.evaluate().unwrap(), Value::Number(3.0));
}

#[test]
fn bindings_can_be_merged_and_cleared() {
    let mut expr = Expression::new("a + b");
    expr.bind("a", 1);
    expr.bind_all(HashMap::from([("b".to_string(), Value::from(2))]));
    assert_eq!(expr.evaluate().unwrap(), Value::Number(3.0));

    expr.bind("a", 10);
    assert_eq!(expr.evaluate().unwrap(), Value::Number(12.0));

    expr.clear_bindings();
    assert!(expr.evaluate().unwrap_err().is_evaluation());
    assert!(expr.is_parsed(), "clearing bindings keeps the parsed tree");
}

#[test]
fn variable_names_are_case_sensitive() {
    let err = eval_with("Status = 1", &[("status", Value::from(1))]).unwrap_err();
    assert_eq!(
        err,
        ExpressionError::Evaluation(EvaluationError::UndefinedVariable("Status".into()))
    );
}

// =============================================================================
// Parse caching and idempotence
// =============================================================================

#[test]
fn repeated_evaluation_is_idempotent_and_does_not_reparse() {
    let mut expr = Expression::new("price * qty > 100 || name ~= 'deal'");
    expr.bind("price", 30);
    expr.bind("qty", 3);
    expr.bind("name", "Big Deal");

    let first = expr.evaluate().unwrap();
    let stats = expr.stats();
    let second = expr.evaluate().unwrap();

    assert_eq!(first, second);
    assert_eq!(expr.stats(), stats, "second evaluation must not touch the tokenizer");
    assert_eq!(stats.parses, 1);
}

#[test]
fn set_text_then_two_evaluations_agree() {
    let mut expr = Expression::new("1");
    for text in ["a * 2", "(a + 1) / 2", "a ~= 1 || a = 3", "a - a - a"] {
        expr.set_text(text);
        expr.bind("a", 3);
        let first = expr.evaluate();
        let second = expr.evaluate();
        assert_eq!(first, second, "{text}");
    }
}

#[test]
fn malformed_expression_fails_before_evaluation_and_every_time() {
    let mut expr = Expression::new("(a = 1");
    expr.set_resolver(|_: &str| -> Option<Value> {
        panic!("a malformed expression must not be evaluated")
    });

    let first = expr.evaluate().unwrap_err();
    let second = expr.evaluate().unwrap_err();
    assert_eq!(first, second);
    assert!(first.is_malformed());
    assert!(!first.is_evaluation());
    assert!(matches!(
        &first,
        ExpressionError::Malformed(err) if err.kind == MalformedKind::UnmatchedOpeningParenthesis
    ));
    assert_eq!(expr.stats().parses, 1);

    expr.set_text("a = 1");
    expr.bind("a", 1);
    assert_eq!(expr.evaluate().unwrap(), Value::Boolean(true));
}

#[test]
fn evaluate_with_uses_external_bindings_per_row() {
    let mut expr = Expression::new("score >= 50");
    let rows: Vec<Bindings> = [10, 50, 90]
        .into_iter()
        .map(|score| Bindings::from_iter([("score", score)]))
        .collect();

    let matches: Vec<bool> = rows
        .iter()
        .map(|row| expr.evaluate_with(row).unwrap().is_truthy())
        .collect();

    assert_eq!(matches, vec![false, true, true]);
    assert_eq!(expr.stats().parses, 1);
}

#[test]
fn one_shot_helper() {
    let bindings = Bindings::from_iter([("x", 4)]);
    assert_eq!(
        sift_expr::evaluate("x * x", &bindings).unwrap(),
        Value::Number(16.0)
    );
}

// =============================================================================
// Shared trees
// =============================================================================

#[test]
fn parsed_tree_can_be_evaluated_from_several_threads() {
    let tree = Expression::new("n * 2 > 10").tree().unwrap();

    let results: Vec<bool> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let tree = &tree;
                scope.spawn(move || {
                    let bindings = Bindings::from_iter([("n", n)]);
                    eval::evaluate(tree, &bindings, &sift_expr::NoResolver)
                        .unwrap()
                        .is_truthy()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    assert_eq!(
        results,
        vec![false, false, false, false, false, false, true, true]
    );
}

// =============================================================================
// Round trip against hand evaluation
// =============================================================================

#[test]
fn flat_expressions_match_manual_evaluation() {
    let a = 7.0;
    let b = 3.0;
    let c = 2.0;
    let cases = [
        ("a + b * c", a + b * c),
        ("a * b + c", a * b + c),
        ("a - b - c", a - b - c),
        ("a / b * c", a / b * c),
        ("a - b * c / 4", a - b * c / 4.0),
    ];

    for (input, expected) in cases {
        let result = eval_with(
            input,
            &[
                ("a", Value::from(a)),
                ("b", Value::from(b)),
                ("c", Value::from(c)),
            ],
        )
        .unwrap();
        assert_eq!(result, Value::Number(expected), "{input}");
    }
}
