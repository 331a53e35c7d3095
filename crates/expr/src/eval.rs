//! Tree evaluation.
//!
//! The evaluator is a plain function of a tree, bindings and a resolver. It never mutates
//! anything, so a parsed tree can be evaluated from several threads at once.

use std::cmp::Ordering;

use crate::ast::{OperatorKind, Token};
use crate::error::EvaluationError;
use crate::resolver::VariableResolver;
use crate::value::{Bindings, Value, ValueResult};

/// Evaluates `token` against `bindings`, asking `resolver` for any variable that is not bound.
///
/// Both operands of every operator are evaluated, including `&&` and `||`: an undefined
/// variable on either side fails the evaluation even when the other side alone would decide
/// the result.
pub fn evaluate(
    token: &Token,
    bindings: &Bindings,
    resolver: &dyn VariableResolver,
) -> Result<Value, EvaluationError> {
    match token {
        Token::Literal(value) => Ok(value.clone()),
        Token::Variable(name) => lookup(name, bindings, resolver),
        Token::BinaryOp {
            left,
            operator,
            right,
        } => {
            let lhs = evaluate(left, bindings, resolver)?;
            let rhs = evaluate(right, bindings, resolver)?;
            apply(*operator, &lhs, &rhs)
        }
    }
}

/// Applies a binary operator to two evaluated operands.
pub fn apply(operator: OperatorKind, lhs: &Value, rhs: &Value) -> ValueResult<Value> {
    let result = match operator {
        OperatorKind::And => Value::Boolean(lhs.is_truthy() && rhs.is_truthy()),
        OperatorKind::Or => Value::Boolean(lhs.is_truthy() || rhs.is_truthy()),
        OperatorKind::Eq => Value::Boolean(lhs.loose_eq(rhs)),
        OperatorKind::Neq => Value::Boolean(!lhs.loose_eq(rhs)),
        OperatorKind::Gt => Value::Boolean(lhs.compare(rhs)? == Ordering::Greater),
        OperatorKind::Gte => Value::Boolean(lhs.compare(rhs)? != Ordering::Less),
        OperatorKind::Lt => Value::Boolean(lhs.compare(rhs)? == Ordering::Less),
        OperatorKind::Lte => Value::Boolean(lhs.compare(rhs)? != Ordering::Greater),
        OperatorKind::Contains => Value::Boolean(lhs.contains(rhs)?),
        OperatorKind::StartsWith => Value::Boolean(lhs.starts_with(rhs)?),
        OperatorKind::EndsWith => Value::Boolean(lhs.ends_with(rhs)?),
        OperatorKind::Add => lhs.add(rhs)?,
        OperatorKind::Sub => lhs.sub(rhs)?,
        OperatorKind::Mul => lhs.mul(rhs)?,
        OperatorKind::Div => lhs.div(rhs)?,
    };
    Ok(result)
}

fn lookup(
    name: &str,
    bindings: &Bindings,
    resolver: &dyn VariableResolver,
) -> Result<Value, EvaluationError> {
    if let Some(value) = bindings.get(name) {
        return Ok(value.clone());
    }
    resolver
        .resolve(name)
        .ok_or_else(|| EvaluationError::UndefinedVariable(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::NoResolver;

    #[test]
    fn literals_evaluate_to_themselves() {
        let bindings = Bindings::new();
        let value = evaluate(&Token::literal("hi"), &bindings, &NoResolver).unwrap();
        assert_eq!(value, Value::from("hi"));
    }

    #[test]
    fn bindings_win_over_resolver() {
        let bindings = Bindings::from_iter([("x", 1)]);
        let resolver = |_: &str| Some(Value::from(2));
        let value = evaluate(&Token::variable("x"), &bindings, &resolver).unwrap();
        assert_eq!(value, Value::from(1));
    }

    #[test]
    fn operators_dispatch_to_value_semantics() {
        let two = Value::from(2);
        let three = Value::from(3);
        assert_eq!(
            apply(OperatorKind::Gte, &three, &two).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            apply(OperatorKind::Lte, &three, &two).unwrap(),
            Value::Boolean(false)
        );
        assert_eq!(apply(OperatorKind::Sub, &three, &two).unwrap(), Value::from(1));
        assert_eq!(
            apply(OperatorKind::Div, &three, &Value::from(0)),
            Err(EvaluationError::DivisionByZero)
        );
    }
}
