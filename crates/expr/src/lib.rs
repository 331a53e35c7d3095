//! A small embeddable expression engine.
//!
//! Expressions combine literals, variables, comparison, logical and arithmetic operators, and
//! parentheses. They are parsed once into a tree and can then be evaluated many times against
//! different variable bindings:
//!
//! ```
//! use sift_expr::{Expression, Value};
//!
//! let mut expr = Expression::new("(5 + 3) * 2");
//! assert_eq!(expr.evaluate().unwrap(), Value::Number(16.0));
//!
//! expr.set_text("status = 2 && name *= 'jo'");
//! expr.bind("status", "2");
//! expr.bind("name", "John");
//! assert_eq!(expr.evaluate().unwrap(), Value::Boolean(true));
//! ```
//!
//! Variables missing from the bindings are passed to a [`VariableResolver`], if one is
//! installed. Without one they fail the evaluation.

pub mod ast;
pub mod error;
pub mod eval;
pub mod expression;
pub mod extract;
pub mod filter;
pub mod resolver;
pub mod tokenizer;
pub mod value;

pub use crate::ast::{OperatorClass, OperatorKind, Token};
pub use crate::error::{
    EvaluationError, ExpressionError, ExpressionResult, MalformedExpression, MalformedKind,
};
pub use crate::expression::Expression;
pub use crate::filter::{FilterNode, PreparedFilter};
pub use crate::resolver::{NoResolver, VariableResolver};
pub use crate::tokenizer::TokenizerStats;
pub use crate::value::{Bindings, Value};

/// Parses and evaluates `text` in one go, without a resolver.
pub fn evaluate(text: &str, bindings: &Bindings) -> ExpressionResult<Value> {
    Expression::new(text).evaluate_with(bindings)
}
