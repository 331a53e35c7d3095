//! Error types for expression parsing and evaluation.
//!
//! Both kinds are `Clone + PartialEq` so that a parse failure can be cached on the owning
//! [`Expression`](crate::Expression) and handed back unchanged on every later evaluation.

use thiserror::Error;

/// Result type used throughout the engine.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Top level error returned by [`Expression::evaluate`](crate::Expression::evaluate).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    /// The expression text could not be turned into a parse tree.
    #[error(transparent)]
    Malformed(#[from] MalformedExpression),
    /// The parse tree could not be evaluated against the current bindings.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl ExpressionError {
    /// Returns true if this error was raised while parsing.
    pub fn is_malformed(&self) -> bool {
        matches!(self, ExpressionError::Malformed(_))
    }

    /// Returns true if this error was raised while evaluating.
    pub fn is_evaluation(&self) -> bool {
        matches!(self, ExpressionError::Evaluation(_))
    }
}

/// The reason an expression failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedKind {
    /// An opening quote has no closing quote of the same kind.
    UnterminatedQuote,
    /// A `)` appears without a matching `(`.
    UnmatchedClosingParenthesis,
    /// A `(` appears without a matching `)`.
    UnmatchedOpeningParenthesis,
    /// More than one comparison operator at the same nesting level, e.g. `a < b < c`.
    ChainedComparison,
    /// An operator with nothing on one of its sides.
    MissingOperand,
    /// A fragment that is neither an operator expression nor a valid atom.
    InvalidAtom,
    /// Nothing to parse.
    Empty,
    /// The source contains the character reserved for internal placeholders.
    ReservedCharacter,
}

impl MalformedKind {
    fn describe(self) -> &'static str {
        match self {
            MalformedKind::UnterminatedQuote => "unterminated quote",
            MalformedKind::UnmatchedClosingParenthesis => {
                "closing parenthesis without matching opening"
            }
            MalformedKind::UnmatchedOpeningParenthesis => {
                "opening parenthesis without matching closing"
            }
            MalformedKind::ChainedComparison => "chained comparison",
            MalformedKind::MissingOperand => "missing operand",
            MalformedKind::InvalidAtom => "invalid atom",
            MalformedKind::Empty => "empty expression",
            MalformedKind::ReservedCharacter => "reserved character",
        }
    }
}

/// A parse failure. Always carries the offending fragment, with any internal placeholders
/// already expanded back to the source text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed expression: {} in `{fragment}`", .kind.describe())]
pub struct MalformedExpression {
    pub kind: MalformedKind,
    pub fragment: String,
}

impl MalformedExpression {
    /// Create a new parse error for the given fragment.
    pub fn new(kind: MalformedKind, fragment: impl Into<String>) -> Self {
        Self {
            kind,
            fragment: fragment.into(),
        }
    }
}

/// Errors raised while walking a parse tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvaluationError {
    /// The variable is not bound and the resolver does not know it either.
    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),
    /// The operator is not defined for the operand types.
    #[error("operation '{op}' is not supported for {left} and {right}")]
    InvalidOperand {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    /// The right side of a division evaluated to zero.
    #[error("division by zero")]
    DivisionByZero,
}
