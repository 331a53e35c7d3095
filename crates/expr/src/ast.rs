//! Parse tree for expressions.

use std::fmt::{self, Write};
use std::sync::Arc;

use crate::value::Value;

/// A node of the parse tree.
///
/// Children are reference counted so that sub-trees held in the tokenizer cache can be shared
/// between several parents, and so a finished tree can be handed to other threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// A number, boolean, `null` or quoted string.
    Literal(Value),
    /// A name to look up in the bindings or the resolver.
    Variable(String),
    /// `left <operator> right`.
    BinaryOp {
        left: Arc<Token>,
        operator: OperatorKind,
        right: Arc<Token>,
    },
}

impl Token {
    /// Convenience constructor for a binary operation node.
    pub fn binary(
        left: impl Into<Arc<Token>>,
        operator: OperatorKind,
        right: impl Into<Arc<Token>>,
    ) -> Self {
        Token::BinaryOp {
            left: left.into(),
            operator,
            right: right.into(),
        }
    }

    /// Convenience constructor for a variable node.
    pub fn variable(name: impl Into<String>) -> Self {
        Token::Variable(name.into())
    }

    /// Convenience constructor for a literal node.
    pub fn literal(value: impl Into<Value>) -> Self {
        Token::Literal(value.into())
    }

    /// Returns the depth of the tree, counting a leaf as 1.
    pub fn depth(&self) -> usize {
        match self {
            Token::Literal(_) | Token::Variable(_) => 1,
            Token::BinaryOp { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Renders the canonical, fully parenthesized form of the tree. String literals are double
/// quoted unless they contain a double quote and no single quote. Backslashes, the delimiter
/// and control characters are escaped, so the rendered text parses back to the same tree.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Literal(Value::String(text)) => write_quoted(f, text),
            Token::Literal(value) => write!(f, "{value}"),
            Token::Variable(name) => write!(f, "{name}"),
            Token::BinaryOp {
                left,
                operator,
                right,
            } => write!(f, "({left} {operator} {right})"),
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let quote = if text.contains('"') && !text.contains('\'') {
        '\''
    } else {
        '"'
    };

    f.write_char(quote)?;
    for ch in text.chars() {
        match ch {
            '\\' => f.write_str(r"\\")?,
            '\n' => f.write_str(r"\n")?,
            '\r' => f.write_str(r"\r")?,
            '\t' => f.write_str(r"\t")?,
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

/// Groups of operators that share a precedence level, loosest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorClass {
    Logical,
    Comparison,
    Additive,
    Multiplicative,
}

impl OperatorClass {
    /// Every class in the order the tokenizer tries them.
    pub const ALL: [OperatorClass; 4] = [
        OperatorClass::Logical,
        OperatorClass::Comparison,
        OperatorClass::Additive,
        OperatorClass::Multiplicative,
    ];
}

/// Binary operator kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    // Logical
    And,
    Or,
    // Comparison
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    StartsWith,
    EndsWith,
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
}

impl OperatorKind {
    /// Every operator spelling, longest first so a scanner can match greedily. `<>` is an
    /// alternative spelling of `!=`.
    pub const SPELLINGS: [(&'static str, OperatorKind); 16] = [
        ("&&", OperatorKind::And),
        ("||", OperatorKind::Or),
        ("!=", OperatorKind::Neq),
        ("<>", OperatorKind::Neq),
        (">=", OperatorKind::Gte),
        ("<=", OperatorKind::Lte),
        ("~=", OperatorKind::Contains),
        ("*=", OperatorKind::StartsWith),
        ("=*", OperatorKind::EndsWith),
        ("=", OperatorKind::Eq),
        (">", OperatorKind::Gt),
        ("<", OperatorKind::Lt),
        ("+", OperatorKind::Add),
        ("-", OperatorKind::Sub),
        ("*", OperatorKind::Mul),
        ("/", OperatorKind::Div),
    ];

    /// The precedence class this operator belongs to.
    pub fn class(self) -> OperatorClass {
        match self {
            OperatorKind::And | OperatorKind::Or => OperatorClass::Logical,
            OperatorKind::Eq
            | OperatorKind::Neq
            | OperatorKind::Gt
            | OperatorKind::Gte
            | OperatorKind::Lt
            | OperatorKind::Lte
            | OperatorKind::Contains
            | OperatorKind::StartsWith
            | OperatorKind::EndsWith => OperatorClass::Comparison,
            OperatorKind::Add | OperatorKind::Sub => OperatorClass::Additive,
            OperatorKind::Mul | OperatorKind::Div => OperatorClass::Multiplicative,
        }
    }

    /// The canonical spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            OperatorKind::And => "&&",
            OperatorKind::Or => "||",
            OperatorKind::Eq => "=",
            OperatorKind::Neq => "!=",
            OperatorKind::Gt => ">",
            OperatorKind::Gte => ">=",
            OperatorKind::Lt => "<",
            OperatorKind::Lte => "<=",
            OperatorKind::Contains => "~=",
            OperatorKind::StartsWith => "*=",
            OperatorKind::EndsWith => "=*",
            OperatorKind::Add => "+",
            OperatorKind::Sub => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
