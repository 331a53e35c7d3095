//! Composite filters built from several expressions.
//!
//! A filter document nests expressions under `and`, `or` and `not` lists:
//!
//! ```yaml
//! and:
//!   - "status = 'open'"
//!   - or:
//!       - "priority >= 3"
//!       - "tags ~= 'urgent'"
//! ```
//!
//! [`FilterNode`] is the deserialized document; [`PreparedFilter`] holds a parsed
//! [`Expression`] per leaf so that running the filter over many rows parses each leaf once.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ExpressionResult;
use crate::eval;
use crate::expression::Expression;
use crate::resolver::VariableResolver;
use crate::value::Bindings;

/// Recursive filter structure supporting logical groups and expressions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum FilterNode {
    And { and: Vec<FilterNode> },
    Or { or: Vec<FilterNode> },
    Not { not: Vec<FilterNode> },
    Expression(String),
}

/// A filter tree whose leaves have been parsed.
#[derive(Debug)]
pub enum PreparedFilter {
    /// Matches when every child matches. An empty list matches.
    And(Vec<PreparedFilter>),
    /// Matches when any child matches. An empty list does not match.
    Or(Vec<PreparedFilter>),
    /// Matches when no child matches. An empty list matches.
    Not(Vec<PreparedFilter>),
    /// Matches when the expression evaluates to a truthy value.
    Expr(Expression),
}

impl PreparedFilter {
    /// Parses every expression in `node`. A malformed leaf is reported together with its path
    /// in the document, e.g. `filter.and[1].or[0]`.
    pub fn from_node(node: &FilterNode) -> Result<Self> {
        convert_filter_node(node, "filter")
    }

    /// Evaluates the filter against one set of bindings.
    ///
    /// Every child is evaluated, so an evaluation error anywhere in the tree is reported even if
    /// an earlier child already decided the outcome.
    pub fn matches(
        &mut self,
        bindings: &Bindings,
        resolver: &dyn VariableResolver,
    ) -> ExpressionResult<bool> {
        match self {
            PreparedFilter::And(children) => {
                let results = evaluate_children(children, bindings, resolver)?;
                Ok(results.iter().all(|matched| *matched))
            }
            PreparedFilter::Or(children) => {
                let results = evaluate_children(children, bindings, resolver)?;
                Ok(results.iter().any(|matched| *matched))
            }
            PreparedFilter::Not(children) => {
                let results = evaluate_children(children, bindings, resolver)?;
                Ok(!results.iter().any(|matched| *matched))
            }
            PreparedFilter::Expr(expr) => {
                let tree = expr.tree()?;
                Ok(eval::evaluate(&tree, bindings, resolver)?.is_truthy())
            }
        }
    }
}

impl TryFrom<&FilterNode> for PreparedFilter {
    type Error = anyhow::Error;

    fn try_from(node: &FilterNode) -> Result<Self> {
        Self::from_node(node)
    }
}

fn evaluate_children(
    children: &mut [PreparedFilter],
    bindings: &Bindings,
    resolver: &dyn VariableResolver,
) -> ExpressionResult<Vec<bool>> {
    children
        .iter_mut()
        .map(|child| child.matches(bindings, resolver))
        .collect()
}

fn convert_filter_node(node: &FilterNode, context: &str) -> Result<PreparedFilter> {
    match node {
        FilterNode::And { and } => Ok(PreparedFilter::And(convert_children(
            and,
            &format!("{context}.and"),
        )?)),
        FilterNode::Or { or } => Ok(PreparedFilter::Or(convert_children(
            or,
            &format!("{context}.or"),
        )?)),
        FilterNode::Not { not } => Ok(PreparedFilter::Not(convert_children(
            not,
            &format!("{context}.not"),
        )?)),
        FilterNode::Expression(text) => {
            let mut expr = Expression::new(text.as_str());
            expr.tree()
                .with_context(|| format!("Failed to parse filter expression at {context}"))?;
            Ok(PreparedFilter::Expr(expr))
        }
    }
}

fn convert_children(children: &[FilterNode], context: &str) -> Result<Vec<PreparedFilter>> {
    children
        .iter()
        .enumerate()
        .map(|(idx, child)| convert_filter_node(child, &format!("{context}[{idx}]")))
        .collect()
}
