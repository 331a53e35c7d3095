//! Fallback lookup for variables that are not bound.

use crate::value::{Bindings, Value};

/// Supplies values for variables that are absent from the bindings of an evaluation.
///
/// Returning `None` means "undefined" and fails the evaluation. Closures of the form
/// `Fn(&str) -> Option<Value>` implement this trait, as does a [`Bindings`] table of fallbacks.
pub trait VariableResolver {
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// A resolver that knows nothing. Used when no resolver is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResolver;

impl VariableResolver for NoResolver {
    fn resolve(&self, _name: &str) -> Option<Value> {
        None
    }
}

impl<F> VariableResolver for F
where
    F: Fn(&str) -> Option<Value>,
{
    fn resolve(&self, name: &str) -> Option<Value> {
        self(name)
    }
}

impl VariableResolver for Bindings {
    fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}
