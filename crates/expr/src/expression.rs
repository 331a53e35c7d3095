//! The embedding API: an expression together with its bindings and resolver.

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::ast::Token;
use crate::error::{ExpressionResult, MalformedExpression};
use crate::eval;
use crate::resolver::{NoResolver, VariableResolver};
use crate::tokenizer::{Tokenizer, TokenizerStats};
use crate::value::{Bindings, Value};

/// A parsed-on-demand expression.
///
/// Parsing happens lazily on the first call to [`evaluate`](Self::evaluate) or
/// [`tree`](Self::tree), and its outcome is kept: later evaluations reuse the tree, and a
/// malformed expression fails with the same error every time until [`set_text`](Self::set_text)
/// replaces the source.
///
/// ```
/// use sift_expr::{Expression, Value};
///
/// let mut expr = Expression::new("price * quantity > 100 && name ~= 'widget'");
/// expr.bind("price", 25);
/// expr.bind("quantity", 5);
/// expr.bind("name", "Blue Widget");
/// assert_eq!(expr.evaluate().unwrap(), Value::Boolean(true));
/// ```
pub struct Expression {
    source: String,
    tokenizer: Tokenizer,
    parsed: Option<Result<Arc<Token>, MalformedExpression>>,
    bindings: Bindings,
    resolver: Option<Box<dyn VariableResolver>>,
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("parsed", &self.parsed)
            .field("bindings", &self.bindings)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl Expression {
    /// Creates an expression from source text. Nothing is parsed yet.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: text.into(),
            tokenizer: Tokenizer::new(),
            parsed: None,
            bindings: Bindings::new(),
            resolver: None,
        }
    }

    /// Returns the source text.
    pub fn text(&self) -> &str {
        &self.source
    }

    /// Replaces the source text. The parsed tree, placeholder tables, tokenizer cache and
    /// bindings are all discarded; the resolver is kept.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.source = text.into();
        self.tokenizer.reset();
        self.parsed = None;
        self.bindings.clear();
    }

    /// Binds a single variable, replacing any previous value.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.bindings.bind(name, value);
    }

    /// Merges a set of bindings into the current ones.
    pub fn bind_all<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.bindings.extend(values);
    }

    /// Removes every binding. The parsed tree is kept.
    pub fn clear_bindings(&mut self) {
        self.bindings.clear();
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Installs the resolver consulted for variables missing from the bindings.
    pub fn set_resolver(&mut self, resolver: impl VariableResolver + 'static) {
        self.resolver = Some(Box::new(resolver));
    }

    /// Removes the resolver; unbound variables become errors again.
    pub fn clear_resolver(&mut self) {
        self.resolver = None;
    }

    /// Returns true once a parse has been attempted for the current text.
    pub fn is_parsed(&self) -> bool {
        self.parsed.is_some()
    }

    /// Returns the parse tree, parsing the source first if needed.
    ///
    /// The tree is immutable and may be shared with other threads for use with
    /// [`eval::evaluate`].
    pub fn tree(&mut self) -> Result<Arc<Token>, MalformedExpression> {
        let Self {
            source,
            tokenizer,
            parsed,
            ..
        } = self;

        parsed
            .get_or_insert_with(|| {
                let result = tokenizer.parse(source);
                match &result {
                    Ok(tree) => debug!("parsed expression `{source}` as {tree}"),
                    Err(err) => debug!("failed to parse expression `{source}`: {err}"),
                }
                result
            })
            .clone()
    }

    /// Evaluates the expression against the current bindings and resolver.
    pub fn evaluate(&mut self) -> ExpressionResult<Value> {
        let tree = self.tree()?;
        let resolver = self.resolver();
        Ok(eval::evaluate(&tree, &self.bindings, resolver)?)
    }

    /// Evaluates the expression against `bindings` instead of the held ones, still using the
    /// configured resolver. Useful when the same expression runs once per row of a dataset.
    pub fn evaluate_with(&mut self, bindings: &Bindings) -> ExpressionResult<Value> {
        let tree = self.tree()?;
        Ok(eval::evaluate(&tree, bindings, self.resolver())?)
    }

    /// Work counters of the underlying tokenizer since the text was last set.
    pub fn stats(&self) -> TokenizerStats {
        self.tokenizer.stats()
    }

    fn resolver(&self) -> &dyn VariableResolver {
        match &self.resolver {
            Some(resolver) => resolver.as_ref(),
            None => &NoResolver,
        }
    }
}

impl From<&str> for Expression {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Expression {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
