//! Runtime value representation for expressions.
//!
//! Values are dynamically typed. All operator semantics that depend on operand types (loose
//! equality, ordering, arithmetic and the string tests) live here so the evaluator only has to
//! dispatch on the operator.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map;
use std::fmt::{self, Display};

use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{all_consuming, opt, recognize};
use nom::{IResult, Parser};
use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;

/// Result type used for value operations.
pub type ValueResult<T> = Result<T, EvaluationError>;

/// Runtime value produced by evaluating expressions or supplied through bindings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Number(number) => write!(f, "{number}"),
            Value::String(text) => write!(f, "{text}"),
            Value::List(items) => {
                let rendered: Vec<String> = items.iter().map(|item| item.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
        }
    }
}

impl Value {
    /// Returns a static type name used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
        }
    }

    /// Returns whether the value is treated as truthy.
    ///
    /// `null`, `false`, `0`, `NaN`, the empty string and the empty list are falsy. Everything
    /// else, including the strings `"0"` and `"false"`, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(value) => *value,
            Value::Number(number) => !number.is_nan() && *number != 0.0,
            Value::String(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
        }
    }

    /// Returns the numeric value of numbers and of strings holding a numeric literal.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number),
            Value::String(text) => parse_number(text.trim()),
            _ => None,
        }
    }

    /// Returns the text form used for lexical comparisons and string tests. `null` is the empty
    /// string; lists have no text form.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Value::Null => Some(Cow::Borrowed("")),
            Value::String(text) => Some(Cow::Borrowed(text)),
            Value::Boolean(_) | Value::Number(_) => Some(Cow::Owned(self.to_string())),
            Value::List(_) => None,
        }
    }

    /// Loose equality.
    ///
    /// | left    | right   | rule                                                        |
    /// |---------|---------|-------------------------------------------------------------|
    /// | null    | null    | equal                                                       |
    /// | null    | any     | equal iff the other side is falsy                           |
    /// | boolean | any     | equal iff the boolean matches the other side's truthiness   |
    /// | number  | number  | numeric equality                                            |
    /// | number  | string  | numeric equality if the trimmed string is numeric, else not |
    /// | string  | string  | exact, case-sensitive                                       |
    /// | list    | list    | same length and pairwise loose-equal                        |
    /// | list    | scalar  | never equal                                                 |
    ///
    /// The table is symmetric.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, value) | (value, Value::Null) => !value.is_truthy(),
            (Value::Boolean(flag), value) | (value, Value::Boolean(flag)) => {
                *flag == value.is_truthy()
            }
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Number(number), Value::String(text))
            | (Value::String(text), Value::Number(number)) => {
                parse_number(text.trim()).is_some_and(|parsed| parsed == *number)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(lhs, rhs)| lhs.loose_eq(rhs))
            }
            (Value::List(_), _) | (_, Value::List(_)) => false,
        }
    }

    /// Ordered comparison: numeric when both sides are numeric (numbers or numeric strings),
    /// lexical over the text form otherwise.
    pub fn compare(&self, other: &Value) -> ValueResult<Ordering> {
        let invalid = || EvaluationError::InvalidOperand {
            op: "compare",
            left: self.type_name(),
            right: other.type_name(),
        };

        if let (Some(lhs), Some(rhs)) = (self.as_number(), other.as_number()) {
            return lhs.partial_cmp(&rhs).ok_or_else(invalid);
        }

        match (self.as_text(), other.as_text()) {
            (Some(lhs), Some(rhs)) => Ok(lhs.cmp(&rhs)),
            _ => Err(invalid()),
        }
    }

    /// Adds two numeric values.
    pub fn add(&self, other: &Value) -> ValueResult<Value> {
        let (lhs, rhs) = self.numeric_pair(other, "add")?;
        Ok(Value::Number(lhs + rhs))
    }

    /// Subtracts one numeric value from another.
    pub fn sub(&self, other: &Value) -> ValueResult<Value> {
        let (lhs, rhs) = self.numeric_pair(other, "sub")?;
        Ok(Value::Number(lhs - rhs))
    }

    /// Multiplies two numeric values.
    pub fn mul(&self, other: &Value) -> ValueResult<Value> {
        let (lhs, rhs) = self.numeric_pair(other, "mul")?;
        Ok(Value::Number(lhs * rhs))
    }

    /// Divides one numeric value by another. Dividing by zero is an error rather than an
    /// infinity.
    pub fn div(&self, other: &Value) -> ValueResult<Value> {
        let (lhs, rhs) = self.numeric_pair(other, "div")?;
        if rhs == 0.0 {
            return Err(EvaluationError::DivisionByZero);
        }
        Ok(Value::Number(lhs / rhs))
    }

    /// `~=`: list membership when `self` is a list, case-insensitive substring search otherwise.
    pub fn contains(&self, needle: &Value) -> ValueResult<bool> {
        if let Value::List(items) = self {
            let needle = match needle {
                Value::String(text) => Value::String(strip_quotes(text).to_string()),
                Value::List(_) => return Err(self.invalid_operand("contains", needle)),
                other => other.clone(),
            };
            return Ok(items.iter().any(|item| item.loose_eq(&needle)));
        }

        let (haystack, needle) = self.text_pair(needle, "contains")?;
        Ok(haystack.to_lowercase().contains(&needle.to_lowercase()))
    }

    /// `*=`: case-insensitive prefix test.
    pub fn starts_with(&self, prefix: &Value) -> ValueResult<bool> {
        let (text, prefix) = self.text_pair(prefix, "startsWith")?;
        Ok(text.to_lowercase().starts_with(&prefix.to_lowercase()))
    }

    /// `=*`: case-sensitive suffix test.
    pub fn ends_with(&self, suffix: &Value) -> ValueResult<bool> {
        let (text, suffix) = self.text_pair(suffix, "endsWith")?;
        Ok(text.ends_with(suffix.as_ref()))
    }

    fn numeric_pair(&self, other: &Value, op: &'static str) -> ValueResult<(f64, f64)> {
        match (self.as_number(), other.as_number()) {
            (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
            _ => Err(self.invalid_operand(op, other)),
        }
    }

    fn text_pair<'a>(
        &'a self,
        other: &'a Value,
        op: &'static str,
    ) -> ValueResult<(Cow<'a, str>, Cow<'a, str>)> {
        match (self.as_text(), other.as_text()) {
            (Some(lhs), Some(rhs)) => Ok((lhs, rhs)),
            _ => Err(self.invalid_operand(op, other)),
        }
    }

    fn invalid_operand(&self, op: &'static str, other: &Value) -> EvaluationError {
        EvaluationError::InvalidOperand {
            op,
            left: self.type_name(),
            right: other.type_name(),
        }
    }
}

/// Parses a complete numeric literal: `[+-]digits[.digits][(e|E)[+-]digits]`.
///
/// Unlike [`str::parse::<f64>`] this rejects `inf`, `NaN` and friends, which are identifiers in
/// the expression grammar.
pub fn parse_number(text: &str) -> Option<f64> {
    let (_, literal) = all_consuming(number_literal).parse(text).ok()?;
    literal.parse().ok()
}

/// Recognises a numeric literal at the start of `input`.
pub(crate) fn number_literal(input: &str) -> IResult<&str, &str> {
    recognize((
        opt(one_of("+-")),
        digit1,
        opt((char('.'), digit1)),
        opt((one_of("eE"), opt(one_of("+-")), digit1)),
    ))
    .parse(input)
}

/// Strips one pair of matching surrounding quote characters.
fn strip_quotes(text: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = text
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    text
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

/// Numbers are `f64`, so integers beyond ±2^53 are rounded to the nearest representable value.
impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(value: Vec<T>) -> Self {
        Value::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Variable bindings visible to one evaluation. Names are case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings {
    values: HashMap<String, Value>,
}

impl Bindings {
    /// Creates an empty set of bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `value`, replacing any previous binding.
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(name.into(), value.into());
    }

    /// Returns the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Removes the binding for `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Removes every binding.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.values.iter()
    }
}

impl From<HashMap<String, Value>> for Bindings {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut bindings = Bindings::new();
        bindings.extend(iter);
        bindings
    }
}

impl<K: Into<String>, V: Into<Value>> Extend<(K, V)> for Bindings {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.bind(name, value);
        }
    }
}

impl<'a> IntoIterator for &'a Bindings {
    type Item = (&'a String, &'a Value);
    type IntoIter = hash_map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
