//! Tokenizer and parse-tree builder.
//!
//! The tokenizer works on flat text: quoted literals and parenthesized groups have already been
//! replaced by sentinels (see [`extract`](crate::extract)). For each piece of text it tries the
//! operator classes loosest first:
//!
//! ```text
//! logical        &&  ||
//! comparison     =  !=  <>  >=  <=  ~=  *=  =*  >  <
//! additive       +  -
//! multiplicative *  /
//! ```
//!
//! The first class with an operator at the top level of the text splits it into
//! `left <op> right`, and both sides are tokenized recursively. Within a class the split happens
//! at the *last* occurrence, which makes chains left-associative: `10 - 4 - 3` is
//! `(10 - 4) - 3`. A comparison level may hold a single comparison only. Text without any
//! operator is an atom.
//!
//! Every piece of text is memoized, so evaluating the same expression shape many times (or
//! repeating a sub-clause) only parses it once.

use std::collections::HashMap;
use std::sync::Arc;

use log::trace;
use nom::bytes::complete::{take_while, take_while1};
use nom::combinator::{all_consuming, recognize};
use nom::{IResult, Parser};

use crate::ast::{OperatorClass, OperatorKind, Token};
use crate::error::{MalformedExpression, MalformedKind};
use crate::extract::{self, PlaceholderKind, Placeholders};
use crate::value::{Value, parse_number};

/// Counters describing the work a [`Tokenizer`] has done since it was created or reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizerStats {
    /// Number of full source parses (quote extraction through tree building).
    pub parses: usize,
    /// Sub-expressions answered from the cache.
    pub cache_hits: usize,
    /// Sub-expressions that had to be built.
    pub cache_misses: usize,
}

/// Builds parse trees, owning the placeholder tables and the memoization cache for one
/// expression.
#[derive(Debug, Default)]
pub struct Tokenizer {
    placeholders: Placeholders,
    cache: HashMap<String, Arc<Token>>,
    stats: TokenizerStats,
}

/// An operator found by the scanner, as a byte range into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OperatorMatch {
    start: usize,
    end: usize,
    kind: OperatorKind,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a complete source expression.
    ///
    /// Quoted literals are extracted from the raw source first so their contents keep their
    /// exact whitespace; the remaining text is then whitespace-normalized and checked for
    /// balanced parentheses before any tree is built.
    pub fn parse(&mut self, source: &str) -> Result<Arc<Token>, MalformedExpression> {
        self.stats.parses += 1;
        extract::check_reserved(source)?;
        let unquoted = extract::extract_quotes(source, &mut self.placeholders)?;
        let normalized = extract::normalize_whitespace(&unquoted);
        extract::check_balance(&normalized, &self.placeholders)?;
        self.tokenize(&normalized)
    }

    /// Tokenizes a fragment of working text, consulting and filling the cache.
    pub fn tokenize(&mut self, text: &str) -> Result<Arc<Token>, MalformedExpression> {
        let text = text.trim();
        if let Some(token) = self.cache.get(text) {
            trace!("tokenizer cache hit for `{}`", self.placeholders.restore(text));
            self.stats.cache_hits += 1;
            return Ok(Arc::clone(token));
        }

        self.stats.cache_misses += 1;
        let token = self.build(text)?;
        self.cache.insert(text.to_string(), Arc::clone(&token));
        Ok(token)
    }

    /// Returns the placeholder tables filled so far.
    pub fn placeholders(&self) -> &Placeholders {
        &self.placeholders
    }

    /// Number of memoized sub-expressions.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> TokenizerStats {
        self.stats
    }

    /// Forgets the cache, the placeholder tables and the counters.
    pub fn reset(&mut self) {
        self.placeholders.clear();
        self.cache.clear();
        self.stats = TokenizerStats::default();
    }

    fn build(&mut self, text: &str) -> Result<Arc<Token>, MalformedExpression> {
        if text.is_empty() {
            return Err(MalformedExpression::new(MalformedKind::Empty, text));
        }

        let flat = if text.contains(['(', ')']) {
            extract::extract_parens(text, &mut self.placeholders)?
        } else {
            text.to_string()
        };

        match Placeholders::parse_sentinel(&flat) {
            Some((PlaceholderKind::Quote, index)) => {
                let literal = self.quote_text(index, &flat)?;
                return Ok(Arc::new(Token::Literal(Value::String(literal))));
            }
            Some((PlaceholderKind::Paren, index)) => {
                let inner = self.paren_text(index, &flat)?;
                if inner.trim().is_empty() {
                    return Err(MalformedExpression::new(MalformedKind::Empty, "()"));
                }
                return self.tokenize(&inner);
            }
            None => {}
        }

        for class in OperatorClass::ALL {
            if let Some(op) = self.find_split(&flat, class)? {
                let left = flat[..op.start].trim();
                let right = flat[op.end..].trim();
                if left.is_empty() || right.is_empty() {
                    return Err(self.malformed(MalformedKind::MissingOperand, &flat));
                }

                let left = self.tokenize(left)?;
                let right = self.tokenize(right)?;
                return Ok(Arc::new(Token::BinaryOp {
                    left,
                    operator: op.kind,
                    right,
                }));
            }
        }

        parse_atom(&flat)
            .map(Arc::new)
            .ok_or_else(|| self.malformed(MalformedKind::InvalidAtom, &flat))
    }

    /// Picks the operator of `class` to split `text` on, if any.
    fn find_split(
        &self,
        text: &str,
        class: OperatorClass,
    ) -> Result<Option<OperatorMatch>, MalformedExpression> {
        let mut candidates = scan_operators(text)
            .into_iter()
            .filter(|op| op.kind.class() == class);

        let last = candidates.next_back();
        if class == OperatorClass::Comparison && candidates.next().is_some() {
            return Err(self.malformed(MalformedKind::ChainedComparison, text));
        }
        Ok(last)
    }

    fn quote_text(&self, index: usize, sentinel: &str) -> Result<String, MalformedExpression> {
        self.placeholders
            .quote(index)
            .map(|literal| literal.text.clone())
            .ok_or_else(|| MalformedExpression::new(MalformedKind::InvalidAtom, sentinel))
    }

    fn paren_text(&self, index: usize, sentinel: &str) -> Result<String, MalformedExpression> {
        self.placeholders
            .paren(index)
            .map(str::to_string)
            .ok_or_else(|| MalformedExpression::new(MalformedKind::InvalidAtom, sentinel))
    }

    fn malformed(&self, kind: MalformedKind, text: &str) -> MalformedExpression {
        MalformedExpression::new(kind, self.placeholders.restore(text))
    }
}

/// Finds every binary operator in flat text, left to right.
///
/// At each position the longest spelling wins, so `>=` is never read as `>` followed by `=`
/// and `*=` is never a multiplication. A `+` or `-` in operand position (at the start, or right
/// after another operator) is the sign of a number, as is one that follows the `e` of an
/// exponent.
fn scan_operators(text: &str) -> Vec<OperatorMatch> {
    let mut found = Vec::new();
    let mut expect_operand = true;
    let mut atom_start = 0usize;
    let mut idx = 0usize;

    while let Some(ch) = text[idx..].chars().next() {
        if ch.is_whitespace() {
            idx += ch.len_utf8();
            continue;
        }

        if matches!(ch, '+' | '-') {
            if expect_operand {
                atom_start = idx;
                expect_operand = false;
                idx += 1;
                continue;
            }
            if is_exponent_prefix(&text[atom_start..idx]) {
                idx += 1;
                continue;
            }
        }

        let rest = &text[idx..];
        if let Some((spelling, kind)) = OperatorKind::SPELLINGS
            .iter()
            .find(|(spelling, _)| rest.starts_with(spelling))
        {
            found.push(OperatorMatch {
                start: idx,
                end: idx + spelling.len(),
                kind: *kind,
            });
            idx += spelling.len();
            expect_operand = true;
            continue;
        }

        if expect_operand {
            atom_start = idx;
            expect_operand = false;
        }
        idx += ch.len_utf8();
    }

    found
}

/// True if `atom` is a number mantissa followed by an exponent marker, e.g. `1.5e`.
fn is_exponent_prefix(atom: &str) -> bool {
    atom.strip_suffix(['e', 'E'])
        .is_some_and(|mantissa| parse_number(mantissa).is_some())
}

/// Parses an irreducible fragment: a number, `true`, `false`, `null` or an identifier.
fn parse_atom(text: &str) -> Option<Token> {
    if let Some(number) = parse_number(text) {
        return Some(Token::Literal(Value::Number(number)));
    }

    match text {
        "true" => return Some(Token::Literal(Value::Boolean(true))),
        "false" => return Some(Token::Literal(Value::Boolean(false))),
        "null" => return Some(Token::Literal(Value::Null)),
        _ => {}
    }

    let (_, name) = all_consuming(identifier).parse(text).ok()?;
    Some(Token::Variable(name.to_string()))
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize((take_while1(is_ident_start), take_while(is_ident_continue))).parse(input)
}

fn is_ident_start(ch: char) -> bool {
    ch == '_' || ch.is_ascii_alphabetic()
}

fn is_ident_continue(ch: char) -> bool {
    ch == '_' || ch == '.' || ch.is_ascii_alphanumeric()
}
