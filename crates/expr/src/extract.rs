//! Placeholder extraction for quoted literals and parenthesized groups.
//!
//! Before operators are searched for, every quoted string literal and every top level
//! parenthesized group is cut out of the working text and replaced by a sentinel. The operator
//! scanner can then work on flat text without being confused by operator characters inside
//! strings or by nesting.
//!
//! Sentinels are delimited by [`MARKER`], a private-use character that cannot be part of an
//! identifier, number or operator. Source text containing it is rejected up front.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, tag};
use nom::character::complete::{anychar, char, none_of};
use nom::combinator::{opt, recognize, value};
use nom::sequence::terminated;
use nom::{IResult, Parser};

use crate::error::{MalformedExpression, MalformedKind};

/// Delimits sentinels in the working text.
pub const MARKER: char = '\u{E000}';

const QUOTE_TAG: &str = "QUOTE_";
const PAREN_TAG: &str = "PAREN_";

/// The kind of fragment a sentinel stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Quote,
    Paren,
}

/// A quoted literal cut out of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotedLiteral {
    /// The delimiter used in the source, `'` or `"`.
    pub quote: char,
    /// The literal contents with escape sequences resolved.
    pub text: String,
}

/// Tables of extracted fragments, indexed by the number embedded in their sentinel.
#[derive(Debug, Clone, Default)]
pub struct Placeholders {
    quotes: Vec<QuotedLiteral>,
    parens: Vec<String>,
}

impl Placeholders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the extracted quoted literal with the given index.
    pub fn quote(&self, index: usize) -> Option<&QuotedLiteral> {
        self.quotes.get(index)
    }

    /// Returns the contents (without the outer parentheses) of the group with the given index.
    pub fn paren(&self, index: usize) -> Option<&str> {
        self.parens.get(index).map(String::as_str)
    }

    pub fn quote_count(&self) -> usize {
        self.quotes.len()
    }

    pub fn paren_count(&self) -> usize {
        self.parens.len()
    }

    /// Forgets every extracted fragment.
    pub fn clear(&mut self) {
        self.quotes.clear();
        self.parens.clear();
    }

    /// Formats the sentinel for the given table entry.
    pub fn sentinel(kind: PlaceholderKind, index: usize) -> String {
        let tag = match kind {
            PlaceholderKind::Quote => QUOTE_TAG,
            PlaceholderKind::Paren => PAREN_TAG,
        };
        format!("{MARKER}{tag}{index}{MARKER}")
    }

    /// If `text` is exactly one sentinel, returns what it stands for.
    pub fn parse_sentinel(text: &str) -> Option<(PlaceholderKind, usize)> {
        let inner = text.strip_prefix(MARKER)?.strip_suffix(MARKER)?;
        let (kind, digits) = if let Some(digits) = inner.strip_prefix(QUOTE_TAG) {
            (PlaceholderKind::Quote, digits)
        } else if let Some(digits) = inner.strip_prefix(PAREN_TAG) {
            (PlaceholderKind::Paren, digits)
        } else {
            return None;
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some((kind, digits.parse().ok()?))
    }

    /// Expands every sentinel in `text` back into the source fragment it replaced. Used to
    /// build diagnostics.
    pub fn restore(&self, text: &str) -> String {
        let mut output = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(MARKER) {
            let after_start = &rest[start + MARKER.len_utf8()..];
            let Some(len) = after_start.find(MARKER) else {
                break;
            };
            let end = start + MARKER.len_utf8() + len + MARKER.len_utf8();
            output.push_str(&rest[..start]);

            match Self::parse_sentinel(&rest[start..end]) {
                Some((PlaceholderKind::Quote, index)) => match self.quote(index) {
                    Some(literal) => {
                        output.push(literal.quote);
                        output.push_str(&literal.text);
                        output.push(literal.quote);
                    }
                    None => output.push_str(&rest[start..end]),
                },
                Some((PlaceholderKind::Paren, index)) => match self.paren(index) {
                    Some(inner) => {
                        output.push('(');
                        output.push_str(&self.restore(inner));
                        output.push(')');
                    }
                    None => output.push_str(&rest[start..end]),
                },
                None => output.push_str(&rest[start..end]),
            }
            rest = &rest[end..];
        }

        output.push_str(rest);
        output
    }

    fn push_quote(&mut self, quote: char, text: String) -> String {
        self.quotes.push(QuotedLiteral { quote, text });
        Self::sentinel(PlaceholderKind::Quote, self.quotes.len() - 1)
    }

    fn push_paren(&mut self, inner: &str) -> String {
        self.parens.push(inner.to_string());
        Self::sentinel(PlaceholderKind::Paren, self.parens.len() - 1)
    }
}

/// Rejects source text that contains the sentinel marker.
pub fn check_reserved(source: &str) -> Result<(), MalformedExpression> {
    if source.contains(MARKER) {
        return Err(MalformedExpression::new(
            MalformedKind::ReservedCharacter,
            source,
        ));
    }
    Ok(())
}

/// Collapses every run of whitespace into a single space and trims both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Replaces every quoted literal in `text` with a sentinel.
///
/// The earliest quote character found opens the literal, and only the same character closes
/// it, so `"it's"` and `'say "hi"'` are both single literals. Inside a literal a backslash
/// escapes the next character: `\\`, `\'`, `\"`, `\n`, `\r` and `\t` are translated, any other
/// escaped character stands for itself.
pub fn extract_quotes(
    text: &str,
    table: &mut Placeholders,
) -> Result<String, MalformedExpression> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(['\'', '"']) {
        // Both delimiters are ASCII so the byte is the whole character.
        let quote = rest.as_bytes()[open] as char;
        output.push_str(&rest[..open]);

        let body = &rest[open + 1..];
        let Some((literal, consumed)) = scan_quoted(body, quote) else {
            return Err(MalformedExpression::new(
                MalformedKind::UnterminatedQuote,
                table.restore(&rest[open..]),
            ));
        };

        output.push_str(&table.push_quote(quote, literal));
        rest = &body[consumed..];
    }

    output.push_str(rest);
    Ok(output)
}

/// Reads a literal body up to and including the closing `quote`. Returns the unescaped
/// contents and the number of bytes consumed, or `None` if the closing quote is missing.
fn scan_quoted(body: &str, quote: char) -> Option<(String, usize)> {
    let mut parse = quoted_body(quote);
    let (rest, literal) = parse(body).ok()?;
    Some((literal, body.len() - rest.len()))
}

/// Parses the contents of a literal opened with `quote`, plus its closing quote.
///
/// Escapes:
/// - `\\` → backslash
/// - `\'` and `\"` → the quote character
/// - `\n` → newline
/// - `\r` → carriage return
/// - `\t` → tab
///
/// Any other escaped character stands for itself.
fn quoted_body(quote: char) -> impl FnMut(&str) -> IResult<&str, String> {
    // Backslash and the delimiter in use
    let forbidden_chars = match quote {
        '"' => r#"\""#,
        _ => r"\'",
    };

    move |input: &str| {
        terminated(
            opt(escaped_transform(
                none_of(forbidden_chars),
                '\\',
                alt((
                    value(r"\", tag(r"\")),
                    value("'", tag("'")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                    value("\r", tag("r")),
                    value("\t", tag("t")),
                    recognize(anychar),
                )),
            ))
            .map(Option::unwrap_or_default),
            char(quote),
        )
        .parse(input)
    }
}

/// Checks that `text` holds as many `(` as `)`.
pub fn check_balance(text: &str, table: &Placeholders) -> Result<(), MalformedExpression> {
    let opens = text.matches('(').count();
    let closes = text.matches(')').count();

    match opens.cmp(&closes) {
        std::cmp::Ordering::Equal => Ok(()),
        std::cmp::Ordering::Less => Err(MalformedExpression::new(
            MalformedKind::UnmatchedClosingParenthesis,
            table.restore(text),
        )),
        std::cmp::Ordering::Greater => Err(MalformedExpression::new(
            MalformedKind::UnmatchedOpeningParenthesis,
            table.restore(text),
        )),
    }
}

/// Replaces every top level parenthesized group in `text` with a sentinel. Nested groups stay
/// inside the stored contents and are extracted when that group is tokenized.
pub fn extract_parens(
    text: &str,
    table: &mut Placeholders,
) -> Result<String, MalformedExpression> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('(') {
        if rest[..open].contains(')') {
            return Err(MalformedExpression::new(
                MalformedKind::UnmatchedClosingParenthesis,
                table.restore(text),
            ));
        }

        let Some(close) = matching_close(&rest[open + 1..]) else {
            return Err(MalformedExpression::new(
                MalformedKind::UnmatchedOpeningParenthesis,
                table.restore(&rest[open..]),
            ));
        };

        output.push_str(&rest[..open]);
        let inner = &rest[open + 1..open + 1 + close];
        output.push_str(&table.push_paren(inner));
        rest = &rest[open + 1 + close + 1..];
    }

    if rest.contains(')') {
        return Err(MalformedExpression::new(
            MalformedKind::UnmatchedClosingParenthesis,
            table.restore(text),
        ));
    }

    output.push_str(rest);
    Ok(output)
}

/// Finds the byte offset of the `)` closing a group whose `(` immediately precedes `text`.
fn matching_close(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(idx),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}
