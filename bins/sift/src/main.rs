use std::{collections::BTreeMap, fmt, io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use sift_core::{printer, reader};
use sift_expr::{Bindings, Expression, FilterNode, NoResolver, PreparedFilter, Value};

/// A command line tool for evaluating and filtering with sift expressions.
///
/// Expressions combine literals, variables, comparison operators (`=`, `!=`, `<`, `~=`, ...),
/// logical operators (`&&`, `||`), arithmetic and parentheses. Set `RUST_LOG=debug` to see
/// what the engine is doing.
#[derive(Debug, Parser)]
#[command(name = "sift", version)]
struct Cli {
    #[command(flatten)]
    printer: printer::PrinterArgs,

    #[command(flatten)]
    limits: Limits,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Evaluate an expression once and print the result.
    Eval {
        /// The expression to evaluate.
        #[arg(value_name = "EXPR")]
        expression: String,

        /// A YAML or JSON mapping of variable names to values. Use `-` for stdin.
        #[arg(short = 'b', long)]
        bindings: Option<PathBuf>,

        /// Bind a single variable, e.g. `--var count=3`. The value is read as a YAML scalar, so
        /// numbers, booleans and `null` keep their type. Overrides values from `--bindings`.
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_assignment)]
        vars: Vec<(String, Value)>,
    },
    /// Evaluate an expression or filter document against every row of a file and print the rows
    /// that match.
    Filter {
        /// The expression each row must satisfy.
        #[arg(value_name = "EXPR", required_unless_present = "filter_file")]
        expression: Option<String>,

        /// A YAML or JSON filter document with nested `and`, `or` and `not` lists of expressions.
        #[arg(short = 'f', long, conflicts_with = "expression")]
        filter_file: Option<PathBuf>,

        /// A YAML or JSON list of mappings. Use `-` for stdin.
        #[arg(short = 'r', long)]
        rows: PathBuf,

        /// What to do with rows that fail to evaluate.
        #[arg(long, value_enum, default_value_t = OnError::Skip)]
        on_error: OnError,
    },
    /// Print the fully parenthesized parse tree of an expression.
    Parse {
        #[arg(value_name = "EXPR")]
        expression: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OnError {
    /// Log a warning and treat the row as not matching.
    Skip,
    /// Stop at the first row that fails.
    Fail,
}

/// Limits applied to expression text before it reaches the engine.
#[derive(Debug, Clone, Copy, Args)]
struct Limits {
    /// Reject expressions longer than this many characters.
    #[arg(long, default_value_t = 4096, global = true)]
    max_length: usize,

    /// Reject expressions whose parentheses nest deeper than this.
    #[arg(long, default_value_t = 64, global = true)]
    max_depth: usize,
}

impl Limits {
    fn check(&self, text: &str) -> Result<()> {
        let length = text.chars().count();
        if length > self.max_length {
            anyhow::bail!(
                "expression is {length} characters long, the limit is {}",
                self.max_length
            );
        }
        let depth = nesting_depth(text);
        if depth > self.max_depth {
            anyhow::bail!(
                "expression nests parentheses {depth} deep, the limit is {}",
                self.max_depth
            );
        }
        Ok(())
    }

    fn check_filter(&self, node: &FilterNode) -> Result<()> {
        match node {
            FilterNode::And { and: children }
            | FilterNode::Or { or: children }
            | FilterNode::Not { not: children } => children
                .iter()
                .try_for_each(|child| self.check_filter(child)),
            FilterNode::Expression(text) => self
                .check(text)
                .with_context(|| format!("checking filter expression `{text}`")),
        }
    }
}

/// Deepest parenthesis nesting outside of quoted text.
fn nesting_depth(text: &str) -> usize {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut depth = 0usize;
    let mut deepest = 0usize;
    for c in text.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

fn parse_assignment(raw: &str) -> Result<(String, Value)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Invalid variable `{raw}`. Expected NAME=VALUE"))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid variable `{raw}`. The name is empty");
    }
    // Anything YAML can't type (or reads as a collection) is bound as the raw string.
    let value = match serde_norway::from_str::<Value>(value) {
        Ok(Value::List(_)) | Err(_) => Value::from(value),
        Ok(parsed) => parsed,
    };
    Ok((name.to_string(), value))
}

/// A matched row. Plain output renders it as `key=value` pairs in key order.
#[derive(Debug, Serialize)]
#[serde(transparent)]
struct RowOutput<'a>(&'a Bindings);

impl fmt::Display for RowOutput<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sorted: BTreeMap<&String, &Value> = self.0.iter().collect();
        let pairs: Vec<String> = sorted
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        write!(f, "{}", pairs.join(" "))
    }
}

#[derive(Debug, Serialize)]
struct ParseOutput {
    tree: String,
    depth: usize,
}

impl fmt::Display for ParseOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tree)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let printer = cli.printer.printer();
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Command::Eval {
            expression,
            bindings,
            vars,
        } => {
            cli.limits.check(&expression)?;
            let mut all: Bindings = match bindings {
                Some(path) => reader::read_document(&path)?,
                None => Bindings::new(),
            };
            all.extend(vars);

            let value = Expression::new(expression.as_str())
                .evaluate_with(&all)
                .with_context(|| format!("evaluating `{expression}`"))?;
            printer.print(&value, &mut stdout)?;
        }
        Command::Filter {
            expression,
            filter_file,
            rows,
            on_error,
        } => {
            let node = match (expression, filter_file) {
                (Some(text), _) => FilterNode::Expression(text),
                (None, Some(path)) => reader::read_document(&path)?,
                (None, None) => anyhow::bail!("either EXPR or --filter-file is required"),
            };
            cli.limits.check_filter(&node)?;
            let mut filter = PreparedFilter::from_node(&node)?;
            let rows: Vec<Bindings> = reader::read_document(&rows)?;
            log::debug!("filtering {} rows", rows.len());

            let matched = select_rows(&mut filter, &rows, on_error)?;
            printer.print_all(&matched, &mut stdout)?;
        }
        Command::Parse { expression } => {
            cli.limits.check(&expression)?;
            let tree = Expression::new(expression.as_str())
                .tree()
                .with_context(|| format!("parsing `{expression}`"))?;
            let output = ParseOutput {
                tree: tree.to_string(),
                depth: tree.depth(),
            };
            printer.print(&output, &mut stdout)?;
        }
    }

    stdout.flush()?;
    Ok(())
}

fn select_rows<'a>(
    filter: &mut PreparedFilter,
    rows: &'a [Bindings],
    on_error: OnError,
) -> Result<Vec<RowOutput<'a>>> {
    let mut matched = Vec::new();
    for (idx, row) in rows.iter().enumerate() {
        match filter.matches(row, &NoResolver) {
            Ok(true) => matched.push(RowOutput(row)),
            Ok(false) => {}
            Err(err) if on_error == OnError::Skip => {
                log::warn!("skipping row {idx}: {err}");
            }
            Err(err) => return Err(err).with_context(|| format!("evaluating row {idx}")),
        }
    }
    Ok(matched)
}
