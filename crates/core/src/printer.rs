use std::{fmt::Display, io::Write};

use anyhow::Context;
use clap::{Args, ValueEnum};
use serde::Serialize;

#[derive(Debug, Args)]
pub struct PrinterArgs {
    /// The output format to use.
    #[arg(long, short = 'o', value_enum, default_value_t = Format::default(), global = true)]
    pub output: Format,

    /// Indent JSON output. Ignored by the other formats.
    #[arg(long, global = true)]
    pub pretty: bool,
}

impl PrinterArgs {
    /// Build the printer described by these arguments.
    pub fn printer(&self) -> Printer {
        Printer {
            format: self.output,
            pretty: self.pretty,
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// One line per result, using its display form.
    #[default]
    Plain,
    Json,
    /// CBOR.
    #[value(alias = "cbor")]
    Binary,
}

/// Writes results in the configured [`Format`]. Plain output uses each item's [`Display`]
/// implementation, one item per line; the structured formats use [`Serialize`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Printer {
    pub format: Format,
    pub pretty: bool,
}

impl Printer {
    pub fn new(format: Format) -> Self {
        Self {
            format,
            pretty: false,
        }
    }

    /// Print a single item.
    pub fn print<T, W>(&self, item: &T, writer: &mut W) -> anyhow::Result<()>
    where
        T: Serialize + Display + ?Sized,
        W: Write,
    {
        match self.format {
            Format::Plain => {
                writeln!(writer, "{item}")?;
                Ok(())
            }
            _ => self.print_structured(item, writer),
        }
    }

    /// Print a sequence of items. Structured formats emit them as a single array.
    pub fn print_all<T, W>(&self, items: &[T], writer: &mut W) -> anyhow::Result<()>
    where
        T: Serialize + Display,
        W: Write,
    {
        match self.format {
            Format::Plain => {
                for item in items {
                    writeln!(writer, "{item}")?;
                }
                Ok(())
            }
            _ => self.print_structured(items, writer),
        }
    }

    fn print_structured<S, W>(&self, data: &S, writer: &mut W) -> anyhow::Result<()>
    where
        S: Serialize + ?Sized,
        W: Write,
    {
        match self.format {
            Format::Json if self.pretty => {
                serde_json::to_writer_pretty(&mut *writer, data)
                    .context("JSON serialization failed")?;
                writeln!(writer)?;
                Ok(())
            }
            Format::Json => {
                serde_json::to_writer(&mut *writer, data).context("JSON serialization failed")?;
                writeln!(writer)?;
                Ok(())
            }
            Format::Binary => {
                ciborium::into_writer(data, writer).context("CBOR serialization failed")
            }
            Format::Plain => {
                anyhow::bail!("Plain format not supported for structured output")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fmt;
    use std::io::Cursor;

    use serde_json::Value;

    #[derive(Debug, Clone, Serialize, serde::Deserialize, PartialEq)]
    struct Row {
        name: String,
    }

    impl fmt::Display for Row {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "name={}", self.name)
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row {
                name: "gamma".into(),
            },
            Row {
                name: "delta".into(),
            },
        ]
    }

    #[test]
    fn output_flag_accepts_formats_and_cbor_alias() {
        #[derive(Debug, clap::Parser)]
        struct Cli {
            #[command(flatten)]
            printer: PrinterArgs,
        }

        let parse = |args: &[&str]| {
            let argv = std::iter::once("test").chain(args.iter().copied());
            <Cli as clap::Parser>::try_parse_from(argv)
        };

        assert_eq!(parse(&[]).unwrap().printer.output, Format::Plain);
        assert_eq!(parse(&["-o", "json"]).unwrap().printer.output, Format::Json);
        assert_eq!(
            parse(&["--output", "cbor"]).unwrap().printer.output,
            Format::Binary
        );
        assert!(parse(&["--output", "yaml"]).is_err());
    }

    #[test]
    fn plain_prints_one_line_per_item() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Printer::new(Format::Plain).print_all(&rows(), &mut buffer)?;
        assert_eq!(String::from_utf8(buffer)?, "name=gamma\nname=delta\n");
        Ok(())
    }

    #[test]
    fn json_prints_items_as_an_array() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Printer::new(Format::Json).print_all(&rows(), &mut buffer)?;

        let value: Value = serde_json::from_slice(&buffer)?;
        assert_eq!(value[0]["name"], "gamma");
        assert_eq!(value[1]["name"], "delta");
        Ok(())
    }

    #[test]
    fn pretty_json_is_indented() -> anyhow::Result<()> {
        let printer = Printer {
            format: Format::Json,
            pretty: true,
        };
        let mut buffer = Vec::new();
        printer.print(&rows()[0], &mut buffer)?;
        assert_eq!(String::from_utf8(buffer)?, "{\n  \"name\": \"gamma\"\n}\n");
        Ok(())
    }

    #[test]
    fn binary_format_round_trip() -> anyhow::Result<()> {
        let mut buffer = Vec::new();
        Printer::new(Format::Binary).print_all(&rows(), &mut buffer)?;

        let mut cursor = Cursor::new(buffer);
        let decoded: Vec<Row> = ciborium::from_reader(&mut cursor)?;
        assert_eq!(decoded, rows());
        Ok(())
    }
}
