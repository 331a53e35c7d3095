use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

/// The path that means "read from stdin".
pub const STDIN_PATH: &str = "-";

/// Serialization formats accepted for input documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    /// YAML is also the fallback for unknown extensions and stdin, since it accepts JSON too.
    Yaml,
}

impl InputFormat {
    /// Picks the format from a file extension. Only `.json` selects JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => InputFormat::Yaml,
        }
    }
}

/// Read and deserialize a document from `path`, or from stdin if the path is `-`.
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if path == Path::new(STDIN_PATH) {
        let mut contents = String::new();
        std::io::stdin()
            .read_to_string(&mut contents)
            .context("reading document from stdin")?;
        return parse_document(&contents, InputFormat::Yaml).context("parsing stdin");
    }

    let format = InputFormat::from_path(path);
    log::debug!("reading {} as {:?}", path.display(), format);
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_document(&contents, format).with_context(|| format!("parsing {}", path.display()))
}

/// Deserialize a document held in memory.
pub fn parse_document<T: DeserializeOwned>(contents: &str, format: InputFormat) -> Result<T> {
    match format {
        InputFormat::Json => serde_json::from_str(contents).context("invalid JSON document"),
        InputFormat::Yaml => serde_norway::from_str(contents).context("invalid YAML document"),
    }
}
