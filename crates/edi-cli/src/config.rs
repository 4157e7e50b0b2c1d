//! `edi.toml` configuration.
//!
//! Every section is optional; missing keys take their defaults. Command-line
//! flags override file values.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use edi_ingest::{CommandDecryptor, PlainText};
use edi_model::{DEFAULT_LINE_WIDTH, Decryptor, FieldHeuristics};
use edi_synth::SynthesisOptions;
use edi_transform::TransformOptions;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "edi.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub layout: LayoutConfig,
    pub stores: StoreConfig,
    pub heuristics: FieldHeuristics,
    pub transform: TransformOptions,
    pub synthesis: SynthesisOptions,
    pub decrypt: Option<DecryptConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Line width of layouts imported from CSV field tables.
    pub default_line_width: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            default_line_width: DEFAULT_LINE_WIDTH,
        }
    }
}

/// Directories backing the layout, mapping and learned-model stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub layouts: Option<PathBuf>,
    pub mappings: Option<PathBuf>,
    pub learned: Option<PathBuf>,
}

/// External decryption program. Ciphertext goes to stdin, plaintext comes back
/// on stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecryptConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Config {
    /// Load `explicit`, or `edi.toml` from the working directory when present.
    ///
    /// An explicit path that does not exist is an error; a missing default file
    /// is not.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    debug!("no configuration file, using defaults");
                    return Ok(Self::default());
                }
                default
            }
        };
        let content = fs::read_to_string(&path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("parse configuration {}", path.display()))?;
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// The configured decryptor, or a passthrough when none is set.
    pub fn decryptor(&self) -> Box<dyn Decryptor> {
        match &self.decrypt {
            Some(decrypt) => Box::new(CommandDecryptor::new(
                decrypt.program.clone(),
                decrypt.args.clone(),
            )),
            None => Box::new(PlainText),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edi_synth::{LineTerminator, OccurrencePolicy};

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml(
            r#"
[layout]
default_line_width = 240

[stores]
layouts = "layouts"

[heuristics]
monetary_tokens = ["valor"]
default_decimals = 4

[transform]
default_root = "CTe"

[synthesis]
seed = 42
occurrences = "maximum"
line_terminator = "crlf"

[decrypt]
program = "legacy-decrypt"
args = ["--stdin"]
"#,
        )
        .unwrap();
        assert_eq!(config.layout.default_line_width, 240);
        assert_eq!(config.stores.layouts, Some(PathBuf::from("layouts")));
        assert_eq!(config.heuristics.monetary_tokens, vec!["valor".to_string()]);
        assert_eq!(config.heuristics.default_decimals, 4);
        assert!(config.heuristics.monetary_prefix_rule);
        assert_eq!(config.transform.default_root, "CTe");
        assert_eq!(
            config.transform.default_namespace,
            TransformOptions::default().default_namespace
        );
        assert_eq!(config.synthesis.seed, 42);
        assert_eq!(config.synthesis.occurrences, OccurrencePolicy::Maximum);
        assert_eq!(config.synthesis.line_terminator, LineTerminator::Crlf);
        assert_eq!(config.decrypt.unwrap().args, vec!["--stdin".to_string()]);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(Config::from_toml("[retries]\nmax = 5\n").is_err());
    }

    #[test]
    fn explicit_missing_file_fails() {
        let result = Config::load(Some(Path::new("/nonexistent/edi.toml")));
        assert!(result.is_err());
    }
}
