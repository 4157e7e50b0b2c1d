//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "edi",
    version,
    about = "Fixed-width EDI map, transform and test-record generator",
    long_about = "Generate fixed-width EDI map artifacts and XSL transforms from layout \
                  definitions, validate and parse positional records, and synthesize \
                  valid test records."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (default: ./edi.toml when present).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Directory of layout JSON files (overrides [stores] layouts).
    #[arg(long = "layouts", value_name = "DIR", global = true)]
    pub layouts: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Log raw record content at trace level.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate the TCL map artifact for one or more layouts.
    Map(MapArgs),

    /// Generate the XSL transform for a layout's mapping.
    Xsl(XslArgs),

    /// Remove vendor extensions from a stylesheet and repair xsi declarations.
    CleanXsl(CleanXslArgs),

    /// Validate a fixed-width record against a layout.
    Validate(RecordArgs),

    /// Parse a fixed-width record into intermediate XML.
    Parse(ParseArgs),

    /// Synthesize valid test records for a layout.
    Synth(SynthArgs),

    /// Compare a layout's generated map with a learned model.
    Compare(CompareArgs),

    /// List or search the layouts of the layout directory.
    Layouts(LayoutsArgs),
}

#[derive(Parser)]
pub struct MapArgs {
    /// Layout files (.json / .csv) or layout ids in the layout directory.
    #[arg(value_name = "LAYOUT", required = true)]
    pub layouts: Vec<String>,

    /// Learned model used to refine low-confidence fields.
    #[arg(long = "learned", value_name = "PATH")]
    pub learned: Option<PathBuf>,

    /// Write maps to this directory as <layout>.tcl instead of stdout.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct XslArgs {
    /// Input layout file or id.
    #[arg(value_name = "LAYOUT")]
    pub layout: String,

    /// Mapping file (default: looked up in the mapping directory).
    #[arg(long = "mapping", value_name = "PATH")]
    pub mapping: Option<PathBuf>,

    /// Example output document fixing the root element, namespace and batch wrapper.
    #[arg(long = "example", value_name = "PATH")]
    pub example: Option<PathBuf>,

    /// Learned model contributing lookup candidates.
    #[arg(long = "learned", value_name = "PATH")]
    pub learned: Option<PathBuf>,

    /// Write the stylesheet here instead of stdout.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CleanXslArgs {
    /// Stylesheet to clean.
    #[arg(value_name = "XSL")]
    pub input: PathBuf,

    /// Write the result here instead of stdout.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct RecordArgs {
    /// Layout file or id.
    #[arg(value_name = "LAYOUT")]
    pub layout: String,

    /// Record file.
    #[arg(value_name = "RECORD")]
    pub record: PathBuf,
}

#[derive(Parser)]
pub struct ParseArgs {
    #[command(flatten)]
    pub record: RecordArgs,

    /// Run the record through the configured decryptor first.
    #[arg(long = "decrypt")]
    pub decrypt: bool,

    /// Write the intermediate XML here instead of stdout.
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Parser)]
pub struct SynthArgs {
    /// Layout file or id.
    #[arg(value_name = "LAYOUT")]
    pub layout: String,

    /// Number of records.
    #[arg(long = "count", short = 'n', default_value_t = 1)]
    pub count: usize,

    /// Base seed (overrides [synthesis] seed).
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Candidate provider.
    #[arg(long = "provider", value_enum, default_value = "random")]
    pub provider: ProviderArg,

    /// Occurrences per line (overrides [synthesis] occurrences).
    #[arg(long = "occurrences", value_enum)]
    pub occurrences: Option<OccurrencesArg>,

    /// Worker threads, 0 for one per core (overrides [synthesis] workers).
    #[arg(long = "workers")]
    pub workers: Option<usize>,

    /// Write records to this directory as <layout>_<nnnn>.txt instead of stdout.
    #[arg(long = "output-dir", value_name = "DIR")]
    pub output_dir: Option<PathBuf>,
}

#[derive(Parser)]
pub struct CompareArgs {
    /// Layout file or id.
    #[arg(value_name = "LAYOUT")]
    pub layout: String,

    /// Learned model (default: looked up in the learned-model directory).
    #[arg(long = "learned", value_name = "PATH")]
    pub learned: Option<PathBuf>,

    /// Minimum similarity reported as a match.
    #[arg(long = "threshold")]
    pub threshold: Option<f64>,
}

#[derive(Parser)]
pub struct LayoutsArgs {
    /// Case-insensitive id or name fragment; empty lists everything.
    #[arg(value_name = "TERM", default_value = "")]
    pub term: String,

    /// Maximum number of layouts listed.
    #[arg(long = "max", default_value_t = 50)]
    pub max: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ProviderArg {
    Deterministic,
    Random,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OccurrencesArg {
    Minimum,
    Maximum,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
