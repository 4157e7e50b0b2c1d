//! EDI generator CLI.

use clap::{ColorChoice, Parser};
use edi_cli::config::Config;
use edi_cli::logging::{LogConfig, LogFormat, init_logging};
use edi_cli::pipeline::Session;
use std::io::{self, IsTerminal};
use tracing::level_filters::LevelFilter;

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{
    Outcome, run_clean_xsl, run_compare, run_layouts, run_map, run_parse, run_synth,
    run_validate, run_xsl,
};

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: Cli) -> Outcome {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.layouts {
        config.stores.layouts = Some(dir);
    }
    let mut session = Session::new(config);
    match &cli.command {
        Command::Map(args) => run_map(&session, args),
        Command::Xsl(args) => run_xsl(&session, args),
        Command::CleanXsl(args) => run_clean_xsl(args),
        Command::Validate(args) => run_validate(&session, args),
        Command::Parse(args) => run_parse(&session, args),
        Command::Synth(args) => run_synth(&mut session, args),
        Command::Compare(args) => run_compare(&session, args),
        Command::Layouts(args) => run_layouts(&session, args),
    }
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
