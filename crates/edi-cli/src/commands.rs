use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, info_span, warn};

use edi_cli::pipeline::{
    ProviderKind, Session, default_compare_threshold, read_input, record_path, write_output,
};
use edi_synth::OccurrencePolicy;
use edi_transform::clean_stylesheet;

use crate::cli::{
    CleanXslArgs, CompareArgs, LayoutsArgs, MapArgs, OccurrencesArg, ParseArgs, ProviderArg,
    RecordArgs, SynthArgs, XslArgs,
};
use crate::summary::{
    print_comparison, print_layouts, print_map_summary, print_synthesis_summary, print_validation,
};

/// Every command reports `Ok(false)` when it ran but its result should fail
/// the process.
pub type Outcome = Result<bool>;

pub fn run_map(session: &Session, args: &MapArgs) -> Outcome {
    let mut outcomes = Vec::with_capacity(args.layouts.len());
    for reference in &args.layouts {
        let layout = session.resolve_layout(reference)?;
        let learned = session.resolve_learned(&layout, args.learned.as_deref())?;
        let outcome = session
            .generate_map(&layout, learned.as_ref())
            .with_context(|| format!("generate map for {}", layout.id))?;
        match &args.output_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.tcl", layout.id));
                write_output(&path, &outcome.text)?;
                info!(path = %path.display(), "map written");
            }
            None => print_stdout(&outcome.text)?,
        }
        outcomes.push(outcome);
    }
    print_map_summary(&outcomes);
    Ok(true)
}

pub fn run_xsl(session: &Session, args: &XslArgs) -> Outcome {
    let layout = session.resolve_layout(&args.layout)?;
    let mapping = session.resolve_mapping(&layout, args.mapping.as_deref())?;
    let learned = session.resolve_learned(&layout, args.learned.as_deref())?;
    let example = args.example.as_deref().map(read_input).transpose()?;

    let response =
        session.generate_transform(&mapping, Some(&layout), learned.as_ref(), example.as_deref());
    for warning in &response.warnings {
        eprintln!("warning: {warning}");
    }
    for error in &response.errors {
        eprintln!("error: {error}");
    }
    let Some(generated) = response.output.filter(|_| response.success) else {
        return Ok(false);
    };
    match &args.output {
        Some(path) => {
            write_output(path, &generated.xsl)?;
            info!(path = %path.display(), root = %generated.root, "stylesheet written");
        }
        None => print_stdout(&generated.xsl)?,
    }
    Ok(true)
}

pub fn run_clean_xsl(args: &CleanXslArgs) -> Outcome {
    let xsl = read_input(&args.input)?;
    let cleaned = clean_stylesheet(&xsl);
    match &args.output {
        Some(path) => write_output(path, &cleaned)?,
        None => print_stdout(&cleaned)?,
    }
    Ok(true)
}

pub fn run_validate(session: &Session, args: &RecordArgs) -> Outcome {
    let layout = session.resolve_layout(&args.layout)?;
    let text = read_input(&args.record)?;
    let report = session.validate(&layout, &text);
    print_validation(&report);
    Ok(report.is_valid())
}

pub fn run_parse(session: &Session, args: &ParseArgs) -> Outcome {
    let layout = session.resolve_layout(&args.record.layout)?;
    let text = read_input(&args.record.record)?;
    let outcome = session.parse(&layout, &text, args.decrypt)?;
    match &args.output {
        Some(path) => write_output(path, &outcome.xml)?,
        None => print_stdout(&outcome.xml)?,
    }
    if outcome.parsed.unmatched.is_empty() {
        return Ok(true);
    }
    let lines: Vec<String> = outcome
        .parsed
        .unmatched
        .iter()
        .map(|index| (index + 1).to_string())
        .collect();
    eprintln!("warning: lines matched no definition: {}", lines.join(", "));
    Ok(false)
}

pub fn run_synth(session: &mut Session, args: &SynthArgs) -> Outcome {
    let _span = info_span!("synth", layout = %args.layout, count = args.count).entered();
    apply_synth_overrides(session, args);
    let layout = session.resolve_layout(&args.layout)?;
    let kind = match args.provider {
        ProviderArg::Deterministic => ProviderKind::Deterministic,
        ProviderArg::Random => ProviderKind::Random,
    };

    let bar = synth_progress(args.count);
    let records = session.synthesize(&layout, args.count, kind, |_| bar.inc(1));
    bar.finish_and_clear();

    let terminator = session.config().synthesis.line_terminator;
    match &args.output_dir {
        Some(dir) => {
            for record in &records {
                let path = record_path(dir, &layout, record.index);
                write_output(&path, &record.text(terminator))?;
            }
            info!(dir = %dir.display(), records = records.len(), "records written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            for record in &records {
                stdout
                    .write_all(record.text(terminator).as_bytes())
                    .context("write record")?;
            }
        }
    }
    print_synthesis_summary(&layout, &records);

    let defects: usize = records.iter().map(|record| record.defects.len()).sum();
    if defects > 0 {
        warn!(defects, "records contain unresolved defects");
    }
    Ok(defects == 0)
}

fn apply_synth_overrides(session: &mut Session, args: &SynthArgs) {
    let options = &mut session.config_mut().synthesis;
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    if let Some(occurrences) = args.occurrences {
        options.occurrences = match occurrences {
            OccurrencesArg::Minimum => OccurrencePolicy::Minimum,
            OccurrencesArg::Maximum => OccurrencePolicy::Maximum,
        };
    }
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
}

fn synth_progress(count: usize) -> ProgressBar {
    if count <= 1 {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(count as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} records")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

pub fn run_compare(session: &Session, args: &CompareArgs) -> Outcome {
    let layout = session.resolve_layout(&args.layout)?;
    let model = session
        .resolve_learned(&layout, args.learned.as_deref())?
        .ok_or_else(|| anyhow!("no learned model for layout '{}'", layout.id))?;
    let threshold = args.threshold.unwrap_or_else(default_compare_threshold);
    let comparison = session.compare(&layout, &model, threshold)?;
    print_comparison(&comparison);
    Ok(true)
}

pub fn run_layouts(session: &Session, args: &LayoutsArgs) -> Outcome {
    let layouts = session.search_layouts(&args.term, args.max)?;
    if layouts.is_empty() {
        eprintln!("no layouts match '{}'", args.term);
        return Ok(true);
    }
    print_layouts(&layouts);
    Ok(true)
}

fn print_stdout(content: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(content.as_bytes()).context("write stdout")?;
    if !content.ends_with('\n') {
        stdout.write_all(b"\n").context("write stdout")?;
    }
    Ok(())
}
