//! The incremental synthesis loop.
//!
//! Every line occurrence runs `generate → validate → accept | retry | give up`.
//! A record is always produced: a line that still fails after the retry budget
//! is force-normalised to the line width, accepted, and reported as an
//! [`UnresolvedDefect`].

use std::num::NonZeroUsize;
use std::thread;

use edi_model::{DATA_TARGET, Layout, LineDef};
use edi_validate::validate_line;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, trace, warn};

use crate::provider::{ContentProvider, LineRequest, line_prefix, normalize_line};

/// Retries after the first attempt. Four candidates in total per line.
pub const MAX_RETRIES: u32 = 3;
const DEFAULT_UNBOUNDED_CAP: u32 = 3;

/// How many occurrences of each line to generate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrencePolicy {
    /// `min_occurs`, at least one.
    #[default]
    Minimum,
    /// `max_occurs`, or the unbounded cap.
    Maximum,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineTerminator {
    #[default]
    Lf,
    Crlf,
}

impl LineTerminator {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lf => "\n",
            Self::Crlf => "\r\n",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisOptions {
    /// Base seed; record `i` uses `seed + i`.
    pub seed: u64,
    pub occurrences: OccurrencePolicy,
    /// Occurrences generated for unbounded lines under [`OccurrencePolicy::Maximum`].
    pub unbounded_cap: u32,
    pub line_terminator: LineTerminator,
    /// Worker threads for multi-record runs; 0 picks the available parallelism.
    pub workers: usize,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            occurrences: OccurrencePolicy::default(),
            unbounded_cap: DEFAULT_UNBOUNDED_CAP,
            line_terminator: LineTerminator::default(),
            workers: 0,
        }
    }
}

/// A line accepted only after normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDefect {
    pub record: usize,
    pub line: String,
    pub occurrence: u32,
    pub attempts: u32,
    /// Errors of the last candidate.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedLine {
    pub line: String,
    pub occurrence: u32,
    pub text: String,
    pub attempts: u32,
    /// Set when the retry budget ran out and `text` was force-normalised.
    pub normalized: bool,
    /// Errors of the last rejected candidate; empty for accepted lines.
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedRecord {
    pub index: usize,
    pub lines: Vec<SynthesizedLine>,
    pub defects: Vec<UnresolvedDefect>,
}

impl SynthesizedRecord {
    /// Lines joined by `terminator`, each one terminated.
    pub fn text(&self, terminator: LineTerminator) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(&line.text);
            text.push_str(terminator.as_str());
        }
        text
    }

    pub fn is_clean(&self) -> bool {
        self.defects.is_empty()
    }
}

pub struct Synthesizer<'a> {
    layout: &'a Layout,
    options: SynthesisOptions,
}

impl<'a> Synthesizer<'a> {
    pub fn new(layout: &'a Layout, options: SynthesisOptions) -> Self {
        Self { layout, options }
    }

    pub fn options(&self) -> &SynthesisOptions {
        &self.options
    }

    /// Occurrences of `line` generated per record.
    pub fn occurrences(&self, line: &LineDef) -> u32 {
        match self.options.occurrences {
            OccurrencePolicy::Minimum => {
                let floor = line.min_occurs.max(1);
                line.max_occurs.map_or(floor, |max| floor.min(max))
            }
            OccurrencePolicy::Maximum => line
                .max_occurs
                .unwrap_or(self.options.unbounded_cap)
                .max(line.min_occurs),
        }
    }

    /// Synthesize one record, lines in layout order.
    pub fn synthesize_record<P>(&self, index: usize, provider: &mut P) -> SynthesizedRecord
    where
        P: ContentProvider + ?Sized,
    {
        let _span = info_span!(
            "synthesize_record",
            layout = %self.layout.id,
            record = index,
            provider = provider.name()
        )
        .entered();

        let mut lines = Vec::new();
        let mut defects = Vec::new();
        let mut sequence = 0u32;
        for def in &self.layout.lines {
            for occurrence in 0..self.occurrences(def) {
                if !def.is_header() {
                    sequence += 1;
                }
                let line = self.synthesize_line(provider, def, occurrence, sequence);
                if line.normalized {
                    warn!(
                        record = index,
                        line = %def.name,
                        occurrence,
                        attempts = line.attempts,
                        errors = line.errors.len(),
                        "line accepted with unresolved defects"
                    );
                    trace!(target: DATA_TARGET, errors = ?line.errors, "unresolved line errors");
                    defects.push(UnresolvedDefect {
                        record: index,
                        line: def.name.clone(),
                        occurrence,
                        attempts: line.attempts,
                        errors: line.errors.clone(),
                    });
                }
                lines.push(line);
            }
        }
        debug!(lines = lines.len(), defects = defects.len(), "record synthesized");
        SynthesizedRecord {
            index,
            lines,
            defects,
        }
    }

    /// Run the retry loop for one line occurrence.
    ///
    /// Provider failures count as attempts. After [`MAX_RETRIES`] retries the
    /// last candidate (or a prefix-only line if none was produced) is
    /// normalised and accepted.
    pub fn synthesize_line<P>(
        &self,
        provider: &mut P,
        line: &LineDef,
        occurrence: u32,
        sequence: u32,
    ) -> SynthesizedLine
    where
        P: ContentProvider + ?Sized,
    {
        let width = self.layout.line_width;
        let mut previous: Option<String> = None;
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=MAX_RETRIES + 1 {
            let request = LineRequest {
                layout: self.layout,
                line,
                occurrence,
                sequence,
                attempt,
                previous: previous.as_deref(),
                errors: &errors,
            };
            match provider.generate(&request) {
                Ok(candidate) => match validate_line(&candidate, line, width).failure() {
                    None => {
                        trace!(target: DATA_TARGET, line = %line.name, attempt, text = %candidate, "line accepted");
                        return SynthesizedLine {
                            line: line.name.clone(),
                            occurrence,
                            text: candidate,
                            attempts: attempt,
                            normalized: false,
                            errors: Vec::new(),
                        };
                    }
                    Some(failure) => {
                        debug!(line = %line.name, attempt, errors = failure.errors.len(), "candidate rejected");
                        trace!(target: DATA_TARGET, %failure, text = %candidate, "rejected candidate");
                        errors = failure.errors;
                        previous = Some(candidate);
                    }
                },
                Err(error) => {
                    debug!(line = %line.name, attempt, %error, "provider failed");
                    errors = vec![error.to_string()];
                }
            }
        }

        let text = match &previous {
            Some(candidate) => normalize_line(candidate, width),
            None => normalize_line(&line_prefix(line, sequence), width),
        };
        SynthesizedLine {
            line: line.name.clone(),
            occurrence,
            text,
            attempts: MAX_RETRIES + 1,
            normalized: true,
            errors,
        }
    }

    /// Synthesize `count` records, in parallel when more than one worker is
    /// available. Record `i` gets a provider built from `seed + i`; output is
    /// ordered by record index whatever the scheduling.
    pub fn generate_records<P, F, G>(&self, count: usize, factory: F, progress: G) -> Vec<SynthesizedRecord>
    where
        P: ContentProvider,
        F: Fn(u64) -> P + Sync,
        G: Fn(&SynthesizedRecord) + Sync,
    {
        let workers = self.worker_count(count);
        info!(
            layout = %self.layout.id,
            records = count,
            workers,
            seed = self.options.seed,
            "starting synthesis"
        );

        let run = |index: usize| {
            let mut provider = factory(self.options.seed.wrapping_add(index as u64));
            let record = self.synthesize_record(index, &mut provider);
            progress(&record);
            record
        };

        if workers <= 1 {
            return (0..count).map(run).collect();
        }

        let mut records: Vec<SynthesizedRecord> = thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let run = &run;
                    scope.spawn(move || {
                        (worker..count)
                            .step_by(workers)
                            .map(run)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| match handle.join() {
                    Ok(records) => records,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });
        records.sort_by_key(|record| record.index);
        records
    }

    fn worker_count(&self, count: usize) -> usize {
        let workers = match self.options.workers {
            0 => thread::available_parallelism().map_or(1, NonZeroUsize::get),
            workers => workers,
        };
        workers.min(count).max(1)
    }
}
