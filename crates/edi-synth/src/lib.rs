//! Validation-driven synthesis of positional test records.
//!
//! A [`Synthesizer`] walks a layout line by line, asks a [`ContentProvider`]
//! for candidates and checks each one with the record validator, retrying with
//! the validator's errors as feedback.

#![deny(unsafe_code)]

pub mod deterministic;
pub mod documents;
pub mod llm;
pub mod provider;
pub mod random;
pub mod synth;
pub mod values;

pub use deterministic::DeterministicProvider;
pub use documents::{cnpj_from_base, cpf_from_base, is_valid_cnpj, is_valid_cpf};
pub use llm::{
    CompletionClient, CompletionRequest, LINE_EXAMPLE_TYPE, LlmProvider, build_prompt,
    examples_for_line, extract_line,
};
pub use provider::{ContentProvider, LineRequest, blank_line, fit_value, line_prefix, normalize_line};
pub use random::RandomProvider;
pub use synth::{
    LineTerminator, MAX_RETRIES, OccurrencePolicy, SynthesisOptions, SynthesizedLine,
    SynthesizedRecord, Synthesizer, UnresolvedDefect,
};
