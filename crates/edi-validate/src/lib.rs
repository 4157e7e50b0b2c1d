#![deny(unsafe_code)]

pub mod issue;
pub mod line;
pub mod record;

pub use issue::{Issue, Severity};
pub use line::{LineReport, ValidationOutcome, validate_line};
pub use record::{RecordReport, validate_record};
