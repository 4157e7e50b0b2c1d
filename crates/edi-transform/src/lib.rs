//! XSL transform generation for EDI link mappings.
//!
//! - **expr**: rule expression parsing (config lookups, concatenation)
//! - **lookup**: ranked source lookups with an in-memory evaluator
//! - **template**: stylesheet writer
//! - **cleanup**: vendor namespace removal and `xsi` declaration repair
//! - **generator**: ties the above together for one mapping

#![deny(unsafe_code)]

pub mod cleanup;
pub mod error;
pub mod example;
pub mod expr;
pub mod generator;
pub mod lookup;
pub mod sanitize;
pub mod template;

pub use cleanup::{XSI_NAMESPACE, clean_stylesheet, vendor_prefixes};
pub use error::{Result, TransformError};
pub use example::{BatchWrapper, DocumentShape, inspect_example};
pub use expr::{Expression, Operand, ParsedRules, Statement, parse_rules};
pub use generator::{GeneratedTransform, TransformGenerator, TransformOptions};
pub use lookup::{
    LookupCandidate, MAX_EMBEDDED_CANDIDATES, RankContext, Resolution, rank_candidates,
    resolve_link,
};
pub use sanitize::{sanitize_attribute_name, sanitize_name, strip_quotes};
