use serde::{Deserialize, Serialize};

/// Envelope returned by every generation or transformation request.
///
/// Errors and warnings are reported even when `success` is false so partial
/// diagnostics are never lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse<T> {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub output: Option<T>,
}

impl<T> GenerationResponse<T> {
    pub fn ok(output: T, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings,
            output: Some(output),
        }
    }

    pub fn failed(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            success: false,
            errors,
            warnings,
            output: None,
        }
    }

    /// Build a response from a fallible step, keeping collected warnings either way.
    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>, warnings: Vec<String>) -> Self {
        match result {
            Ok(output) => Self::ok(output, warnings),
            Err(error) => Self::failed(vec![error.to_string()], warnings),
        }
    }
}
