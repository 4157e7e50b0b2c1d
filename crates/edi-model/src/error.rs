use thiserror::Error;

/// Malformed or missing Layout / Mapping input. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("layout {layout} has no lines")]
    EmptyLayout { layout: String },

    #[error("line {line} of layout {layout} has no fields")]
    EmptyLine { layout: String, line: String },

    #[error("mapping {input} -> {target} has neither rules nor link mappings")]
    EmptyMapping { input: String, target: String },

    #[error("field {field} of line {line} (layout {layout}) shares its sequence with another field")]
    FieldOverlap {
        layout: String,
        line: String,
        field: String,
    },

    #[error(
        "field {field} of line {line} (layout {layout}) declares start {declared}, contiguous start is {expected}"
    )]
    NonContiguousField {
        layout: String,
        line: String,
        field: String,
        expected: usize,
        declared: usize,
    },

    #[error(
        "field {field} of line {line} (layout {layout}) ends at column {end}, beyond line width {line_width}"
    )]
    WidthOverflow {
        layout: String,
        line: String,
        field: String,
        end: usize,
        line_width: usize,
    },

    #[error("line {line} of layout {layout} has initial value '{prefix}' longer than the sequence prefix")]
    InvalidPrefix {
        layout: String,
        line: String,
        prefix: String,
    },

    #[error("layout not found: {id}")]
    LayoutNotFound { id: String },

    #[error("no mapping found for layout {layout}")]
    MappingNotFound { layout: String },

    #[error("{0}")]
    Message(String),
}

/// Failure of an external collaborator (store, decryptor, content provider).
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("{collaborator} timed out after {seconds}s")]
    Timeout {
        collaborator: &'static str,
        seconds: u64,
    },

    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollaboratorError {
    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            collaborator,
            message: message.into(),
        }
    }
}

/// A candidate line failed record validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line} failed validation: {}", errors.join("; "))]
pub struct ValidationFailure {
    pub line: String,
    pub errors: Vec<String>,
}

#[derive(Debug, Error)]
pub enum EdiError {
    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EdiError>;
