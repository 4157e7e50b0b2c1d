#![deny(unsafe_code)]

pub mod error;
pub mod heuristics;
pub mod layout;
pub mod learned;
pub mod mapping;
pub mod record;
pub mod response;
pub mod services;

/// Target of `tracing` events that carry raw record content.
///
/// Front ends filter it out unless content logging was asked for.
pub const DATA_TARGET: &str = "edi::data";

pub use error::{CollaboratorError, EdiError, Result, StructureError, ValidationFailure};
pub use heuristics::FieldHeuristics;
pub use layout::{
    Alignment, DEFAULT_LINE_WIDTH, FieldDef, FieldKind, FieldLength, FieldSpan, Layout,
    LayoutType, LineDef, SEQUENCE_PREFIX_WIDTH,
};
pub use learned::{LearnedMappingRule, LearnedModel, LearnedPattern, MetadataValue};
pub use mapping::{LinkMapping, Mapping, Rule};
pub use record::{IntermediateRecord, RECORD_ROOT, RecordNode};
pub use response::GenerationResponse;
pub use services::{
    ArtifactCache, Decryptor, LayoutStore, LearnedModelStore, MappingStore, require_layout,
    require_mapping,
};
