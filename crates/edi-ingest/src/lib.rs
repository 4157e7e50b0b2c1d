//! Ingestion and collaborator adapters for the EDI core.
//!
//! - **parser**: raw fixed-width text to intermediate record
//! - **xml**: intermediate record to intermediate XML
//! - **loader**: JSON / CSV layout import, mapping and learned-model files
//! - **store**: directory-backed layout, mapping and learned-model stores
//! - **decrypt**: subprocess decryptor with a hard timeout
//! - **cache**: fingerprint-keyed artifact cache

#![deny(unsafe_code)]

pub mod cache;
pub mod decrypt;
pub mod error;
pub mod loader;
pub mod parser;
pub mod store;
pub mod xml;

pub use cache::{MemoryCache, fingerprint};
pub use decrypt::{CommandDecryptor, DECRYPT_TIMEOUT, PlainText};
pub use error::{IngestError, Result};
pub use loader::{
    finish_layout, layout_from_csv, load_layout, load_layout_csv, load_layout_json,
    load_learned_model, load_mapping,
};
pub use parser::{ParsedRecord, parse_encrypted, parse_line, parse_record};
pub use store::{JsonLayoutStore, JsonLearnedModelStore, JsonMappingStore, list_json_files};
pub use xml::render_intermediate_xml;
