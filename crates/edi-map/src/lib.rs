#![deny(unsafe_code)]

pub mod patterns;
pub mod score;
pub mod tcl;

pub use patterns::{
    FIELD_PATTERN, MapRefiner, Refinement, field_pattern, map_patterns, suggest_for_map,
    suggest_improvements,
};
pub use score::{
    PatternMatch, Similarity, SimilarityComponent, find_most_similar, metadata_similarity,
    similarity, string_similarity,
};
pub use tcl::{
    GeneratedMap, MapField, MapGenerator, MapLine, letter_code, line_identifier, line_sort_key,
};
