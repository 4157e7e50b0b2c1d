//! In-memory artifact cache keyed by content fingerprints.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use edi_model::ArtifactCache;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::trace;

/// SHA-256 over the artifact kind and the JSON form of `input`.
///
/// Identical inputs produce identical keys, so regenerating an artifact from
/// an unchanged layout or mapping is a cache hit. Several inputs go in as a
/// tuple.
pub fn fingerprint<T: Serialize + ?Sized>(kind: &str, input: &T) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(input)?);
    Ok(format!("{kind}:{}", hex::encode(hasher.finalize())))
}

#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let hit = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        trace!(key, hit = hit.is_some(), "cache lookup");
        hit
    }

    fn put(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}
