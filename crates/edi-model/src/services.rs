//! Contracts of the external collaborators the core consumes.
//!
//! Implementations live outside the core (see `edi-ingest` for file-backed
//! ones). Every method is synchronous from the caller's point of view; the
//! implementation owns its timeout and cancellation policy.

use crate::error::{CollaboratorError, StructureError};
use crate::layout::Layout;
use crate::learned::LearnedModel;
use crate::mapping::Mapping;

pub trait LayoutStore: Send + Sync {
    /// Fetch one layout by id; `Ok(None)` when it does not exist.
    fn fetch(&self, id: &str) -> Result<Option<Layout>, CollaboratorError>;

    /// Layouts whose id or name contains `term`, at most `max_results`.
    fn search(&self, term: &str, max_results: usize) -> Result<Vec<Layout>, CollaboratorError>;
}

pub trait MappingStore: Send + Sync {
    fn fetch_by_input_layout(&self, layout_id: &str) -> Result<Option<Mapping>, CollaboratorError>;

    fn fetch_by_target_layout(&self, layout_id: &str)
    -> Result<Option<Mapping>, CollaboratorError>;
}

/// Legacy decryption step. Fails closed: on any failure the implementation
/// logs a warning and returns the ciphertext unchanged.
pub trait Decryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> String;
}

pub trait LearnedModelStore: Send + Sync {
    fn load(&self, layout_name: &str) -> Result<Option<LearnedModel>, CollaboratorError>;
}

/// Key/value cache for generated text artifacts.
pub trait ArtifactCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn put(&self, key: &str, value: &str);

    /// Return the cached value for `key`, computing and storing it on a miss.
    /// Failed computations are not cached.
    fn get_or_populate<E, F>(&self, key: &str, populate: F) -> Result<String, E>
    where
        Self: Sized,
        F: FnOnce() -> Result<String, E>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = populate()?;
        self.put(key, &value);
        Ok(value)
    }
}

/// Fetch a layout that must exist. Missing layouts and store failures both
/// surface as [`StructureError`]: without a layout there is nothing to generate.
pub fn require_layout(store: &dyn LayoutStore, id: &str) -> Result<Layout, StructureError> {
    match store.fetch(id) {
        Ok(Some(layout)) => Ok(layout),
        Ok(None) => Err(StructureError::LayoutNotFound { id: id.to_string() }),
        Err(error) => Err(StructureError::Message(format!(
            "layout store failed for {id}: {error}"
        ))),
    }
}

/// Fetch the mapping whose input is `layout_id`, falling back to the one whose
/// target is `layout_id`.
pub fn require_mapping(store: &dyn MappingStore, layout_id: &str) -> Result<Mapping, StructureError> {
    let lookup = store
        .fetch_by_input_layout(layout_id)
        .and_then(|found| match found {
            Some(mapping) => Ok(Some(mapping)),
            None => store.fetch_by_target_layout(layout_id),
        });
    match lookup {
        Ok(Some(mapping)) => Ok(mapping),
        Ok(None) => Err(StructureError::MappingNotFound {
            layout: layout_id.to_string(),
        }),
        Err(error) => Err(StructureError::Message(format!(
            "mapping store failed for {layout_id}: {error}"
        ))),
    }
}
