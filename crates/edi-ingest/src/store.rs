//! File-backed collaborator stores.
//!
//! Each store reads a directory of JSON documents. Files are listed in file
//! name order, so lookups that scan the directory are deterministic.

use std::path::{Path, PathBuf};

use edi_model::{
    CollaboratorError, FieldHeuristics, Layout, LayoutStore, LearnedModel, LearnedModelStore,
    Mapping, MappingStore,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::loader::{finish_layout, read_json};

/// All `.json` files directly inside `dir`, sorted by file name.
pub fn list_json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(IngestError::DirectoryNotFound {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::DirectoryRead {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        let is_json = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

fn store_error(collaborator: &'static str, error: IngestError) -> CollaboratorError {
    CollaboratorError::failed(collaborator, error.to_string())
}

/// Parse every document in `dir`, skipping (and logging) unreadable ones.
fn scan<T: DeserializeOwned>(dir: &Path, collaborator: &'static str) -> Result<Vec<(PathBuf, T)>> {
    let mut documents = Vec::new();
    for path in list_json_files(dir)? {
        match read_json::<T>(&path) {
            Ok(document) => documents.push((path, document)),
            Err(error) => warn!(%error, store = collaborator, "skipping unreadable document"),
        }
    }
    Ok(documents)
}

/// Layouts stored as `<dir>/<id>.json`.
#[derive(Debug, Clone)]
pub struct JsonLayoutStore {
    dir: PathBuf,
    heuristics: FieldHeuristics,
}

impl JsonLayoutStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            heuristics: FieldHeuristics::default(),
        }
    }

    #[must_use]
    pub fn with_heuristics(mut self, heuristics: FieldHeuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Every layout in the directory, kinds resolved. Invalid layouts are skipped.
    pub fn all(&self) -> Result<Vec<Layout>> {
        let mut layouts = Vec::new();
        for (path, layout) in scan::<Layout>(&self.dir, "layout store")? {
            match finish_layout(layout, &self.heuristics) {
                Ok(layout) => layouts.push(layout),
                Err(error) => warn!(%error, path = %path.display(), "skipping invalid layout"),
            }
        }
        Ok(layouts)
    }
}

impl LayoutStore for JsonLayoutStore {
    fn fetch(&self, id: &str) -> std::result::Result<Option<Layout>, CollaboratorError> {
        let direct = self.dir.join(format!("{id}.json"));
        if direct.is_file() {
            return read_json::<Layout>(&direct)
                .and_then(|layout| finish_layout(layout, &self.heuristics))
                .map(Some)
                .map_err(|error| store_error("layout store", error));
        }
        let found = self
            .all()
            .map_err(|error| store_error("layout store", error))?
            .into_iter()
            .find(|layout| layout.id == id);
        debug!(id, found = found.is_some(), "layout lookup by scan");
        Ok(found)
    }

    fn search(
        &self,
        term: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<Layout>, CollaboratorError> {
        let term = term.trim().to_lowercase();
        let layouts = self
            .all()
            .map_err(|error| store_error("layout store", error))?;
        Ok(layouts
            .into_iter()
            .filter(|layout| {
                term.is_empty()
                    || layout.id.to_lowercase().contains(&term)
                    || layout.name.to_lowercase().contains(&term)
            })
            .take(max_results)
            .collect())
    }
}

/// Mappings stored as JSON documents in one directory.
#[derive(Debug, Clone)]
pub struct JsonMappingStore {
    dir: PathBuf,
}

impl JsonMappingStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn find(
        &self,
        matches: impl Fn(&Mapping) -> bool,
    ) -> std::result::Result<Option<Mapping>, CollaboratorError> {
        let mappings =
            scan::<Mapping>(&self.dir, "mapping store").map_err(|error| store_error("mapping store", error))?;
        Ok(mappings
            .into_iter()
            .map(|(_, mapping)| mapping)
            .find(|mapping| matches(mapping)))
    }
}

impl MappingStore for JsonMappingStore {
    fn fetch_by_input_layout(
        &self,
        layout_id: &str,
    ) -> std::result::Result<Option<Mapping>, CollaboratorError> {
        self.find(|mapping| mapping.input_layout_id == layout_id)
    }

    fn fetch_by_target_layout(
        &self,
        layout_id: &str,
    ) -> std::result::Result<Option<Mapping>, CollaboratorError> {
        self.find(|mapping| mapping.target_layout_id == layout_id)
    }
}

/// Learned models stored as `<dir>/<layout name>.json`.
#[derive(Debug, Clone)]
pub struct JsonLearnedModelStore {
    dir: PathBuf,
}

impl JsonLearnedModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LearnedModelStore for JsonLearnedModelStore {
    fn load(&self, layout_name: &str) -> std::result::Result<Option<LearnedModel>, CollaboratorError> {
        let direct = self.dir.join(format!("{layout_name}.json"));
        if direct.is_file() {
            return read_json(&direct)
                .map(Some)
                .map_err(|error| store_error("learned model store", error));
        }
        if !self.dir.is_dir() {
            return Ok(None);
        }
        let models = scan::<LearnedModel>(&self.dir, "learned model store")
            .map_err(|error| store_error("learned model store", error))?;
        Ok(models
            .into_iter()
            .map(|(_, model)| model)
            .find(|model| model.layout_name.eq_ignore_ascii_case(layout_name)))
    }
}
