//! Command orchestration shared by the binary and the integration tests.
//!
//! A [`Session`] resolves layouts, mappings and learned models from files or
//! the configured stores, then drives the generators. Generated artifacts are
//! cached by a fingerprint of their inputs for the lifetime of the session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use edi_ingest::{
    JsonLayoutStore, JsonLearnedModelStore, JsonMappingStore, MemoryCache, ParsedRecord,
    fingerprint, load_layout, load_learned_model, load_mapping, parse_encrypted, parse_record,
    render_intermediate_xml,
};
use edi_map::patterns::SUGGESTION_THRESHOLD;
use edi_map::{MapGenerator, MapRefiner, find_most_similar, map_patterns, suggest_for_map};
use edi_model::{
    ArtifactCache, CollaboratorError, GenerationResponse, Layout, LayoutStore, LearnedModel,
    LearnedModelStore, Mapping, MappingStore, require_layout,
};
use edi_synth::{
    ContentProvider, DeterministicProvider, LineRequest, RandomProvider, SynthesizedRecord,
    Synthesizer,
};
use edi_transform::{GeneratedTransform, TransformGenerator};
use edi_validate::{RecordReport, validate_record};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use crate::config::Config;

const LAYOUT_EXTENSIONS: &[&str] = &["json", "csv"];

/// A generated map artifact and what refinement did to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapOutcome {
    pub layout: String,
    pub text: String,
    pub lines: usize,
    pub fields: usize,
    pub rewritten: usize,
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub parsed: ParsedRecord,
    pub xml: String,
}

/// Best learned match for one generated field pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldComparison {
    pub field: String,
    pub line: String,
    pub generated: String,
    pub best: Option<(String, f64)>,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub fields: Vec<FieldComparison>,
    pub advisories: Vec<String>,
}

/// Built-in candidate providers selectable from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderKind {
    #[default]
    Deterministic,
    Random,
}

enum SessionProvider {
    Deterministic(DeterministicProvider),
    Random(RandomProvider),
}

impl ContentProvider for SessionProvider {
    fn name(&self) -> &'static str {
        match self {
            Self::Deterministic(provider) => provider.name(),
            Self::Random(provider) => provider.name(),
        }
    }

    fn generate(&mut self, request: &LineRequest<'_>) -> Result<String, CollaboratorError> {
        match self {
            Self::Deterministic(provider) => provider.generate(request),
            Self::Random(provider) => provider.generate(request),
        }
    }
}

pub struct Session {
    config: Config,
    cache: MemoryCache,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            cache: MemoryCache::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn cached_artifacts(&self) -> usize {
        self.cache.len()
    }

    fn layout_store(&self) -> Option<JsonLayoutStore> {
        self.config
            .stores
            .layouts
            .as_ref()
            .map(|dir| JsonLayoutStore::new(dir).with_heuristics(self.config.heuristics.clone()))
    }

    /// Load a layout from a `.json` / `.csv` path, or fetch it by id from the
    /// layout store.
    pub fn resolve_layout(&self, reference: &str) -> Result<Layout> {
        let path = Path::new(reference);
        let looks_like_file = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| LAYOUT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)));
        if looks_like_file || path.is_file() {
            let layout = load_layout(
                path,
                self.config.layout.default_line_width,
                &self.config.heuristics,
            )
            .with_context(|| format!("load layout {}", path.display()))?;
            debug!(layout = %layout.id, path = %path.display(), "layout loaded from file");
            return Ok(layout);
        }
        let store = self.layout_store().ok_or_else(|| {
            anyhow!("'{reference}' is not a layout file and no layout directory is configured")
        })?;
        let layout = require_layout(&store, reference)?;
        debug!(layout = %layout.id, dir = %store.dir().display(), "layout fetched from store");
        Ok(layout)
    }

    /// The mapping for `layout`: an explicit file, else the mapping store
    /// (by input layout, then by target layout).
    pub fn resolve_mapping(&self, layout: &Layout, explicit: Option<&Path>) -> Result<Mapping> {
        if let Some(path) = explicit {
            return load_mapping(path).with_context(|| format!("load mapping {}", path.display()));
        }
        let dir = self
            .config
            .stores
            .mappings
            .as_ref()
            .ok_or_else(|| anyhow!("no mapping file given and no mapping directory configured"))?;
        let store = JsonMappingStore::new(dir);
        if let Some(mapping) = store.fetch_by_input_layout(&layout.id)? {
            return Ok(mapping);
        }
        store
            .fetch_by_target_layout(&layout.id)?
            .ok_or_else(|| anyhow!("no mapping for layout '{}' in {}", layout.id, dir.display()))
    }

    /// The learned model: an explicit file, else the learned-model store.
    /// `None` when neither is available.
    pub fn resolve_learned(&self, layout: &Layout, explicit: Option<&Path>) -> Result<Option<LearnedModel>> {
        if let Some(path) = explicit {
            let model = load_learned_model(path)
                .with_context(|| format!("load learned model {}", path.display()))?;
            return Ok(Some(model));
        }
        let Some(dir) = &self.config.stores.learned else {
            return Ok(None);
        };
        let store = JsonLearnedModelStore::new(dir);
        let name = if layout.name.is_empty() {
            &layout.id
        } else {
            &layout.name
        };
        match store.load(name)? {
            Some(model) => Ok(Some(model)),
            None => Ok(store.load(&layout.id)?),
        }
    }

    /// Generate the map artifact, refined against `learned` when given.
    pub fn generate_map(&self, layout: &Layout, learned: Option<&LearnedModel>) -> Result<MapOutcome> {
        let _span = info_span!("map", layout = %layout.id).entered();
        let key = fingerprint("map", &(layout, &self.config.heuristics, learned))?;
        let json = self.cache.get_or_populate(&key, || -> Result<String> {
            let generated = MapGenerator::new(self.config.heuristics.clone()).generate(layout)?;
            let (map, rewritten, advisories) = match learned {
                Some(model) => {
                    let refinement = MapRefiner::new(model).refine(&generated);
                    let mut advisories = refinement.advisories;
                    advisories.extend(suggest_for_map(&refinement.map, model));
                    (refinement.map, refinement.rewritten, advisories)
                }
                None => (generated, 0, Vec::new()),
            };
            let outcome = MapOutcome {
                layout: layout.id.clone(),
                text: map.render(),
                lines: map.lines.len(),
                fields: map.lines.iter().map(|line| line.fields.len()).sum(),
                rewritten,
                advisories,
            };
            Ok(serde_json::to_string(&outcome)?)
        })?;
        let outcome: MapOutcome = serde_json::from_str(&json)?;
        info!(
            lines = outcome.lines,
            fields = outcome.fields,
            rewritten = outcome.rewritten,
            "map generated"
        );
        Ok(outcome)
    }

    /// Generate the transform for `mapping`. Failures land in the response
    /// envelope, never in `Err`.
    pub fn generate_transform(
        &self,
        mapping: &Mapping,
        layout: Option<&Layout>,
        learned: Option<&LearnedModel>,
        example: Option<&str>,
    ) -> GenerationResponse<GeneratedTransform> {
        let _span = info_span!("transform", input = %mapping.input_layout_id).entered();
        let mut generator = TransformGenerator::new(self.config.transform.clone());
        if let Some(layout) = layout {
            generator = generator.with_layout(layout);
        }
        if let Some(model) = learned {
            generator = generator.with_learned(model);
        }
        let generated = fingerprint(
            "xsl",
            &(mapping, layout, learned, &self.config.transform, example),
        )
        .map_err(anyhow::Error::from)
        .and_then(|key| {
            self.cache.get_or_populate(&key, || -> Result<String> {
                let generated = generator.generate(mapping, example)?;
                Ok(serde_json::to_string(&generated)?)
            })
        })
        .and_then(|json| Ok(serde_json::from_str::<GeneratedTransform>(&json)?));
        match generated {
            Ok(generated) => {
                info!(
                    root = %generated.root,
                    warnings = generated.warnings.len(),
                    "transform generated"
                );
                let warnings = generated.warnings.clone();
                GenerationResponse::ok(generated, warnings)
            }
            Err(error) => {
                warn!(%error, "transform generation failed");
                GenerationResponse::failed(vec![format!("{error:#}")], Vec::new())
            }
        }
    }

    pub fn validate(&self, layout: &Layout, text: &str) -> RecordReport {
        let _span = info_span!("validate", layout = %layout.id).entered();
        validate_record(text, layout)
    }

    /// Parse a raw record, optionally through the configured decryptor, and
    /// render it as intermediate XML.
    pub fn parse(&self, layout: &Layout, text: &str, decrypt: bool) -> Result<ParseOutcome> {
        let _span = info_span!("parse", layout = %layout.id, decrypt).entered();
        let parsed = if decrypt {
            if self.config.decrypt.is_none() {
                bail!("decryption requested but no [decrypt] program is configured");
            }
            parse_encrypted(text, layout, self.config.decryptor().as_ref())
        } else {
            parse_record(text, layout)
        };
        let xml = render_intermediate_xml(&parsed.record)?;
        info!(
            matched = parsed.matched.len(),
            unmatched = parsed.unmatched.len(),
            "record parsed"
        );
        Ok(ParseOutcome { parsed, xml })
    }

    /// Synthesize `count` records with a built-in provider.
    pub fn synthesize<G>(&self, layout: &Layout, count: usize, kind: ProviderKind, progress: G) -> Vec<SynthesizedRecord>
    where
        G: Fn(&SynthesizedRecord) + Sync,
    {
        let synthesizer = Synthesizer::new(layout, self.config.synthesis.clone());
        synthesizer.generate_records(
            count,
            |seed| match kind {
                ProviderKind::Deterministic => {
                    SessionProvider::Deterministic(DeterministicProvider::default())
                }
                ProviderKind::Random => SessionProvider::Random(RandomProvider::seeded(seed)),
            },
            progress,
        )
    }

    /// Compare the generated map's field patterns with a learned model.
    pub fn compare(&self, layout: &Layout, model: &LearnedModel, threshold: f64) -> Result<Comparison> {
        let _span = info_span!("compare", layout = %layout.id).entered();
        let map = MapGenerator::new(self.config.heuristics.clone()).generate(layout)?;
        let fields = map_patterns(&map)
            .iter()
            .map(|pattern| {
                let matches = find_most_similar(pattern, &model.patterns, threshold);
                let best = matches.first();
                FieldComparison {
                    field: pattern.name.clone(),
                    line: pattern
                        .metadata
                        .get("line")
                        .map(ToString::to_string)
                        .unwrap_or_default(),
                    generated: pattern.pattern_string.clone(),
                    best: best.map(|m| (m.pattern.pattern_string.clone(), m.similarity.score)),
                    explanation: best.map(|m| m.similarity.explain()).unwrap_or_default(),
                }
            })
            .collect();
        Ok(Comparison {
            fields,
            advisories: suggest_for_map(&map, model),
        })
    }

    /// Layouts in the configured store whose id or name contains `term`.
    pub fn search_layouts(&self, term: &str, max_results: usize) -> Result<Vec<Layout>> {
        let store = self
            .layout_store()
            .ok_or_else(|| anyhow!("no layout directory configured"))?;
        Ok(store.search(term, max_results)?)
    }
}

/// Default comparison threshold.
pub fn default_compare_threshold() -> f64 {
    SUGGESTION_THRESHOLD
}

pub fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("read {}", path.display()))
}

/// Write `content` to `path`, creating parent directories.
pub fn write_output(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("write {}", path.display()))
}

/// Output file of record `index` inside `dir`: `<layout>_<nnnn>.txt`.
pub fn record_path(dir: &Path, layout: &Layout, index: usize) -> PathBuf {
    dir.join(format!("{}_{:04}.txt", layout.id, index + 1))
}
