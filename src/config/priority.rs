//! Priority table for ranking crawl candidates
//!
//! The table is an ordered list of (keyword substring, weight) pairs. A link's
//! score is the weight of the first keyword found in it, so earlier entries win
//! over later ones. Tables are plain data: they can live inline in the main
//! config, in a standalone TOML file, or fall back to the built-in defaults.

use crate::ConfigError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A single keyword and the weight it contributes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriorityEntry {
    pub keyword: String,
    pub weight: u32,
}

impl PriorityEntry {
    pub fn new(keyword: &str, weight: u32) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            weight,
        }
    }
}

/// Standalone priority table file layout
#[derive(Debug, Deserialize)]
struct PriorityFile {
    priority: Vec<PriorityEntry>,
}

/// Ordered keyword → weight table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityTable {
    entries: Vec<PriorityEntry>,
}

/// Built-in table tuned toward pages describing a local business
const DEFAULT_PRIORITIES: &[(&str, u32)] = &[
    ("about", 10),
    ("ueber-uns", 10),
    ("uber-uns", 10),
    ("a-propos", 10),
    ("quienes-somos", 10),
    ("chi-siamo", 10),
    ("contact", 9),
    ("kontakt", 9),
    ("contacto", 9),
    ("contatti", 9),
    ("menu", 8),
    ("speisekarte", 8),
    ("carta", 8),
    ("services", 8),
    ("leistungen", 8),
    ("servicios", 8),
    ("team", 7),
    ("staff", 7),
    ("hours", 7),
    ("oeffnungszeiten", 7),
    ("horaires", 7),
    ("horario", 7),
    ("reviews", 6),
    ("testimonials", 6),
    ("bewertungen", 6),
    ("avis", 6),
    ("prices", 5),
    ("preise", 5),
    ("tarifs", 5),
    ("booking", 5),
    ("reservation", 5),
    ("gallery", 3),
    ("history", 3),
    ("location", 3),
];

impl PriorityTable {
    /// Builds a table from entries, lowercasing keywords
    pub fn new(entries: Vec<PriorityEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| PriorityEntry::new(&e.keyword, e.weight))
            .collect();
        Self { entries }
    }

    /// Returns the built-in multilingual table
    pub fn builtin() -> Self {
        Self::new(
            DEFAULT_PRIORITIES
                .iter()
                .map(|(keyword, weight)| PriorityEntry::new(keyword, *weight))
                .collect(),
        )
    }

    /// Loads a table from a TOML file containing `[[priority]]` entries
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let file: PriorityFile = toml::from_str(&content)?;
        if file.priority.is_empty() {
            return Err(ConfigError::Validation(format!(
                "priority table '{}' has no entries",
                path.display()
            )));
        }
        Ok(Self::new(file.priority))
    }

    /// Scores a URL: weight of the first matching keyword, else 0
    pub fn score(&self, url: &str) -> u32 {
        let lowered = url.to_lowercase();
        self.entries
            .iter()
            .find(|entry| lowered.contains(&entry.keyword))
            .map(|entry| entry.weight)
            .unwrap_or(0)
    }

    pub fn entries(&self) -> &[PriorityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for PriorityTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Where a cached priority table comes from
#[derive(Debug, Clone)]
pub enum PrioritySource {
    Builtin,
    Inline(Vec<PriorityEntry>),
    File(PathBuf),
}

/// Loads the priority table once and hands out shared copies until invalidated
///
/// The owner (the pipeline context) decides when a reload is due, for example
/// after an operator edits the table file.
#[derive(Debug)]
pub struct PriorityTableCache {
    source: PrioritySource,
    cached: RwLock<Option<Arc<PriorityTable>>>,
}

impl PriorityTableCache {
    pub fn new(source: PrioritySource) -> Self {
        Self {
            source,
            cached: RwLock::new(None),
        }
    }

    /// Picks the source from a loaded config: file, then inline, then built-in
    pub fn from_config(config: &crate::config::Config) -> Self {
        let source = if let Some(path) = &config.priority_table {
            PrioritySource::File(path.clone())
        } else if !config.priority.is_empty() {
            PrioritySource::Inline(config.priority.clone())
        } else {
            PrioritySource::Builtin
        };
        Self::new(source)
    }

    /// Returns the cached table, loading it on first use
    pub fn get(&self) -> Result<Arc<PriorityTable>, ConfigError> {
        if let Ok(guard) = self.cached.read() {
            if let Some(table) = guard.as_ref() {
                return Ok(Arc::clone(table));
            }
        }

        let table = Arc::new(self.load_from_source()?);
        let mut guard = self
            .cached
            .write()
            .map_err(|_| ConfigError::Validation("priority cache lock poisoned".to_string()))?;
        *guard = Some(Arc::clone(&table));
        tracing::debug!("Loaded priority table with {} entries", table.len());
        Ok(table)
    }

    /// Drops the cached table; the next `get` reloads from the source
    pub fn invalidate(&self) {
        if let Ok(mut guard) = self.cached.write() {
            *guard = None;
        }
    }

    fn load_from_source(&self) -> Result<PriorityTable, ConfigError> {
        match &self.source {
            PrioritySource::Builtin => Ok(PriorityTable::builtin()),
            PrioritySource::Inline(entries) => Ok(PriorityTable::new(entries.clone())),
            PrioritySource::File(path) => PriorityTable::load(path),
        }
    }
}
