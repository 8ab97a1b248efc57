//! On-disk persistence for per-file records and the consolidated structure.
//!
//! Records live under one directory and mirror the project layout:
//! `./pkg/mod.py` is stored as `pkg/mod.json`.

use ignore::WalkBuilder;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Result, TraceLensError};
use crate::graph::builder::RecordSink;
use crate::graph::types::{ProjectStructure, SourceFileRecord};

/// Directory of persisted [`SourceFileRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordStore {
    dir: PathBuf,
}

impl RecordStore {
    /// Open a store without touching the filesystem.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Open a store, creating its directory.
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| TraceLensError::io(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the record for a project-relative source path is stored.
    pub fn record_file(&self, rel_path: &str) -> PathBuf {
        let trimmed = rel_path.strip_prefix("./").unwrap_or(rel_path);
        trimmed
            .split('/')
            .filter(|p| !p.is_empty())
            .fold(self.dir.clone(), |acc, p| acc.join(p))
            .with_extension("json")
    }

    /// Write one record, replacing any previous version.
    pub fn save(&self, record: &SourceFileRecord) -> Result<PathBuf> {
        let file = self.record_file(&record.path);
        write_json(&file, record)?;
        debug!(record = %file.display(), "record saved");
        Ok(file)
    }

    /// Load the record for `rel_path`. `Ok(None)` if none was persisted.
    pub fn load(&self, rel_path: &str) -> Result<Option<SourceFileRecord>> {
        let file = self.record_file(rel_path);
        if !file.is_file() {
            return Ok(None);
        }
        read_json(&file).map(Some)
    }

    /// Every record in the store, ordered by record file path.
    /// Unreadable records are logged and skipped.
    pub fn load_all(&self) -> Result<Vec<SourceFileRecord>> {
        if !self.dir.is_dir() {
            debug!(dir = %self.dir.display(), "record directory does not exist");
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = WalkBuilder::new(&self.dir)
            .standard_filters(false)
            .build()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .map(|entry| entry.into_path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut records = Vec::with_capacity(files.len());
        for file in files {
            match read_json::<SourceFileRecord>(&file) {
                Ok(record) => records.push(record),
                Err(e) => warn!(record = %file.display(), error = %e, "skipping unreadable record"),
            }
        }
        Ok(records)
    }
}

impl RecordSink for RecordStore {
    fn accept(&mut self, record: SourceFileRecord) -> Result<()> {
        self.save(&record).map(|_| ())
    }
}

/// Write the consolidated structure document.
pub fn write_structure(path: &Path, structure: &ProjectStructure) -> Result<()> {
    write_json(path, structure)
}

pub fn read_structure(path: &Path) -> Result<ProjectStructure> {
    read_json(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TraceLensError::io(parent, e))?;
    }
    let mut json = serde_json::to_string_pretty(value).map_err(|e| TraceLensError::json(path, e))?;
    json.push('\n');
    fs::write(path, json).map_err(|e| TraceLensError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| TraceLensError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| TraceLensError::json(path, e))
}
