//! Per-project workspace layout.
//!
//! ```text
//! <workspace_dir>/<project name>/
//!   dependency_analysis/      one JSON record per analyzed file
//!   actual_code/              staged copy of the analyzed sources
//!   project_structure.json
//!   error_report.txt
//!   project_<YYYY-MM-DD_HH>.log
//! ```

use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Result, TraceLensError};
use crate::graph::tree::absolute_from_relative;
use crate::graph::types::SourceFileRecord;
use crate::storage::RecordStore;

const RECORDS_DIR: &str = "dependency_analysis";
const STAGING_DIR: &str = "actual_code";
const STRUCTURE_FILE: &str = "project_structure.json";
const REPORT_FILE: &str = "error_report.txt";

#[derive(Debug, Clone)]
pub struct Workspace {
    project_root: PathBuf,
    analysis_dir: PathBuf,
}

impl Workspace {
    /// Lay out the workspace for the project at `project_root`. Nothing is
    /// created until [`setup`](Self::setup).
    pub fn new(project_root: &Path, workspace_dir: &Path) -> Result<Self> {
        let project_root = project_root
            .canonicalize()
            .map_err(|e| TraceLensError::io(project_root, e))?;
        let name = project_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        Ok(Self {
            analysis_dir: workspace_dir.join(name),
            project_root,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn analysis_dir(&self) -> &Path {
        &self.analysis_dir
    }

    pub fn records_dir(&self) -> PathBuf {
        self.analysis_dir.join(RECORDS_DIR)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.analysis_dir.join(STAGING_DIR)
    }

    pub fn structure_file(&self) -> PathBuf {
        self.analysis_dir.join(STRUCTURE_FILE)
    }

    pub fn report_file(&self) -> PathBuf {
        self.analysis_dir.join(REPORT_FILE)
    }

    /// Hourly log file for the given time.
    pub fn log_file(&self, now: DateTime<Local>) -> PathBuf {
        self.analysis_dir
            .join(format!("project_{}.log", now.format("%Y-%m-%d_%H")))
    }

    pub fn record_store(&self) -> RecordStore {
        RecordStore::new(self.records_dir())
    }

    /// Create the analysis directories. With `clean`, previous analysis
    /// output for this project is removed first.
    pub fn setup(&self, clean: bool) -> Result<RecordStore> {
        if clean && self.analysis_dir.exists() {
            info!(dir = %self.analysis_dir.display(), "cleaning existing analysis folder");
            fs::remove_dir_all(&self.analysis_dir)
                .map_err(|e| TraceLensError::io(&self.analysis_dir, e))?;
        }
        fs::create_dir_all(&self.analysis_dir)
            .map_err(|e| TraceLensError::io(&self.analysis_dir, e))?;
        debug!(dir = %self.analysis_dir.display(), "analysis folder ready");
        RecordStore::create(self.records_dir())
    }

    /// Copy every analyzed source file into the staging directory, keeping
    /// the project layout. The staging directory is recreated first.
    /// Returns the number of files copied.
    pub fn stage_analyzed_files(&self, records: &[SourceFileRecord]) -> Result<usize> {
        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| TraceLensError::io(&staging, e))?;
        }
        fs::create_dir_all(&staging).map_err(|e| TraceLensError::io(&staging, e))?;

        let mut copied = HashSet::new();
        for record in records {
            if !copied.insert(record.path.as_str()) {
                continue;
            }
            let source = absolute_from_relative(&self.project_root, &record.path);
            if !source.is_file() {
                debug!(file = %record.path, "analyzed file no longer exists, not staged");
                copied.remove(record.path.as_str());
                continue;
            }
            let target = absolute_from_relative(&staging, &record.path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| TraceLensError::io(parent, e))?;
            }
            fs::copy(&source, &target).map_err(|e| TraceLensError::io(&source, e))?;
        }

        info!(count = copied.len(), dir = %staging.display(), "staged analyzed files");
        Ok(copied.len())
    }
}
