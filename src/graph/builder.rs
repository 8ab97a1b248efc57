//! Dependency graph builder: depth-first traversal from an entry file.
//!
//! Each reachable file is read, parsed, extracted and classified once, and its
//! record handed to a [`RecordSink`]. Traversal follows every internal import
//! of a successfully parsed file; a file that fails to parse is a dead end.

use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

use super::tree::{absolute_from_relative, project_relative, DependencyTree};
use super::types::SourceFileRecord;
use crate::config::AnalyzerConfig;
use crate::error::{Result, TraceLensError};
use crate::parser::extract_file;
use crate::resolve::ImportResolver;

/// Destination for records produced during traversal.
pub trait RecordSink {
    fn accept(&mut self, record: SourceFileRecord) -> Result<()>;
}

impl RecordSink for Vec<SourceFileRecord> {
    fn accept(&mut self, record: SourceFileRecord) -> Result<()> {
        self.push(record);
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn accept(&mut self, record: SourceFileRecord) -> Result<()> {
        (**self).accept(record)
    }
}

/// Hands every record to both sinks, first to last.
impl<A: RecordSink, B: RecordSink> RecordSink for (A, B) {
    fn accept(&mut self, record: SourceFileRecord) -> Result<()> {
        self.0.accept(record.clone())?;
        self.1.accept(record)
    }
}

/// Counters reported at the end of a traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraversalSummary {
    /// Files for which a record was produced, including failed ones.
    pub analyzed: usize,
    pub parse_failures: usize,
    /// Imports not followed because the depth limit was exceeded.
    pub depth_limited: usize,
    /// Resolved module paths that no longer exist on disk.
    pub missing_paths: usize,
    /// Imports not followed because of ignore rules.
    pub ignored: usize,
}

impl fmt::Display for TraversalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Analyzed {} files ({} parse failures, {} beyond depth limit, {} missing, {} ignored)",
            self.analyzed, self.parse_failures, self.depth_limited, self.missing_paths, self.ignored
        )
    }
}

/// Mutable state of one traversal.
#[derive(Debug, Default)]
pub struct TraversalContext {
    visited: HashSet<PathBuf>,
    summary: TraversalSummary,
}

impl TraversalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visited(&self, path: &Path) -> bool {
        self.visited.contains(path)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn summary(&self) -> &TraversalSummary {
        &self.summary
    }

    /// Returns false if `path` was already visited.
    fn mark_visited(&mut self, path: &Path) -> bool {
        self.visited.insert(path.to_path_buf())
    }
}

/// Walks a project from its entry file and records every reachable module.
#[derive(Debug, Clone)]
pub struct DependencyGraphBuilder {
    root: PathBuf,
    resolver: ImportResolver,
    config: AnalyzerConfig,
}

impl DependencyGraphBuilder {
    /// Create a builder for the project at `root`.
    ///
    /// The root is canonicalized so every path seen during traversal shares
    /// one prefix.
    pub fn new(root: &Path, config: AnalyzerConfig) -> Result<Self> {
        let root = root.canonicalize().map_err(|e| TraceLensError::io(root, e))?;
        Ok(Self {
            resolver: ImportResolver::new(root.clone()),
            root,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Traverse from `entry` (absolute, or relative to the root).
    pub fn analyze_from_entry<S: RecordSink>(
        &self,
        entry: &Path,
        sink: &mut S,
    ) -> Result<TraversalSummary> {
        let mut ctx = TraversalContext::new();
        self.analyze_with_context(entry, &mut ctx, sink)?;
        Ok(ctx.summary)
    }

    /// Like [`analyze_from_entry`](Self::analyze_from_entry) with caller-owned
    /// state, so the visited set can be inspected afterwards.
    pub fn analyze_with_context<S: RecordSink>(
        &self,
        entry: &Path,
        ctx: &mut TraversalContext,
        sink: &mut S,
    ) -> Result<()> {
        let entry = if entry.is_absolute() {
            entry.to_path_buf()
        } else {
            self.root.join(entry)
        };
        if !entry.is_file() {
            error!(entry = %entry.display(), "entry file does not exist");
            return Err(TraceLensError::EntryNotFound(entry));
        }
        let entry = entry
            .canonicalize()
            .map_err(|e| TraceLensError::io(&entry, e))?;

        info!(root = %self.root.display(), entry = %entry.display(), "starting dependency analysis");
        self.visit(&entry, 0, ctx, sink)?;
        info!("{}", ctx.summary);
        Ok(())
    }

    fn visit<S: RecordSink>(
        &self,
        path: &Path,
        depth: usize,
        ctx: &mut TraversalContext,
        sink: &mut S,
    ) -> Result<()> {
        if self.config.max_depth.is_some_and(|max| depth > max) {
            debug!(file = %path.display(), depth, "max depth reached");
            ctx.summary.depth_limited += 1;
            return Ok(());
        }
        if !ctx.mark_visited(path) {
            debug!(file = %path.display(), "already visited");
            return Ok(());
        }

        let record = self.analyze_file(path);
        let failed = record.is_error();
        let targets = record.internal_dependencies.unique_module_paths();
        sink.accept(record)?;
        ctx.summary.analyzed += 1;

        if failed {
            ctx.summary.parse_failures += 1;
            return Ok(());
        }

        for rel in targets {
            let target = absolute_from_relative(&self.root, &rel);
            if !target.is_file() {
                warn!(module = %target.display(), "module path does not exist");
                ctx.summary.missing_paths += 1;
                continue;
            }
            if self
                .config
                .is_ignored(Path::new(rel.trim_start_matches("./")))
            {
                debug!(module = %rel, "ignored by configuration");
                ctx.summary.ignored += 1;
                continue;
            }
            self.visit(&target, depth + 1, ctx, sink)?;
        }
        Ok(())
    }

    /// Build the record for one file. Unreadable or unparsable files yield a
    /// degraded record carrying the error message.
    fn analyze_file(&self, path: &Path) -> SourceFileRecord {
        let rel = project_relative(&self.root, path).unwrap_or_else(|| path.display().to_string());
        info!(file = %rel, "analyzing");

        let source = match fs::read(path) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(source) => source,
                Err(e) => {
                    error!(file = %rel, error = %e, "source is not valid UTF-8");
                    return SourceFileRecord::failed(rel, format!("invalid UTF-8: {e}"));
                }
            },
            Err(e) => {
                error!(file = %rel, error = %e, "failed to read source");
                return SourceFileRecord::failed(rel, e.to_string());
            }
        };

        let entities = match extract_file(path, &source) {
            Ok(entities) => entities,
            Err(e) => {
                error!(file = %rel, error = %e, "failed to parse");
                let message = match e {
                    TraceLensError::Parse { message, .. } => message,
                    other => other.to_string(),
                };
                return SourceFileRecord::failed(rel, message);
            }
        };

        let imports = self.resolver.classify(&entities.imports);
        SourceFileRecord {
            path: rel,
            internal_dependencies: DependencyTree::from_imports(&self.root, &imports.internal),
            external_dependencies: imports.external,
            classes: entities.classes,
            functions: entities.functions,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn run(dir: &TempDir, config: AnalyzerConfig) -> (Vec<SourceFileRecord>, TraversalSummary) {
        let builder = DependencyGraphBuilder::new(dir.path(), config).unwrap();
        let mut records = Vec::new();
        let summary = builder
            .analyze_from_entry(Path::new("main.py"), &mut records)
            .unwrap();
        (records, summary)
    }

    fn paths(records: &[SourceFileRecord]) -> Vec<&str> {
        records.iter().map(|r| r.path.as_str()).collect()
    }

    #[test]
    fn test_depth_first_order() {
        let dir = project(&[
            ("main.py", "import a\nimport b\n"),
            ("a.py", "import c\n"),
            ("b.py", ""),
            ("c.py", "import os\n"),
        ]);
        let (records, summary) = run(&dir, AnalyzerConfig::default());

        assert_eq!(paths(&records), vec!["./main.py", "./a.py", "./c.py", "./b.py"]);
        assert_eq!(summary.analyzed, 4);
        assert_eq!(records[2].external_dependencies, vec!["os"]);
    }

    #[test]
    fn test_depth_limit() {
        let dir = project(&[
            ("main.py", "import a\n"),
            ("a.py", "import b\n"),
            ("b.py", ""),
        ]);
        let config = AnalyzerConfig {
            max_depth: Some(1),
            ..Default::default()
        };
        let (records, summary) = run(&dir, config);

        assert_eq!(paths(&records), vec!["./main.py", "./a.py"]);
        assert_eq!(summary.depth_limited, 1);
    }

    #[test]
    fn test_parse_failure_is_dead_end() {
        let dir = project(&[
            ("main.py", "import broken\n"),
            ("broken.py", "import helper\ndef oops(:\n"),
            ("helper.py", ""),
        ]);
        let (records, summary) = run(&dir, AnalyzerConfig::default());

        assert_eq!(paths(&records), vec!["./main.py", "./broken.py"]);
        assert!(records[1].is_error());
        assert!(records[1].classes.is_empty());
        assert!(records[1].internal_dependencies.is_empty());
        assert_eq!(summary.parse_failures, 1);
    }

    #[test]
    fn test_invalid_utf8_is_parse_failure() {
        let dir = project(&[("main.py", "import latin\n")]);
        fs::write(dir.path().join("latin.py"), [0x63, 0x61, 0x66, 0xe9, 0x0a]).unwrap();
        let (records, _) = run(&dir, AnalyzerConfig::default());

        assert!(records[1].error.as_deref().unwrap().starts_with("invalid UTF-8"));
    }

    #[test]
    fn test_ignored_files_are_recorded_but_not_followed() {
        let dir = project(&[
            ("main.py", "import tests.fixtures\nimport app\n"),
            ("tests/fixtures.py", ""),
            ("app.py", ""),
        ]);
        let config = AnalyzerConfig {
            ignored_dirs: vec!["tests".into()],
            ..Default::default()
        };
        let (records, summary) = run(&dir, config);

        assert_eq!(paths(&records), vec!["./main.py", "./app.py"]);
        assert_eq!(
            records[0].internal_dependencies.unique_module_paths(),
            vec!["./app.py", "./tests/fixtures.py"]
        );
        assert_eq!(summary.ignored, 1);
    }

    /// Deletes a file once the entry's record arrives, before its imports
    /// are followed.
    struct DeletingSink {
        victim: PathBuf,
        records: Vec<SourceFileRecord>,
    }

    impl RecordSink for DeletingSink {
        fn accept(&mut self, record: SourceFileRecord) -> Result<()> {
            if record.path == "./main.py" {
                fs::remove_file(&self.victim).unwrap();
            }
            self.records.push(record);
            Ok(())
        }
    }

    #[test]
    fn test_vanished_module_is_skipped() {
        let dir = project(&[
            ("main.py", "import a
import b
"),
            ("a.py", ""),
            ("b.py", "import c
"),
            ("c.py", ""),
        ]);
        let builder = DependencyGraphBuilder::new(dir.path(), AnalyzerConfig::default()).unwrap();
        let mut sink = DeletingSink {
            victim: dir.path().join("a.py"),
            records: Vec::new(),
        };
        let summary = builder
            .analyze_from_entry(Path::new("main.py"), &mut sink)
            .unwrap();

        assert_eq!(summary.missing_paths, 1);
        assert_eq!(paths(&sink.records), vec!["./main.py", "./b.py", "./c.py"]);
        assert_eq!(
            sink.records[0].internal_dependencies.unique_module_paths(),
            vec!["./a.py", "./b.py"]
        );
    }

    #[test]
    fn test_paired_sinks_see_the_same_records() {
        let dir = project(&[("main.py", "import a\n"), ("a.py", "")]);
        let builder = DependencyGraphBuilder::new(dir.path(), AnalyzerConfig::default()).unwrap();
        let mut kept = vec![SourceFileRecord {
            path: "./stale.py".into(),
            ..Default::default()
        }];
        let mut fresh = Vec::new();
        builder
            .analyze_from_entry(Path::new("main.py"), &mut (&mut kept, &mut fresh))
            .unwrap();

        assert_eq!(paths(&fresh), vec!["./main.py", "./a.py"]);
        assert_eq!(paths(&kept), vec!["./stale.py", "./main.py", "./a.py"]);
    }

    #[test]
    fn test_missing_entry_is_fatal() {
        let dir = project(&[("other.py", "")]);
        let builder = DependencyGraphBuilder::new(dir.path(), AnalyzerConfig::default()).unwrap();
        let mut records = Vec::new();
        let err = builder
            .analyze_from_entry(Path::new("main.py"), &mut records)
            .unwrap_err();
        assert!(matches!(err, TraceLensError::EntryNotFound(_)));
        assert!(records.is_empty());
    }

    #[test]
    fn test_context_tracks_visited() {
        let dir = project(&[("main.py", "import a\n"), ("a.py", "import main\n")]);
        let builder = DependencyGraphBuilder::new(dir.path(), AnalyzerConfig::default()).unwrap();
        let mut ctx = TraversalContext::new();
        let mut records = Vec::new();
        builder
            .analyze_with_context(Path::new("main.py"), &mut ctx, &mut records)
            .unwrap();

        assert_eq!(ctx.visited_count(), 2);
        assert!(ctx.is_visited(&builder.root().join("a.py")));
        assert_eq!(ctx.summary().analyzed, 2);
    }
}
