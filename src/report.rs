//! Diagnostic report for a failure trace.
//!
//! Each trace frame inside the project gets a source excerpt around the
//! failing line and the nearest declared entity from the persisted records.
//! Frames outside the project are listed without details.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Result, TraceLensError};
use crate::graph::tree::absolute_from_relative;
use crate::locate::{find_nearest_entity, EntityMatch, ErrorLocation};
use crate::storage::RecordStore;

/// Details for a frame that maps into the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameDetails {
    /// Project-relative path of the frame's file.
    pub path: String,
    /// Numbered excerpt lines; the failing line is marked `>>`.
    pub excerpt: Vec<String>,
    pub nearest: EntityMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    pub location: ErrorLocation,
    pub details: Option<FrameDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorReport {
    pub frames: Vec<FrameReport>,
}

/// Where report inputs come from.
pub struct ReportSources<'a> {
    /// Project root; source excerpts are read from here.
    pub root: &'a Path,
    /// Extra directories trace paths may point into, such as a staged copy.
    pub aliases: &'a [&'a Path],
    pub records: &'a RecordStore,
    /// Lines of context on each side of the failing line.
    pub context_lines: usize,
}

impl ErrorReport {
    pub fn build(locations: &[ErrorLocation], sources: &ReportSources<'_>) -> Self {
        let mut bases: Vec<&Path> = vec![sources.root];
        bases.extend_from_slice(sources.aliases);

        let frames = locations
            .iter()
            .map(|location| FrameReport {
                location: location.clone(),
                details: location
                    .project_path(&bases)
                    .map(|path| frame_details(path, location.line, sources)),
            })
            .collect();
        Self { frames }
    }

    pub fn render(&self) -> String {
        let mut out = String::from("=== Error Report ===\n\nTraceback files and lines:\n");
        for frame in &self.frames {
            let _ = writeln!(out, "{}", frame.location);
            if let Some(details) = &frame.details {
                out.push_str("\nCode Excerpt around error:\n");
                for line in &details.excerpt {
                    let _ = writeln!(out, "{line}");
                }
                let _ = write!(out, "\nNearest Entity: {}\n\n", details.nearest);
            }
        }
        out.push_str("=== End of Report ===\n");
        out
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| TraceLensError::io(parent, e))?;
        }
        fs::write(path, self.render()).map_err(|e| TraceLensError::io(path, e))?;
        info!(report = %path.display(), frames = self.frames.len(), "error report written");
        Ok(())
    }
}

fn frame_details(path: String, line: usize, sources: &ReportSources<'_>) -> FrameDetails {
    let file = absolute_from_relative(sources.root, &path);
    let excerpt = match fs::read_to_string(&file) {
        Ok(source) => code_excerpt(&source, line, sources.context_lines),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "cannot read source for excerpt");
            Vec::new()
        }
    };

    let record = match sources.records.load(&path) {
        Ok(Some(record)) => Some(record),
        Ok(None) => {
            warn!(file = %path, "no analysis record found");
            None
        }
        Err(e) => {
            warn!(file = %path, error = %e, "unreadable analysis record");
            None
        }
    };

    FrameDetails {
        nearest: find_nearest_entity(record.as_ref(), line),
        path,
        excerpt,
    }
}

/// Numbered lines around `line` (1-based), `context` on each side.
pub fn code_excerpt(source: &str, line: usize, context: usize) -> Vec<String> {
    let lines: Vec<&str> = source.lines().collect();
    let start = line.saturating_sub(context + 1);
    let end = lines.len().min(line + context);

    (start..end)
        .map(|i| {
            let marker = if i + 1 == line { ">> " } else { "   " };
            format!("{marker}{}: {}", i + 1, lines[i])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{ClassInfo, EntityKind, FunctionInfo, SourceFileRecord};
    use tempfile::TempDir;

    #[test]
    fn test_code_excerpt_marks_line() {
        let source = (1..=20).map(|i| format!("line{i}")).collect::<Vec<_>>().join("\n");
        let excerpt = code_excerpt(&source, 10, 2);
        assert_eq!(
            excerpt,
            vec![
                "   8: line8",
                "   9: line9",
                ">> 10: line10",
                "   11: line11",
                "   12: line12",
            ]
        );
    }

    #[test]
    fn test_code_excerpt_clamps_at_edges() {
        let excerpt = code_excerpt("a\nb\nc\n", 1, 5);
        assert_eq!(excerpt, vec![">> 1: a", "   2: b", "   3: c"]);
        assert!(code_excerpt("a\n", 9, 2).is_empty());
    }

    #[test]
    fn test_report_for_project_and_external_frames() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("proj");
        fs::create_dir_all(&root).unwrap();
        let body: String = (1..=8).map(|i| format!("# {i}\n")).collect();
        fs::write(root.join("app.py"), body).unwrap();

        let store = RecordStore::create(dir.path().join("records")).unwrap();
        let mut record = SourceFileRecord {
            path: "./app.py".into(),
            ..Default::default()
        };
        let mut class = ClassInfo::new("App".into(), 2, 8);
        class.methods.insert(
            "run".into(),
            FunctionInfo::new("run".into(), EntityKind::Method, 3, 5),
        );
        record.classes.insert("App".into(), class);
        store.save(&record).unwrap();

        let locations = vec![
            ErrorLocation::new(root.join("app.py").display().to_string(), 4),
            ErrorLocation::new("/usr/lib/python3/json/decoder.py", 337),
        ];
        let sources = ReportSources {
            root: &root,
            aliases: &[],
            records: &store,
            context_lines: 1,
        };
        let report = ErrorReport::build(&locations, &sources);

        let details = report.frames[0].details.as_ref().unwrap();
        assert_eq!(details.path, "./app.py");
        assert_eq!(details.excerpt, vec!["   3: # 3", ">> 4: # 4", "   5: # 5"]);
        assert_eq!(details.nearest.to_string(), "Method run of class App");
        assert!(report.frames[1].details.is_none());

        let text = report.render();
        assert!(text.starts_with("=== Error Report ===\n\nTraceback files and lines:\n"));
        assert!(text.contains("\nCode Excerpt around error:\n   3: # 3\n>> 4: # 4\n   5: # 5\n"));
        assert!(text.contains("Nearest Entity: Method run of class App\n\n"));
        assert!(text.contains("File: /usr/lib/python3/json/decoder.py, Line: 337\n"));
        assert!(text.ends_with("=== End of Report ===\n"));
    }

    #[test]
    fn test_missing_record_reports_no_entity() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "x = 1\n").unwrap();
        let store = RecordStore::new(dir.path().join("records"));
        let sources = ReportSources {
            root: dir.path(),
            aliases: &[],
            records: &store,
            context_lines: 5,
        };
        let report = ErrorReport::build(&[ErrorLocation::new("main.py", 1)], &sources);

        let details = report.frames[0].details.as_ref().unwrap();
        assert_eq!(details.nearest, EntityMatch::NotFound);
        assert_eq!(details.excerpt, vec![">> 1: x = 1"]);

        let out = dir.path().join("out").join("error_report.txt");
        report.write(&out).unwrap();
        assert!(fs::read_to_string(out).unwrap().contains("No nearby entity found"));
    }
}
