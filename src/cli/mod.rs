//! Command-line interface definition.
//!
//! Commands:
//! - Analysis: analyze, structure, stage
//! - Failure traces: locate, report
//! - Graph queries: deps, stats

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "tracelens")]
#[command(about = "Dependency graph and failure-trace locator for Python projects")]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/.tracelens/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace directory holding analysis output
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    // ─── Analysis ─────────────────────────────────────────────────
    /// Traverse the project from its entry file, write its records, then
    /// aggregate and stage the files this run reached
    Analyze {
        /// Entry file relative to the root (overrides config)
        #[arg(short, long)]
        entry: Option<PathBuf>,

        /// Maximum import depth to follow (overrides config)
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,

        /// Remove previous analysis output first. Without it, records from
        /// earlier runs stay on disk and are included by `structure` and `stage`
        #[arg(long)]
        clean: bool,

        /// Skip copying analyzed files into the staging folder
        #[arg(long)]
        no_stage: bool,
    },

    /// Rebuild project_structure.json from persisted records
    Structure,

    /// Copy analyzed files into the staging folder
    Stage,

    // ─── Failure Traces ───────────────────────────────────────────
    /// Print the nearest entity for each frame of a traceback
    Locate {
        /// File containing captured traceback output ("-" for stdin)
        trace: PathBuf,
    },

    /// Write error_report.txt for a traceback
    Report {
        /// File containing captured traceback output ("-" for stdin)
        trace: PathBuf,

        /// Lines of source context around each failing line (overrides config)
        #[arg(long)]
        context_lines: Option<usize>,
    },

    // ─── Graph Queries ────────────────────────────────────────────
    /// Show what a module imports and what imports it
    Deps {
        /// Module path relative to the root, e.g. widgets/MapPlot.py
        path: String,

        /// Follow dependencies transitively
        #[arg(short, long)]
        transitive: bool,
    },

    /// Show graph statistics and import cycles
    Stats,
}

/// Normalize a user-supplied module path to the `./a/b.py` record form.
pub fn record_path(path: &str) -> String {
    let trimmed = path.trim_start_matches("./").replace('\\', "/");
    format!("./{}", trimmed.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_analyze_flags() {
        let cli = Cli::parse_from([
            "tracelens", "analyze", "--entry", "app.py", "-d", "2", "--clean", "--root", "proj",
        ]);
        assert_eq!(cli.root, PathBuf::from("proj"));
        match cli.command {
            Commands::Analyze {
                entry,
                max_depth,
                clean,
                no_stage,
            } => {
                assert_eq!(entry, Some(PathBuf::from("app.py")));
                assert_eq!(max_depth, Some(2));
                assert!(clean);
                assert!(!no_stage);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_deps() {
        let cli = Cli::parse_from(["tracelens", "deps", "widgets/MapPlot.py", "-t"]);
        assert!(matches!(
            cli.command,
            Commands::Deps { ref path, transitive: true } if path == "widgets/MapPlot.py"
        ));
    }

    #[test]
    fn test_record_path() {
        assert_eq!(record_path("widgets/MapPlot.py"), "./widgets/MapPlot.py");
        assert_eq!(record_path("./main.py"), "./main.py");
    }
}
