//! tracelens CLI - dependency graph and failure-trace locator.
//!
//! Usage:
//!   tracelens analyze                 # Traverse from main.py, write records
//!   tracelens structure               # Re-aggregate project_structure.json
//!   tracelens locate trace.txt        # Nearest entity per traceback frame
//!   tracelens report trace.txt        # Write error_report.txt
//!   tracelens deps widgets/MapPlot.py # Imports and importers of a module
//!   tracelens stats                   # Graph statistics and cycles

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::io::{self, Read};
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use tracelens::cli::{record_path, Cli, Commands};
use tracelens::locate::find_nearest_entity;
use tracelens::report::{ErrorReport, ReportSources};
use tracelens::storage::{read_structure, write_structure};
use tracelens::trace::parse_traceback;
use tracelens::{
    build_structure, AnalyzerConfig, DependencyGraphBuilder, ModuleGraph, ProjectStructure,
    Workspace,
};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let root = cli
        .root
        .canonicalize()
        .with_context(|| format!("project root {} not found", cli.root.display()))?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| AnalyzerConfig::default_path(&root));
    // Logging lives in the workspace named by the config, so a load failure
    // is reported once the subscriber is installed.
    let (mut config, config_failure) = AnalyzerConfig::load_or_default(&config_path);
    if let Some(workspace_dir) = cli.workspace {
        config.workspace_dir = workspace_dir;
    }

    let workspace = Workspace::new(&root, &config.workspace_dir)?;
    let clean = matches!(cli.command, Commands::Analyze { clean: true, .. });
    let store = workspace
        .setup(clean)
        .context("failed to set up the analysis workspace")?;
    init_logging(&workspace)?;
    if let Some(e) = config_failure {
        warn!(config = %config_path.display(), error = %e, "config load failed, using defaults");
    }
    info!(project = %root.display(), analysis = %workspace.analysis_dir().display(), "workspace ready");

    match cli.command {
        Commands::Analyze {
            entry,
            max_depth,
            no_stage,
            ..
        } => {
            if let Some(entry) = entry {
                config.entry = entry;
            }
            if max_depth.is_some() {
                config.max_depth = max_depth;
            }
            let entry = config.entry.clone();

            let builder = DependencyGraphBuilder::new(&root, config)?;
            let mut records = Vec::new();
            let summary = builder.analyze_from_entry(&entry, &mut (store.clone(), &mut records))?;
            println!("{summary}");

            let structure = build_structure(&records);
            write_structure(&workspace.structure_file(), &structure)?;
            println!(
                "Structure: {} modules, {} edges -> {}",
                structure.dependencies_graph.nodes.len(),
                structure.dependencies_graph.edges.len(),
                workspace.structure_file().display()
            );

            if !no_stage {
                let copied = workspace.stage_analyzed_files(&records)?;
                println!("Staged {} files -> {}", copied, workspace.staging_dir().display());
            }
        }

        Commands::Structure => {
            let records = store.load_all()?;
            if records.is_empty() {
                warn!("no records found; run `tracelens analyze` first");
            }
            let structure = build_structure(&records);
            write_structure(&workspace.structure_file(), &structure)?;
            println!(
                "Structure: {} modules, {} edges -> {}",
                structure.dependencies_graph.nodes.len(),
                structure.dependencies_graph.edges.len(),
                workspace.structure_file().display()
            );
        }

        Commands::Stage => {
            let records = store.load_all()?;
            let copied = workspace.stage_analyzed_files(&records)?;
            println!("Staged {} files -> {}", copied, workspace.staging_dir().display());
        }

        Commands::Locate { trace } => {
            let frames = parse_traceback(&read_trace(&trace)?);
            if frames.is_empty() {
                println!("No traceback frames found");
                return Ok(());
            }
            let staging = workspace.staging_dir();
            let bases = [root.as_path(), staging.as_path()];
            for frame in &frames {
                match frame.project_path(&bases) {
                    Some(path) => {
                        let record = store.load(&path).unwrap_or_else(|e| {
                            warn!(file = %path, error = %e, "unreadable analysis record");
                            None
                        });
                        let nearest = find_nearest_entity(record.as_ref(), frame.line);
                        println!("{}:{}  {}", path, frame.line, nearest);
                    }
                    None => println!("{}:{}  (outside project)", frame.file, frame.line),
                }
            }
        }

        Commands::Report {
            trace,
            context_lines,
        } => {
            let frames = parse_traceback(&read_trace(&trace)?);
            let staging = workspace.staging_dir();
            let aliases = [staging.as_path()];
            let sources = ReportSources {
                root: &root,
                aliases: &aliases,
                records: &store,
                context_lines: context_lines.unwrap_or(config.context_lines),
            };
            let report = ErrorReport::build(&frames, &sources);
            report.write(&workspace.report_file())?;
            println!(
                "Report with {} frames -> {}",
                report.frames.len(),
                workspace.report_file().display()
            );
        }

        Commands::Deps { path, transitive } => {
            let graph = load_graph(&workspace, &store)?;
            let path = record_path(&path);
            if !graph.contains(&path) {
                println!("Module '{}' is not in the dependency graph", path);
                return Ok(());
            }

            println!("Module: {}", path);
            println!();
            let imports = if transitive {
                graph.transitive_dependencies(&path)
            } else {
                graph.dependencies(&path)
            };
            print_list(if transitive { "Imports (transitive)" } else { "Imports" }, &imports);
            print_list("Imported by", &graph.dependents(&path));
        }

        Commands::Stats => {
            let graph = load_graph(&workspace, &store)?;
            let stats = graph.stats();
            println!("tracelens - Graph Statistics");
            println!("════════════════════════════");
            println!("Modules:      {}", stats.modules);
            println!("Edges:        {} ({} unique)", stats.edges, stats.unique_edges);
            println!("Roots:        {}", stats.roots);
            println!("Leaves:       {}", stats.leaves);
            println!("Cycles:       {}", stats.cycles);
            for cycle in graph.cycles() {
                println!("  {}", cycle.join(" <-> "));
            }
        }
    }

    Ok(())
}

/// stderr output filtered by `RUST_LOG` (default `info`), plus a debug-level
/// hourly log file in the analysis folder.
fn init_logging(workspace: &Workspace) -> Result<()> {
    let log_path = workspace.log_file(Local::now());
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file))
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
    Ok(())
}

fn read_trace(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .context("failed to read traceback from stdin")?;
        return Ok(text);
    }
    fs::read_to_string(path).with_context(|| format!("failed to read traceback {}", path.display()))
}

/// The consolidated structure file, or a fresh aggregation when it is absent.
fn load_graph(workspace: &Workspace, store: &tracelens::RecordStore) -> Result<ModuleGraph> {
    let structure_file = workspace.structure_file();
    let structure: ProjectStructure = if structure_file.is_file() {
        read_structure(&structure_file)?
    } else {
        build_structure(&store.load_all()?)
    };
    Ok(ModuleGraph::from_dependency_graph(&structure.dependencies_graph))
}

fn print_list(title: &str, items: &[String]) {
    println!("{} ({}):", title, items.len());
    for item in items {
        println!("  {}", item);
    }
    println!();
}
