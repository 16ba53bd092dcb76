//! Agreement CLI: import annotations, run analyses, export results.
//!
//! Usage:
//!   agreement import <system> <nodes.jsonl> [--db path]
//!   agreement run <config> [--db path] [--analysis-id id]
//!   agreement export <analysis-id> [--output file] [--db path]
//!   agreement summary <analysis-id> [--db path]

use agreement::evaluation::write_csv;
use agreement::{
    AnalysisConfig, AnalysisRunner, AnnotationNode, HitMissPolicy, LocationPropagator, OpenStore,
    ResultSink, RunOptions, SqliteStore, StatusSink,
};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "agreement",
    version,
    about = "Span-aware agreement evaluation between annotation systems"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Path to SQLite database file
    #[arg(long, global = true)]
    db: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one system's nodes from a JSON-lines file
    Import {
        /// System the nodes belong to
        system: String,
        /// One JSON node per line
        path: PathBuf,
    },
    /// Run an analysis from a JSON or YAML configuration
    Run {
        config: PathBuf,
        /// Id for the run (generated when omitted)
        #[arg(long)]
        analysis_id: Option<String>,
        /// Skip failing documents instead of aborting
        #[arg(long)]
        isolate_failures: bool,
        /// In hit/miss mode, count unmatched hypothesis nodes with no reference node on their span as misses
        #[arg(long)]
        count_unlocated: bool,
    },
    /// Write a run's match records as CSV
    Export {
        analysis_id: String,
        /// Output file (stdout when omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Print a run's summary and status as JSON
    Summary { analysis_id: String },
}

/// Get the default database path (~/.local/share/agreement/agreement.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let agreement_dir = data_dir.join("agreement");
    std::fs::create_dir_all(&agreement_dir).ok();
    agreement_dir.join("agreement.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

fn cmd_import(store: &SqliteStore, system: &str, path: &Path) -> Result<(), String> {
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;

    let mut documents: BTreeMap<String, Vec<AnnotationNode>> = BTreeMap::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| e.to_string())?;
        if line.trim().is_empty() {
            continue;
        }
        let node: AnnotationNode = serde_json::from_str(&line)
            .map_err(|e| format!("{}:{}: {}", path.display(), line_no + 1, e))?;
        documents.entry(node.document_id.clone()).or_default().push(node);
    }

    let mut total = 0;
    for (document_id, mut nodes) in documents {
        let located = LocationPropagator::from_nodes(&nodes).assign(&mut nodes);
        let saved = store
            .save_nodes(system, &nodes)
            .map_err(|e| format!("Failed to save {}: {}", document_id, e))?;
        info!(system, document = %document_id, nodes = saved, located, "imported document");
        total += saved;
    }

    println!("Imported {} nodes into '{}'", total, system);
    Ok(())
}

fn cmd_run(
    db: Option<PathBuf>,
    config_path: &Path,
    analysis_id: Option<String>,
    options: RunOptions,
) -> Result<(), String> {
    // Validate before touching the database
    let config = AnalysisConfig::load(config_path).map_err(|e| e.to_string())?;
    let analysis_id = analysis_id.unwrap_or_else(AnalysisRunner::new_analysis_id);

    let store = Arc::new(open_store(db)?);
    let runner =
        AnalysisRunner::new(store.clone(), store.clone(), store).with_options(options);
    let summary = runner.run(&analysis_id, &config).map_err(|e| e.to_string())?;

    let json = serde_json::to_string_pretty(&summary).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn cmd_export(store: &SqliteStore, analysis_id: &str, output: Option<PathBuf>) -> Result<(), String> {
    let records = store.load_records(analysis_id).map_err(|e| e.to_string())?;

    let rows = match output {
        Some(path) => {
            let file = File::create(&path)
                .map_err(|e| format!("Failed to create {}: {}", path.display(), e))?;
            write_csv(&records, BufWriter::new(file))
        }
        None => write_csv(&records, std::io::stdout().lock()),
    }
    .map_err(|e| e.to_string())?;

    info!(analysis_id, rows, "exported match records");
    Ok(())
}

fn cmd_summary(store: &SqliteStore, analysis_id: &str) -> Result<(), String> {
    let summary = store.load_summary(analysis_id).map_err(|e| e.to_string())?;
    let status = store.load_status(analysis_id).map_err(|e| e.to_string())?;

    if summary.is_none() && status.is_none() {
        return Err(format!("analysis '{}' not found", analysis_id));
    }

    let report = serde_json::json!({ "summary": summary, "status": status });
    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            analysis_id,
            isolate_failures,
            count_unlocated,
        } => {
            let options = RunOptions {
                hit_miss_policy: if count_unlocated {
                    HitMissPolicy::CountAsMiss
                } else {
                    HitMissPolicy::DropUnlocated
                },
                isolate_document_failures: isolate_failures,
                ..RunOptions::default()
            };
            cmd_run(cli.db, &config, analysis_id, options)
        }
        Commands::Import { system, path } => {
            open_store(cli.db).and_then(|store| cmd_import(&store, &system, &path))
        }
        Commands::Export {
            analysis_id,
            output,
        } => open_store(cli.db).and_then(|store| cmd_export(&store, &analysis_id, output)),
        Commands::Summary { analysis_id } => {
            open_store(cli.db).and_then(|store| cmd_summary(&store, &analysis_id))
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
