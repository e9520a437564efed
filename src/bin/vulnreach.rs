//! vulnreach CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vulnreach::catalog::VulnIndex;
use vulnreach::driver;
use vulnreach::error::VulnreachError;
use vulnreach::graph::{LoadError, LoaderErrorKind, PackageGraph};
use vulnreach::modules;
use vulnreach::osv::client::{db_sources, CancelToken, DirClient};
use vulnreach::osv::platform::Platform;

/// Reports reference paths leading to known-vulnerable symbols in
/// dependencies of a loaded package graph.
#[derive(Parser)]
#[command(name = "vulnreach")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a package graph and report reachable vulnerable symbols.
    Analyze {
        /// Package graph JSON produced by the language front end
        #[arg(long)]
        graph: PathBuf,

        /// Pre-fetched vulnerability index (package path -> OSV entries);
        /// skips the database entirely
        #[arg(long, value_name = "FILE")]
        vulns_json: Option<PathBuf>,

        /// Vulnerability database location (default: GOVULNDB)
        #[arg(long)]
        db: Option<String>,
    },

    /// Fetch and filter the catalog for a package graph, writing the
    /// package-to-entries JSON index to stdout.
    Dump {
        /// Package graph JSON produced by the language front end
        #[arg(long)]
        graph: PathBuf,

        /// Vulnerability database location (default: GOVULNDB)
        #[arg(long)]
        db: Option<String>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(target: "vulnreach", "{err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), VulnreachError> {
    match cli.command {
        Commands::Analyze {
            graph,
            vulns_json,
            db,
        } => {
            let graph = load_graph(&graph)?;
            let index = match vulns_json {
                Some(path) => VulnIndex::from_json_path(&path)?,
                None => fetch_index(&graph, db)?,
            };
            if index.is_empty() {
                tracing::info!(target: "vulnreach", "zero vulnerability found");
                return Ok(());
            }
            let report = driver::analyze_graph(&graph, &index)?;
            for (pkg, diag) in &report.diagnostics {
                println!("{pkg}: {} {} {}", diag.pos, diag.category, diag.message);
            }
            if report.diagnostics.is_empty() {
                tracing::info!(target: "vulnreach", "no vulnerabilities found");
            }
            for row in report.summary() {
                println!(
                    "{}\t{}\t({} paths)\n\t{}",
                    row.category,
                    row.root,
                    row.count,
                    row.trace.join("\n\t")
                );
            }
            Ok(())
        }
        Commands::Dump { graph, db } => {
            let graph = load_graph(&graph)?;
            let index = fetch_index(&graph, db)?;
            index.write_json(std::io::stdout().lock())?;
            Ok(())
        }
    }
}

/// Loads the package graph, tolerating parse and type errors and refusing
/// anything worse.
fn load_graph(path: &PathBuf) -> Result<PackageGraph, VulnreachError> {
    let graph = PackageGraph::from_path(path)?;
    let fatal = graph.fatal_errors();
    if !fatal.is_empty() {
        return Err(LoadError::Loader(
            fatal
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; "),
        )
        .into());
    }
    for err in &graph.errors {
        if matches!(err.kind, LoaderErrorKind::Parse | LoaderErrorKind::Type) {
            tracing::warn!(
                target: "vulnreach",
                "continuing past loader error: {}",
                err.message
            );
        }
    }
    Ok(graph)
}

/// Builds the vulnerability index by querying the configured database.
fn fetch_index(graph: &PackageGraph, db: Option<String>) -> Result<VulnIndex, VulnreachError> {
    let sources = match db {
        Some(source) => vec![source],
        None => db_sources(),
    };
    let client = DirClient::from_sources(&sources)?;
    let token = CancelToken::new();
    let platform = Platform::detect();
    let tag = modules::toolchain_version();
    Ok(VulnIndex::fetch(&token, &client, graph, &platform, &tag)?)
}
