#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `geoparse`: gazetteer import, document geoparsing, and reverse
//! geocoding from the command line.
//!
//! Logging goes through [`geoparse_cli_utils::init_logger`] so that log
//! lines and progress bars share the terminal.

mod jsonl;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};
use geoparse_cli_utils::IndicatifProgress;
use geoparse_database::{Connection, gazetteer_db};
use geoparse_gazetteer::config::{default_config, load_config};
use geoparse_gazetteer::{DuckDbSource, Gazetteer};
use geoparse_gazetteer_models::LocationRow;
use geoparse_gazetteer_models::config::GeoparseConfig;
use geoparse_matcher::Geoparser;
use geoparse_matcher_models::{Document, DocumentOutcome};

/// Rows written per insert batch during import.
const IMPORT_BATCH_SIZE: usize = 1_000;

#[derive(Parser)]
#[command(name = "geoparse", about = "Gazetteer toponym matching and disambiguation")]
struct Cli {
    /// Gazetteer `DuckDB` file (default: `data/gazetteer.duckdb`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file (default: built-in configuration)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import preprocessed location rows (JSON lines) into a gazetteer table
    Import {
        /// JSONL file of rows, `-` for stdin
        input: PathBuf,
        /// Target table, e.g. `uk_places_point`
        #[arg(long)]
        table: String,
    },
    /// Geoparse documents (JSON lines with `id`, `text`, optional `geotag`)
    Annotate {
        /// JSONL file of documents, `-` for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
        /// Output file for annotations (default: stdout)
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Number of document chunks processed concurrently
        #[arg(long, default_value = "4")]
        concurrency: usize,
    },
    /// List the indexed locations containing each WKT geometry
    Reverse {
        /// WKT geometries, e.g. `"POINT(-1.4 50.9)"`
        #[arg(required = true)]
        wkt: Vec<String>,
    },
    /// Print gazetteer snapshot counts and index fingerprints
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = geoparse_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Import { input, table } => {
            let rows: Vec<LocationRow> = jsonl::read_all(jsonl::open_input(&input)?)?;
            let conn = open_db(cli.db.as_deref())?;

            let progress =
                IndicatifProgress::rows_bar(&multi, &format!("Importing {table}"), rows.len() as u64);
            let mut written = 0;
            for batch in rows.chunks(IMPORT_BATCH_SIZE) {
                written += gazetteer_db::insert_rows(&conn, &table, batch)?;
                progress.advance(batch.len() as u64);
            }
            progress.finish(&format!("Imported {written} rows into {table}"));
            log::info!("Imported {written} rows into {table}");
        }
        Commands::Annotate {
            input,
            output,
            concurrency,
        } => {
            let documents: Vec<Document> = jsonl::read_all(jsonl::open_input(&input)?)?;
            let config = resolve_config(cli.config.as_deref())?;
            let gazetteer = load_gazetteer(cli.db.as_deref(), &config)?;
            let geoparser = Arc::new(Geoparser::new(Arc::new(gazetteer), config));

            let start = Instant::now();
            let count = documents.len();
            let progress = IndicatifProgress::documents_bar(&multi, "Annotating");
            let outcomes = geoparser
                .annotate_batch(documents, concurrency, progress)
                .await?;

            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, DocumentOutcome::Failed { .. }))
                .count();
            for outcome in &outcomes {
                if let DocumentOutcome::Failed { document_id, error } = outcome {
                    log::warn!("[{document_id}] not annotated: {error}");
                }
            }

            let mut out = jsonl::open_output(output.as_deref())?;
            jsonl::write_all(out.as_mut(), &outcomes)?;

            log::info!(
                "Annotated {} of {count} documents in {:.1}s",
                count - failed,
                start.elapsed().as_secs_f64()
            );
        }
        Commands::Reverse { wkt } => {
            let config = resolve_config(cli.config.as_deref())?;
            let gazetteer = load_gazetteer(cli.db.as_deref(), &config)?;
            let geoparser = Geoparser::new(Arc::new(gazetteer), config);

            for query in &wkt {
                let regions = geoparser.reverse_geocode(query)?;
                println!(
                    "{}",
                    serde_json::json!({ "query": query, "regions": regions })
                );
            }
        }
        Commands::Stats => {
            let config = resolve_config(cli.config.as_deref())?;
            let gazetteer = load_gazetteer(cli.db.as_deref(), &config)?;
            println!("{}", serde_json::to_string_pretty(&gazetteer.stats())?);
        }
    }

    Ok(())
}

fn resolve_config(path: Option<&Path>) -> Result<GeoparseConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => load_config(path)?,
        None => default_config(),
    })
}

fn open_db(path: Option<&Path>) -> Result<Connection, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => gazetteer_db::open(path)?,
        None => gazetteer_db::open_default()?,
    })
}

/// Loads every configured focus area. Areas that fail to load are logged
/// and skipped; the remaining ones still make up the snapshot.
fn load_gazetteer(
    db: Option<&Path>,
    config: &GeoparseConfig,
) -> Result<Gazetteer, Box<dyn std::error::Error>> {
    let conn = open_db(db)?;
    let mut source = DuckDbSource::new(&conn);

    let start = Instant::now();
    let (gazetteer, failures) = Gazetteer::load(&mut source, config)?;
    for failure in &failures {
        log::warn!("{failure}");
    }

    let stats = gazetteer.stats();
    log::info!(
        "Gazetteer ready in {:.1}s: {} records, {} ids, {} phrases ({} focus area(s) skipped)",
        start.elapsed().as_secs_f64(),
        stats.records,
        stats.ids,
        stats.phrases,
        failures.len()
    );

    Ok(gazetteer)
}
