//! Conflux CLI — entity resolution and scored-association engine.
//!
//! Usage:
//!   conflux ingest <file.json> [--db path]
//!   conflux link [--config file.yaml] [--limit n] [--delay-ms n] [--db path]
//!   conflux partners <file.yaml> [--db path]
//!   conflux export [--source s] [--status s] [--page n] [--limit n] [--format csv|json] [--db path]

use clap::{Parser, Subcommand, ValueEnum};
use conflux::ingest::link::{run_link_batch, LinkConfig};
use conflux::ingest::partners::{run_partner_import, PartnerSpec};
use conflux::{
    export_services, ingest_batch, to_csv, IngestRequest, OpenStore, ServiceFilter, SqliteStore,
    VerificationStatus,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "conflux",
    version,
    about = "Entity resolution and scored-association engine"
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
    /// Ingest a JSON file of records (one object or an array)
    Ingest {
        /// Path to the JSON payload
        file: PathBuf,
    },
    /// Link unlinked narrative items to catalog targets
    Link {
        /// Optional YAML file overriding scorer, classifier and rating scale
        #[arg(long)]
        config: Option<PathBuf>,
        /// Max items this run
        #[arg(long)]
        limit: Option<usize>,
        /// Pause between items in milliseconds (0 disables)
        #[arg(long)]
        delay_ms: Option<u64>,
    },
    /// Import a declarative facility-partnership list (YAML)
    Partners {
        /// Path to the YAML list
        file: PathBuf,
    },
    /// Export services as JSON or CSV
    Export {
        /// Filter by ingesting source system
        #[arg(long)]
        source: Option<String>,
        /// Filter by verification status (pending/verified/unverified)
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 100)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

/// Get the default database path (~/.local/share/conflux/conflux.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    let conflux_dir = data_dir.join("conflux");
    std::fs::create_dir_all(&conflux_dir).ok();
    conflux_dir.join("conflux.db")
}

fn open_store(db: Option<PathBuf>) -> Result<SqliteStore, String> {
    let db_path = db.unwrap_or_else(default_db_path);
    SqliteStore::open(&db_path).map_err(|e| format!("Failed to open database: {}", e))
}

/// Accepts either a single request object or an array of them.
fn read_requests(file: &PathBuf) -> Result<Vec<IngestRequest>, String> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read '{}': {}", file.display(), e))?;
    if let Ok(batch) = serde_json::from_str::<Vec<IngestRequest>>(&text) {
        return Ok(batch);
    }
    serde_json::from_str::<IngestRequest>(&text)
        .map(|one| vec![one])
        .map_err(|e| format!("cannot parse '{}': {}", file.display(), e))
}

fn cmd_ingest(store: &SqliteStore, file: &PathBuf) -> i32 {
    let requests = match read_requests(file) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    let summary = ingest_batch(store, &requests);
    println!(
        "Ingested {} records: {} created, {} updated, {} skipped, {} failed",
        requests.len(),
        summary.created,
        summary.updated,
        summary.skipped,
        summary.failed
    );
    i32::from(summary.failed > 0)
}

async fn cmd_link(
    store: &SqliteStore,
    config: Option<PathBuf>,
    limit: Option<usize>,
    delay_ms: Option<u64>,
) -> i32 {
    let mut link_config = match config {
        Some(path) => {
            let text = match std::fs::read_to_string(&path) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error: cannot read '{}': {}", path.display(), e);
                    return 1;
                }
            };
            match serde_yaml::from_str::<LinkConfig>(&text) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error: cannot parse '{}': {}", path.display(), e);
                    return 1;
                }
            }
        }
        None => LinkConfig::default(),
    };
    if let Some(limit) = limit {
        link_config.batch_limit = limit;
    }
    if let Some(delay_ms) = delay_ms {
        link_config.delay_ms = delay_ms;
    }

    match run_link_batch(store, &link_config).await {
        Ok(summary) => {
            println!(
                "Link batch: {} linked, {} ratings updated, {} skipped, {} failed",
                summary.created, summary.updated, summary.skipped, summary.failed
            );
            i32::from(summary.failed > 0)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_partners(store: &SqliteStore, file: &PathBuf) -> i32 {
    let text = match std::fs::read_to_string(file) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: cannot read '{}': {}", file.display(), e);
            return 1;
        }
    };
    let specs: Vec<PartnerSpec> = match serde_yaml::from_str(&text) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: cannot parse '{}': {}", file.display(), e);
            return 1;
        }
    };
    match run_partner_import(store, &conflux::RuleTable::default(), &specs) {
        Ok(summary) => {
            println!(
                "Partner import: {} created, {} skipped, {} failed",
                summary.created, summary.skipped, summary.failed
            );
            i32::from(summary.failed > 0)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_export(
    store: &SqliteStore,
    source: Option<String>,
    status: Option<String>,
    page: usize,
    limit: usize,
    format: Format,
) -> i32 {
    let mut filter = ServiceFilter::new().with_page(page).with_limit(limit);
    if let Some(source) = source {
        filter = filter.with_source(source);
    }
    if let Some(status) = status {
        match VerificationStatus::parse(&status) {
            Some(status) => filter = filter.with_status(status),
            None => {
                eprintln!("Error: unknown status '{}' (expected pending/verified/unverified)", status);
                return 1;
            }
        }
    }

    let export = match export_services(store, &filter) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    match format {
        Format::Csv => print!("{}", to_csv(&export)),
        Format::Json => match serde_json::to_string_pretty(&export) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
    }
    0
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("conflux=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = match open_store(cli.db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Ingest { file } => cmd_ingest(&store, &file),
        Commands::Link { config, limit, delay_ms } => cmd_link(&store, config, limit, delay_ms).await,
        Commands::Partners { file } => cmd_partners(&store, &file),
        Commands::Export { source, status, page, limit, format } => {
            cmd_export(&store, source, status, page, limit, format)
        }
    };
    std::process::exit(code);
}
