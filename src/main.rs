// deddiag-loader - print dataset stats or export labelled measurements
//
// Connection settings come from flags or DEDDIAG_DB_* variables.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use deddiag_loader::{
    export,
    report::{self, Formatter, LatexFormatter, PlainFormatter},
    Connection, DbConfig, Query, QueryCache,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "deddiag-loader", version, about = "Loader for the DEDDIAG dataset")]
struct Cli {
    #[command(flatten)]
    db: DbArgs,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "DEDDIAG_DB_HOST", default_value = "localhost", global = true)]
    host: String,

    #[arg(long, env = "DEDDIAG_DB_NAME", default_value = "postgres", global = true)]
    db: String,

    #[arg(long, env = "DEDDIAG_DB_PORT", default_value_t = 5432, global = true)]
    port: u16,

    #[arg(long, env = "DEDDIAG_DB_USER", default_value = "postgres", global = true)]
    username: String,

    #[arg(long, env = "DEDDIAG_DB_PW", default_value = "", hide_env_values = true, global = true)]
    password: String,
}

impl DbArgs {
    fn config(&self) -> DbConfig {
        DbConfig::new(&self.host, self.port, &self.db, &self.username, &self.password)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Print dataset stats
    Stats {
        /// Cache query results in this directory
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Include missing-data ratios per item
        #[arg(long)]
        missing: bool,

        /// Print a LaTeX tabular instead of plain text
        #[arg(long)]
        latex: bool,
    },
    /// Export data to numpy array
    Save {
        #[arg(long)]
        item_id: i32,

        /// Only count these labels (repeatable)
        #[arg(long = "label-id")]
        label_ids: Vec<i32>,

        #[arg(long, value_parser = parse_datetime)]
        start_date: NaiveDateTime,

        #[arg(long, value_parser = parse_datetime)]
        stop_date: NaiveDateTime,

        /// Output prefix, `_measurement_with_labels.npy` is appended
        file_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;

    let con = Connection::new(&cli.db.config())?;

    let outcome = match cli.command {
        Command::Stats {
            cache_dir,
            missing,
            latex,
        } => handle_stats(&con, cache_dir, missing, latex).await,
        Command::Save {
            item_id,
            label_ids,
            start_date,
            stop_date,
            file_name,
        } => handle_save(&con, item_id, label_ids, start_date, stop_date, &file_name).await,
    };

    con.close().await;
    outcome
}

async fn handle_stats(
    con: &Connection,
    cache_dir: Option<PathBuf>,
    missing: bool,
    latex: bool,
) -> Result<()> {
    let cache = cache_dir.map(QueryCache::new);
    let report = report::build(con, cache.as_ref(), missing)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if latex {
        LatexFormatter::default().print(&report);
    } else {
        PlainFormatter.print(&report);
    }
    Ok(())
}

async fn handle_save(
    con: &Connection,
    item_id: i32,
    label_ids: Vec<i32>,
    start_date: NaiveDateTime,
    stop_date: NaiveDateTime,
    file_name: &str,
) -> Result<()> {
    let labels = if label_ids.is_empty() { None } else { Some(label_ids) };
    let measurements = Query::measurements_expanded_with_labels(item_id, labels, start_date, stop_date)
        .request(con, None)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    let path = export::labelled_measurements_path(file_name);
    export::write_npy(&path, &measurements)
        .await
        .with_context(|| format!("Failed to write {}", path))?;

    println!("Wrote {} rows to {}", measurements.len(), path);
    Ok(())
}

fn init_tracing(debug: bool) -> Result<()> {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(debug)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

/// Accepts `%Y-%m-%d`, `%Y-%m-%dT%H:%M:%S` and `%Y-%m-%d %H:%M:%S`
fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid date '{}', expected YYYY-MM-DD[ HH:MM:SS]", s))
}
