//! Trayhouse schema tool
//!
//! Prints or applies the PostgreSQL schema used by `PgStore`, and previews
//! the addresses a partition grid would get.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use trayhouse::store::schema;
use trayhouse::{generate, CellType, PgStore, TrayhouseConfig};

#[derive(Parser)]
#[command(name = "trayhouse-schema")]
#[command(about = "Schema management for the Trayhouse inventory store")]
#[command(version)]
struct Cli {
    /// Database connection URL (overrides config and TRAYHOUSE__DATABASE__URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the DDL without touching a database
    Print,

    /// Create missing tables and indexes
    Apply,

    /// Show the addresses of a rows x cols grid
    Addresses {
        rows: u32,
        cols: u32,
        /// Use the large-cell address form
        #[arg(long)]
        large: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Print => {
            for sql in schema::statements() {
                println!("{sql};");
            }
        }
        Commands::Apply => {
            let mut config = TrayhouseConfig::load().context("failed to load configuration")?;
            if let Some(url) = cli.database_url {
                config.database.url = url;
            }
            if config.database.url.is_empty() {
                bail!("database URL not provided; use --database-url or set TRAYHOUSE__DATABASE__URL");
            }
            config.database.max_connections = 1;

            // may_postgres blocks the calling coroutine; run on one so the
            // scheduler is driving the socket.
            may::config().set_stack_size(0x10000);
            let handle = may::go!(move || -> Result<()> {
                let store = PgStore::connect(&config.database)?;
                schema::apply(&store)?;
                Ok(())
            });
            handle
                .join()
                .map_err(|_| anyhow::anyhow!("schema coroutine panicked"))??;
        }
        Commands::Addresses { rows, cols, large } => {
            let cell_type = if large { CellType::Large } else { CellType::Normal };
            for row in generate(rows, cols, cell_type).chunks(cols.max(1) as usize) {
                let line: Vec<&str> = row.iter().map(|a| a.address.as_str()).collect();
                println!("{}", line.join("\t"));
            }
        }
    }
    Ok(())
}
