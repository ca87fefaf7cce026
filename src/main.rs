use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use sqlx::SqlitePool;

#[derive(Debug, Parser)]
#[command(name = "larder", about = "Larder database maintenance", version)]
struct Cli {
    /// Path to the SQLite database file.
    #[arg(long, default_value = "larder.sqlite3")]
    db: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply any pending schema migrations.
    Migrate,
    /// Report row counts per table.
    Status {
        /// Emit a machine-readable JSON object instead of the table view.
        #[arg(long)]
        json: bool,
    },
    /// Run VACUUM to compact the database.
    Vacuum,
}

const STATUS_TABLES: &[&str] = &[
    "household",
    "users",
    "locations",
    "containers",
    "items",
    "consumption_entries",
    "invitations",
    "shopping_items",
];

fn main() {
    larder_lib::init_logging();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
    runtime.block_on(async {
        let pool = larder_lib::db::open_sqlite_pool(&cli.db)
            .await
            .context("open database")?;

        match cli.command {
            Commands::Migrate => {
                larder_lib::migrate::apply_migrations(&pool)
                    .await
                    .context("apply migrations")?;
                println!("Migrations applied.");
            }
            Commands::Status { json } => handle_status(&pool, json).await?,
            Commands::Vacuum => {
                sqlx::query("VACUUM").execute(&pool).await.context("vacuum")?;
                println!("Vacuum complete.");
            }
        }
        Ok(())
    })
}

async fn handle_status(pool: &SqlitePool, as_json: bool) -> Result<()> {
    let mut counts = serde_json::Map::new();
    for table in STATUS_TABLES {
        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?")
                .bind(table)
                .fetch_optional(pool)
                .await?;
        let count: i64 = if exists.is_some() {
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(pool)
                .await?
        } else {
            -1
        };
        counts.insert(table.to_string(), json!(count));
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&json!({ "tables": counts }))?);
    } else {
        for (table, count) in &counts {
            match count.as_i64() {
                Some(-1) => println!("{table:<22} (missing; run `larder migrate`)"),
                Some(n) => println!("{table:<22} {n}"),
                None => {}
            }
        }
    }
    Ok(())
}
