//! schemactl CLI
//!
//! Thin shell over the library: flag parsing, `.env` loading and plain
//! result printing. All logic lives in the library crate.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use schemactl::config;
use schemactl::connect;
use schemactl::dialect::Dialect;
use schemactl::executor::Executor;
use schemactl::query::{self, QueryOutput};
use schemactl::snapshot;

/// Schema migrations and introspection for SQLite, PostgreSQL and MySQL.
#[derive(Parser)]
#[command(name = "schemactl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database type override (sqlite, libsql, turso, postgres, mysql, mariadb).
    #[arg(long, global = true)]
    db: Option<String>,

    /// Connection URL override.
    #[arg(long, global = true)]
    url: Option<String>,

    /// Project root directory.
    #[arg(long, global = true, default_value = "schema")]
    root_dir: PathBuf,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project root: write db.schema and record the URL in .env.
    Init,

    /// Update the configured database type and/or connection URL.
    Config,

    /// Create a new numbered migration file.
    Create {
        /// Migration name (becomes `<seq>_<name>.sql`).
        name: String,
    },

    /// Apply a specific migration, or all pending ones in ledger order.
    Migrate {
        /// Migration file to apply (all pending if not specified).
        file: Option<String>,
    },

    /// Roll back a migration (the most recently applied if not specified).
    Rollback {
        /// Migration file to roll back.
        file: Option<String>,
    },

    /// Remove an unapplied migration file and its ledger record.
    Remove {
        /// Migration file to remove.
        file: String,
    },

    /// Re-render db.schema from the live database.
    Pull,

    /// Run a SQL statement (or a .sql file from the migrations directory).
    Sql {
        /// Statement text, or a filename ending in .sql.
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // The connection URL usually lives in .env; a missing file is fine
    // when overrides or literal URLs are used.
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Init => {
            let dialect: Dialect = cli.db.as_deref().unwrap_or("sqlite").parse()?;
            config::init(&cli.root_dir, dialect, cli.url.as_deref())?;
            info!("schema project initialized");
        }

        Commands::Config => {
            if cli.db.is_none() && cli.url.is_none() {
                info!("nothing to update; pass --db and/or --url");
            } else {
                config::update(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref())?;
                info!("configuration updated");
            }
        }

        Commands::Create { name } => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let executor = Executor::new(&handle, &cli.root_dir);
            let file = executor.ledger().create_migration(&name).await?;
            info!(file, "migration file created");
        }

        Commands::Migrate { file } => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let executor = Executor::new(&handle, &cli.root_dir);
            executor.migrate(file.as_deref()).await?;
        }

        Commands::Rollback { file } => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let executor = Executor::new(&handle, &cli.root_dir);
            executor.rollback(file.as_deref()).await?;
        }

        Commands::Remove { file } => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let executor = Executor::new(&handle, &cli.root_dir);
            executor.remove(&file).await?;
        }

        Commands::Pull => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let schema_path = config::schema_path(&cli.root_dir);
            snapshot::refresh(&handle.pool, handle.dialect, &schema_path).await?;
            info!(path = %schema_path.display(), "schema written");
        }

        Commands::Sql { query } => {
            let handle =
                connect::connect(&cli.root_dir, cli.db.as_deref(), cli.url.as_deref()).await?;
            let output = if query.trim().ends_with(".sql") {
                let path = cli.root_dir.join("migrations").join(query.trim());
                query::run_file(&handle.pool, &path).await?
            } else {
                query::run_statement(&handle.pool, &query).await?
            };
            print_output(&output);
        }
    }

    Ok(())
}

fn print_output(output: &QueryOutput) {
    match output {
        QueryOutput::Affected(count) => println!("OK, {count} row(s) affected"),
        QueryOutput::Rows { columns, rows } => print_table(columns, rows),
    }
}

/// Plain aligned layout; rich rendering belongs to the schema browser.
fn print_table(columns: &[String], rows: &[Vec<String>]) {
    if columns.is_empty() {
        println!("(no rows)");
        return;
    }
    let mut widths: Vec<usize> = columns.iter().map(String::len).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header: Vec<String> = columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{c:<w$}"))
        .collect();
    println!("{}", header.join("  "));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        println!("{}", line.join("  "));
    }
    println!("({} row(s))", rows.len());
}
