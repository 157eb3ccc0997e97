//! Illustrative CLI surface over import/resolve/query (spec.md "not the
//! hard part"). Each subcommand opens its own pool, wires the `cdb-store`
//! Postgres implementations, and drives one of C2/C4/C3; mirrors the
//! teacher's `agent/src/main.rs` clap + tracing-subscriber init.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// URL of the postgres database.
    #[clap(long = "database", env = "DATABASE_URL")]
    database_url: String,
    /// Config file (without extension) to layer under env vars.
    #[clap(long = "config")]
    config: Option<String>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a batch of candidate records into an academic-literature import.
    Import {
        #[clap(subcommand)]
        kind: ImportKind,
    },
    /// Resolve one annotation scheme over a set of scopes into a single
    /// value per item/label, optionally persisting the result.
    Resolve(commands::resolve::ResolveArgs),
    /// Compile and run one NQL filter (read from a JSON file) against a
    /// project's items.
    Query(commands::query::QueryArgs),
}

#[derive(Subcommand, Debug)]
enum ImportKind {
    Academic(commands::import::AcademicArgs),
    Lexis(commands::import::LexisArgs),
}

fn main() -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(command = ?args.command, "cdb starting");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(async_main(args));

    if let Err(ref e) = result {
        tracing::error!(error = %e, "cdb exited with an error");
    }
    result
}

async fn async_main(args: Args) -> anyhow::Result<()> {
    if let Err(e) = cdb_config::load(args.config.as_deref()) {
        tracing::warn!(error = %e, "no layered config loaded, relying on --database/env only");
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&args.database_url)
        .await
        .context("connecting to database")?;
    let query_pool = pool.clone();
    let store = cdb_store::PgStore::new(pool);

    match args.command {
        Command::Import { kind: ImportKind::Academic(cmd) } => commands::import::run_academic(&store, cmd).await,
        Command::Import { kind: ImportKind::Lexis(cmd) } => commands::import::run_lexis(&store, cmd).await,
        Command::Resolve(cmd) => commands::resolve::run(&store, cmd).await,
        Command::Query(cmd) => commands::query::run(&query_pool, cmd).await,
    }
}

fn parse_uuid(s: &str) -> Result<Uuid, String> {
    Uuid::parse_str(s).map_err(|e| e.to_string())
}
