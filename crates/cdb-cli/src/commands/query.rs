//! `query`: compiles an NQL filter (read as JSON) into a `SELECT` and runs
//! it against one project's items of the chosen type.

use std::path::PathBuf;

use anyhow::Context;
use cdb_models::ItemKind;
use cdb_nql::Filter;
use clap::{Args as ClapArgs, ValueEnum};
use sqlx::Row;
use uuid::Uuid;

use crate::parse_uuid;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ItemTypeArg {
    Academic,
    Lexis,
    Generic,
    Twitter,
}

impl From<ItemTypeArg> for ItemKind {
    fn from(value: ItemTypeArg) -> Self {
        match value {
            ItemTypeArg::Academic => ItemKind::Academic,
            ItemTypeArg::Lexis => ItemKind::Lexis,
            ItemTypeArg::Generic => ItemKind::Generic,
            ItemTypeArg::Twitter => ItemKind::Twitter,
        }
    }
}

#[derive(ClapArgs, Debug)]
pub struct QueryArgs {
    #[clap(long, value_parser = parse_uuid)]
    project: Uuid,
    #[clap(long, value_enum)]
    item_type: ItemTypeArg,
    /// JSON file holding one serialized [`Filter`] tree.
    #[clap(long)]
    filter: PathBuf,
}

pub async fn run(pool: &sqlx::PgPool, args: QueryArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.filter).with_context(|| format!("reading {}", args.filter.display()))?;
    let filter: Filter = serde_json::from_str(&raw).context("parsing filter JSON")?;

    let compiled = cdb_nql::compile(args.item_type.into(), args.project, &filter)?;
    tracing::info!(sql = compiled.sql(), "compiled query");

    let rows = compiled.builder.build().fetch_all(pool).await.context("executing compiled query")?;

    tracing::info!(matches = rows.len(), "query finished");
    for row in rows.iter().take(20) {
        if let Ok(id) = row.try_get::<Uuid, _>("id") {
            println!("{id}");
        }
    }
    Ok(())
}
