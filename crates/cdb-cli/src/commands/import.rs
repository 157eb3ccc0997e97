//! `import academic|lexis`: reads one JSON-lines file of candidate records
//! and streams it through [`cdb_import`]'s two-pass scan.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use cdb_import::{ImportOptions, RawAcademicRecord, RawLexisRecord};
use cdb_models::ItemKind;
use cdb_store::{ImportRef, PgStore};
use clap::Args as ClapArgs;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::parse_uuid;

#[derive(ClapArgs, Debug)]
pub struct AcademicArgs {
    #[clap(long, value_parser = parse_uuid)]
    project: Uuid,
    /// JSON-lines file of `RawAcademicRecord` candidates.
    #[clap(long)]
    input: PathBuf,
    #[clap(long, value_parser = parse_uuid)]
    import_id: Option<Uuid>,
    #[clap(long)]
    import_name: Option<String>,
    #[clap(long, default_value_t = 0)]
    min_update_size: i32,
    #[clap(long)]
    n_new: Option<i32>,
    #[clap(long, default_value_t = cdb_dedup::DEFAULT_MAX_SLOP)]
    max_slop: f32,
    #[clap(long, default_value_t = 500)]
    batch_size: usize,
}

#[derive(ClapArgs, Debug)]
pub struct LexisArgs {
    #[clap(long, value_parser = parse_uuid)]
    project: Uuid,
    /// JSON-lines file of `RawLexisRecord` candidates.
    #[clap(long)]
    input: PathBuf,
    #[clap(long, value_parser = parse_uuid)]
    import_id: Option<Uuid>,
    #[clap(long)]
    import_name: Option<String>,
    #[clap(long, default_value_t = 0)]
    min_update_size: i32,
    #[clap(long)]
    n_new: Option<i32>,
    #[clap(long, default_value_t = cdb_dedup::DEFAULT_MAX_SLOP)]
    max_slop: f32,
    #[clap(long, default_value_t = 500)]
    batch_size: usize,
}

fn read_jsonl<T: DeserializeOwned>(path: &PathBuf) -> anyhow::Result<Vec<T>> {
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    std::io::BufReader::new(file)
        .lines()
        .filter(|line| !matches!(line, Ok(l) if l.trim().is_empty()))
        .map(|line| {
            let line = line?;
            Ok(serde_json::from_str(&line).with_context(|| format!("parsing record: {line}"))?)
        })
        .collect()
}

fn build_import_ref(import_id: Option<Uuid>, import_name: Option<String>, item_type: ItemKind) -> anyhow::Result<ImportRef> {
    match (import_id, import_name) {
        (Some(id), _) => Ok(ImportRef::Existing(id)),
        (None, Some(name)) => Ok(ImportRef::Named { name, item_type, config: serde_json::Value::Null }),
        (None, None) => anyhow::bail!("one of --import-id or --import-name is required"),
    }
}

pub async fn run_academic(store: &PgStore, args: AcademicArgs) -> anyhow::Result<()> {
    let records: Vec<RawAcademicRecord> = read_jsonl(&args.input)?;
    let import_ref = build_import_ref(args.import_id, args.import_name.clone(), ItemKind::Academic)?;
    let options = ImportOptions {
        n_new: args.n_new,
        min_update_size: args.min_update_size,
        max_slop: args.max_slop,
        max_features: usize::MAX,
        batch_size: args.batch_size,
    };

    let outcome = cdb_import::import_academic_items(&store.locks, &store.imports, &store.items, args.project, import_ref, records, options).await?;
    tracing::info!(?outcome, "academic import finished");
    Ok(())
}

pub async fn run_lexis(store: &PgStore, args: LexisArgs) -> anyhow::Result<()> {
    let records: Vec<RawLexisRecord> = read_jsonl(&args.input)?;
    let import_ref = build_import_ref(args.import_id, args.import_name.clone(), ItemKind::Lexis)?;
    let options = ImportOptions {
        n_new: args.n_new,
        min_update_size: args.min_update_size,
        max_slop: args.max_slop,
        max_features: usize::MAX,
        batch_size: args.batch_size,
    };

    let outcome = cdb_import::import_lexis_items(&store.locks, &store.imports, &store.items, args.project, import_ref, records, options).await?;
    tracing::info!(?outcome, "lexis import finished");
    Ok(())
}
