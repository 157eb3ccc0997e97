//! `resolve`: runs C4 over one scheme/scope set and either prints a dry-run
//! summary, commits a fresh `RESOLVE`-kind metadata, or updates an existing
//! one in place.

use cdb_resolve::{ResolveFilter, ResolveOptions, ResolutionStrategy};
use cdb_store::PgStore;
use clap::{Args as ClapArgs, ValueEnum};
use uuid::Uuid;

use crate::parse_uuid;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolveMode {
    DryRun,
    Commit,
    Update,
}

#[derive(ClapArgs, Debug)]
pub struct ResolveArgs {
    #[clap(long, value_parser = parse_uuid)]
    project: Uuid,
    #[clap(long, value_parser = parse_uuid)]
    scheme: Uuid,
    #[clap(long, value_parser = parse_uuid, required = true)]
    scope: Vec<Uuid>,
    #[clap(long, default_value = "majority")]
    strategy: String,
    #[clap(long)]
    ignore_hierarchy: bool,
    #[clap(long)]
    ignore_repeat: bool,
    #[clap(long)]
    include_empty: bool,
    #[clap(long)]
    include_new: bool,
    #[clap(long)]
    update_existing: bool,
    #[clap(long, value_parser = parse_uuid)]
    prior_metadata: Option<Uuid>,
    #[clap(long, value_enum, default_value = "dry-run")]
    mode: ResolveMode,
    /// Name recorded on the committed `BotAnnotationMetadata` row.
    #[clap(long, default_value = "cli resolution")]
    name: String,
}

pub async fn run(store: &PgStore, args: ResolveArgs) -> anyhow::Result<()> {
    let filter = ResolveFilter { scheme_id: args.scheme, scope_ids: args.scope.clone() };
    let strategy = ResolutionStrategy::parse(&args.strategy)?;
    let options = ResolveOptions {
        ignore_hierarchy: args.ignore_hierarchy,
        ignore_repeat: args.ignore_repeat,
        include_empty: args.include_empty,
        include_new: args.include_new,
        update_existing: args.update_existing,
        prior_metadata_id: args.prior_metadata,
    };

    let proposal = cdb_resolve::resolve(&store.annotations, &filter, strategy, &options).await?;
    let cell_count: usize = proposal.matrix.values().map(|row| row.len()).sum();
    tracing::info!(
        items = proposal.matrix.len(),
        cells = cell_count,
        annotators = proposal.annotators.len(),
        "resolution proposal built"
    );

    match args.mode {
        ResolveMode::DryRun => {
            tracing::info!("dry run: nothing persisted");
        }
        ResolveMode::Commit => {
            let id = cdb_resolve::commit(&store.annotations, args.project, args.scheme, args.name, &proposal.matrix).await?;
            tracing::info!(metadata_id = %id, "resolution committed");
        }
        ResolveMode::Update => {
            use cdb_store::AnnotationStore;
            let prior_id = args.prior_metadata.ok_or_else(|| anyhow::anyhow!("--prior-metadata is required with --mode update"))?;
            let metadata = store.annotations.get_bot_metadata(prior_id).await?;
            cdb_resolve::update(&store.annotations, metadata, &proposal.matrix).await?;
            tracing::info!(metadata_id = %prior_id, "resolution updated");
        }
    }

    Ok(())
}
