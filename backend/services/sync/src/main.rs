mod batch;
mod bookkeeping;
mod engine;
mod fanout;
mod plan;
mod policy;
mod resolver;
mod status;
mod syncers;
mod target;

use std::sync::Arc;

use anyhow::Context;
use mca_config::{init_tracing, SyncConfig};
use mca_db::crm::pg_repository::PgDocumentStore;
use mca_db::source::models::SourceKind;
use mca_db::source::pg_repository::PgSourceRepository;

use crate::batch::{sync_all, SyncOptions};
use crate::engine::SyncContext;
use crate::policy::PolicySet;

const PROGRESS_LOG_EVERY: usize = 25;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    let config = SyncConfig::from_env().context("failed to load sync configuration")?;
    tracing::info!(
        service = "mca-sync",
        funder_id = %config.funder_id,
        dry_run = config.dry_run,
        "starting"
    );

    let requested: Vec<SourceKind> = if config.entities.is_empty() {
        SourceKind::ALL
            .into_iter()
            .filter(SourceKind::is_standalone)
            .collect()
    } else {
        config
            .entities
            .iter()
            .map(|raw| raw.parse::<SourceKind>().map_err(anyhow::Error::msg))
            .collect::<anyhow::Result<_>>()?
    };
    let order = plan::sync_order(&requested)?;
    let policies = PolicySet::from_pairs(&config.policy_overrides)?;
    tracing::info!(order = ?order, "sync plan");

    let pool = mca_db::create_pool(&config.database_url).await?;
    mca_db::migrate(&pool).await?;

    let ctx = Arc::new(
        SyncContext::new(
            PgDocumentStore::new(pool.clone()),
            PgSourceRepository::new(pool),
            config.funder_id,
            config.actor.clone(),
        )
        .with_policies(policies),
    );

    for (position, kind) in order.into_iter().enumerate() {
        let syncer = syncers::for_kind(ctx.clone(), kind)?;
        let options = SyncOptions {
            dry_run: config.dry_run,
            update_existing: config.update_existing,
            only_selected: config.only_selected,
            // An interrupted run resumes inside the kind it stopped in, which
            // is the first kind of the plan.
            resume_from_index: if position == 0 {
                config.resume_from_index
            } else {
                0
            },
            progress: Some(Box::new(move |done: usize, total: usize, name: &str| {
                if done % PROGRESS_LOG_EVERY == 0 || done == total {
                    tracing::info!(entity = %kind, done, total, last = name, "progress");
                }
            })),
        };

        let summary = sync_all(&*ctx, syncer.as_ref(), options)
            .await
            .with_context(|| format!("{kind} sync aborted"))?;
        tracing::info!(
            entity = %kind,
            candidates = summary.total_candidates,
            processed = summary.stats.total_processed,
            synced = summary.stats.total_synced,
            updated = summary.stats.total_updated,
            skipped = summary.stats.total_skipped,
            failed = summary.stats.total_failed,
            "{}",
            summary.message
        );
        for error in &summary.stats.errors {
            tracing::warn!(
                entity = %kind,
                source_id = error.source_id,
                name = %error.name,
                error = %error.error,
                "record failed"
            );
        }
    }

    tracing::info!("sync run finished");
    Ok(())
}
