use serde::Serialize;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::models::Funder;
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::repositories::SourceRepository;

use crate::engine::{EntitySyncer, RecordOptions, RecordOutcome, SyncContext};

/// Called after every record with `(processed, total, display_name)`,
/// both counted from the resume offset.
pub type ProgressFn = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

pub struct SyncOptions {
    pub dry_run: bool,
    pub update_existing: bool,
    pub only_selected: bool,
    pub resume_from_index: usize,
    pub progress: Option<ProgressFn>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            update_existing: true,
            only_selected: true,
            resume_from_index: 0,
            progress: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SyncError {
    pub source_id: i64,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SyncStats {
    pub total_processed: usize,
    pub total_synced: usize,
    pub total_updated: usize,
    pub total_skipped: usize,
    pub total_failed: usize,
    pub error_count: usize,
    pub errors: Vec<SyncError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub success: bool,
    pub message: String,
    /// Records selected for the run, before the resume offset is applied.
    pub total_candidates: usize,
    pub stats: SyncStats,
}

/// Run one syncer over every candidate record of its kind for the context's
/// funder. A record that fails is counted and the batch carries on; only a
/// missing funder or a failure to list the records aborts the run.
pub async fn sync_all<D, S>(
    ctx: &SyncContext<D, S>,
    syncer: &dyn EntitySyncer,
    options: SyncOptions,
) -> McaResult<SyncSummary>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let kind = syncer.kind();
    if ctx.store.get::<Funder>(ctx.funder_id).await?.is_none() {
        return Err(McaError::NotFound(format!("funder {}", ctx.funder_id)));
    }

    let records = ctx
        .source
        .list_for_sync(kind, ctx.funder_id, options.only_selected)
        .await?;
    let total_candidates = records.len();

    if options.dry_run {
        tracing::info!(entity = %kind, candidates = total_candidates, "dry run, nothing written");
        return Ok(SyncSummary {
            success: true,
            message: format!(
                "Dry run: {total_candidates} {} records would be processed",
                kind.label()
            ),
            total_candidates,
            stats: SyncStats::default(),
        });
    }

    let remaining = &records[options.resume_from_index.min(total_candidates)..];
    tracing::info!(
        entity = %kind,
        funder_id = %ctx.funder_id,
        candidates = total_candidates,
        resume_from = options.resume_from_index,
        remaining = remaining.len(),
        "starting sync"
    );

    let record_options = RecordOptions {
        update_existing: options.update_existing,
    };
    let mut stats = SyncStats::default();
    for (index, record) in remaining.iter().enumerate() {
        let name = record.label();
        match syncer.sync_record(record, record_options).await {
            Ok(RecordOutcome::Synced) => stats.total_synced += 1,
            Ok(RecordOutcome::Updated) => stats.total_updated += 1,
            Ok(RecordOutcome::Skipped) => stats.total_skipped += 1,
            Err(e) => {
                tracing::warn!(
                    entity = %kind,
                    source_id = record.id,
                    error = %e,
                    "record sync failed"
                );
                stats.total_failed += 1;
                stats.errors.push(SyncError {
                    source_id: record.id,
                    name: name.clone(),
                    error: e.to_string(),
                });
            }
        }
        stats.total_processed += 1;

        if let Some(progress) = &options.progress {
            progress(index + 1, remaining.len(), &name);
        }
    }
    stats.error_count = stats.errors.len();

    let message = format!(
        "Processed {} {} records: {} synced, {} updated, {} skipped, {} failed",
        stats.total_processed,
        kind.label(),
        stats.total_synced,
        stats.total_updated,
        stats.total_skipped,
        stats.total_failed
    );
    tracing::info!(
        entity = %kind,
        processed = stats.total_processed,
        synced = stats.total_synced,
        updated = stats.total_updated,
        skipped = stats.total_skipped,
        failed = stats.total_failed,
        "sync completed"
    );

    Ok(SyncSummary {
        success: true,
        message,
        total_candidates,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::syncers::testing::{context, reload, seed};
    use crate::syncers::{AdvanceSyncer, LenderSyncer, SyndicatorSyncer};
    use mca_db::crm::document::Document;
    use mca_db::crm::models::{
        Commission, CommissionIntent, Disbursement, DisbursementIntent, Funding, FundingExpense,
        FundingFee, FundingType, Lender, Syndication, Syndicator,
    };
    use mca_db::memory::{MemoryDocumentStore, MemorySourceRepository};
    use mca_db::source::models::{SourceKind, SourceRecord};

    /// Records the ids it sees and fails on the configured ones.
    struct ScriptedSyncer {
        seen: Mutex<Vec<i64>>,
        fail_on: Vec<i64>,
    }

    impl ScriptedSyncer {
        fn new(fail_on: Vec<i64>) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl EntitySyncer for ScriptedSyncer {
        fn kind(&self) -> SourceKind {
            SourceKind::Lender
        }

        async fn sync_record(
            &self,
            record: &SourceRecord,
            _options: RecordOptions,
        ) -> McaResult<RecordOutcome> {
            self.seen.lock().unwrap().push(record.id);
            if self.fail_on.contains(&record.id) {
                return Err(McaError::Validation(format!("record {} is broken", record.id)));
            }
            Ok(RecordOutcome::Synced)
        }
    }

    /// Ten selected lenders, oldest first by id.
    async fn ten_lenders() -> Arc<crate::syncers::testing::MemoryContext> {
        let ctx = context().await;
        let start = Utc::now() - Duration::hours(1);
        for id in 0..10 {
            let mut record = SourceRecord::new(
                SourceKind::Lender,
                id,
                ctx.funder_id,
                json!({ "name": format!("Lender {id}") }),
            );
            record.sync_metadata.needs_sync = true;
            record.updated_at = start + Duration::seconds(id);
            ctx.source.insert(record).unwrap();
        }
        ctx
    }

    #[tokio::test]
    async fn resume_processes_the_tail_with_relative_progress() {
        let ctx = ten_lenders().await;
        let syncer = ScriptedSyncer::new(Vec::new());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();

        let summary = sync_all(
            &*ctx,
            &syncer,
            SyncOptions {
                resume_from_index: 5,
                progress: Some(Box::new(move |done: usize, total: usize, _name: &str| {
                    sink.lock().unwrap().push((done, total));
                })),
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(*syncer.seen.lock().unwrap(), vec![5, 6, 7, 8, 9]);
        assert_eq!(summary.stats.total_processed, 5);
        assert_eq!(summary.total_candidates, 10);
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 5);
        assert!(calls.iter().all(|(_, total)| *total == 5));
        assert_eq!(calls.last(), Some(&(5, 5)));
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_batch() {
        let ctx = ten_lenders().await;
        let syncer = ScriptedSyncer::new(vec![3]);

        let summary = sync_all(&*ctx, &syncer, SyncOptions::default()).await.unwrap();

        assert!(summary.success);
        assert_eq!(summary.stats.total_processed, 10);
        assert_eq!(summary.stats.total_synced, 9);
        assert_eq!(summary.stats.total_failed, 1);
        assert_eq!(summary.stats.error_count, 1);
        assert_eq!(summary.stats.errors[0].source_id, 3);
        assert_eq!(summary.stats.errors[0].name, "Lender 3");
        assert_eq!(*syncer.seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn dry_run_counts_without_writing() {
        let ctx = ten_lenders().await;
        let syncer = LenderSyncer::new(ctx.clone());

        let summary = sync_all(
            &*ctx,
            &syncer,
            SyncOptions {
                dry_run: true,
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.total_candidates, 10);
        assert_eq!(summary.stats.total_processed, 0);
        assert_eq!(ctx.store.count(Lender::COLLECTION), 0);
    }

    #[tokio::test]
    async fn only_selected_filters_unselected_records() {
        let ctx = ten_lenders().await;
        let mut unselected =
            SourceRecord::new(SourceKind::Lender, 99, ctx.funder_id, json!({ "name": "Extra" }));
        unselected.sync_metadata.needs_sync = false;
        ctx.source.insert(unselected).unwrap();

        let syncer = ScriptedSyncer::new(Vec::new());
        let selected = sync_all(&*ctx, &syncer, SyncOptions::default()).await.unwrap();
        assert_eq!(selected.total_candidates, 10);

        let everything = sync_all(
            &*ctx,
            &syncer,
            SyncOptions {
                only_selected: false,
                ..SyncOptions::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(everything.total_candidates, 11);
    }

    #[tokio::test]
    async fn missing_funder_is_fatal() {
        let ctx = SyncContext::new(
            MemoryDocumentStore::new(),
            MemorySourceRepository::new(),
            Uuid::new_v4(),
            "tester",
        );
        let syncer = ScriptedSyncer::new(Vec::new());
        let result = sync_all(&ctx, &syncer, SyncOptions::default()).await;
        assert!(matches!(result, Err(McaError::NotFound(_))));
        assert!(syncer.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn second_advance_run_updates_without_duplicates() {
        let ctx = context().await;
        let syndicator = seed(&ctx, SourceKind::Syndicator, 30, json!({ "name": "Gnyp Holdings" }));
        SyndicatorSyncer::new(ctx.clone())
            .sync_record(&syndicator, RecordOptions::default())
            .await
            .unwrap();
        for id in [100, 101] {
            seed(
                &ctx,
                SourceKind::Advance,
                id,
                json!({
                    "name": format!("Deal {id}"),
                    "funded_date": "2024-03-01",
                    "funding": {
                        "principal_amount": "20000",
                        "bank_fee": "100",
                        "iso_commission": "500",
                        "iso_origination_commission": "800"
                    },
                    "participations": [{ "syndicator": 30, "amount": "5000" }]
                }),
            );
        }
        let syncer = AdvanceSyncer::new(ctx.clone());

        let first = sync_all(&*ctx, &syncer, SyncOptions::default()).await.unwrap();
        assert_eq!(first.stats.total_synced, 2);

        let second = sync_all(&*ctx, &syncer, SyncOptions::default()).await.unwrap();
        assert_eq!(second.stats.total_updated, 2);
        assert_eq!(second.stats.total_synced, 0);

        assert_eq!(ctx.store.count(Funding::COLLECTION), 2);
        assert_eq!(ctx.store.count(FundingFee::COLLECTION), 2);
        assert_eq!(ctx.store.count(FundingExpense::COLLECTION), 2);
        assert_eq!(ctx.store.count(DisbursementIntent::COLLECTION), 2);
        assert_eq!(ctx.store.count(Disbursement::COLLECTION), 2);
        assert_eq!(ctx.store.count(CommissionIntent::COLLECTION), 2);
        assert_eq!(ctx.store.count(Commission::COLLECTION), 2);
        assert_eq!(ctx.store.count(Syndication::COLLECTION), 2);
        assert_eq!(ctx.store.count(Syndicator::COLLECTION), 1);
    }

    #[tokio::test]
    async fn advance_adopts_funding_with_matching_name() {
        let ctx = context().await;
        let now = Utc::now();
        let existing = Funding {
            id: Uuid::new_v4(),
            funder_id: ctx.funder_id,
            name: "Corner Deli 2024-01".to_string(),
            funding_type: FundingType::New,
            status: None,
            merchant: None,
            iso: None,
            lender: None,
            underwriter: None,
            sales_rep: None,
            funded_amount: 0,
            payback_amount: 0,
            commission_amount: 0,
            factor_rate: None,
            funded_date: None,
            followers: Vec::new(),
            orgmeter_id: None,
            created_at: now,
            updated_at: now,
        };
        ctx.store.insert(&existing).await.unwrap();
        let record = seed(
            &ctx,
            SourceKind::Advance,
            100,
            json!({ "name": "Corner Deli 2024-01", "funding": { "principal_amount": "1000" } }),
        );

        let summary = sync_all(&*ctx, &AdvanceSyncer::new(ctx.clone()), SyncOptions::default())
            .await
            .unwrap();

        assert_eq!(summary.stats.total_updated, 1);
        assert_eq!(ctx.store.count(Funding::COLLECTION), 1);
        assert_eq!(reload(&ctx, &record).sync_metadata.sync_id, Some(existing.id));
    }
}
