use async_trait::async_trait;
use uuid::Uuid;

use crate::source::models::{SourceKind, SourceRecord, SyncStatusFilter, SyncStatusPage};
use mca_common::error::McaResult;

/// Access to mirrored OrgMeter records and their sync bookkeeping.
///
/// Every call is scoped by `(kind, funder_id)`; records are addressed by
/// their numeric OrgMeter id within that scope.
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Non-deleted records of one kind, oldest `updated_at` first.
    /// With `only_selected`, restricted to `needs_sync = true`.
    async fn list_for_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        only_selected: bool,
    ) -> McaResult<Vec<SourceRecord>>;

    async fn get(&self, kind: SourceKind, funder_id: Uuid, id: i64)
        -> McaResult<Option<SourceRecord>>;

    /// Target id previously written for this record, if any.
    async fn find_sync_id(&self, kind: SourceKind, funder_id: Uuid, id: i64)
        -> McaResult<Option<Uuid>>;

    /// Non-deleted payment records that reference the given advance.
    async fn list_payments_for_advance(
        &self,
        funder_id: Uuid,
        advance_id: i64,
    ) -> McaResult<Vec<SourceRecord>>;

    /// Stamp `last_synced_at`/`last_synced_by`, and `sync_id` when given.
    /// Never touches `needs_sync`.
    async fn record_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
        actor: &str,
        sync_id: Option<Uuid>,
    ) -> McaResult<()>;

    /// Point the record at an existing target found by natural key, before
    /// anything is written to the target side.
    async fn set_sync_id(&self, kind: SourceKind, funder_id: Uuid, id: i64, sync_id: Uuid)
        -> McaResult<()>;

    /// Select records for the next run: `needs_sync = true`, clears
    /// `last_synced_at` and `sync_id`. Returns the number of records touched.
    async fn mark_for_sync(&self, kind: SourceKind, funder_id: Uuid, ids: &[i64])
        -> McaResult<u64>;

    async fn sync_status(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        filter: &SyncStatusFilter,
    ) -> McaResult<SyncStatusPage>;
}
