use uuid::Uuid;

use mca_db::source::models::SourceRecord;
use mca_db::source::repositories::SourceRepository;

/// Writes sync bookkeeping back onto source records.
///
/// Failures are logged and swallowed: a record whose target was written is
/// synced even if stamping it fails.
pub struct Bookkeeper<'a, S> {
    source: &'a S,
    actor: &'a str,
}

impl<'a, S: SourceRepository> Bookkeeper<'a, S> {
    pub fn new(source: &'a S, actor: &'a str) -> Self {
        Self { source, actor }
    }

    /// Stamp `last_synced_*`, and `sync_id` when a target id is given.
    pub async fn record(&self, record: &SourceRecord, target_id: Option<Uuid>) {
        let result = self
            .source
            .record_sync(record.kind, record.funder_id, record.id, self.actor, target_id)
            .await;
        if let Err(e) = result {
            tracing::warn!(
                entity = %record.kind,
                source_id = record.id,
                error = %e,
                "failed to update sync metadata"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mca_db::memory::MemorySourceRepository;
    use mca_db::source::models::SourceKind;
    use serde_json::json;

    #[tokio::test]
    async fn stamps_without_touching_selection() {
        let source = MemorySourceRepository::new();
        let funder = Uuid::new_v4();
        let mut record = SourceRecord::new(SourceKind::Lender, 1, funder, json!({}));
        record.sync_metadata.needs_sync = true;
        source.insert(record.clone()).unwrap();

        let target = Uuid::new_v4();
        Bookkeeper::new(&source, "ops@funder.com")
            .record(&record, Some(target))
            .await;

        let stored = source.snapshot(SourceKind::Lender, funder, 1).unwrap();
        assert!(stored.sync_metadata.needs_sync);
        assert!(stored.sync_metadata.last_synced_at.is_some());
        assert_eq!(stored.sync_metadata.last_synced_by.as_deref(), Some("ops@funder.com"));
        assert_eq!(stored.sync_metadata.sync_id, Some(target));
    }

    #[tokio::test]
    async fn keeps_existing_sync_id_when_none_given() {
        let source = MemorySourceRepository::new();
        let funder = Uuid::new_v4();
        let existing = Uuid::new_v4();
        let mut record = SourceRecord::new(SourceKind::Lender, 1, funder, json!({}));
        record.sync_metadata.sync_id = Some(existing);
        source.insert(record.clone()).unwrap();

        Bookkeeper::new(&source, "system").record(&record, None).await;

        let stored = source.snapshot(SourceKind::Lender, funder, 1).unwrap();
        assert_eq!(stored.sync_metadata.sync_id, Some(existing));
    }

    #[tokio::test]
    async fn failures_are_swallowed() {
        let source = MemorySourceRepository::new();
        let record = SourceRecord::new(SourceKind::Lender, 1, Uuid::new_v4(), json!({}));
        // Record was never stored, so the write fails with not-found.
        Bookkeeper::new(&source, "system")
            .record(&record, Some(Uuid::new_v4()))
            .await;
    }
}
