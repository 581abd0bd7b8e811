use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::source::models::{
    ImportMetadata, SourceKind, SourceRecord, SyncCounts, SyncMetadata, SyncStatusEntry,
    SyncStatusFilter, SyncStatusKind, SyncStatusPage,
};
use crate::source::repositories::SourceRepository;
use mca_common::error::{McaError, McaResult};

const RECORD_COLUMNS: &str = "entity, id, funder_id, display_name, payload, deleted, \
     import_source, imported_at, imported_by, last_updated_at, last_updated_by, \
     needs_sync, last_synced_at, last_synced_by, sync_id, updated_at";

#[derive(Clone)]
pub struct PgSourceRepository {
    pool: PgPool,
}

impl PgSourceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: PgRow) -> McaResult<SourceRecord> {
        let entity: String = row.get("entity");
        let kind = SourceKind::from_str(&entity).map_err(McaError::Internal)?;

        Ok(SourceRecord {
            kind,
            id: row.get("id"),
            funder_id: row.get("funder_id"),
            display_name: row.get("display_name"),
            payload: row.get("payload"),
            import_metadata: ImportMetadata {
                source: row.get("import_source"),
                imported_at: row.get("imported_at"),
                imported_by: row.get("imported_by"),
                last_updated_at: row.get("last_updated_at"),
                last_updated_by: row.get("last_updated_by"),
            },
            sync_metadata: SyncMetadata {
                needs_sync: row.get("needs_sync"),
                last_synced_at: row.get("last_synced_at"),
                last_synced_by: row.get("last_synced_by"),
                sync_id: row.get("sync_id"),
            },
            deleted: row.get("deleted"),
            updated_at: row.get("updated_at"),
        })
    }

    fn push_status_filters(
        qb: &mut QueryBuilder<'_, Postgres>,
        kind: SourceKind,
        funder_id: Uuid,
        filter: &SyncStatusFilter,
    ) {
        qb.push(" where entity = ")
            .push_bind(kind.as_str())
            .push(" and funder_id = ")
            .push_bind(funder_id)
            .push(" and deleted = false");

        if let Some(term) = filter.search_term() {
            qb.push(" and (display_name ilike ")
                .push_bind(format!("%{term}%"));
            if let Ok(id) = term.parse::<i64>() {
                qb.push(" or id = ").push_bind(id);
            }
            qb.push(")");
        }

        match filter.sync_status.unwrap_or_default() {
            SyncStatusKind::All => {}
            SyncStatusKind::Selected => {
                qb.push(" and needs_sync");
            }
            SyncStatusKind::Pending => {
                qb.push(" and needs_sync and last_synced_at is null");
            }
            SyncStatusKind::Synced => {
                qb.push(" and needs_sync and last_synced_at is not null");
            }
            SyncStatusKind::Ignored => {
                qb.push(" and not needs_sync");
            }
        }
    }

    /// Insert or replace a mirrored record. Used by the import step and tests.
    pub async fn upsert_record(&self, record: &SourceRecord) -> McaResult<()> {
        sqlx::query(
            "insert into orgmeter_records
             (entity, id, funder_id, display_name, payload, deleted,
              import_source, imported_at, imported_by, last_updated_at, last_updated_by,
              needs_sync, last_synced_at, last_synced_by, sync_id, updated_at)
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             on conflict (entity, funder_id, id) do update set
               display_name = excluded.display_name,
               payload = excluded.payload,
               deleted = excluded.deleted,
               last_updated_at = excluded.last_updated_at,
               last_updated_by = excluded.last_updated_by,
               updated_at = excluded.updated_at",
        )
        .bind(record.kind.as_str())
        .bind(record.id)
        .bind(record.funder_id)
        .bind(&record.display_name)
        .bind(&record.payload)
        .bind(record.deleted)
        .bind(&record.import_metadata.source)
        .bind(record.import_metadata.imported_at)
        .bind(&record.import_metadata.imported_by)
        .bind(record.import_metadata.last_updated_at)
        .bind(&record.import_metadata.last_updated_by)
        .bind(record.sync_metadata.needs_sync)
        .bind(record.sync_metadata.last_synced_at)
        .bind(&record.sync_metadata.last_synced_by)
        .bind(record.sync_metadata.sync_id)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SourceRepository for PgSourceRepository {
    async fn list_for_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        only_selected: bool,
    ) -> McaResult<Vec<SourceRecord>> {
        let rows = sqlx::query(&format!(
            "select {RECORD_COLUMNS} from orgmeter_records
             where entity = $1 and funder_id = $2 and deleted = false
               and ($3 = false or needs_sync = true)
             order by updated_at asc, id asc"
        ))
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(only_selected)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn get(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
    ) -> McaResult<Option<SourceRecord>> {
        let row = sqlx::query(&format!(
            "select {RECORD_COLUMNS} from orgmeter_records
             where entity = $1 and funder_id = $2 and id = $3"
        ))
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        row.map(Self::map_row).transpose()
    }

    async fn find_sync_id(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
    ) -> McaResult<Option<Uuid>> {
        let sync_id: Option<Option<Uuid>> = sqlx::query_scalar(
            "select sync_id from orgmeter_records
             where entity = $1 and funder_id = $2 and id = $3 and sync_id is not null",
        )
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        Ok(sync_id.flatten())
    }

    async fn list_payments_for_advance(
        &self,
        funder_id: Uuid,
        advance_id: i64,
    ) -> McaResult<Vec<SourceRecord>> {
        let rows = sqlx::query(&format!(
            "select {RECORD_COLUMNS} from orgmeter_records
             where entity = 'payment' and funder_id = $1 and deleted = false
               and (payload ->> 'advance' = $2 or payload -> 'advance' ->> 'id' = $2)
             order by updated_at asc, id asc"
        ))
        .bind(funder_id)
        .bind(advance_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn record_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
        actor: &str,
        sync_id: Option<Uuid>,
    ) -> McaResult<()> {
        let result = sqlx::query(
            "update orgmeter_records
             set last_synced_at = $1, last_synced_by = $2, sync_id = coalesce($3, sync_id)
             where entity = $4 and funder_id = $5 and id = $6",
        )
        .bind(Utc::now())
        .bind(actor)
        .bind(sync_id)
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(McaError::NotFound(format!(
                "{kind} source record not found: {id}"
            )));
        }
        Ok(())
    }

    async fn set_sync_id(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
        sync_id: Uuid,
    ) -> McaResult<()> {
        let result = sqlx::query(
            "update orgmeter_records set sync_id = $1
             where entity = $2 and funder_id = $3 and id = $4",
        )
        .bind(sync_id)
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(McaError::NotFound(format!(
                "{kind} source record not found: {id}"
            )));
        }
        Ok(())
    }

    async fn mark_for_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        ids: &[i64],
    ) -> McaResult<u64> {
        let result = sqlx::query(
            "update orgmeter_records
             set needs_sync = true, last_synced_at = null, sync_id = null
             where entity = $1 and funder_id = $2 and id = any($3)",
        )
        .bind(kind.as_str())
        .bind(funder_id)
        .bind(ids)
        .execute(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn sync_status(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        filter: &SyncStatusFilter,
    ) -> McaResult<SyncStatusPage> {
        let counts_row = sqlx::query(
            "select count(*) as total,
                    count(*) filter (where needs_sync) as selected,
                    count(*) filter (where needs_sync and last_synced_at is not null) as synced
             from orgmeter_records
             where entity = $1 and funder_id = $2 and deleted = false",
        )
        .bind(kind.as_str())
        .bind(funder_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| McaError::Database(e.to_string()))?;

        let counts = SyncCounts::from_parts(
            counts_row.get("total"),
            counts_row.get("selected"),
            counts_row.get("synced"),
        );

        let mut count_qb = QueryBuilder::new("select count(*) from orgmeter_records");
        Self::push_status_filters(&mut count_qb, kind, funder_id, filter);
        let total_matching: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| McaError::Database(e.to_string()))?;

        let mut qb = QueryBuilder::new(format!("select {RECORD_COLUMNS} from orgmeter_records"));
        Self::push_status_filters(&mut qb, kind, funder_id, filter);
        qb.push(" order by id asc");
        qb.push(" limit ").push_bind(i64::from(filter.limit()));
        qb.push(" offset ")
            .push_bind(i64::try_from(filter.offset()).unwrap_or(i64::MAX));

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| McaError::Database(e.to_string()))?;

        let entries = rows
            .into_iter()
            .map(|row| Self::map_row(row).map(|r| SyncStatusEntry::from(&r)))
            .collect::<McaResult<Vec<_>>>()?;

        Ok(SyncStatusPage {
            entries,
            total_matching,
            counts,
        })
    }
}
