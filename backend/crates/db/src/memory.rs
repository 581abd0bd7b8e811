//! In-memory implementations of the repository traits.
//!
//! Semantics follow the Postgres implementations closely enough for the
//! sync engine and API tests; both types are cheap to clone and clones share
//! state. Failure injection hooks let tests exercise soft-failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::crm::document::{normalize_key, Document, LookupKey};
use crate::crm::repositories::DocumentStore;
use crate::source::models::{
    SourceKind, SourceRecord, SyncCounts, SyncStatusEntry, SyncStatusFilter, SyncStatusPage,
};
use crate::source::payloads::SourceRef;
use crate::source::repositories::SourceRepository;
use mca_common::error::{McaError, McaResult};

fn lock<T>(mutex: &Mutex<T>) -> McaResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| McaError::Internal("memory store lock poisoned".to_string()))
}

// ── Source records ──────────────────────────────────────────────

type SourceKey = (SourceKind, Uuid, i64);

#[derive(Default)]
struct SourceState {
    records: HashMap<SourceKey, SourceRecord>,
    fail_bookkeeping: bool,
}

#[derive(Clone, Default)]
pub struct MemorySourceRepository {
    state: Arc<Mutex<SourceState>>,
}

impl MemorySourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SourceRecord) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        state
            .records
            .insert((record.kind, record.funder_id, record.id), record);
        Ok(())
    }

    pub fn snapshot(&self, kind: SourceKind, funder_id: Uuid, id: i64) -> Option<SourceRecord> {
        lock(&self.state)
            .ok()?
            .records
            .get(&(kind, funder_id, id))
            .cloned()
    }

    /// Make every `record_sync` call fail.
    pub fn fail_bookkeeping(&self, fail: bool) {
        if let Ok(mut state) = lock(&self.state) {
            state.fail_bookkeeping = fail;
        }
    }

    fn scoped(state: &SourceState, kind: SourceKind, funder_id: Uuid) -> Vec<SourceRecord> {
        let mut records: Vec<SourceRecord> = state
            .records
            .values()
            .filter(|r| r.kind == kind && r.funder_id == funder_id && !r.deleted)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
        records
    }
}

fn payment_advance_id(payload: &serde_json::Value) -> Option<i64> {
    let advance = payload.get("advance")?;
    serde_json::from_value::<SourceRef>(advance.clone())
        .ok()?
        .numeric_id()
}

#[async_trait]
impl SourceRepository for MemorySourceRepository {
    async fn list_for_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        only_selected: bool,
    ) -> McaResult<Vec<SourceRecord>> {
        let state = lock(&self.state)?;
        Ok(Self::scoped(&state, kind, funder_id)
            .into_iter()
            .filter(|r| !only_selected || r.sync_metadata.needs_sync)
            .collect())
    }

    async fn get(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
    ) -> McaResult<Option<SourceRecord>> {
        let state = lock(&self.state)?;
        Ok(state.records.get(&(kind, funder_id, id)).cloned())
    }

    async fn find_sync_id(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
    ) -> McaResult<Option<Uuid>> {
        let state = lock(&self.state)?;
        Ok(state
            .records
            .get(&(kind, funder_id, id))
            .and_then(|r| r.sync_metadata.sync_id))
    }

    async fn list_payments_for_advance(
        &self,
        funder_id: Uuid,
        advance_id: i64,
    ) -> McaResult<Vec<SourceRecord>> {
        let state = lock(&self.state)?;
        Ok(Self::scoped(&state, SourceKind::Payment, funder_id)
            .into_iter()
            .filter(|r| payment_advance_id(&r.payload) == Some(advance_id))
            .collect())
    }

    async fn record_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        id: i64,
        actor: &str,
        sync_id: Option<Uuid>,
    ) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        if state.fail_bookkeeping {
            return Err(McaError::Database("bookkeeping write rejected".to_string()));
        }
        let record = state
            .records
            .get_mut(&(kind, funder_id, id))
            .ok_or_else(|| McaError::NotFound(format!("{kind} source record not found: {id}")))?;
        record.sync_metadata.last_synced_at = Some(Utc::now());
        record.sync_metadata.last_synced_by = Some(actor.to_string());
        if sync_id.is_some() {
            record.sync_metadata.sync_id = sync_id;
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
        let mut state = lock(&self.state)?;
        let record = state
            .records
            .get_mut(&(kind, funder_id, id))
            .ok_or_else(|| McaError::NotFound(format!("{kind} source record not found: {id}")))?;
        record.sync_metadata.sync_id = Some(sync_id);
        Ok(())
    }

    async fn mark_for_sync(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        ids: &[i64],
    ) -> McaResult<u64> {
        let mut state = lock(&self.state)?;
        let mut touched = 0;
        for id in ids.iter().collect::<HashSet<_>>() {
            if let Some(record) = state.records.get_mut(&(kind, funder_id, *id)) {
                record.sync_metadata.needs_sync = true;
                record.sync_metadata.last_synced_at = None;
                record.sync_metadata.sync_id = None;
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn sync_status(
        &self,
        kind: SourceKind,
        funder_id: Uuid,
        filter: &SyncStatusFilter,
    ) -> McaResult<SyncStatusPage> {
        let state = lock(&self.state)?;
        let mut scoped = Self::scoped(&state, kind, funder_id);
        scoped.sort_by_key(|r| r.id);

        let total = scoped.len() as i64;
        let selected = scoped.iter().filter(|r| r.sync_metadata.needs_sync).count() as i64;
        let synced = scoped
            .iter()
            .filter(|r| r.sync_metadata.needs_sync && r.sync_metadata.last_synced_at.is_some())
            .count() as i64;

        let status = filter.sync_status.unwrap_or_default();
        let matching: Vec<&SourceRecord> = scoped
            .iter()
            .filter(|r| status.matches(&r.sync_metadata) && filter.matches_search(r))
            .collect();

        let offset = usize::try_from(filter.offset()).unwrap_or(usize::MAX);
        let entries = matching
            .iter()
            .skip(offset)
            .take(filter.limit() as usize)
            .map(|r| SyncStatusEntry::from(*r))
            .collect();

        Ok(SyncStatusPage {
            entries,
            total_matching: matching.len() as i64,
            counts: SyncCounts::from_parts(total, selected, synced),
        })
    }
}

// ── CRM documents ───────────────────────────────────────────────

struct StoredDocument {
    seq: u64,
    funder_id: Uuid,
    parent_id: Option<Uuid>,
    name_key: Option<String>,
    email_key: Option<String>,
    body: serde_json::Value,
}

#[derive(Default)]
struct DocumentState {
    next_seq: u64,
    documents: HashMap<(&'static str, Uuid), StoredDocument>,
    failing: HashSet<&'static str>,
}

impl DocumentState {
    fn check_writable(&self, collection: &'static str) -> McaResult<()> {
        if self.failing.contains(collection) {
            return Err(McaError::Database(format!(
                "writes to {collection} are rejected"
            )));
        }
        Ok(())
    }

    fn store<T: Document>(&mut self, doc: &T, seq: Option<u64>) -> McaResult<()> {
        let seq = seq.unwrap_or_else(|| {
            self.next_seq += 1;
            self.next_seq
        });
        let stored = StoredDocument {
            seq,
            funder_id: doc.funder_id(),
            parent_id: doc.parent_id(),
            name_key: doc.name_key(),
            email_key: doc.email_key(),
            body: serde_json::to_value(doc)?,
        };
        self.documents.insert((T::COLLECTION, doc.id()), stored);
        Ok(())
    }

    /// Everything that can reject a child swap, checked before any mutation.
    fn check_replace<T: Document>(&self, parent_id: Uuid, docs: &[T]) -> McaResult<()> {
        self.check_writable(T::COLLECTION)?;
        if let Some(stray) = docs.iter().find(|d| d.parent_id() != Some(parent_id)) {
            return Err(McaError::Validation(format!(
                "{} {} does not belong to parent {parent_id}",
                T::COLLECTION,
                stray.id()
            )));
        }
        Ok(())
    }

    fn swap_children<T: Document>(&mut self, parent_id: Uuid, docs: &[T]) -> McaResult<()> {
        self.documents.retain(|(collection, _), doc| {
            *collection != T::COLLECTION || doc.parent_id != Some(parent_id)
        });
        for doc in docs {
            self.store(doc, None)?;
        }
        Ok(())
    }

    fn collect<T: Document>(&self, keep: impl Fn(&StoredDocument) -> bool) -> McaResult<Vec<T>> {
        let mut matching: Vec<&StoredDocument> = self
            .documents
            .iter()
            .filter(|((collection, _), doc)| *collection == T::COLLECTION && keep(doc))
            .map(|(_, doc)| doc)
            .collect();
        matching.sort_by_key(|doc| doc.seq);
        matching
            .into_iter()
            .map(|doc| decode::<T>(&doc.body))
            .collect()
    }
}

fn decode<T: Document>(body: &serde_json::Value) -> McaResult<T> {
    serde_json::from_value(body.clone())
        .map_err(|e| McaError::Internal(format!("corrupt {} document: {e}", T::COLLECTION)))
}

#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    state: Arc<Mutex<DocumentState>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every write to the given collection.
    pub fn fail_collection(&self, collection: &'static str) {
        if let Ok(mut state) = lock(&self.state) {
            state.failing.insert(collection);
        }
    }

    /// Number of documents stored in a collection.
    pub fn count(&self, collection: &str) -> usize {
        lock(&self.state)
            .map(|state| {
                state
                    .documents
                    .keys()
                    .filter(|(c, _)| *c == collection)
                    .count()
            })
            .unwrap_or(0)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get<T: Document>(&self, id: Uuid) -> McaResult<Option<T>> {
        let state = lock(&self.state)?;
        state
            .documents
            .get(&(T::COLLECTION, id))
            .map(|doc| decode(&doc.body))
            .transpose()
    }

    async fn find_by_key<T: Document>(
        &self,
        scope: Option<Uuid>,
        key: LookupKey,
        value: &str,
    ) -> McaResult<Option<T>> {
        let Some(needle) = normalize_key(value) else {
            return Ok(None);
        };
        let state = lock(&self.state)?;
        let found = state.collect::<T>(|doc| {
            let candidate = match key {
                LookupKey::Name => doc.name_key.as_deref(),
                LookupKey::Email => doc.email_key.as_deref(),
            };
            candidate == Some(needle.as_str()) && scope.map_or(true, |f| doc.funder_id == f)
        })?;
        Ok(found.into_iter().next())
    }

    async fn list_for_funder<T: Document>(&self, funder_id: Uuid) -> McaResult<Vec<T>> {
        let state = lock(&self.state)?;
        state.collect(|doc| doc.funder_id == funder_id)
    }

    async fn list_by_parent<T: Document>(&self, parent_id: Uuid) -> McaResult<Vec<T>> {
        let state = lock(&self.state)?;
        state.collect(|doc| doc.parent_id == Some(parent_id))
    }

    async fn insert<T: Document>(&self, doc: &T) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        state.check_writable(T::COLLECTION)?;
        if state.documents.contains_key(&(T::COLLECTION, doc.id())) {
            return Err(McaError::Database(format!(
                "duplicate {} id: {}",
                T::COLLECTION,
                doc.id()
            )));
        }
        state.store(doc, None)
    }

    async fn update<T: Document>(&self, doc: &T) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        state.check_writable(T::COLLECTION)?;
        let seq = state
            .documents
            .get(&(T::COLLECTION, doc.id()))
            .map(|existing| existing.seq)
            .ok_or_else(|| {
                McaError::NotFound(format!("{} document not found: {}", T::COLLECTION, doc.id()))
            })?;
        state.store(doc, Some(seq))
    }

    async fn replace_children<T: Document>(&self, parent_id: Uuid, docs: &[T]) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        state.check_replace(parent_id, docs)?;
        state.swap_children(parent_id, docs)
    }

    async fn replace_children_pair<A: Document, B: Document>(
        &self,
        parent_id: Uuid,
        first: &[A],
        second: &[B],
    ) -> McaResult<()> {
        let mut state = lock(&self.state)?;
        state.check_replace(parent_id, first)?;
        state.check_replace(parent_id, second)?;
        state.swap_children(parent_id, first)?;
        state.swap_children(parent_id, second)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crm::models::{
        Disbursement, DisbursementIntent, FeeType, FundingFee, IntentStatus,
    };
    use crate::source::models::SyncStatusKind;

    fn fee(funding_id: Uuid, name: &str) -> FundingFee {
        FundingFee {
            id: Uuid::new_v4(),
            funder_id: Uuid::new_v4(),
            funding_id,
            fee_type_id: None,
            name: name.to_string(),
            amount: 100,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn documents_keep_insertion_order_and_keys() {
        let store = MemoryDocumentStore::new();
        let funder = Uuid::new_v4();
        for name in ["Bank Fee", "Wire Fee"] {
            store
                .insert(&FeeType {
                    id: Uuid::new_v4(),
                    funder_id: funder,
                    name: name.to_string(),
                })
                .await
                .unwrap();
        }

        let all: Vec<FeeType> = store.list_for_funder(funder).await.unwrap();
        let names: Vec<&str> = all.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Bank Fee", "Wire Fee"]);

        let found: Option<FeeType> = store
            .find_by_key(Some(funder), LookupKey::Name, "WIRE fee")
            .await
            .unwrap();
        assert_eq!(found.map(|f| f.name), Some("Wire Fee".to_string()));
    }

    #[tokio::test]
    async fn replace_children_is_all_or_nothing() {
        let store = MemoryDocumentStore::new();
        let funding = Uuid::new_v4();
        let original = fee(funding, "Bank Fee");
        store.insert(&original).await.unwrap();

        let bad = vec![fee(funding, "New"), fee(Uuid::new_v4(), "Stray")];
        assert!(store.replace_children(funding, &bad).await.is_err());
        let kept: Vec<FundingFee> = store.list_by_parent(funding).await.unwrap();
        assert_eq!(kept, vec![original]);

        let good = vec![fee(funding, "Replacement")];
        store.replace_children(funding, &good).await.unwrap();
        let now: Vec<FundingFee> = store.list_by_parent(funding).await.unwrap();
        assert_eq!(now, good);
    }

    #[tokio::test]
    async fn replace_children_pair_rolls_back_both_sets() {
        let store = MemoryDocumentStore::new();
        let funder = Uuid::new_v4();
        let funding = Uuid::new_v4();
        let intent = |amount: i64| DisbursementIntent {
            id: Uuid::new_v4(),
            funder_id: funder,
            funding_id: funding,
            merchant: None,
            amount,
            status: IntentStatus::Succeed,
            scheduled_date: None,
            created_at: Utc::now(),
        };
        let paid = |intent: &DisbursementIntent| Disbursement {
            id: Uuid::new_v4(),
            funder_id: funder,
            funding_id: funding,
            intent_id: intent.id,
            amount: intent.amount,
            status: IntentStatus::Succeed,
            disbursed_date: None,
            created_at: Utc::now(),
        };
        let old_intent = intent(100);
        let old_paid = paid(&old_intent);
        store.insert(&old_intent).await.unwrap();
        store.insert(&old_paid).await.unwrap();

        store.fail_collection(Disbursement::COLLECTION);
        let new_intent = intent(200);
        let new_paid = paid(&new_intent);
        assert!(store
            .replace_children_pair(funding, &[new_intent], &[new_paid])
            .await
            .is_err());

        let intents: Vec<DisbursementIntent> = store.list_by_parent(funding).await.unwrap();
        let disbursements: Vec<Disbursement> = store.list_by_parent(funding).await.unwrap();
        assert_eq!(intents, vec![old_intent]);
        assert_eq!(disbursements, vec![old_paid]);
    }

    #[tokio::test]
    async fn failing_collection_rejects_writes() {
        let store = MemoryDocumentStore::new();
        store.fail_collection(FundingFee::COLLECTION);
        assert!(store.insert(&fee(Uuid::new_v4(), "Bank Fee")).await.is_err());
        assert_eq!(store.count(FundingFee::COLLECTION), 0);
    }

    #[tokio::test]
    async fn payments_match_scalar_string_and_embedded_advance() {
        let repo = MemorySourceRepository::new();
        let funder = Uuid::new_v4();
        for (id, advance) in [
            (1, serde_json::json!(9)),
            (2, serde_json::json!("9")),
            (3, serde_json::json!({ "id": 9 })),
            (4, serde_json::json!(10)),
        ] {
            repo.insert(SourceRecord::new(
                SourceKind::Payment,
                id,
                funder,
                serde_json::json!({ "advance": advance }),
            ))
            .unwrap();
        }
        let found = repo.list_payments_for_advance(funder, 9).await.unwrap();
        assert_eq!(found.len(), 3);
    }

    #[tokio::test]
    async fn sync_status_filters_and_counts() {
        let repo = MemorySourceRepository::new();
        let funder = Uuid::new_v4();
        for id in 1..=4 {
            let mut record = SourceRecord::new(
                SourceKind::Iso,
                id,
                funder,
                serde_json::json!({ "name": format!("ISO {id}") }),
            );
            record.sync_metadata.needs_sync = id != 4;
            if id == 1 {
                record.sync_metadata.last_synced_at = Some(Utc::now());
            }
            repo.insert(record).unwrap();
        }

        let page = repo
            .sync_status(
                SourceKind::Iso,
                funder,
                &SyncStatusFilter {
                    sync_status: Some(SyncStatusKind::Pending),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.counts, SyncCounts::from_parts(4, 3, 1));
        let ids: Vec<i64> = page.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
