use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::document::{Document, LookupKey};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::repositories::SourceRepository;

use crate::bookkeeping::Bookkeeper;
use crate::policy::{PolicySet, UpdatePolicy};
use crate::resolver::IdentityResolver;
use crate::target::SyncTarget;

/// Fields that never count as a change when merging.
const UNTRACKED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Terminal state of one successfully handled record. Failures are the
/// `Err` side of [`EntitySyncer::sync_record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Synced,
    Updated,
    Skipped,
}

#[derive(Debug, Clone, Copy)]
pub struct RecordOptions {
    pub update_existing: bool,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            update_existing: true,
        }
    }
}

#[async_trait]
pub trait EntitySyncer: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome>;
}

/// Everything a sync run shares: both stores, the funder being synced, the
/// acting user and the update policies.
pub struct SyncContext<D, S> {
    pub store: D,
    pub source: S,
    pub funder_id: Uuid,
    pub actor: String,
    pub policies: PolicySet,
}

/// A natural-key lookup tried when a record has no usable sync id.
#[derive(Debug, Clone)]
pub struct NaturalKey {
    pub scope: Option<Uuid>,
    pub key: LookupKey,
    pub value: Option<String>,
}

impl NaturalKey {
    pub fn name(scope: Option<Uuid>, value: Option<&str>) -> Self {
        Self::new(scope, LookupKey::Name, value)
    }

    pub fn email(scope: Option<Uuid>, value: Option<&str>) -> Self {
        Self::new(scope, LookupKey::Email, value)
    }

    fn new(scope: Option<Uuid>, key: LookupKey, value: Option<&str>) -> Self {
        Self {
            scope,
            key,
            value: value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Persisted<T> {
    Created(T),
    Updated(T),
    Skipped(T),
}

impl<T> Persisted<T> {
    pub fn doc(&self) -> &T {
        match self {
            Self::Created(doc) | Self::Updated(doc) | Self::Skipped(doc) => doc,
        }
    }

    pub fn outcome(&self) -> RecordOutcome {
        match self {
            Self::Created(_) => RecordOutcome::Synced,
            Self::Updated(_) => RecordOutcome::Updated,
            Self::Skipped(_) => RecordOutcome::Skipped,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

impl<D, S> SyncContext<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(store: D, source: S, funder_id: Uuid, actor: impl Into<String>) -> Self {
        Self {
            store,
            source,
            funder_id,
            actor: actor.into(),
            policies: PolicySet::default(),
        }
    }

    pub fn with_policies(mut self, policies: PolicySet) -> Self {
        self.policies = policies;
        self
    }

    pub fn resolver(&self) -> IdentityResolver<'_, D, S> {
        IdentityResolver::new(&self.store, &self.source, self.funder_id)
    }

    pub fn bookkeeper(&self) -> Bookkeeper<'_, S> {
        Bookkeeper::new(&self.source, &self.actor)
    }

    /// Find the target a record already maps to: by sync id first, then by
    /// each natural key in order. A natural-key hit is adopted by writing its
    /// id to the record before anything else happens.
    pub async fn locate<T: SyncTarget>(
        &self,
        record: &SourceRecord,
        keys: &[NaturalKey],
    ) -> McaResult<Option<T>> {
        if let Some(sync_id) = record.sync_metadata.sync_id {
            if let Some(doc) = self.store.get::<T>(sync_id).await? {
                return Ok(Some(doc));
            }
            tracing::warn!(
                entity = %record.kind,
                source_id = record.id,
                sync_id = %sync_id,
                "sync id points at a missing target, trying natural keys"
            );
        }

        for natural in keys {
            let Some(value) = natural.value.as_deref() else {
                continue;
            };
            let Some(doc) = self
                .store
                .find_by_key::<T>(natural.scope, natural.key, value)
                .await?
            else {
                continue;
            };

            self.source
                .set_sync_id(record.kind, record.funder_id, record.id, doc.id())
                .await?;
            tracing::info!(
                entity = %record.kind,
                source_id = record.id,
                target_id = %doc.id(),
                key = ?natural.key,
                "adopted existing target by natural key"
            );
            return Ok(Some(doc));
        }

        Ok(None)
    }

    /// Create, update or skip depending on whether a target exists.
    pub async fn persist<T: SyncTarget>(
        &self,
        kind: SourceKind,
        existing: Option<T>,
        incoming: T,
        options: RecordOptions,
    ) -> McaResult<Persisted<T>> {
        match existing {
            None => {
                self.store.insert(&incoming).await?;
                Ok(Persisted::Created(incoming))
            }
            Some(existing) if !options.update_existing => Ok(Persisted::Skipped(existing)),
            Some(existing) => {
                let doc = self.apply_update(kind, &existing, incoming).await?;
                Ok(Persisted::Updated(doc))
            }
        }
    }

    async fn apply_update<T: SyncTarget>(
        &self,
        kind: SourceKind,
        existing: &T,
        mut incoming: T,
    ) -> McaResult<T> {
        incoming.carry_over(existing);
        match self.policies.for_kind(kind) {
            UpdatePolicy::Replace => {
                self.store.update(&incoming).await?;
                Ok(incoming)
            }
            UpdatePolicy::Merge => {
                let (merged, changed) = merge_documents(existing, &incoming)?;
                if changed.is_empty() {
                    tracing::debug!(
                        collection = T::COLLECTION,
                        target_id = %existing.id(),
                        "target unchanged, skipping write"
                    );
                    return Ok(existing.clone());
                }
                tracing::debug!(
                    collection = T::COLLECTION,
                    target_id = %existing.id(),
                    changed = ?changed,
                    "merging changed fields"
                );
                self.store.update(&merged).await?;
                Ok(merged)
            }
        }
    }

    /// Stamp bookkeeping for a written target and report the outcome.
    pub async fn finish<T: SyncTarget>(
        &self,
        record: &SourceRecord,
        persisted: &Persisted<T>,
    ) -> RecordOutcome {
        if !persisted.is_skipped() {
            self.bookkeeper()
                .record(record, Some(persisted.doc().id()))
                .await;
        }
        persisted.outcome()
    }

    /// Insert a join document under `parent_id` unless an equivalent one is
    /// already there. Failures are logged, never returned.
    pub async fn link<J, F, B>(&self, record: &SourceRecord, parent_id: Uuid, is_same: F, build: B)
    where
        J: Document,
        F: Fn(&J) -> bool + Send + Sync,
        B: FnOnce() -> J + Send,
    {
        let result: McaResult<bool> = async {
            let existing = self.store.list_by_parent::<J>(parent_id).await?;
            if existing.iter().any(&is_same) {
                return Ok(false);
            }
            self.store.insert(&build()).await?;
            Ok(true)
        }
        .await;

        match result {
            Ok(true) => tracing::debug!(
                collection = J::COLLECTION,
                parent_id = %parent_id,
                "linked"
            ),
            Ok(false) => {}
            Err(e) => tracing::warn!(
                entity = %record.kind,
                source_id = record.id,
                collection = J::COLLECTION,
                error = %e,
                "failed to write relationship"
            ),
        }
    }
}

/// Overlay every top-level field of `incoming` onto `existing`, nulls
/// included, so values cleared at the source are cleared here too.
/// Returns the merged document and the names of fields that changed.
pub fn merge_documents<T: Document>(existing: &T, incoming: &T) -> McaResult<(T, Vec<String>)> {
    let mut base = serde_json::to_value(existing)?;
    let overlay = serde_json::to_value(incoming)?;
    let (Some(base_map), Some(overlay_map)) = (base.as_object_mut(), overlay.as_object()) else {
        return Err(McaError::Internal(format!(
            "{} documents must serialize to objects",
            T::COLLECTION
        )));
    };

    let mut changed = Vec::new();
    for (field, value) in overlay_map {
        if UNTRACKED_FIELDS.contains(&field.as_str()) {
            continue;
        }
        if base_map.get(field) != Some(value) {
            base_map.insert(field.clone(), value.clone());
            changed.push(field.clone());
        }
    }
    if !changed.is_empty() {
        if let Some(updated_at) = overlay_map.get("updated_at") {
            base_map.insert("updated_at".to_string(), updated_at.clone());
        }
    }

    Ok((serde_json::from_value(base)?, changed))
}
