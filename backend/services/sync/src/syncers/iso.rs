use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{Iso, IsoFunder};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceIso;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::{contact_info, primary_address, text};

use super::required_name;
use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

/// ISOs are shared across funders; each funder that syncs one gets an
/// ISO-funder link.
pub struct IsoSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> IsoSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, iso: &SourceIso) -> McaResult<Iso> {
        let info = contact_info(iso.email.as_deref(), iso.phone.as_deref(), &iso.contacts);
        let now = Utc::now();
        Ok(Iso {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            name: required_name(record, iso.name.as_deref())?,
            email: info.email,
            phone: info.phone,
            website: text(iso.website.as_deref()),
            address: primary_address(&iso.addresses),
            contact_name: info.contact_name,
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<D, S> EntitySyncer for IsoSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Iso
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceIso = record.payload_as()?;
        let incoming = self.build(record, &payload)?;

        let keys = [NaturalKey::name(None, Some(&incoming.name))];
        let existing = self.ctx.locate::<Iso>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            let iso_id = persisted.doc().id;
            let funder_id = self.ctx.funder_id;
            self.ctx
                .link(
                    record,
                    iso_id,
                    |l: &IsoFunder| l.funder_id == funder_id,
                    || IsoFunder {
                        id: Uuid::new_v4(),
                        funder_id,
                        iso_id,
                    },
                )
                .await;
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncers::testing::{context, reload, seed};
    use mca_db::crm::document::Document;
    use serde_json::json;

    #[tokio::test]
    async fn create_links_iso_to_funder() {
        let ctx = context().await;
        let syncer = IsoSyncer::new(ctx.clone());
        let record = seed(
            &ctx,
            SourceKind::Iso,
            10,
            json!({
                "name": "Blue Harbor",
                "website": " blueharbor.com ",
                "contacts": [
                    { "first_name": "Sam", "last_name": "Hill", "phone": "555-0101" },
                    { "primary": true, "first_name": "Ana", "last_name": "Ruiz", "email": "ana@bh.com" }
                ]
            }),
        );

        let outcome = syncer.sync_record(&record, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Synced);

        let iso_id = reload(&ctx, &record).sync_metadata.sync_id.unwrap();
        let iso: Iso = ctx.store.get(iso_id).await.unwrap().unwrap();
        assert_eq!(iso.contact_name.as_deref(), Some("Ana Ruiz"));
        assert_eq!(iso.email.as_deref(), Some("ana@bh.com"));
        assert_eq!(iso.website.as_deref(), Some("blueharbor.com"));

        let links: Vec<IsoFunder> = ctx.store.list_by_parent(iso_id).await.unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].funder_id, ctx.funder_id);
    }

    #[tokio::test]
    async fn soft_match_adopts_global_iso_and_links_once() {
        let ctx = context().await;
        let now = Utc::now();
        let shared = Iso {
            id: Uuid::new_v4(),
            funder_id: Uuid::new_v4(),
            name: "Blue Harbor".to_string(),
            email: Some("ops@bh.com".to_string()),
            phone: None,
            website: None,
            address: None,
            contact_name: None,
            orgmeter_id: None,
            created_at: now,
            updated_at: now,
        };
        ctx.store.insert(&shared).await.unwrap();

        let syncer = IsoSyncer::new(ctx.clone());
        let record = seed(&ctx, SourceKind::Iso, 11, json!({ "name": "BLUE HARBOR" }));
        let outcome = syncer.sync_record(&record, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);

        let stored = reload(&ctx, &record);
        assert_eq!(stored.sync_metadata.sync_id, Some(shared.id));
        syncer.sync_record(&stored, RecordOptions::default()).await.unwrap();

        assert_eq!(ctx.store.count(Iso::COLLECTION), 1);
        assert_eq!(ctx.store.count(IsoFunder::COLLECTION), 1);
        let merged: Iso = ctx.store.get(shared.id).await.unwrap().unwrap();
        // The OrgMeter record carries no email, so the adopted ISO loses it.
        assert_eq!(merged.email, None);
        assert_eq!(merged.name, "BLUE HARBOR");
        assert_eq!(merged.funder_id, shared.funder_id);
    }

    #[tokio::test]
    async fn resync_clears_fields_removed_upstream() {
        let ctx = context().await;
        let syncer = IsoSyncer::new(ctx.clone());
        let record = seed(
            &ctx,
            SourceKind::Iso,
            13,
            json!({
                "name": "Blue Harbor",
                "website": "bh.com",
                "contacts": [{ "primary": true, "email": "ops@bh.com" }]
            }),
        );
        syncer.sync_record(&record, RecordOptions::default()).await.unwrap();

        let mut trimmed = reload(&ctx, &record);
        trimmed.payload = json!({ "name": "Blue Harbor" });
        let outcome = syncer.sync_record(&trimmed, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);

        let iso_id = trimmed.sync_metadata.sync_id.unwrap();
        let iso: Iso = ctx.store.get(iso_id).await.unwrap().unwrap();
        assert_eq!(iso.email, None);
        assert_eq!(iso.website, None);
        assert_eq!(ctx.store.count(Iso::COLLECTION), 1);
    }

    #[tokio::test]
    async fn skip_leaves_existing_untouched() {
        let ctx = context().await;
        let syncer = IsoSyncer::new(ctx.clone());
        let record = seed(&ctx, SourceKind::Iso, 12, json!({ "name": "Blue Harbor" }));
        syncer.sync_record(&record, RecordOptions::default()).await.unwrap();

        let stored = reload(&ctx, &record);
        let outcome = syncer
            .sync_record(
                &stored,
                RecordOptions {
                    update_existing: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome, RecordOutcome::Skipped);
    }
}
