use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::Lender;
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceLender;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::{contact_info, primary_address};
use mca_transform::enums::is_internal_lender;

use super::required_name;
use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

/// Lenders belong to a single funder and match on name within it.
pub struct LenderSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> LenderSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, lender: &SourceLender) -> McaResult<Lender> {
        let info = contact_info(
            lender.email.as_deref(),
            lender.phone.as_deref(),
            &lender.contacts,
        );
        let now = Utc::now();
        Ok(Lender {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            name: required_name(record, lender.name.as_deref())?,
            internal: is_internal_lender(lender.lender_type.as_deref()),
            email: info.email,
            phone: info.phone,
            address: primary_address(&lender.addresses),
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<D, S> EntitySyncer for LenderSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Lender
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceLender = record.payload_as()?;
        let incoming = self.build(record, &payload)?;

        let keys = [NaturalKey::name(Some(self.ctx.funder_id), Some(&incoming.name))];
        let existing = self.ctx.locate::<Lender>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

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
    async fn creates_then_updates_by_sync_id() {
        let ctx = context().await;
        let syncer = LenderSyncer::new(ctx.clone());
        let record = seed(
            &ctx,
            SourceKind::Lender,
            1,
            json!({
                "name": "House Capital",
                "type": "Internal",
                "contacts": [{ "primary": true, "email": "desk@house.com" }],
                "addresses": [{ "address1": "9 Wall St", "city": "New York" }]
            }),
        );

        let outcome = syncer.sync_record(&record, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Synced);

        let stored = reload(&ctx, &record);
        let lender_id = stored.sync_metadata.sync_id.unwrap();
        let lender: Lender = ctx.store.get(lender_id).await.unwrap().unwrap();
        assert!(lender.internal);
        assert_eq!(lender.email.as_deref(), Some("desk@house.com"));
        assert_eq!(lender.address.unwrap().city.as_deref(), Some("New York"));
        assert_eq!(lender.funder_id, ctx.funder_id);

        let outcome = syncer.sync_record(&stored, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Updated);
        assert_eq!(ctx.store.count(Lender::COLLECTION), 1);
    }

    #[tokio::test]
    async fn nameless_lender_fails() {
        let ctx = context().await;
        let syncer = LenderSyncer::new(ctx.clone());
        let record = seed(&ctx, SourceKind::Lender, 2, json!({ "name": "  " }));
        assert!(syncer
            .sync_record(&record, RecordOptions::default())
            .await
            .is_err());
        assert_eq!(ctx.store.count(Lender::COLLECTION), 0);
    }

    #[tokio::test]
    async fn name_match_in_another_funder_is_not_adopted() {
        let ctx = context().await;
        let now = Utc::now();
        ctx.store
            .insert(&Lender {
                id: Uuid::new_v4(),
                funder_id: Uuid::new_v4(),
                name: "House Capital".to_string(),
                internal: false,
                email: None,
                phone: None,
                address: None,
                orgmeter_id: None,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();

        let syncer = LenderSyncer::new(ctx.clone());
        let record = seed(&ctx, SourceKind::Lender, 3, json!({ "name": "House Capital" }));
        let outcome = syncer.sync_record(&record, RecordOptions::default()).await.unwrap();
        assert_eq!(outcome, RecordOutcome::Synced);
        assert_eq!(ctx.store.count(Lender::COLLECTION), 2);
    }
}
