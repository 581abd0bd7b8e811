use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{Syndicator, SyndicatorFunder};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceSyndicator;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::{primary_address, text};
use mca_transform::names::parse_syndicator_name;

use super::required_name;
use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

pub struct SyndicatorSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> SyndicatorSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, syndicator: &SourceSyndicator) -> McaResult<Syndicator> {
        let name = required_name(record, syndicator.name.as_deref())?;
        let parsed = parse_syndicator_name(&name);
        let now = Utc::now();
        Ok(Syndicator {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            name,
            first_name: parsed.first_name,
            last_name: parsed.last_name,
            email: text(syndicator.email.as_deref()),
            phone: text(syndicator.phone.as_deref()),
            address: primary_address(&syndicator.addresses),
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }

    /// Sync a syndicator-shaped payload on behalf of `record`, which may be
    /// a syndicator record or a user record that represents a syndicator.
    pub async fn sync_payload(
        &self,
        record: &SourceRecord,
        payload: &SourceSyndicator,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let incoming = self.build(record, payload)?;

        let keys = [
            NaturalKey::email(None, incoming.email.as_deref()),
            NaturalKey::name(None, Some(&incoming.name)),
        ];
        let existing = self.ctx.locate::<Syndicator>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(SourceKind::Syndicator, existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            let syndicator_id = persisted.doc().id;
            let funder_id = self.ctx.funder_id;
            self.ctx
                .link(
                    record,
                    syndicator_id,
                    |l: &SyndicatorFunder| l.funder_id == funder_id,
                    || SyndicatorFunder {
                        id: Uuid::new_v4(),
                        funder_id,
                        syndicator_id,
                    },
                )
                .await;
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}

#[async_trait]
impl<D, S> EntitySyncer for SyndicatorSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Syndicator
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceSyndicator = record.payload_as()?;
        self.sync_payload(record, &payload, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syncers::testing::{context, reload, seed};
    use mca_db::crm::document::Document;
    use serde_json::json;

    #[tokio::test]
    async fn parses_person_out_of_company_name() {
        let ctx = context().await;
        let record = seed(
            &ctx,
            SourceKind::Syndicator,
            30,
            json!({ "name": "Gnyp Holdings Inc - Jared Gnyp", "email": "jared@gnyp.com" }),
        );
        SyndicatorSyncer::new(ctx.clone())
            .sync_record(&record, RecordOptions::default())
            .await
            .unwrap();

        let id = reload(&ctx, &record).sync_metadata.sync_id.unwrap();
        let syndicator: Syndicator = ctx.store.get(id).await.unwrap().unwrap();
        assert_eq!(syndicator.name, "Gnyp Holdings Inc - Jared Gnyp");
        assert_eq!(syndicator.first_name.as_deref(), Some("Jared"));
        assert_eq!(syndicator.last_name.as_deref(), Some("Gnyp"));
        assert_eq!(ctx.store.count(SyndicatorFunder::COLLECTION), 1);
    }

    #[tokio::test]
    async fn email_match_takes_precedence_over_name() {
        let ctx = context().await;
        let now = Utc::now();
        let by_email = Syndicator {
            id: Uuid::new_v4(),
            funder_id: ctx.funder_id,
            name: "J. Gnyp".to_string(),
            first_name: None,
            last_name: None,
            email: Some("jared@gnyp.com".to_string()),
            phone: None,
            address: None,
            orgmeter_id: None,
            created_at: now,
            updated_at: now,
        };
        let by_name = Syndicator {
            id: Uuid::new_v4(),
            name: "Jared Gnyp".to_string(),
            email: None,
            ..by_email.clone()
        };
        ctx.store.insert(&by_email).await.unwrap();
        ctx.store.insert(&by_name).await.unwrap();

        let record = seed(
            &ctx,
            SourceKind::Syndicator,
            31,
            json!({ "name": "Jared Gnyp", "email": "Jared@Gnyp.com" }),
        );
        let outcome = SyndicatorSyncer::new(ctx.clone())
            .sync_record(&record, RecordOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Updated);
        assert_eq!(reload(&ctx, &record).sync_metadata.sync_id, Some(by_email.id));
        assert_eq!(ctx.store.count(Syndicator::COLLECTION), 2);
    }
}
