use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::models::{CrmUser, UserFunder, UserRole};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::SourceUnderwriter;
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::text;

use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

pub struct UnderwriterSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
}

impl<D, S> UnderwriterSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self { ctx }
    }

    fn build(&self, record: &SourceRecord, underwriter: &SourceUnderwriter) -> McaResult<CrmUser> {
        let email = text(underwriter.email.as_deref()).ok_or_else(|| {
            McaError::Validation(format!("Underwriter {} has no email", record.id))
        })?;
        let now = Utc::now();
        Ok(CrmUser {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            first_name: text(underwriter.first_name.as_deref()),
            last_name: text(underwriter.last_name.as_deref()),
            email: Some(email),
            phone: text(underwriter.phone.as_deref()),
            role: UserRole::Underwriter,
            inactive: underwriter.inactive,
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }
}

#[async_trait]
impl<D, S> EntitySyncer for UnderwriterSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::Underwriter
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceUnderwriter = record.payload_as()?;
        let incoming = self.build(record, &payload)?;

        let keys = [NaturalKey::email(None, incoming.email.as_deref())];
        let existing = self.ctx.locate::<CrmUser>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            let user_id = persisted.doc().id;
            let funder_id = self.ctx.funder_id;
            self.ctx
                .link(
                    record,
                    user_id,
                    |l: &UserFunder| l.funder_id == funder_id,
                    || UserFunder {
                        id: Uuid::new_v4(),
                        funder_id,
                        user_id,
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
    async fn creates_underwriter_user() {
        let ctx = context().await;
        let record = seed(
            &ctx,
            SourceKind::Underwriter,
            60,
            json!({ "first_name": "Lee", "last_name": "Park", "email": "lee@northwind.com" }),
        );
        UnderwriterSyncer::new(ctx.clone())
            .sync_record(&record, RecordOptions::default())
            .await
            .unwrap();

        let id = reload(&ctx, &record).sync_metadata.sync_id.unwrap();
        let user: CrmUser = ctx.store.get(id).await.unwrap().unwrap();
        assert_eq!(user.role, UserRole::Underwriter);
        assert_eq!(user.full_name(), "Lee Park");
        assert_eq!(ctx.store.count(UserFunder::COLLECTION), 1);
    }

    #[tokio::test]
    async fn underwriter_without_email_fails() {
        let ctx = context().await;
        let record = seed(&ctx, SourceKind::Underwriter, 61, json!({ "first_name": "Lee" }));
        let result = UnderwriterSyncer::new(ctx.clone())
            .sync_record(&record, RecordOptions::default())
            .await;
        assert!(matches!(result, Err(McaError::Validation(_))));
    }
}
