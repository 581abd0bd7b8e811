use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::models::{join_name, CrmUser, UserFunder, UserLender};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::payloads::{SourceSyndicator, SourceUser};
use mca_db::source::repositories::SourceRepository;
use mca_transform::contact::text;
use mca_transform::enums::user_role;

use super::SyndicatorSyncer;
use crate::engine::{EntitySyncer, NaturalKey, RecordOptions, RecordOutcome, SyncContext};

/// OrgMeter users become CRM users, except users whose organization is a
/// syndicator: those are synced as syndicators.
pub struct UserSyncer<D, S> {
    ctx: Arc<SyncContext<D, S>>,
    syndicators: SyndicatorSyncer<D, S>,
}

impl<D, S> UserSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    pub fn new(ctx: Arc<SyncContext<D, S>>) -> Self {
        Self {
            syndicators: SyndicatorSyncer::new(ctx.clone()),
            ctx,
        }
    }

    fn build(&self, record: &SourceRecord, user: &SourceUser) -> McaResult<CrmUser> {
        let first_name = text(user.first_name.as_deref());
        let last_name = text(user.last_name.as_deref());
        let email = text(user.email.as_deref());
        if first_name.is_none() && last_name.is_none() && email.is_none() {
            return Err(McaError::Validation(format!(
                "User {} has neither a name nor an email",
                record.id
            )));
        }

        let entity_type = user.entity.as_ref().and_then(|e| e.entity_type.as_deref());
        let now = Utc::now();
        Ok(CrmUser {
            id: Uuid::new_v4(),
            funder_id: self.ctx.funder_id,
            first_name,
            last_name,
            email,
            phone: text(user.phone.as_deref()),
            role: user_role(entity_type),
            inactive: user.inactive,
            orgmeter_id: Some(record.id),
            created_at: now,
            updated_at: now,
        })
    }

    fn as_syndicator(user: &SourceUser) -> SourceSyndicator {
        let entity_name = user
            .entity
            .as_ref()
            .and_then(|e| text(e.name.as_deref()));
        SourceSyndicator {
            name: entity_name.or_else(|| {
                let joined = join_name(user.first_name.as_deref(), user.last_name.as_deref());
                (!joined.is_empty()).then_some(joined)
            }),
            email: user.email.clone(),
            phone: user.phone.clone(),
            addresses: Vec::new(),
        }
    }

    async fn link_relationships(
        &self,
        record: &SourceRecord,
        user_id: Uuid,
        payload: &SourceUser,
    ) -> McaResult<()> {
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

        let Some(entity) = payload.entity.as_ref().filter(|e| e.is("lender")) else {
            return Ok(());
        };
        let lender_id = self
            .ctx
            .resolver()
            .resolve(SourceKind::Lender, entity.id.as_ref())
            .await?;
        if let Some(lender_id) = lender_id {
            self.ctx
                .link(
                    record,
                    user_id,
                    |l: &UserLender| l.lender_id == lender_id,
                    || UserLender {
                        id: Uuid::new_v4(),
                        funder_id,
                        user_id,
                        lender_id,
                    },
                )
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl<D, S> EntitySyncer for UserSyncer<D, S>
where
    D: DocumentStore,
    S: SourceRepository,
{
    fn kind(&self) -> SourceKind {
        SourceKind::User
    }

    async fn sync_record(
        &self,
        record: &SourceRecord,
        options: RecordOptions,
    ) -> McaResult<RecordOutcome> {
        let payload: SourceUser = record.payload_as()?;

        if payload.entity.as_ref().is_some_and(|e| e.is("syndicator")) {
            tracing::debug!(source_id = record.id, "user is a syndicator, delegating");
            return self
                .syndicators
                .sync_payload(record, &Self::as_syndicator(&payload), options)
                .await;
        }

        let incoming = self.build(record, &payload)?;
        let keys = [NaturalKey::email(None, incoming.email.as_deref())];
        let existing = self.ctx.locate::<CrmUser>(record, &keys).await?;
        let persisted = self
            .ctx
            .persist(self.kind(), existing, incoming, options)
            .await?;

        if !persisted.is_skipped() {
            if let Err(e) = self
                .link_relationships(record, persisted.doc().id, &payload)
                .await
            {
                tracing::warn!(
                    source_id = record.id,
                    error = %e,
                    "failed to link user relationships"
                );
            }
        }

        Ok(self.ctx.finish(record, &persisted).await)
    }
}
