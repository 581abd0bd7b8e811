use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::{Syndication, Syndicator};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::SourceKind;
use mca_db::source::payloads::TextValue;
use mca_db::source::repositories::SourceRepository;
use mca_transform::money::{cents_or_zero, optional_decimal};

use super::{FanoutInput, FanoutMode};
use crate::engine::SyncContext;

/// One syndication per participating syndicator that has been synced.
/// Existing syndications are matched on the syndicator.
pub(super) async fn sync<D, S>(ctx: &SyncContext<D, S>, input: &FanoutInput<'_>) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    if input.advance.participations.is_empty() {
        return Ok(0);
    }

    let existing: Vec<Syndication> = ctx.store.list_by_parent(funding.id).await?;
    let resolver = ctx.resolver();
    let mut written = 0;

    for participation in &input.advance.participations {
        let Some(syndicator) = resolver
            .resolve_embedded::<Syndicator>(SourceKind::Syndicator, participation.syndicator.as_ref())
            .await?
        else {
            tracing::debug!(
                source_id = input.record.id,
                "participating syndicator not synced yet, skipping"
            );
            continue;
        };

        let amount = cents_or_zero(TextValue::opt(participation.amount.as_ref()))?;
        let percent = optional_decimal(TextValue::opt(participation.percent.as_ref()))?;
        let now = Utc::now();

        match existing.iter().find(|s| s.syndicator.id == syndicator.id) {
            Some(_) if input.mode == FanoutMode::Create => {}
            Some(current) => {
                let updated = Syndication {
                    syndicator,
                    amount,
                    percent,
                    updated_at: now,
                    ..current.clone()
                };
                if updated.amount != current.amount
                    || updated.percent != current.percent
                    || updated.syndicator != current.syndicator
                {
                    ctx.store.update(&updated).await?;
                    written += 1;
                }
            }
            None => {
                ctx.store
                    .insert(&Syndication {
                        id: Uuid::new_v4(),
                        funder_id: funding.funder_id,
                        funding_id: funding.id,
                        syndicator,
                        amount,
                        percent,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?;
                written += 1;
            }
        }
    }

    Ok(written)
}
