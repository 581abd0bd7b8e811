use chrono::Utc;
use uuid::Uuid;

use mca_common::error::McaResult;
use mca_db::crm::models::PaybackPlan;
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::payloads::TextValue;
use mca_db::source::repositories::SourceRepository;
use mca_transform::dates::parse_optional_date;
use mca_transform::money::cents_or_zero;
use mca_transform::schedule::payday_schedule;

use super::{write_set, FanoutInput};
use crate::engine::SyncContext;

/// One plan per funding, only when the collection terms name a frequency.
/// Without one, an update removes the existing plan.
pub(super) async fn sync<D, S>(ctx: &SyncContext<D, S>, input: &FanoutInput<'_>) -> McaResult<usize>
where
    D: DocumentStore,
    S: SourceRepository,
{
    let funding = input.funding;
    let collection = input.advance.collection.as_ref();
    let Some((collection, schedule)) =
        collection.and_then(|c| payday_schedule(c).map(|schedule| (c, schedule)))
    else {
        tracing::debug!(
            source_id = input.record.id,
            frequency = ?collection.and_then(|c| c.frequency.as_deref()),
            "no usable collection frequency, no payback plan"
        );
        // An update still clears a plan the source no longer describes.
        return write_set(ctx, funding.id, Vec::<PaybackPlan>::new(), input.mode).await;
    };

    let plan = PaybackPlan {
        id: Uuid::new_v4(),
        funder_id: funding.funder_id,
        funding_id: funding.id,
        frequency: schedule.frequency,
        payday_list: schedule.payday_list,
        payment_amount: cents_or_zero(TextValue::opt(collection.payment_amount.as_ref()))?,
        total_amount: funding.payback_amount,
        start_date: parse_optional_date(collection.start_date.as_deref()).or(funding.funded_date),
        avoid_holiday: schedule.avoid_holiday,
        created_at: Utc::now(),
    };
    write_set(ctx, funding.id, vec![plan], input.mode).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::testing::funding;
    use crate::fanout::FanoutMode;
    use crate::syncers::testing::context;
    use mca_db::crm::models::PaybackFrequency;
    use mca_db::source::models::{SourceKind, SourceRecord};
    use mca_db::source::payloads::SourceAdvance;
    use serde_json::json;

    fn advance(collection: serde_json::Value) -> SourceAdvance {
        serde_json::from_value(json!({ "collection": collection })).unwrap()
    }

    #[tokio::test]
    async fn banking_days_plan_avoids_holidays() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let advance = advance(json!({
            "frequency": "Daily",
            "daily_type": "banking_days",
            "payment_amount": "350.00"
        }));
        let input = FanoutInput {
            record: &record,
            advance: &advance,
            funding: &funding,
            mode: FanoutMode::Create,
        };

        assert_eq!(sync(&*ctx, &input).await.unwrap(), 1);
        let plans: Vec<PaybackPlan> = ctx.store.list_by_parent(funding.id).await.unwrap();
        assert_eq!(plans[0].frequency, PaybackFrequency::Daily);
        assert_eq!(plans[0].payday_list, vec![1, 2, 3, 4, 5]);
        assert!(plans[0].avoid_holiday);
        assert_eq!(plans[0].payment_amount, 35_000);
        assert_eq!(plans[0].start_date, funding.funded_date);

        // A second create pass leaves the existing plan alone.
        assert_eq!(sync(&*ctx, &input).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn update_without_frequency_removes_existing_plan() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let weekly = advance(json!({ "frequency": "weekly", "weekly_day": "friday" }));
        let input = FanoutInput {
            record: &record,
            advance: &weekly,
            funding: &funding,
            mode: FanoutMode::Create,
        };
        assert_eq!(sync(&*ctx, &input).await.unwrap(), 1);

        let bare: SourceAdvance = serde_json::from_value(json!({})).unwrap();
        let input = FanoutInput {
            advance: &bare,
            mode: FanoutMode::Update,
            ..input
        };
        assert_eq!(sync(&*ctx, &input).await.unwrap(), 0);
        let plans: Vec<PaybackPlan> = ctx.store.list_by_parent(funding.id).await.unwrap();
        assert!(plans.is_empty());
    }

    #[tokio::test]
    async fn update_replaces_existing_plan() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let weekly = advance(json!({ "frequency": "weekly", "weekly_day": "2" }));
        let input = FanoutInput {
            record: &record,
            advance: &weekly,
            funding: &funding,
            mode: FanoutMode::Create,
        };
        assert_eq!(sync(&*ctx, &input).await.unwrap(), 1);

        let monthly = advance(json!({ "frequency": "monthly", "monthly_day": "15" }));
        let input = FanoutInput {
            advance: &monthly,
            mode: FanoutMode::Update,
            ..input
        };
        assert_eq!(sync(&*ctx, &input).await.unwrap(), 1);
        let plans: Vec<PaybackPlan> = ctx.store.list_by_parent(funding.id).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].frequency, PaybackFrequency::Monthly);
        assert_eq!(plans[0].payday_list, vec![15]);
    }

    #[tokio::test]
    async fn missing_frequency_writes_nothing() {
        let ctx = context().await;
        let funding = funding(ctx.funder_id);
        let record = SourceRecord::new(SourceKind::Advance, 100, ctx.funder_id, json!({}));
        let advance = advance(json!({ "payment_amount": "350.00" }));
        let input = FanoutInput {
            record: &record,
            advance: &advance,
            funding: &funding,
            mode: FanoutMode::Update,
        };

        assert_eq!(sync(&*ctx, &input).await.unwrap(), 0);
        let plans: Vec<PaybackPlan> = ctx.store.list_by_parent(funding.id).await.unwrap();
        assert!(plans.is_empty());
    }
}
