use mca_db::crm::models::IntentStatus;

/// Net amount sent to the merchant, in cents. `None` when fees consume the
/// whole principal; callers skip the disbursement in that case.
pub fn disbursement_amount(principal: i64, bank_fee: i64, application_fee: i64) -> Option<i64> {
    let amount = principal
        .saturating_sub(bank_fee)
        .saturating_sub(application_fee);
    (amount > 0).then_some(amount)
}

/// Commission intents settle once the advance is funded.
pub fn commission_intent_status(funded: bool) -> IntentStatus {
    if funded {
        IntentStatus::Succeed
    } else {
        IntentStatus::Scheduled
    }
}
