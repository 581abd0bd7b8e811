use mca_db::crm::models::{FundingType, UserRole};

/// Advance `type` to the CRM funding vocabulary; unknown values are NEW.
pub fn funding_type(raw: Option<&str>) -> FundingType {
    match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
        Some("RENEWAL") => FundingType::Renewal,
        Some("REFINANCE") => FundingType::Refinance,
        Some("BUYOUT") => FundingType::Buyout,
        _ => FundingType::New,
    }
}

pub fn is_internal_lender(raw: Option<&str>) -> bool {
    raw.is_some_and(|s| s.trim().eq_ignore_ascii_case("internal"))
}

/// CRM role for an OrgMeter user given the type of the organization it
/// belongs to.
pub fn user_role(entity_type: Option<&str>) -> UserRole {
    match entity_type.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        Some("lender") => UserRole::LenderUser,
        Some("iso") => UserRole::IsoUser,
        _ => UserRole::FunderUser,
    }
}
