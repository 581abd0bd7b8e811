//! Pure field transformations from OrgMeter payloads to CRM values.

pub mod contact;
pub mod dates;
pub mod disbursement;
pub mod enums;
pub mod money;
pub mod names;
pub mod payback;
pub mod schedule;

pub use money::{Money, TransformError};
