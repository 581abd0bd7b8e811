pub mod advance;
pub mod iso;
pub mod lender;
pub mod merchant;
pub mod representative;
pub mod syndicator;
pub mod underwriter;
pub mod user;

use std::sync::Arc;

use mca_common::error::{McaError, McaResult};
use mca_db::crm::repositories::DocumentStore;
use mca_db::source::models::{SourceKind, SourceRecord};
use mca_db::source::repositories::SourceRepository;

use crate::engine::{EntitySyncer, SyncContext};

pub use advance::AdvanceSyncer;
pub use iso::IsoSyncer;
pub use lender::LenderSyncer;
pub use merchant::MerchantSyncer;
pub use representative::RepresentativeSyncer;
pub use syndicator::SyndicatorSyncer;
pub use underwriter::UnderwriterSyncer;
pub use user::UserSyncer;

/// The syncer responsible for one source kind.
pub fn for_kind<D, S>(ctx: Arc<SyncContext<D, S>>, kind: SourceKind) -> McaResult<Box<dyn EntitySyncer>>
where
    D: DocumentStore + 'static,
    S: SourceRepository + 'static,
{
    Ok(match kind {
        SourceKind::Lender => Box::new(LenderSyncer::new(ctx)),
        SourceKind::Iso => Box::new(IsoSyncer::new(ctx)),
        SourceKind::Merchant => Box::new(MerchantSyncer::new(ctx)),
        SourceKind::User => Box::new(UserSyncer::new(ctx)),
        SourceKind::Syndicator => Box::new(SyndicatorSyncer::new(ctx)),
        SourceKind::SalesRep => Box::new(RepresentativeSyncer::new(ctx)),
        SourceKind::Underwriter => Box::new(UnderwriterSyncer::new(ctx)),
        SourceKind::Advance => Box::new(AdvanceSyncer::new(ctx)),
        SourceKind::Payment => {
            return Err(McaError::Validation(
                "payments sync only as part of their advance".to_string(),
            ))
        }
    })
}

/// Trimmed display name, required for every named target.
pub(crate) fn required_name(record: &SourceRecord, name: Option<&str>) -> McaResult<String> {
    name.map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            McaError::Validation(format!("{} {} has no name", record.kind.label(), record.id))
        })
}
