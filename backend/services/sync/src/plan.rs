use std::collections::BTreeSet;

use mca_common::error::{McaError, McaResult};
use mca_db::source::models::SourceKind;

/// Order the requested kinds so each runs after the kinds it references.
///
/// Dependencies outside the requested set are ignored: their targets are
/// assumed to exist from an earlier run. Among kinds that are ready at the
/// same time, declaration order wins.
pub fn sync_order(requested: &[SourceKind]) -> McaResult<Vec<SourceKind>> {
    if let Some(kind) = requested.iter().find(|k| !k.is_standalone()) {
        return Err(McaError::Validation(format!(
            "{kind} records sync only as part of their parent"
        )));
    }
    order_by(requested, |kind| kind.dependencies())
}

/// Kahn's algorithm over `requested`, with `deps` giving each kind's
/// upstream kinds.
fn order_by<F>(requested: &[SourceKind], deps: F) -> McaResult<Vec<SourceKind>>
where
    F: Fn(SourceKind) -> &'static [SourceKind],
{
    let mut pending: BTreeSet<SourceKind> = requested.iter().copied().collect();
    let mut ordered = Vec::with_capacity(pending.len());

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .copied()
            .find(|kind| deps(*kind).iter().all(|dep| !pending.contains(dep)));
        let Some(kind) = ready else {
            let stuck: Vec<String> = pending.iter().map(|k| k.to_string()).collect();
            return Err(McaError::Config(format!(
                "dependency cycle between entity kinds: {}",
                stuck.join(", ")
            )));
        };
        pending.remove(&kind);
        ordered.push(kind);
    }

    Ok(ordered)
}
