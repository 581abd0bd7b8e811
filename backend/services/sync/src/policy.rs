use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use mca_common::error::{McaError, McaResult};
use mca_db::source::models::SourceKind;

/// How an existing target document absorbs a freshly transformed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Overwrite the whole document. Append-only fields are still unioned.
    Replace,
    /// Overwrite changed fields only; skip the write when nothing changed.
    Merge,
}

impl fmt::Display for UpdatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Merge => "merge",
        })
    }
}

impl FromStr for UpdatePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "replace" | "overwrite" => Ok(Self::Replace),
            "merge" | "diff" => Ok(Self::Merge),
            other => Err(format!("unknown update policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PolicySet {
    overrides: HashMap<SourceKind, UpdatePolicy>,
}

impl PolicySet {
    /// Fundings are rebuilt wholesale from the advance; everything else is
    /// merged field by field.
    pub fn default_for(kind: SourceKind) -> UpdatePolicy {
        match kind {
            SourceKind::Advance => UpdatePolicy::Replace,
            _ => UpdatePolicy::Merge,
        }
    }

    pub fn for_kind(&self, kind: SourceKind) -> UpdatePolicy {
        self.overrides
            .get(&kind)
            .copied()
            .unwrap_or_else(|| Self::default_for(kind))
    }

    pub fn with_override(mut self, kind: SourceKind, policy: UpdatePolicy) -> Self {
        self.overrides.insert(kind, policy);
        self
    }

    /// Build from `(entity, policy)` pairs such as `("iso", "replace")`.
    pub fn from_pairs(pairs: &[(String, String)]) -> McaResult<Self> {
        pairs.iter().try_fold(Self::default(), |set, (entity, policy)| {
            let kind = entity
                .parse::<SourceKind>()
                .map_err(|e| McaError::Config(format!("SYNC_POLICY_OVERRIDES: {e}")))?;
            let policy = policy
                .parse::<UpdatePolicy>()
                .map_err(|e| McaError::Config(format!("SYNC_POLICY_OVERRIDES: {e}")))?;
            Ok(set.with_override(kind, policy))
        })
    }
}
