use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// A CRM record persisted as one document in a named collection.
///
/// The key accessors feed the indexed lookup columns; the document body is
/// stored whole.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: &'static str;

    fn id(&self) -> Uuid;

    /// Owning (or creating) funder.
    fn funder_id(&self) -> Uuid;

    /// Parent document for dependent and join records.
    fn parent_id(&self) -> Option<Uuid> {
        None
    }

    fn name_key(&self) -> Option<String> {
        None
    }

    fn email_key(&self) -> Option<String> {
        None
    }
}

/// Natural keys a document can be looked up by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKey {
    Name,
    Email,
}

/// Lookup keys are compared trimmed and lowercased.
pub fn normalize_key(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

pub(crate) fn normalized(value: Option<&str>) -> Option<String> {
    value.and_then(normalize_key)
}

/// Implements [`Document`] for records keyed only by id, funder and an
/// optional parent field.
macro_rules! plain_document {
    ($ty:ty, $collection:literal) => {
        impl $crate::crm::document::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn funder_id(&self) -> ::uuid::Uuid {
                self.funder_id
            }
        }
    };
    ($ty:ty, $collection:literal, parent = $parent:ident) => {
        impl $crate::crm::document::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn id(&self) -> ::uuid::Uuid {
                self.id
            }

            fn funder_id(&self) -> ::uuid::Uuid {
                self.funder_id
            }

            fn parent_id(&self) -> Option<::uuid::Uuid> {
                Some(self.$parent)
            }
        }
    };
}

pub(crate) use plain_document;
