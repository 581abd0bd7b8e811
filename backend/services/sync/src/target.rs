use mca_db::crm::document::Document;
use mca_db::crm::models::{
    CrmUser, EmbeddedRef, Funding, Iso, Lender, Merchant, Representative, Syndicator,
};

/// A CRM document that an OrgMeter record syncs into.
pub trait SyncTarget: Document {
    /// Copy the fields a rebuilt document must keep from the stored one.
    fn carry_over(&mut self, existing: &Self);

    /// Display snapshot used when other documents reference this one.
    fn embedded(&self) -> EmbeddedRef;
}

macro_rules! party_target {
    ($ty:ty, |$doc:ident| $name:expr) => {
        impl SyncTarget for $ty {
            fn carry_over(&mut self, existing: &Self) {
                self.id = existing.id;
                self.funder_id = existing.funder_id;
                self.created_at = existing.created_at;
            }

            fn embedded(&self) -> EmbeddedRef {
                let $doc = self;
                EmbeddedRef {
                    id: self.id,
                    name: $name,
                    email: self.email.clone(),
                    phone: self.phone.clone(),
                }
            }
        }
    };
}

party_target!(Iso, |d| d.name.clone());
party_target!(Merchant, |d| d.name.clone());
party_target!(Lender, |d| d.name.clone());
party_target!(Syndicator, |d| d.name.clone());
party_target!(CrmUser, |d| d.full_name());
party_target!(Representative, |d| d.full_name());

impl SyncTarget for Funding {
    fn carry_over(&mut self, existing: &Self) {
        self.id = existing.id;
        self.funder_id = existing.funder_id;
        self.created_at = existing.created_at;

        let incoming = std::mem::take(&mut self.followers);
        self.followers = existing.followers.clone();
        for follower in incoming {
            if !self.followers.contains(&follower) {
                self.followers.push(follower);
            }
        }
    }

    fn embedded(&self) -> EmbeddedRef {
        EmbeddedRef {
            id: self.id,
            name: self.name.clone(),
            email: None,
            phone: None,
        }
    }
}
