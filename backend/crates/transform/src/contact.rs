use mca_db::crm::models::{join_name, Address};
use mca_db::source::payloads::{SourceAddress, SourceContact};

trait Primary {
    fn is_primary(&self) -> bool;
}

impl Primary for SourceAddress {
    fn is_primary(&self) -> bool {
        self.primary
    }
}

impl Primary for SourceContact {
    fn is_primary(&self) -> bool {
        self.primary
    }
}

/// The entry flagged primary, else the first one.
fn pick_primary<T: Primary>(entries: &[T]) -> Option<&T> {
    entries.iter().find(|e| e.is_primary()).or_else(|| entries.first())
}

fn clean(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn primary_address(addresses: &[SourceAddress]) -> Option<Address> {
    let source = pick_primary(addresses)?;
    let street = match (clean(source.street.as_deref()), clean(source.street2.as_deref())) {
        (Some(line1), Some(line2)) => Some(format!("{line1}, {line2}")),
        (line1, line2) => line1.or(line2),
    };
    let address = Address {
        street,
        city: clean(source.city.as_deref()),
        state: clean(source.state.as_deref()),
        zip: clean(source.zip.as_deref()),
        country: clean(source.country.as_deref()),
    };
    (address != Address::default()).then_some(address)
}

pub fn primary_contact(contacts: &[SourceContact]) -> Option<&SourceContact> {
    pick_primary(contacts)
}

/// "First Last" for a contact, falling back to its free-text name.
pub fn contact_name(contact: &SourceContact) -> Option<String> {
    let joined = join_name(contact.first_name.as_deref(), contact.last_name.as_deref());
    if joined.is_empty() {
        clean(contact.name.as_deref())
    } else {
        Some(joined)
    }
}

/// Flattened contact fields for an organization: its own email/phone, with
/// the primary contact's as fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactInfo {
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

pub fn contact_info(
    email: Option<&str>,
    phone: Option<&str>,
    contacts: &[SourceContact],
) -> ContactInfo {
    let contact = primary_contact(contacts);
    ContactInfo {
        contact_name: contact.and_then(contact_name),
        email: clean(email).or_else(|| contact.and_then(|c| clean(c.email.as_deref()))),
        phone: clean(phone).or_else(|| contact.and_then(|c| clean(c.phone.as_deref()))),
    }
}

/// Trimmed non-empty text.
pub fn text(value: Option<&str>) -> Option<String> {
    clean(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address(street: &str, primary: bool) -> SourceAddress {
        SourceAddress {
            primary,
            street: Some(street.to_string()),
            city: Some("Miami".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn prefers_the_primary_address() {
        let addresses = vec![address("1 First St", false), address("2 Main St", true)];
        let picked = primary_address(&addresses).unwrap();
        assert_eq!(picked.street.as_deref(), Some("2 Main St"));
        assert_eq!(picked.city.as_deref(), Some("Miami"));
    }

    #[test]
    fn falls_back_to_the_first_address_and_joins_lines() {
        let mut first = address("1 First St", false);
        first.street2 = Some("Suite 4".to_string());
        let picked = primary_address(&[first, address("2 Main St", false)]).unwrap();
        assert_eq!(picked.street.as_deref(), Some("1 First St, Suite 4"));
    }

    #[test]
    fn empty_address_is_none() {
        assert!(primary_address(&[]).is_none());
        assert!(primary_address(&[SourceAddress::default()]).is_none());
    }

    #[test]
    fn contact_info_falls_back_to_primary_contact() {
        let contacts = vec![SourceContact {
            primary: true,
            first_name: Some("Ana".to_string()),
            last_name: Some("Ruiz".to_string()),
            email: Some("ana@isoco.com".to_string()),
            phone: Some("555-0100".to_string()),
            ..Default::default()
        }];
        let info = contact_info(None, Some(" 555-0199 "), &contacts);
        assert_eq!(info.contact_name.as_deref(), Some("Ana Ruiz"));
        assert_eq!(info.email.as_deref(), Some("ana@isoco.com"));
        assert_eq!(info.phone.as_deref(), Some("555-0199"));
    }

    #[test]
    fn contact_name_uses_free_text_when_parts_missing() {
        let contact = SourceContact {
            name: Some("Front Desk".to_string()),
            ..Default::default()
        };
        assert_eq!(contact_name(&contact).as_deref(), Some("Front Desk"));
    }
}
