use mca_db::crm::models::PaybackFrequency;
use mca_db::source::payloads::{SourceCollection, TextValue};

const WEEKDAYS: [u8; 5] = [1, 2, 3, 4, 5];
const EVERY_DAY: [u8; 7] = [0, 1, 2, 3, 4, 5, 6];

/// Payday list and holiday handling derived from an advance's collection
/// terms. Weekdays are numbered 0 = Sunday through 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaydaySchedule {
    pub frequency: PaybackFrequency,
    pub payday_list: Vec<u8>,
    pub avoid_holiday: bool,
}

/// `None` when the collection has no recognizable frequency.
pub fn payday_schedule(collection: &SourceCollection) -> Option<PaydaySchedule> {
    let frequency = collection.frequency.as_deref()?.trim().to_ascii_lowercase();
    match frequency.as_str() {
        "daily" => Some(daily(collection)),
        "weekly" => Some(PaydaySchedule {
            frequency: PaybackFrequency::Weekly,
            payday_list: vec![weekly_day(collection.weekly_day.as_ref())],
            avoid_holiday: false,
        }),
        "monthly" => Some(PaydaySchedule {
            frequency: PaybackFrequency::Monthly,
            payday_list: vec![monthly_day(collection.monthly_day.as_ref())],
            avoid_holiday: false,
        }),
        _ => None,
    }
}

fn daily(collection: &SourceCollection) -> PaydaySchedule {
    let daily_type = collection
        .daily_type
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase());

    let (payday_list, avoid_holiday) = match daily_type.as_deref() {
        Some("every_day") => (EVERY_DAY.to_vec(), false),
        // Same paydays as weekdays; holidays are handled by the flag.
        Some("banking_days") => (WEEKDAYS.to_vec(), true),
        Some("custom_days") => {
            let days = custom_days(&collection.custom_days);
            if days.is_empty() {
                (WEEKDAYS.to_vec(), false)
            } else {
                (days, false)
            }
        }
        _ => (WEEKDAYS.to_vec(), false),
    };

    PaydaySchedule {
        frequency: PaybackFrequency::Daily,
        payday_list,
        avoid_holiday,
    }
}

/// Weekday number for a day name ("mon", "Monday") or number (0..=6, or 7
/// for Sunday).
pub fn weekday_number(raw: &str) -> Option<u8> {
    let token = raw.trim().to_ascii_lowercase();
    if let Ok(n) = token.parse::<u8>() {
        return match n {
            0..=6 => Some(n),
            7 => Some(0),
            _ => None,
        };
    }
    let prefix = token.get(..3)?;
    ["sun", "mon", "tue", "wed", "thu", "fri", "sat"]
        .iter()
        .position(|d| *d == prefix)
        .map(|i| i as u8)
}

fn custom_days(raw: &[TextValue]) -> Vec<u8> {
    let mut days: Vec<u8> = raw.iter().filter_map(|d| weekday_number(d.as_str())).collect();
    days.sort_unstable();
    days.dedup();
    days
}

fn as_number(raw: Option<&TextValue>) -> Option<i64> {
    raw.and_then(|v| v.as_str().trim().parse::<i64>().ok())
}

/// OrgMeter weekly days run 1 = Monday .. 7 = Sunday, or are given by name.
/// Defaults to Monday.
fn weekly_day(raw: Option<&TextValue>) -> u8 {
    match as_number(raw) {
        Some(7) => 0,
        Some(n @ 1..=6) => n as u8,
        Some(_) => 1,
        None => raw
            .and_then(|v| weekday_number(v.as_str()))
            .unwrap_or(1),
    }
}

/// Day of month 1..=28, defaulting to the 1st.
fn monthly_day(raw: Option<&TextValue>) -> u8 {
    match as_number(raw) {
        Some(n @ 1..=28) => n as u8,
        _ => 1,
    }
}
