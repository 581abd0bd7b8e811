use mca_db::crm::models::PaybackStatus;
use mca_db::source::payloads::{SourceNote, SourcePayment};

use crate::dates::parse_date;

/// Flags are checked in priority order: paid, bounced, ignored.
pub fn payback_status(payment: &SourcePayment) -> PaybackStatus {
    if payment.paid {
        PaybackStatus::Paid
    } else if payment.bounced {
        PaybackStatus::Bounced
    } else if payment.ignored {
        PaybackStatus::Ignored
    } else {
        PaybackStatus::Submitted
    }
}

fn format_note(note: &SourceNote) -> Option<String> {
    let text = note.text.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    let author = note
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or("Unknown");
    let date = note.date.as_deref().map(str::trim).filter(|d| !d.is_empty());

    Some(match date {
        Some(raw) => {
            let shown = parse_date(raw)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| raw.to_string());
            format!("{author} - {text} ({shown})")
        }
        None => format!("{author} - {text}"),
    })
}

/// All payment notes as `"<Author> - <text> (<date>)"` lines. Notes without
/// text are dropped; `None` when nothing remains.
pub fn payback_note(notes: &[SourceNote]) -> Option<String> {
    let lines: Vec<String> = notes.iter().filter_map(format_note).collect();
    (!lines.is_empty()).then(|| lines.join("\n"))
}
