//! Person-name extraction from OrgMeter syndicator names.
//!
//! A syndicator `name` is free text that may hold a person, a company, or
//! both. Company names are searched for an embedded person with a fixed,
//! ordered set of patterns; the first pattern that yields a plausible person
//! wins.

use std::sync::LazyLock;

use regex::{Captures, Regex};

const COMPANY_INDICATORS: [&str; 25] = [
    "inc",
    "llc",
    "corp",
    "corporation",
    "co",
    "company",
    "ltd",
    "limited",
    "holdings",
    "group",
    "capital",
    "partners",
    "fund",
    "funding",
    "investment",
    "investments",
    "ventures",
    "enterprises",
    "associates",
    "trust",
    "lp",
    "llp",
    "pllc",
    "financial",
    "equity",
];

const COMMON_FIRST_NAMES: [&str; 90] = [
    "james", "john", "robert", "michael", "william", "david", "richard", "joseph", "thomas",
    "charles", "christopher", "daniel", "matthew", "anthony", "mark", "donald", "steven", "paul",
    "andrew", "joshua", "kenneth", "kevin", "brian", "george", "timothy", "ronald", "edward",
    "jason", "jeffrey", "ryan", "jacob", "gary", "nicholas", "eric", "jonathan", "stephen",
    "larry", "justin", "scott", "brandon", "benjamin", "samuel", "gregory", "alexander", "frank",
    "patrick", "raymond", "jack", "dennis", "jerry", "tyler", "aaron", "adam", "nathan", "henry",
    "zachary", "peter", "kyle", "jared", "ethan", "mary", "patricia", "jennifer", "linda",
    "elizabeth", "barbara", "susan", "jessica", "sarah", "karen", "lisa", "nancy", "betty",
    "margaret", "sandra", "ashley", "kimberly", "emily", "donna", "michelle", "carol", "amanda",
    "melissa", "deborah", "stephanie", "rebecca", "laura", "rachel", "anna", "maria",
];

const NAME: &str = r"[A-Za-z][A-Za-z'.\-]*";

static COMPANY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b(?:{})\b", COMPANY_INDICATORS.join("|"))).unwrap()
});

/// "Company - First Last"
static COMPANY_DASH_PERSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<company>.+?)\s+[-–—]\s+(?P<first>{NAME})\s+(?P<last>{NAME}(?:\s+{NAME})*)$"
    ))
    .unwrap()
});

/// "First Last (Company)"
static PERSON_PAREN_COMPANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<first>{NAME})\s+(?P<last>{NAME})\s*\((?P<company>[^)]+)\)$"
    ))
    .unwrap()
});

/// "First Last <CompanyWord>"
static PERSON_COMPANY_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"^(?P<first>{NAME})\s+(?P<last>{NAME})\s+(?P<company>[A-Za-z.]+)$"
    ))
    .unwrap()
});

/// "First Last <anything>"
static PERSON_ANYTHING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?P<first>{NAME})\s+(?P<last>{NAME})\s+.+$")).unwrap()
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedName {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl ParsedName {
    fn person(first: &str, last: &str) -> Self {
        Self {
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
        }
    }
}

pub fn has_company_indicator(name: &str) -> bool {
    COMPANY_RE.is_match(name)
}

fn is_indicator(word: &str) -> bool {
    let bare = word.trim_end_matches(['.', ',']).to_ascii_lowercase();
    COMPANY_INDICATORS.contains(&bare.as_str())
}

fn is_common_first_name(word: &str) -> bool {
    COMMON_FIRST_NAMES.contains(&word.to_ascii_lowercase().as_str())
}

fn plausible_person(caps: &Captures<'_>) -> Option<ParsedName> {
    let first = caps.name("first")?.as_str();
    let last = caps.name("last")?.as_str();
    if last.split_whitespace().chain([first]).any(is_indicator) {
        return None;
    }
    Some(ParsedName::person(first, last))
}

fn person_in_company_name(name: &str) -> Option<ParsedName> {
    if let Some(parsed) = COMPANY_DASH_PERSON
        .captures(name)
        .and_then(|c| plausible_person(&c))
    {
        return Some(parsed);
    }
    if let Some(parsed) = PERSON_PAREN_COMPANY
        .captures(name)
        .and_then(|c| plausible_person(&c))
    {
        return Some(parsed);
    }
    if let Some(parsed) = PERSON_COMPANY_WORD
        .captures(name)
        .filter(|c| c.name("company").is_some_and(|m| is_indicator(m.as_str())))
        .and_then(|c| plausible_person(&c))
    {
        return Some(parsed);
    }
    PERSON_ANYTHING
        .captures(name)
        .filter(|c| c.name("first").is_some_and(|m| is_common_first_name(m.as_str())))
        .and_then(|c| plausible_person(&c))
}

/// Split a syndicator name into first and last name.
///
/// Company names with no recognizable person yield an empty result. Plain
/// names split on whitespace: one token is a first name, two are
/// first/last, more put everything after the first token in the last name.
pub fn parse_syndicator_name(raw: &str) -> ParsedName {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if name.is_empty() {
        return ParsedName::default();
    }

    if has_company_indicator(&name) {
        return person_in_company_name(&name).unwrap_or_default();
    }

    let mut tokens = name.split(' ');
    let first = tokens.next().map(str::to_string);
    let rest = tokens.collect::<Vec<_>>().join(" ");
    ParsedName {
        first_name: first,
        last_name: (!rest.is_empty()).then_some(rest),
    }
}
