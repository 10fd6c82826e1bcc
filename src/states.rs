//! Static bidirectional US state lookup (full name ↔ postal abbreviation).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StateForm {
    #[default]
    FullName,
    Abbreviation,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseMode {
    #[default]
    Unchanged,
    Upper,
    Lower,
}

const STATES: &[(&str, &str)] = &[
    ("Alabama", "AL"),
    ("Alaska", "AK"),
    ("Arizona", "AZ"),
    ("Arkansas", "AR"),
    ("California", "CA"),
    ("Colorado", "CO"),
    ("Connecticut", "CT"),
    ("Delaware", "DE"),
    ("District of Columbia", "DC"),
    ("Florida", "FL"),
    ("Georgia", "GA"),
    ("Hawaii", "HI"),
    ("Idaho", "ID"),
    ("Illinois", "IL"),
    ("Indiana", "IN"),
    ("Iowa", "IA"),
    ("Kansas", "KS"),
    ("Kentucky", "KY"),
    ("Louisiana", "LA"),
    ("Maine", "ME"),
    ("Maryland", "MD"),
    ("Massachusetts", "MA"),
    ("Michigan", "MI"),
    ("Minnesota", "MN"),
    ("Mississippi", "MS"),
    ("Missouri", "MO"),
    ("Montana", "MT"),
    ("Nebraska", "NE"),
    ("Nevada", "NV"),
    ("New Hampshire", "NH"),
    ("New Jersey", "NJ"),
    ("New Mexico", "NM"),
    ("New York", "NY"),
    ("North Carolina", "NC"),
    ("North Dakota", "ND"),
    ("Ohio", "OH"),
    ("Oklahoma", "OK"),
    ("Oregon", "OR"),
    ("Pennsylvania", "PA"),
    ("Puerto Rico", "PR"),
    ("Rhode Island", "RI"),
    ("South Carolina", "SC"),
    ("South Dakota", "SD"),
    ("Tennessee", "TN"),
    ("Texas", "TX"),
    ("Utah", "UT"),
    ("Vermont", "VT"),
    ("Virgin Islands", "VI"),
    ("Virginia", "VA"),
    ("Washington", "WA"),
    ("West Virginia", "WV"),
    ("Wisconsin", "WI"),
    ("Wyoming", "WY"),
];

/// Case-insensitive lookup accepting either form; returns the canonical
/// (full name, abbreviation) pair when the token is recognized.
fn lookup(token: &str) -> Option<(&'static str, &'static str)> {
    let trimmed = token.trim();
    STATES.iter().copied().find(|(name, abbrev)| {
        name.eq_ignore_ascii_case(trimmed) || abbrev.eq_ignore_ascii_case(trimmed)
    })
}

pub fn abbreviation_for(token: &str) -> Option<&'static str> {
    lookup(token).map(|(_, abbrev)| abbrev)
}

pub fn full_name_for(token: &str) -> Option<&'static str> {
    lookup(token).map(|(name, _)| name)
}

/// Maps a state token to the requested form; unrecognized tokens pass
/// through unchanged apart from the case normalization.
pub fn normalize_state(value: &str, output: StateForm, case: CaseMode) -> String {
    let mapped = match (lookup(value), output) {
        (Some((name, _)), StateForm::FullName) => name.to_string(),
        (Some((_, abbrev)), StateForm::Abbreviation) => abbrev.to_string(),
        (None, _) => value.to_string(),
    };
    match case {
        CaseMode::Unchanged => mapped,
        CaseMode::Upper => mapped.to_uppercase(),
        CaseMode::Lower => mapped.to_lowercase(),
    }
}
