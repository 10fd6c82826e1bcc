use std::fmt;

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::catalog::Target;

/// Currency cells are quantized to cents.
pub const CURRENCY_SCALE: u32 = 2;

/// A cleaned, typed cell. The missing marker is `None` in an
/// `Option<Value>`; an empty output cell round-trips back to `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Value {
    Text(String),
    Integer(i64),
    Number(f64),
    Currency(Decimal),
    Date(NaiveDate),
    Flag(bool),
}

impl Eq for Value {}

impl Value {
    pub fn as_display(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => {
                if n.fract() == 0.0 {
                    (*n as i64).to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Currency(d) => d.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Flag(b) => b.to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Number(n) => Some(*n),
            Value::Currency(d) => d.to_f64(),
            _ => None,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::Currency(a), Value::Currency(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Flag(a), Value::Flag(b)) => a.cmp(b),
            _ => panic!("Cannot compare heterogeneous Value variants"),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

/// Wrapper ordering missing cells before present ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparableValue(pub Option<Value>);

impl Ord for ComparableValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        match (&self.0, &other.0) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(left), Some(right)) => left.cmp(right),
        }
    }
}

impl PartialOrd for ComparableValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%m/%d/%Y",
        "%Y/%m/%d",
        "%m-%d-%Y",
        "%m/%d/%y",
    ];
    let trimmed = value.trim();
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, fmt) {
            return Ok(parsed);
        }
    }
    // Year-only entries (common in the DOB column) resolve to January 1st.
    if trimmed.len() == 4
        && trimmed.chars().all(|c| c.is_ascii_digit())
        && let Ok(year) = trimmed.parse::<i32>()
        && let Some(parsed) = NaiveDate::from_ymd_opt(year, 1, 1)
    {
        return Ok(parsed);
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

/// Parses a currency-style string into a cents-quantized decimal.
///
/// Accepts the raw export grammar: `$` and `,` are cosmetic, a lone `-`
/// means zero, and parentheses are accounting notation for negatives.
pub fn parse_currency_decimal(value: &str) -> Result<Decimal> {
    let mut body: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$' && *c != ',')
        .collect();
    if body.is_empty() {
        return Err(anyhow!("Empty currency value"));
    }
    if body == "-" {
        return Ok(Decimal::new(0, CURRENCY_SCALE));
    }
    let mut negated = false;
    if body.starts_with('(') && body.ends_with(')') && body.len() > 2 {
        negated = true;
        body = body[1..body.len() - 1].to_string();
    }
    let mut amount: Decimal = body
        .parse()
        .map_err(|_| anyhow!("Failed to parse '{value}' as currency"))?;
    if negated {
        amount = -amount;
    }
    let mut rounded =
        amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    Ok(rounded)
}

pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

/// Re-parses a cell from an already-cleaned file under its catalog target.
/// Empty cells are the missing marker; anything unparseable is treated the
/// same way rather than failing the report.
pub fn parse_output_value(value: &str, target: &Target) -> Option<Value> {
    if value.is_empty() {
        return None;
    }
    match target {
        Target::Text => Some(Value::Text(value.to_string())),
        Target::Integer => value.trim().parse().ok().map(Value::Integer),
        Target::Number { .. } => value.trim().parse().ok().map(Value::Number),
        Target::Currency => parse_currency_decimal(value).ok().map(Value::Currency),
        Target::Date => parse_naive_date(value).ok().map(Value::Date),
        Target::Flag => parse_flag(value).map(Value::Flag),
    }
}

/// Lowercases a header and folds non-alphanumerics to `_` so column names
/// become valid expression identifiers.
pub fn normalize_column_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_naive_date_supports_export_formats() {
        let expected = NaiveDate::from_ymd_opt(2023, 4, 1).unwrap();
        assert_eq!(parse_naive_date("2023-04-01").unwrap(), expected);
        assert_eq!(parse_naive_date("4/1/2023").unwrap(), expected);
        assert_eq!(parse_naive_date("2023/04/01").unwrap(), expected);
        assert_eq!(parse_naive_date(" 04/01/2023 ").unwrap(), expected);
    }

    #[test]
    fn parse_naive_date_accepts_bare_years() {
        let parsed = parse_naive_date("1956").unwrap();
        assert_eq!(parsed, NaiveDate::from_ymd_opt(1956, 1, 1).unwrap());
    }

    #[test]
    fn parse_naive_date_rejects_garbage() {
        assert!(parse_naive_date("pending").is_err());
        assert!(parse_naive_date("2023-13-40").is_err());
    }

    #[test]
    fn currency_grammar_quantizes_to_cents() {
        assert_eq!(
            parse_currency_decimal("$1,500").unwrap().to_string(),
            "1500.00"
        );
        assert_eq!(
            parse_currency_decimal("(250.755)").unwrap().to_string(),
            "-250.76"
        );
        assert_eq!(parse_currency_decimal("-").unwrap().to_string(), "0.00");
        assert_eq!(
            parse_currency_decimal(" $ 12.3 ").unwrap().to_string(),
            "12.30"
        );
    }

    #[test]
    fn currency_grammar_rejects_double_decimal_points() {
        assert!(parse_currency_decimal("1.070.50").is_err());
    }

    #[test]
    fn normalize_column_name_folds_punctuation() {
        assert_eq!(normalize_column_name("Patient ID#"), "patient_id_");
        assert_eq!(normalize_column_name("Pt State"), "pt_state");
    }

    #[test]
    fn comparable_value_orders_missing_first() {
        let none = ComparableValue(None);
        let some = ComparableValue(Some(Value::Integer(0)));
        assert!(none < some);
    }
}
