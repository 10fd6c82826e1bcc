use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use grant_scrub::catalog::{Catalog, StateOptions, Step, Target};
use grant_scrub::data::{Value, parse_currency_decimal};
use grant_scrub::states::{CaseMode, StateForm};
use grant_scrub::transform::Normalizer;

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
}

/// Runs the built-in catalog over a single record whose named columns are
/// set and every other column is empty.
fn clean_builtin(cells: &[(&str, &str)]) -> (Vec<String>, Vec<Option<Value>>) {
    let catalog = Catalog::builtin();
    let normalizer = Normalizer::compile(&catalog).expect("compile builtin");
    let headers: Vec<String> = catalog
        .fields
        .iter()
        .map(|field| field.name.clone())
        .collect();
    let binding = normalizer.bind(&headers).expect("bind builtin");
    let mut record = vec![String::new(); headers.len()];
    for (name, value) in cells {
        let idx = headers
            .iter()
            .position(|header| header == name)
            .unwrap_or_else(|| panic!("unknown column {name}"));
        record[idx] = value.to_string();
    }
    let cleaned = normalizer.normalize_record(&binding, &record, as_of());
    (normalizer.output_headers().to_vec(), cleaned)
}

fn out<'a>(
    headers: &[String],
    cleaned: &'a [Option<Value>],
    name: &str,
) -> &'a Option<Value> {
    let idx = headers
        .iter()
        .position(|header| header == name)
        .unwrap_or_else(|| panic!("unknown output column {name}"));
    &cleaned[idx]
}

#[test]
fn compound_field_splits_flag_and_date() {
    let (headers, cleaned) = clean_builtin(&[("Payment Submitted?", "Yes")]);
    assert_eq!(
        out(&headers, &cleaned, "Payment Submitted? Boolean"),
        &Some(Value::Flag(true))
    );
    assert_eq!(out(&headers, &cleaned, "Payment Submitted?"), &None);

    let (headers, cleaned) = clean_builtin(&[("Payment Submitted?", "2023-04-01")]);
    assert_eq!(
        out(&headers, &cleaned, "Payment Submitted? Boolean"),
        &Some(Value::Flag(true))
    );
    assert_eq!(
        out(&headers, &cleaned, "Payment Submitted?"),
        &Some(Value::Date(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap()))
    );

    let (headers, cleaned) = clean_builtin(&[("Payment Submitted?", "No")]);
    assert_eq!(
        out(&headers, &cleaned, "Payment Submitted? Boolean"),
        &Some(Value::Flag(false))
    );
    assert_eq!(out(&headers, &cleaned, "Payment Submitted?"), &None);
}

#[test]
fn dates_after_the_processing_date_are_missing() {
    let (headers, cleaned) = clean_builtin(&[("Grant Req Date", "2099-01-01")]);
    assert_eq!(out(&headers, &cleaned, "Grant Req Date"), &None);

    let (headers, cleaned) = clean_builtin(&[("Grant Req Date", "not a date")]);
    assert_eq!(out(&headers, &cleaned, "Grant Req Date"), &None);
}

#[test]
fn household_ceiling_invalidates_the_record() {
    let (_, cleaned) = clean_builtin(&[
        ("Household Size", "4500"),
        ("Pt City", "Omaha"),
        ("Gender", "female"),
        (" Amount ", "$100.00"),
    ]);
    assert!(cleaned.iter().all(Option::is_none));

    let (headers, cleaned) = clean_builtin(&[("Household Size", "4"), ("Pt City", "Omaha")]);
    assert_eq!(
        out(&headers, &cleaned, "Household Size"),
        &Some(Value::Number(4.0))
    );
    assert_eq!(
        out(&headers, &cleaned, "Pt City"),
        &Some(Value::Text("Omaha".to_string()))
    );
}

#[test]
fn payment_method_rules_resolve_in_listed_order() {
    // Contains both the CK and CC patterns; CK is listed first.
    let (headers, cleaned) = clean_builtin(&[("Payment Method", "ck/cc combo")]);
    assert_eq!(
        out(&headers, &cleaned, "Payment Method"),
        &Some(Value::Text("CK".to_string()))
    );

    // Unmatched methods pass through uppercased: the taxonomy is open.
    let (headers, cleaned) = clean_builtin(&[("Payment Method", "wire")]);
    assert_eq!(
        out(&headers, &cleaned, "Payment Method"),
        &Some(Value::Text("WIRE".to_string()))
    );
}

#[test]
fn derived_year_of_birth_follows_the_cleaned_date() {
    let (headers, cleaned) = clean_builtin(&[("DOB", "1956")]);
    assert_eq!(
        out(&headers, &cleaned, "DOB"),
        &Some(Value::Date(NaiveDate::from_ymd_opt(1956, 1, 1).unwrap()))
    );
    assert_eq!(out(&headers, &cleaned, "YOB"), &Some(Value::Integer(1956)));

    let (headers, cleaned) = clean_builtin(&[("DOB", "2150-01-01")]);
    assert_eq!(out(&headers, &cleaned, "YOB"), &None);
}

#[test]
fn normalization_is_idempotent_over_canonical_values() {
    let canonical: &[(&str, &str)] = &[
        ("Patient ID#", "1001"),
        ("Grant Req Date", "2024-01-15"),
        (" Remaining Balance ", "200.00"),
        ("Request Status", "Pending"),
        ("Payment Submitted?", "2024-02-01"),
        ("Pt City", "Omaha"),
        ("Pt State", "Nebraska"),
        ("Pt Zip", "68105"),
        ("Language", "English"),
        ("DOB", "1956-01-01"),
        ("Gender", "Female"),
        ("Race", "White"),
        ("Hispanic/Latino", "false"),
        ("Sexual Orientation", "Heterosexual"),
        ("Insurance Type", "Uninsured"),
        ("Household Size", "4"),
        (" Total Household Gross Monthly Income ", "3200.00"),
        ("Distance roundtrip/Tx", "24"),
        ("Referral Source", "CLINIC"),
        ("Type of Assistance (CLASS)", "Other"),
        (" Amount ", "1500.00"),
        ("Payment Method", "CK"),
        ("Application Signed?", "true"),
    ];
    let (headers, first) = clean_builtin(canonical);

    // Feed the displayed output straight back through the pipeline.
    let catalog = Catalog::builtin();
    let normalizer = Normalizer::compile(&catalog).expect("compile builtin");
    let binding = normalizer.bind(&headers).expect("bind cleaned headers");
    let displayed: Vec<String> = first
        .iter()
        .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
        .collect();
    let second = normalizer.normalize_record(&binding, &displayed, as_of());
    assert_eq!(first, second);
}

#[test]
fn state_step_supports_abbreviation_output() {
    let catalog = Catalog {
        catalog_version: None,
        fields: vec![grant_scrub::catalog::FieldSpec {
            name: "Pt State".to_string(),
            rename: None,
            steps: vec![Step::State(StateOptions {
                output: StateForm::Abbreviation,
                case: CaseMode::Unchanged,
                into: None,
            })],
            target: Target::Text,
        }],
        derived: Vec::new(),
    };
    let normalizer = Normalizer::compile(&catalog).expect("compile");
    let binding = normalizer.bind(&["Pt State".to_string()]).expect("bind");
    let cleaned =
        normalizer.normalize_record(&binding, &["Nebraska".to_string()], as_of());
    assert_eq!(cleaned[0], Some(Value::Text("NE".to_string())));
}

proptest! {
    /// Any string in the export's currency grammar normalizes to a
    /// two-decimal value, with parenthesized forms negated.
    #[test]
    fn currency_grammar_normalizes_to_two_decimals(
        dollars in 0u64..10_000_000,
        cents in 0u32..100,
        with_symbol in any::<bool>(),
        with_separators in any::<bool>(),
        negative in any::<bool>(),
    ) {
        let digits = if with_separators {
            let raw = dollars.to_string();
            let mut grouped = String::new();
            for (idx, ch) in raw.chars().enumerate() {
                if idx > 0 && (raw.len() - idx).is_multiple_of(3) {
                    grouped.push(',');
                }
                grouped.push(ch);
            }
            grouped
        } else {
            dollars.to_string()
        };
        let mut body = String::new();
        if with_symbol {
            body.push('$');
        }
        body.push_str(&digits);
        body.push_str(&format!(".{cents:02}"));
        let rendered = if negative { format!("({body})") } else { body };

        let parsed = parse_currency_decimal(&rendered).expect("grammar accepted");
        prop_assert_eq!(parsed.scale(), 2);
        let expected = Decimal::new(dollars as i64 * 100 + i64::from(cents), 2);
        let expected = if negative { -expected } else { expected };
        prop_assert_eq!(parsed, expected);
    }

    /// A lone dash is zero regardless of surrounding whitespace.
    #[test]
    fn lone_dash_is_zero(padding in "\\s{0,4}") {
        let rendered = format!("{padding}-{padding}");
        let parsed = parse_currency_decimal(&rendered).expect("dash accepted");
        prop_assert_eq!(parsed, Decimal::new(0, 2));
    }
}
