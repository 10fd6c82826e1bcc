//! The `report` command: canned views over a cleaned export.
//!
//! Each view is a pure aggregation over the cleaned file, selected through
//! a dispatch on [`ReportView`]. The cleaned file is re-typed through the
//! catalog's output contract, so reports never see raw strings.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, Local, NaiveDate};
use itertools::Itertools;
use log::info;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    catalog::{Catalog, Step, Target},
    cli::{Demographic, ReportArgs, ReportView},
    data::{self, ComparableValue, Value},
    io_utils, table,
};

pub fn execute(args: &ReportArgs) -> Result<()> {
    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    let cleaned = CleanedTable::load(args, &catalog)?;
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    match args.view {
        ReportView::Status => status_view(&cleaned, args),
        ReportView::Support => support_view(&cleaned, args.demographic, as_of),
        ReportView::Wait => wait_view(&cleaned),
        ReportView::Balance => balance_view(&cleaned),
        ReportView::Summary => summary_view(&cleaned, args.year.unwrap_or(as_of.year() - 1)),
    }
}

/// A cleaned file loaded back into typed cells.
struct CleanedTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<Value>>>,
    /// Column indices shown in row listings; preservation-only and derived
    /// columns are dropped there, mirroring the downstream contract.
    listing: Vec<usize>,
}

impl CleanedTable {
    fn load(args: &ReportArgs, catalog: &Catalog) -> Result<Self> {
        let delimiter = io_utils::resolve_delimiter(&args.input, args.delimiter);
        let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
        let contract: Vec<(String, Target)> = catalog.output_columns();

        let mut reader = io_utils::open_csv_reader(&args.input, delimiter)?;
        let headers = io_utils::reader_headers(&mut reader, encoding)?;
        let targets: Vec<Target> = headers
            .iter()
            .map(|header| {
                contract
                    .iter()
                    .find(|(name, _)| name == header)
                    .map(|(_, target)| target.clone())
                    .unwrap_or(Target::Text)
            })
            .collect();

        let mut rows = Vec::new();
        for (ordinal, result) in reader.into_byte_records().enumerate() {
            let record = result.with_context(|| format!("Reading row {}", ordinal + 2))?;
            let decoded = io_utils::decode_record(&record, encoding)?;
            let typed = targets
                .iter()
                .enumerate()
                .map(|(idx, target)| {
                    decoded
                        .get(idx)
                        .and_then(|cell| data::parse_output_value(cell, target))
                })
                .collect_vec();
            rows.push(typed);
        }

        let hidden = hidden_columns(catalog);
        let listing = headers
            .iter()
            .enumerate()
            .filter(|(_, header)| !hidden.contains(header.as_str()))
            .map(|(idx, _)| idx)
            .collect_vec();

        Ok(CleanedTable {
            headers,
            rows,
            listing,
        })
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|header| header == name)
            .ok_or_else(|| anyhow!("Column '{name}' not found in cleaned input"))
    }

    fn cell<'a>(&self, row: &'a [Option<Value>], column: usize) -> Option<&'a Value> {
        row.get(column).and_then(|cell| cell.as_ref())
    }

    fn listing_headers(&self) -> Vec<String> {
        self.listing
            .iter()
            .map(|&idx| self.headers[idx].clone())
            .collect()
    }

    fn listing_row(&self, row: &[Option<Value>]) -> Vec<String> {
        self.listing
            .iter()
            .map(|&idx| {
                row.get(idx)
                    .and_then(|cell| cell.as_ref())
                    .map(Value::as_display)
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Shadow and derived columns are carried for data preservation, not for
/// presentation.
fn hidden_columns(catalog: &Catalog) -> HashSet<String> {
    let mut hidden = HashSet::new();
    for field in &catalog.fields {
        for step in &field.steps {
            match step {
                Step::Snapshot(into) => {
                    hidden.insert(into.clone());
                }
                Step::SnapshotFlag { into, .. } => {
                    hidden.insert(into.clone());
                }
                Step::State(options) => {
                    if let Some(into) = &options.into {
                        hidden.insert(into.clone());
                    }
                }
                _ => {}
            }
        }
    }
    for derived in &catalog.derived {
        hidden.insert(derived.name.clone());
    }
    hidden
}

fn fmt_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn status_view(cleaned: &CleanedTable, args: &ReportArgs) -> Result<()> {
    let status_idx = cleaned.column("Request Status")?;
    let signed_idx = cleaned.column("Application Signed?")?;
    let wanted = args.status.label();

    let mut rows = Vec::new();
    for row in &cleaned.rows {
        let status_matches = matches!(
            cleaned.cell(row, status_idx),
            Some(Value::Text(status)) if status == wanted
        );
        if !status_matches {
            continue;
        }
        let signed = match cleaned.cell(row, signed_idx) {
            Some(Value::Flag(signed)) => Some(*signed),
            _ if args.assume_unsigned => Some(false),
            _ => None,
        };
        if signed == Some(args.signed) {
            rows.push(cleaned.listing_row(row));
        }
    }

    table::print_table(&cleaned.listing_headers(), &rows);
    info!(
        "Listed {} {} application(s) with signed = {}",
        rows.len(),
        wanted,
        args.signed
    );
    Ok(())
}

fn support_view(cleaned: &CleanedTable, demographic: Demographic, as_of: NaiveDate) -> Result<()> {
    let amount_idx = cleaned.column("Amount")?;
    let (label, key_column) = match demographic {
        Demographic::State => ("state", Some("Pt State")),
        Demographic::Gender => ("gender", Some("Gender")),
        Demographic::Income => ("monthly_income", Some("Total Household Gross Monthly Income")),
        Demographic::Insurance => ("insurance_type", Some("Insurance Type")),
        Demographic::Age => ("age", None),
        Demographic::Assistance => ("assistance_type", Some("Type of Assistance (CLASS)")),
        Demographic::Hispanic => ("hispanic_latino", Some("Hispanic/Latino")),
        Demographic::Orientation => ("sexual_orientation", Some("Sexual Orientation")),
    };
    let key_idx = match key_column {
        Some(name) => cleaned.column(name)?,
        None => cleaned.column("YOB")?,
    };

    let mut groups: BTreeMap<ComparableValue, (Decimal, usize)> = BTreeMap::new();
    for row in &cleaned.rows {
        let key = match (demographic, cleaned.cell(row, key_idx)) {
            (Demographic::Age, Some(Value::Integer(yob))) => {
                Value::Integer(i64::from(as_of.year()) - yob)
            }
            (Demographic::Age, _) => continue,
            (_, Some(value)) => value.clone(),
            (_, None) => continue,
        };
        let Some(Value::Currency(amount)) = cleaned.cell(row, amount_idx) else {
            continue;
        };
        let entry = groups
            .entry(ComparableValue(Some(key)))
            .or_insert((Decimal::ZERO, 0));
        entry.0 += *amount;
        entry.1 += 1;
    }

    let headers = vec![
        label.to_string(),
        "grants".to_string(),
        "avg_amount".to_string(),
        "total_amount".to_string(),
    ];
    let rows = groups
        .iter()
        .map(|(key, (total, count))| {
            let display = key.0.as_ref().map(Value::as_display).unwrap_or_default();
            let mean = *total / Decimal::from(*count);
            vec![
                display,
                count.to_string(),
                fmt_money(mean),
                fmt_money(*total),
            ]
        })
        .collect_vec();

    table::print_table(&headers, &rows);
    info!("Aggregated support across {} group(s)", rows.len());
    Ok(())
}

fn wait_view(cleaned: &CleanedTable) -> Result<()> {
    let request_idx = cleaned.column("Grant Req Date")?;
    let payment_idx = cleaned.column("Payment Submitted?")?;

    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut excluded = 0usize;
    for row in &cleaned.rows {
        match (
            cleaned.cell(row, request_idx),
            cleaned.cell(row, payment_idx),
        ) {
            (Some(Value::Date(requested)), Some(Value::Date(paid))) => {
                let days = (*paid - *requested).num_days();
                *counts.entry(days).or_insert(0) += 1;
            }
            _ => excluded += 1,
        }
    }

    let headers = vec!["days_to_payment".to_string(), "grants".to_string()];
    let rows = counts
        .iter()
        .map(|(days, count)| vec![days.to_string(), count.to_string()])
        .collect_vec();
    table::print_table(&headers, &rows);
    info!(
        "Computed wait times for {} grant(s); {} row(s) lacked a request or payment date",
        counts.values().sum::<usize>(),
        excluded
    );
    Ok(())
}

fn balance_view(cleaned: &CleanedTable) -> Result<()> {
    let balance_idx = cleaned.column("Remaining Balance")?;
    let patient_idx = cleaned.column("Patient ID#")?;

    let mut rows = Vec::new();
    let mut patients: HashSet<String> = HashSet::new();
    for row in &cleaned.rows {
        let Some(Value::Currency(balance)) = cleaned.cell(row, balance_idx) else {
            continue;
        };
        if *balance <= Decimal::ZERO {
            continue;
        }
        if let Some(Value::Text(patient)) = cleaned.cell(row, patient_idx) {
            patients.insert(patient.clone());
        }
        rows.push(cleaned.listing_row(row));
    }

    println!(
        "{} requestor(s) did not use their full grant at least once",
        patients.len()
    );
    table::print_table(&cleaned.listing_headers(), &rows);
    info!("Listed {} grant(s) with an unused balance", rows.len());
    Ok(())
}

fn summary_view(cleaned: &CleanedTable, year: i32) -> Result<()> {
    let request_idx = cleaned.column("Grant Req Date")?;
    let payment_idx = cleaned.column("Payment Submitted?")?;
    let status_idx = cleaned.column("Request Status")?;
    let amount_idx = cleaned.column("Amount")?;
    let patient_idx = cleaned.column("Patient ID#")?;

    let mut applications = 0usize;
    let mut approved = 0usize;
    let mut denied = 0usize;
    let mut pending = 0usize;
    let mut awarded = Decimal::ZERO;
    let mut awards = 0usize;
    let mut patients: HashSet<String> = HashSet::new();
    let mut wait_days = 0i64;
    let mut waits = 0usize;

    for row in &cleaned.rows {
        let Some(Value::Date(requested)) = cleaned.cell(row, request_idx) else {
            continue;
        };
        if requested.year() != year {
            continue;
        }
        applications += 1;
        match cleaned.cell(row, status_idx) {
            Some(Value::Text(status)) if status == "Approved" => approved += 1,
            Some(Value::Text(status)) if status == "Denied" => denied += 1,
            Some(Value::Text(status)) if status == "Pending" => pending += 1,
            _ => {}
        }
        if let Some(Value::Currency(amount)) = cleaned.cell(row, amount_idx) {
            awarded += *amount;
            awards += 1;
        }
        if let Some(Value::Text(patient)) = cleaned.cell(row, patient_idx) {
            patients.insert(patient.clone());
        }
        if let Some(Value::Date(paid)) = cleaned.cell(row, payment_idx) {
            wait_days += (*paid - *requested).num_days();
            waits += 1;
        }
    }

    println!("Executive Summary — {year}");
    println!("  Applications received:    {applications}");
    println!("  Approved:                 {approved}");
    println!("  Denied:                   {denied}");
    println!("  Pending:                  {pending}");
    println!("  Distinct patients:        {}", patients.len());
    println!("  Total support awarded:    {}", fmt_money(awarded));
    if awards > 0 {
        println!(
            "  Average award:            {}",
            fmt_money(awarded / Decimal::from(awards))
        );
    } else {
        println!("  Average award:            n/a");
    }
    if waits > 0 {
        println!(
            "  Average days to payment:  {:.1}",
            wait_days as f64 / waits as f64
        );
    } else {
        println!("  Average days to payment:  n/a");
    }
    info!("Summarized {applications} application(s) for {year}");
    Ok(())
}
