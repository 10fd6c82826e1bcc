//! The `clean` command: one read, one in-memory normalization pass, one
//! write. The output file is only touched after every record has cleaned
//! successfully, so an aborted run never leaves a partial file behind.

use anyhow::{Context, Result};
use chrono::Local;
use log::{debug, info};

use crate::{
    catalog::Catalog,
    cli::CleanArgs,
    data::Value,
    derive::parse_derived_columns,
    io_utils,
    transform::Normalizer,
};

pub fn execute(args: &CleanArgs) -> Result<()> {
    let delimiter = io_utils::resolve_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let output_path = args.output.as_deref();
    let output_delimiter =
        io_utils::resolve_output_delimiter(output_path, args.output_delimiter, delimiter);
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    let catalog = match &args.catalog {
        Some(path) => Catalog::load(path)?,
        None => Catalog::builtin(),
    };
    let normalizer = Normalizer::compile(&catalog)?;
    let derived_columns = parse_derived_columns(&args.derives)?;

    info!(
        "Cleaning '{}' -> {} (as of {})",
        args.input.display(),
        output_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        as_of
    );

    let mut reader = io_utils::open_csv_reader(&args.input, delimiter)?;
    let raw_headers = io_utils::reader_headers(&mut reader, encoding)?;
    let binding = normalizer
        .bind(&raw_headers)
        .with_context(|| format!("Validating header row of {:?}", args.input))?;
    debug!("Input provides {} column(s)", raw_headers.len());

    let output_headers = normalizer.output_headers();
    let mut all_headers = output_headers.to_vec();
    for column in &derived_columns {
        all_headers.push(column.name.clone());
    }

    let mut cleaned_rows: Vec<Vec<String>> = Vec::new();
    for (ordinal, result) in reader.into_byte_records().enumerate() {
        if args.limit.is_some_and(|limit| ordinal >= limit) {
            break;
        }
        let record = result.with_context(|| format!("Reading row {}", ordinal + 2))?;
        let raw = io_utils::decode_record(&record, encoding)?;
        let cleaned = normalizer.normalize_record(&binding, &raw, as_of);
        let mut cells: Vec<String> = cleaned
            .iter()
            .map(|cell| cell.as_ref().map(Value::as_display).unwrap_or_default())
            .collect();
        for column in &derived_columns {
            let derived = column
                .evaluate(output_headers, &cleaned)
                .with_context(|| format!("Deriving '{}' for row {}", column.name, ordinal + 2))?;
            cells.push(derived);
        }
        cleaned_rows.push(cells);
    }

    let mut writer = io_utils::open_csv_writer(output_path, output_delimiter)?;
    writer
        .write_record(all_headers.iter())
        .context("Writing output headers")?;
    for row in &cleaned_rows {
        writer.write_record(row.iter()).context("Writing output row")?;
    }
    writer.flush().context("Flushing output")?;

    info!(
        "Cleaned {} row(s) into {} column(s)",
        cleaned_rows.len(),
        all_headers.len()
    );
    Ok(())
}
