use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Normalize and report on grant-application exports", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize a raw grant export into a cleaned, typed CSV
    Clean(CleanArgs),
    /// Print or write the built-in field catalog as YAML
    Catalog(CatalogArgs),
    /// Render a canned view over a cleaned CSV
    Report(ReportArgs),
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    /// Raw export to clean
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Cleaned CSV destination (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// YAML catalog overriding the built-in cleaning contract
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// Processing date used to reject future-dated values (defaults to today)
    #[arg(long = "as-of", value_parser = parse_as_of)]
    pub as_of: Option<NaiveDate>,
    /// Additional derived columns using `name=expression`
    #[arg(long = "derive", action = clap::ArgAction::Append)]
    pub derives: Vec<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Delimiter for the output file (defaults to the input delimiter)
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Limit number of rows cleaned
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Destination YAML file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// Which view to render
    #[arg(value_enum)]
    pub view: ReportView,
    /// Cleaned CSV produced by the clean command
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML catalog overriding the built-in cleaning contract
    #[arg(long)]
    pub catalog: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Reference date for age derivation and the default summary year
    #[arg(long = "as-of", value_parser = parse_as_of)]
    pub as_of: Option<NaiveDate>,
    /// status view: request status to list
    #[arg(long, value_enum, default_value = "pending")]
    pub status: StatusFilter,
    /// status view: signature state to list
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    pub signed: bool,
    /// status view: treat an unknown signature state as unsigned
    #[arg(long = "assume-unsigned")]
    pub assume_unsigned: bool,
    /// support view: demographic to group by
    #[arg(long, value_enum, default_value = "state")]
    pub demographic: Demographic,
    /// summary view: calendar year to summarize (defaults to last year)
    #[arg(long)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum ReportView {
    /// Applications filtered by status and signature state
    Status,
    /// Average and total support by demographic
    Support,
    /// Histogram of days between request and payment
    Wait,
    /// Grants with an unused remaining balance
    Balance,
    /// Fixed-format yearly executive summary
    Summary,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum StatusFilter {
    Pending,
    Approved,
    Denied,
}

impl StatusFilter {
    pub fn label(self) -> &'static str {
        match self {
            StatusFilter::Pending => "Pending",
            StatusFilter::Approved => "Approved",
            StatusFilter::Denied => "Denied",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Demographic {
    State,
    Gender,
    Income,
    Insurance,
    Age,
    Assistance,
    Hispanic,
    Orientation,
}

pub fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("'{value}' is not a YYYY-MM-DD date"))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
