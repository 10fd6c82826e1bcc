//! Field catalog model, YAML persistence, and the built-in grant contract.
//!
//! A [`Catalog`] is the declarative description of one export's cleaning
//! rules: per-column [`FieldSpec`]s (ordered normalization steps plus a
//! target type), derived columns computed after cleaning, and the shadow
//! fields snapshotted before destructive transforms. The catalog is data,
//! not code: the engine in [`crate::transform`] interprets it, and the
//! `catalog` command round-trips it through YAML so the contract can be
//! inspected or overridden.

use std::{fs::File, io::BufReader, path::Path};

use anyhow::{Context, Result, anyhow, ensure};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::states::{CaseMode, StateForm};

pub const CURRENT_CATALOG_VERSION: &str = "1";

/// Household sizes above this are treated as data-entry errors and
/// invalidate the whole record. Heuristic, dataset-specific.
pub const HOUSEHOLD_SIZE_CEILING: f64 = 15.0;

/// ZIP codes are truncated to their five-digit prefix.
pub const ZIP_DIGITS: usize = 5;

fn is_false(value: &bool) -> bool {
    !*value
}

/// One entry in an ordered rewrite list. Rules are tried in listed order
/// and the first match wins; `to: None` rewrites to the missing marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewriteRule {
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Literal whole-value comparison instead of a regex match.
    #[serde(default, skip_serializing_if = "is_false")]
    pub exact: bool,
}

impl RewriteRule {
    pub fn exact(pattern: &str, to: Option<&str>) -> Self {
        RewriteRule {
            pattern: pattern.to_string(),
            to: to.map(|s| s.to_string()),
            exact: true,
        }
    }

    pub fn matching(pattern: &str, to: Option<&str>) -> Self {
        RewriteRule {
            pattern: pattern.to_string(),
            to: to.map(|s| s.to_string()),
            exact: false,
        }
    }
}

/// Options for the state-normalization step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateOptions {
    #[serde(default)]
    pub output: StateForm,
    #[serde(default)]
    pub case: CaseMode,
    /// Write the mapped value into a new field, leaving the source as-is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub into: Option<String>,
}

/// A single normalization step. Steps run in declared order and each one
/// observes only the output of the steps before it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Trim leading and trailing whitespace.
    Trim,
    /// Remove every whitespace character.
    StripWhitespace,
    /// Remove each character in the list.
    StripChars(String),
    Uppercase,
    TitleCase,
    /// Keep only the first N characters.
    Truncate(usize),
    /// Ordered rewrite rules; first matching rule wins.
    Rewrite(Vec<RewriteRule>),
    /// Case-insensitive sentinel tokens mapped to the missing marker.
    Missing(Vec<String>),
    /// Copy the value as seen at this point into a shadow text field.
    Snapshot(String),
    /// Classify the value as seen at this point into a shadow flag field.
    SnapshotFlag {
        into: String,
        rules: Vec<RewriteRule>,
    },
    /// Normalize a US state name or postal abbreviation.
    State(StateOptions),
}

/// The type a field is cast to after its steps have run. Cast failure
/// yields the missing marker, never an error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Text,
    Integer,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scale: Option<u32>,
        /// Values above the ceiling invalidate the entire record.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ceiling: Option<f64>,
    },
    Currency,
    Date,
    Flag,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldSpec {
    /// Raw column header, exactly as exported (padding included).
    pub name: String,
    /// Cleaned output header, when it differs from the raw one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    pub target: Target,
}

impl FieldSpec {
    pub fn output_name(&self) -> &str {
        self.rename
            .as_deref()
            .filter(|value| !value.is_empty())
            .unwrap_or(&self.name)
    }
}

/// Operations available to derived fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeriveOp {
    /// Calendar year of a cleaned date field.
    YearOf,
}

/// A field computed from another cleaned field, never from raw input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedSpec {
    pub name: String,
    /// Output name of the cleaned source field.
    pub from: String,
    pub op: DeriveOp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_version: Option<String>,
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived: Vec<DerivedSpec>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening catalog file {path:?}"))?;
        let reader = BufReader::new(file);
        let catalog: Catalog =
            serde_yaml::from_reader(reader).context("Parsing catalog YAML")?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Creating catalog file {path:?}"))?;
        serde_yaml::to_writer(file, &self.versioned()).context("Writing catalog YAML")
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.versioned()).context("Serializing catalog to YAML")
    }

    fn versioned(&self) -> Catalog {
        let mut catalog = self.clone();
        if catalog.catalog_version.is_none() {
            catalog.catalog_version = Some(CURRENT_CATALOG_VERSION.to_string());
        }
        catalog
    }

    /// Every output column the cleaned file will contain, in order:
    /// primary fields, then shadow fields, then derived fields.
    pub fn output_columns(&self) -> Vec<(String, Target)> {
        let mut columns = Vec::with_capacity(self.fields.len() + self.derived.len());
        for field in &self.fields {
            columns.push((field.output_name().to_string(), field.target.clone()));
        }
        for field in &self.fields {
            for step in &field.steps {
                match step {
                    Step::Snapshot(into) => columns.push((into.clone(), Target::Text)),
                    Step::SnapshotFlag { into, .. } => {
                        columns.push((into.clone(), Target::Flag));
                    }
                    Step::State(options) => {
                        if let Some(into) = &options.into {
                            columns.push((into.clone(), Target::Text));
                        }
                    }
                    _ => {}
                }
            }
        }
        for derived in &self.derived {
            columns.push((derived.name.clone(), Target::Integer));
        }
        columns
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(!self.fields.is_empty(), "Catalog defines no fields");

        let mut seen = std::collections::HashSet::new();
        for (name, _) in self.output_columns() {
            ensure!(
                seen.insert(name.clone()),
                "Duplicate output column '{name}' in catalog"
            );
        }

        for field in &self.fields {
            for step in &field.steps {
                match step {
                    Step::Rewrite(rules) => validate_rules(&field.name, rules)?,
                    Step::SnapshotFlag { rules, .. } => validate_rules(&field.name, rules)?,
                    Step::Truncate(length) => ensure!(
                        *length > 0,
                        "Field '{}' truncates to zero characters",
                        field.name
                    ),
                    _ => {}
                }
            }
            if let Target::Number { scale: Some(scale), .. } = &field.target {
                ensure!(
                    *scale <= 10,
                    "Field '{}' declares an implausible rounding scale {scale}",
                    field.name
                );
            }
        }

        for derived in &self.derived {
            let source = self
                .fields
                .iter()
                .find(|field| field.output_name() == derived.from)
                .ok_or_else(|| {
                    anyhow!(
                        "Derived field '{}' references unknown column '{}'",
                        derived.name,
                        derived.from
                    )
                })?;
            match derived.op {
                DeriveOp::YearOf => ensure!(
                    source.target == Target::Date,
                    "Derived field '{}' requires a date column but '{}' is not one",
                    derived.name,
                    derived.from
                ),
            }
        }
        Ok(())
    }

    /// The built-in contract for the grant-application export.
    pub fn builtin() -> Catalog {
        builtin_catalog()
    }
}

fn validate_rules(field: &str, rules: &[RewriteRule]) -> Result<()> {
    for rule in rules {
        if !rule.exact {
            Regex::new(&rule.pattern).with_context(|| {
                format!("Field '{field}' has an invalid pattern '{}'", rule.pattern)
            })?;
        }
    }
    Ok(())
}

fn field(name: &str, steps: Vec<Step>, target: Target) -> FieldSpec {
    FieldSpec {
        name: name.to_string(),
        rename: None,
        steps,
        target,
    }
}

fn padded(name: &str, rename: &str, steps: Vec<Step>, target: Target) -> FieldSpec {
    FieldSpec {
        rename: Some(rename.to_string()),
        ..field(name, steps, target)
    }
}

fn missing(tokens: &[&str]) -> Step {
    Step::Missing(tokens.iter().map(|t| t.to_string()).collect())
}

fn plain_number() -> Target {
    Target::Number {
        scale: None,
        ceiling: None,
    }
}

fn builtin_catalog() -> Catalog {
    use RewriteRule as R;

    let fields = vec![
        field(
            "Patient ID#",
            vec![Step::StripWhitespace],
            Target::Text,
        ),
        field("Grant Req Date", vec![Step::StripWhitespace], Target::Date),
        padded(
            " Remaining Balance ",
            "Remaining Balance",
            vec![Step::Trim],
            Target::Currency,
        ),
        field(
            "Request Status",
            vec![Step::TitleCase, Step::Trim],
            Target::Text,
        ),
        field(
            "Payment Submitted?",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::SnapshotFlag {
                    into: "Payment Submitted? Boolean".to_string(),
                    rules: vec![
                        R::matching(r"^\d", Some("true")),
                        R::exact("Yes", Some("true")),
                        R::exact("No", Some("false")),
                    ],
                },
            ],
            Target::Date,
        ),
        field(
            "Pt City",
            vec![
                Step::StripChars(".,(?)".to_string()),
                Step::TitleCase,
                Step::Trim,
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Pt State",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::State(StateOptions {
                    output: StateForm::FullName,
                    case: CaseMode::Unchanged,
                    into: None,
                }),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Pt Zip",
            vec![
                Step::StripWhitespace,
                // Verified data-entry typo in the source export.
                Step::Rewrite(vec![R::exact("698863", Some("68863"))]),
                missing(&["missing"]),
                Step::Truncate(ZIP_DIGITS),
            ],
            Target::Text,
        ),
        field(
            "Language",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    // Unverifiable entry; invalidated rather than guessed.
                    R::exact("Karen", None),
                    R::exact("English, Spanish", Some("English")),
                ]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field("DOB", vec![missing(&["missing"])], Target::Date),
        field(
            "Marital Status",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![R::exact("Seperated", Some("Separated"))]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Gender",
            vec![Step::TitleCase, Step::Trim, missing(&["missing"])],
            Target::Text,
        ),
        field(
            "Race",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::matching("(?i)whiate", Some("White")),
                    R::matching("Indian Or", Some("American Indian or Alaskan Native")),
                    R::matching("(?i)decline to answer", None),
                    R::matching("(?i)hispanic", Some("Other")),
                    R::matching("(?i)two or more races", Some("Other")),
                ]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Hispanic/Latino",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::matching("(?i)^no", Some("false")),
                    R::matching("(?i)^his", Some("true")),
                    R::exact("Yes", Some("true")),
                    R::matching("(?i)decline to answer", None),
                    R::matching("(?i)missing", None),
                ]),
            ],
            Target::Flag,
        ),
        field(
            "Sexual Orientation",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::matching("(?i)^d", None),
                    R::matching("(?i)^st", Some("Heterosexual")),
                    R::matching("(?i)gay or lesbian", Some("Homosexual")),
                    R::matching("(?i)^female", None),
                    R::matching("(?i)^male", None),
                ]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Insurance Type",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::matching("(?i)^uni", Some("Uninsured")),
                    R::exact("Unknown", None),
                    // A marketplace, not an insurance type.
                    R::exact("Heathcare.Gov", None),
                    R::exact("Medicaid & Medicare", Some("Medicare & Medicaid")),
                ]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        field(
            "Household Size",
            vec![Step::StripWhitespace, missing(&["missing"])],
            Target::Number {
                scale: Some(1),
                ceiling: Some(HOUSEHOLD_SIZE_CEILING),
            },
        ),
        padded(
            " Total Household Gross Monthly Income ",
            "Total Household Gross Monthly Income",
            vec![Step::Trim, missing(&["missing"])],
            Target::Currency,
        ),
        field("Distance roundtrip/Tx", vec![Step::Trim], plain_number()),
        field(
            "Referral Source",
            vec![Step::Uppercase, Step::Trim, missing(&["missing"])],
            Target::Text,
        ),
        field(
            "Referred By:",
            vec![Step::Trim, Step::Uppercase, missing(&["missing"])],
            Target::Text,
        ),
        field(
            "Type of Assistance (CLASS)",
            vec![
                Step::Trim,
                Step::TitleCase,
                Step::Rewrite(vec![R::exact("Multiple", Some("Other"))]),
                missing(&["missing"]),
            ],
            Target::Text,
        ),
        padded(" Amount ", "Amount", vec![Step::Trim], Target::Currency),
        field(
            "Payment Method",
            vec![
                Step::Uppercase,
                Step::Trim,
                Step::Snapshot("Payment Method Original".to_string()),
                Step::Rewrite(vec![
                    R::matching("CK", Some("CK")),
                    R::matching("CC", Some("CC")),
                    R::matching("GC", Some("GC")),
                    R::matching("J.*E", Some("JE")),
                    R::exact("BANK TRANSACTION", Some("OTHER")),
                    R::exact("NCS DUE TO/FROM", Some("OTHER")),
                    R::exact("CASH", Some("OTHER")),
                    R::exact("ACH", Some("OTHER")),
                    R::exact("EFT", Some("OTHER")),
                    // A stray amount keyed into the method column.
                    R::exact("1575.86", Some("OTHER")),
                    R::exact("?", None),
                    R::exact("MISSING", None),
                    R::exact("PENDING", None),
                ]),
            ],
            Target::Text,
        ),
        field(
            "Payable to:",
            vec![Step::Trim, missing(&["missing"])],
            Target::Text,
        ),
        field(
            "Patient Letter Notified? (Directly/Indirectly through rep)",
            vec![
                Step::Rewrite(vec![R::matching(r"^\d", Some("true"))]),
                Step::Uppercase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::exact("MISSING", None),
                    R::exact("NA", None),
                    R::exact("HOLD", None),
                    R::exact("YES", Some("true")),
                    R::exact("NO", Some("false")),
                ]),
            ],
            Target::Flag,
        ),
        field(
            "Application Signed?",
            vec![
                Step::TitleCase,
                Step::Trim,
                Step::Rewrite(vec![
                    R::exact("Missing", None),
                    R::exact("Yes", Some("true")),
                    R::exact("No", Some("false")),
                ]),
            ],
            Target::Flag,
        ),
    ];

    Catalog {
        catalog_version: Some(CURRENT_CATALOG_VERSION.to_string()),
        fields,
        derived: vec![DerivedSpec {
            name: "YOB".to_string(),
            from: "DOB".to_string(),
            op: DeriveOp::YearOf,
        }],
    }
}
