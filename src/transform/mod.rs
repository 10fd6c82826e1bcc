//! The normalization engine.
//!
//! [`Normalizer::compile`] turns a [`Catalog`] into pre-compiled per-field
//! step pipelines (regexes compiled once, shadow and derived fields resolved
//! to output slots). [`Normalizer::bind`] resolves the pipelines against an
//! input header row — every catalog field is required, a missing column is
//! fatal. Record normalization itself is pure: no I/O, no clock (the
//! processing date is injected), and no per-value errors — anything that
//! fails to parse becomes the missing marker.

pub mod string_ops;

use anyhow::{Context, Result, anyhow};
use chrono::{Datelike, NaiveDate};
use regex::Regex;

use crate::{
    catalog::{Catalog, DeriveOp, Step, Target},
    data::{self, Value},
    states::{self, CaseMode, StateForm},
};

enum CompiledRule {
    Exact { pattern: String, to: Option<String> },
    Pattern { regex: Regex, to: Option<String> },
}

impl CompiledRule {
    /// First-match-wins outcome: `None` when the rule does not apply,
    /// `Some(rewritten)` when it does.
    fn apply(&self, value: &str) -> Option<Option<String>> {
        match self {
            CompiledRule::Exact { pattern, to } => (value == pattern).then(|| to.clone()),
            CompiledRule::Pattern { regex, to } => regex.is_match(value).then(|| to.clone()),
        }
    }
}

enum CompiledStep {
    Trim,
    StripWhitespace,
    StripChars(Vec<char>),
    Uppercase,
    TitleCase,
    Truncate(usize),
    Rewrite(Vec<CompiledRule>),
    Missing(Vec<String>),
    Snapshot(usize),
    SnapshotFlag {
        slot: usize,
        rules: Vec<CompiledRule>,
    },
    State {
        output: StateForm,
        case: CaseMode,
        slot: Option<usize>,
    },
}

struct CompiledField {
    name: String,
    output_name: String,
    slot: usize,
    steps: Vec<CompiledStep>,
    target: Target,
}

struct CompiledDerived {
    slot: usize,
    source_slot: usize,
    op: DeriveOp,
}

/// A catalog compiled into an executable form.
pub struct Normalizer {
    fields: Vec<CompiledField>,
    derived: Vec<CompiledDerived>,
    headers: Vec<String>,
}

/// Raw-column indices for each catalog field, resolved once per input file.
#[derive(Debug)]
pub struct RecordBinding {
    indices: Vec<usize>,
}

impl Normalizer {
    pub fn compile(catalog: &Catalog) -> Result<Self> {
        catalog.validate()?;
        let output = catalog.output_columns();
        let headers: Vec<String> = output.iter().map(|(name, _)| name.clone()).collect();
        let slot_of = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| anyhow!("Output column '{name}' not found"))
        };

        let mut fields = Vec::with_capacity(catalog.fields.len());
        for spec in &catalog.fields {
            let mut steps = Vec::with_capacity(spec.steps.len());
            for step in &spec.steps {
                steps.push(compile_step(step, &slot_of)?);
            }
            fields.push(CompiledField {
                name: spec.name.clone(),
                output_name: spec.output_name().to_string(),
                slot: slot_of(spec.output_name())?,
                steps,
                target: spec.target.clone(),
            });
        }

        let mut derived = Vec::with_capacity(catalog.derived.len());
        for spec in &catalog.derived {
            derived.push(CompiledDerived {
                slot: slot_of(&spec.name)?,
                source_slot: slot_of(&spec.from)?,
                op: spec.op.clone(),
            });
        }

        Ok(Normalizer {
            fields,
            derived,
            headers,
        })
    }

    /// Headers of the cleaned output, in column order.
    pub fn output_headers(&self) -> &[String] {
        &self.headers
    }

    /// Resolves every catalog field against the input header row. The input
    /// schema is fixed: any absent column is an error naming the column.
    /// Both the raw name and the cleaned output name are accepted, so a
    /// cleaned file can be re-bound.
    pub fn bind(&self, raw_headers: &[String]) -> Result<RecordBinding> {
        let mut indices = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            let index = raw_headers
                .iter()
                .position(|header| header == &field.name || header == &field.output_name)
                .ok_or_else(|| {
                    anyhow!("Required column '{}' not found in input header", field.name)
                })?;
            indices.push(index);
        }
        Ok(RecordBinding { indices })
    }

    /// Cleans one record. Returns one `Option<Value>` per output column;
    /// a bounded-numeric ceiling breach blanks the entire record.
    pub fn normalize_record(
        &self,
        binding: &RecordBinding,
        raw: &[String],
        as_of: NaiveDate,
    ) -> Vec<Option<Value>> {
        let mut out: Vec<Option<Value>> = vec![None; self.headers.len()];
        let mut record_invalid = false;

        for (field, &raw_index) in self.fields.iter().zip(&binding.indices) {
            let raw_value = raw.get(raw_index).map(String::as_str).unwrap_or("");
            let mut current = if raw_value.trim().is_empty() {
                None
            } else {
                Some(raw_value.to_string())
            };

            for step in &field.steps {
                let Some(text) = current.take() else {
                    break;
                };
                current = run_step(step, text, &mut out);
            }

            out[field.slot] = current
                .filter(|text| !text.is_empty())
                .and_then(|text| cast(&text, &field.target, as_of, &mut record_invalid));
        }

        for derived in &self.derived {
            out[derived.slot] = match derived.op {
                DeriveOp::YearOf => match &out[derived.source_slot] {
                    Some(Value::Date(date)) => Some(Value::Integer(i64::from(date.year()))),
                    _ => None,
                },
            };
        }

        if record_invalid {
            out.iter_mut().for_each(|cell| *cell = None);
        }
        out
    }

    /// Cleans a whole record set in input order.
    pub fn normalize_all(
        &self,
        binding: &RecordBinding,
        records: &[Vec<String>],
        as_of: NaiveDate,
    ) -> Vec<Vec<Option<Value>>> {
        records
            .iter()
            .map(|record| self.normalize_record(binding, record, as_of))
            .collect()
    }
}

fn compile_step(
    step: &Step,
    slot_of: &dyn Fn(&str) -> Result<usize>,
) -> Result<CompiledStep> {
    Ok(match step {
        Step::Trim => CompiledStep::Trim,
        Step::StripWhitespace => CompiledStep::StripWhitespace,
        Step::StripChars(chars) => CompiledStep::StripChars(chars.chars().collect()),
        Step::Uppercase => CompiledStep::Uppercase,
        Step::TitleCase => CompiledStep::TitleCase,
        Step::Truncate(length) => CompiledStep::Truncate(*length),
        Step::Rewrite(rules) => CompiledStep::Rewrite(compile_rules(rules)?),
        Step::Missing(tokens) => {
            CompiledStep::Missing(tokens.iter().map(|t| t.to_lowercase()).collect())
        }
        Step::Snapshot(into) => CompiledStep::Snapshot(slot_of(into)?),
        Step::SnapshotFlag { into, rules } => CompiledStep::SnapshotFlag {
            slot: slot_of(into)?,
            rules: compile_rules(rules)?,
        },
        Step::State(options) => CompiledStep::State {
            output: options.output,
            case: options.case,
            slot: options.into.as_deref().map(slot_of).transpose()?,
        },
    })
}

fn compile_rules(rules: &[crate::catalog::RewriteRule]) -> Result<Vec<CompiledRule>> {
    rules
        .iter()
        .map(|rule| {
            if rule.exact {
                Ok(CompiledRule::Exact {
                    pattern: rule.pattern.clone(),
                    to: rule.to.clone(),
                })
            } else {
                let regex = Regex::new(&rule.pattern)
                    .with_context(|| format!("Compiling pattern '{}'", rule.pattern))?;
                Ok(CompiledRule::Pattern {
                    regex,
                    to: rule.to.clone(),
                })
            }
        })
        .collect()
}

/// Runs one step over a present value, writing shadow slots as a side
/// effect. Returns the value seen by the next step (`None` = missing).
fn run_step(step: &CompiledStep, text: String, out: &mut [Option<Value>]) -> Option<String> {
    match step {
        CompiledStep::Trim => Some(string_ops::trim(&text).into_owned()),
        CompiledStep::StripWhitespace => Some(string_ops::strip_whitespace(&text).into_owned()),
        CompiledStep::StripChars(unwanted) => {
            Some(string_ops::strip_chars(&text, unwanted).into_owned())
        }
        CompiledStep::Uppercase => Some(string_ops::uppercase(&text).into_owned()),
        CompiledStep::TitleCase => Some(string_ops::title_case(&text).into_owned()),
        CompiledStep::Truncate(length) => Some(string_ops::truncate(&text, *length).into_owned()),
        CompiledStep::Rewrite(rules) => {
            for rule in rules {
                if let Some(outcome) = rule.apply(&text) {
                    return outcome;
                }
            }
            Some(text)
        }
        CompiledStep::Missing(tokens) => {
            if tokens.iter().any(|token| text.to_lowercase() == *token) {
                None
            } else {
                Some(text)
            }
        }
        CompiledStep::Snapshot(slot) => {
            out[*slot] = Some(Value::Text(text.clone()));
            Some(text)
        }
        CompiledStep::SnapshotFlag { slot, rules } => {
            for rule in rules {
                if let Some(outcome) = rule.apply(&text) {
                    out[*slot] = outcome
                        .as_deref()
                        .and_then(data::parse_flag)
                        .map(Value::Flag);
                    break;
                }
            }
            Some(text)
        }
        CompiledStep::State { output, case, slot } => {
            let mapped = states::normalize_state(&text, *output, *case);
            match slot {
                Some(slot) => {
                    out[*slot] = Some(Value::Text(mapped));
                    Some(text)
                }
                None => Some(mapped),
            }
        }
    }
}

/// Casts the post-step text to the field's target type. Failure is the
/// missing marker; only a bounded-numeric ceiling breach escalates, and it
/// does so by flagging the whole record rather than erroring.
fn cast(
    text: &str,
    target: &Target,
    as_of: NaiveDate,
    record_invalid: &mut bool,
) -> Option<Value> {
    match target {
        Target::Text => Some(Value::Text(text.to_string())),
        Target::Integer => text.trim().parse().ok().map(Value::Integer),
        Target::Number { scale, ceiling } => {
            let mut number: f64 = text.trim().parse().ok()?;
            if let Some(scale) = scale {
                let factor = 10f64.powi(*scale as i32);
                number = (number * factor).round() / factor;
            }
            if let Some(ceiling) = ceiling
                && number > *ceiling
            {
                *record_invalid = true;
            }
            Some(Value::Number(number))
        }
        Target::Currency => data::parse_currency_decimal(text).ok().map(Value::Currency),
        Target::Date => {
            let date = data::parse_naive_date(text).ok()?;
            // Future-dated values are bad input, not time travel.
            (date <= as_of).then_some(Value::Date(date))
        }
        Target::Flag => data::parse_flag(text).map(Value::Flag),
    }
}
