//! User-defined derived output columns (`name=expression`).
//!
//! Expressions are evaluated over the cleaned values of each record with
//! `evalexpr`. Columns are bound under identifier-normalized names
//! (`Pt State` → `pt_state`) and positional `c{idx}` aliases; missing cells
//! bind to the empty string.

use anyhow::{Context, Result, anyhow};
use evalexpr::{
    ContextWithMutableVariables, HashMapContext, Value as EvalValue, eval_with_context,
};

use crate::data::{Value, normalize_column_name};

#[derive(Debug, Clone)]
pub struct DerivedColumn {
    pub name: String,
    pub expression: String,
}

impl DerivedColumn {
    pub fn parse(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(2, '=');
        let name = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Derived column is missing a name"))?;
        let expression = parts
            .next()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| anyhow!("Derived column '{name}' is missing an expression"))?;
        Ok(DerivedColumn {
            name: name.to_string(),
            expression: expression.to_string(),
        })
    }

    pub fn evaluate(&self, headers: &[String], cleaned: &[Option<Value>]) -> Result<String> {
        let mut context = HashMapContext::new();
        for (idx, header) in headers.iter().enumerate() {
            let bound = match cleaned.get(idx).and_then(|cell| cell.as_ref()) {
                Some(value) => value_to_evalexpr(value),
                None => EvalValue::String(String::new()),
            };
            context
                .set_value(normalize_column_name(header).into(), bound.clone())
                .with_context(|| format!("Binding column '{header}'"))?;
            context
                .set_value(format!("c{idx}").into(), bound)
                .with_context(|| format!("Binding column index {idx}"))?;
        }

        let result = eval_with_context(&self.expression, &context)
            .with_context(|| format!("Evaluating expression for column '{}'", self.name))?;
        Ok(match result {
            EvalValue::String(s) => s,
            EvalValue::Int(i) => i.to_string(),
            EvalValue::Float(f) => f.to_string(),
            EvalValue::Boolean(b) => b.to_string(),
            EvalValue::Tuple(values) => values
                .into_iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("|"),
            EvalValue::Empty => String::new(),
        })
    }
}

fn value_to_evalexpr(value: &Value) -> EvalValue {
    use rust_decimal::prelude::ToPrimitive;
    match value {
        Value::Text(s) => EvalValue::String(s.clone()),
        Value::Integer(i) => EvalValue::Int(*i),
        Value::Number(n) => EvalValue::Float(*n),
        Value::Currency(d) => d
            .to_f64()
            .map(EvalValue::Float)
            .unwrap_or(EvalValue::Empty),
        Value::Date(d) => EvalValue::String(d.format("%Y-%m-%d").to_string()),
        Value::Flag(b) => EvalValue::Boolean(*b),
    }
}

pub fn parse_derived_columns(specs: &[String]) -> Result<Vec<DerivedColumn>> {
    specs
        .iter()
        .map(|spec| DerivedColumn::parse(spec))
        .collect()
}
