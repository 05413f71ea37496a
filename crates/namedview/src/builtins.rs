//! Built-in reduce functions.
//!
//! Registered by [`FunctionTable::with_builtins`](crate::FunctionTable::with_builtins)
//! as `builtin.sum`, `builtin.count` and `builtin.stats`. Each accepts the
//! reduce argument triple `[keys, values, rereduce]`.
//!
//! `builtin.sum` adds numbers, or arrays of numbers position by position
//! when every value is an array; shorter arrays count as zero-padded.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::errors::FunctionError;
use crate::function::{Invocation, ViewFunction, view_function};

/// Every built-in with its registered name.
pub(crate) fn all() -> Vec<(&'static str, Arc<dyn ViewFunction>)> {
    vec![
        ("builtin.sum", view_function(|_scope, args| sum(&args))),
        ("builtin.count", view_function(|_scope, args| count(&args))),
        ("builtin.stats", view_function(|_scope, args| stats(&args))),
    ]
}

fn reduce_args(name: &str, args: &[Value]) -> Result<(Vec<Value>, bool), FunctionError> {
    match args {
        [_keys, Value::Array(values), rereduce] => {
            Ok((values.clone(), rereduce == &Value::Bool(true)))
        }
        _ => Err(FunctionError::runtime(format!(
            "{name} expects [keys, values, rereduce]"
        ))),
    }
}

fn sum(args: &[Value]) -> Result<Invocation, FunctionError> {
    let (values, _) = reduce_args("builtin.sum", args)?;
    if values.first().is_some_and(Value::is_array) {
        return sum_arrays(&values).map(Invocation::Returned);
    }
    let mut total = Total::default();
    for value in &values {
        total = total.add(value)?;
    }
    Ok(Invocation::Returned(total.into_value()))
}

fn sum_arrays(values: &[Value]) -> Result<Value, FunctionError> {
    let mut totals: Vec<Total> = Vec::new();
    for value in values {
        let Value::Array(items) = value else {
            return Err(FunctionError::runtime(format!(
                "builtin.sum cannot mix arrays and numbers, got {value}"
            )));
        };
        if totals.len() < items.len() {
            totals.resize(items.len(), Total::default());
        }
        for (total, item) in totals.iter_mut().zip(items) {
            *total = total.add(item)?;
        }
    }
    Ok(Value::Array(
        totals.into_iter().map(Total::into_value).collect(),
    ))
}

fn count(args: &[Value]) -> Result<Invocation, FunctionError> {
    let (values, rereduce) = reduce_args("builtin.count", args)?;
    if !rereduce {
        return Ok(Invocation::returned(values.len()));
    }
    sum(args)
}

fn stats(args: &[Value]) -> Result<Invocation, FunctionError> {
    let (values, rereduce) = reduce_args("builtin.stats", args)?;
    let mut acc: Option<Stats> = None;
    for value in &values {
        let next = if rereduce {
            Stats::from_summary(value)?
        } else {
            Stats::single(number(value)?)
        };
        acc = Some(acc.map_or(next, |current| current.merge(&next)));
    }
    Ok(Invocation::Returned(
        acc.map_or(Value::Null, Stats::into_value),
    ))
}

fn number(value: &Value) -> Result<f64, FunctionError> {
    value
        .as_f64()
        .ok_or_else(|| FunctionError::runtime(format!("expected a number, got {value}")))
}

/// Running sum kept exact while every input is an integer.
#[derive(Debug, Clone, Copy)]
enum Total {
    Int(i64),
    Float(f64),
}

impl Default for Total {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl Total {
    #[expect(
        clippy::float_arithmetic,
        clippy::cast_precision_loss,
        reason = "non-integer sums are approximate by nature"
    )]
    fn add(self, value: &Value) -> Result<Self, FunctionError> {
        if let (Self::Int(current), Some(next)) = (self, value.as_i64())
            && let Some(sum) = current.checked_add(next)
        {
            return Ok(Self::Int(sum));
        }
        let current = match self {
            Self::Int(current) => current as f64,
            Self::Float(current) => current,
        };
        Ok(Self::Float(current + number(value)?))
    }

    fn into_value(self) -> Value {
        match self {
            Self::Int(total) => Value::from(total),
            Self::Float(total) => float_value(total),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Stats {
    sum: f64,
    count: f64,
    min: f64,
    max: f64,
    sumsqr: f64,
}

impl Stats {
    #[expect(clippy::float_arithmetic, reason = "statistics are floating point")]
    const fn single(value: f64) -> Self {
        Self {
            sum: value,
            count: 1.0,
            min: value,
            max: value,
            sumsqr: value * value,
        }
    }

    fn from_summary(value: &Value) -> Result<Self, FunctionError> {
        let field = |name: &str| {
            value.get(name).map_or_else(
                || {
                    Err(FunctionError::runtime(format!(
                        "stats summary is missing '{name}'"
                    )))
                },
                number,
            )
        };
        Ok(Self {
            sum: field("sum")?,
            count: field("count")?,
            min: field("min")?,
            max: field("max")?,
            sumsqr: field("sumsqr")?,
        })
    }

    #[expect(clippy::float_arithmetic, reason = "statistics are floating point")]
    const fn merge(self, other: &Self) -> Self {
        Self {
            sum: self.sum + other.sum,
            count: self.count + other.count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sumsqr: self.sumsqr + other.sumsqr,
        }
    }

    fn into_value(self) -> Value {
        let mut fields = Map::new();
        for (name, value) in [
            ("sum", self.sum),
            ("count", self.count),
            ("min", self.min),
            ("max", self.max),
            ("sumsqr", self.sumsqr),
        ] {
            fields.insert(name.to_owned(), float_value(value));
        }
        Value::Object(fields)
    }
}

/// Renders integral floats as JSON integers.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::float_cmp,
    reason = "the cast is only taken when it round-trips exactly"
)]
fn float_value(value: f64) -> Value {
    let truncated = value as i64;
    if truncated as f64 == value {
        json!(truncated)
    } else {
        json!(value)
    }
}
