//! `reduce` and `rereduce`.
//!
//! Reduce function paths are resolved on every call and never cached. When
//! the query configuration enables `reduce_limit`, the response must fit in
//! half the size of the request line, with a floor of 200 bytes.

use namedview_config::ReportStyle;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{HANDLER_TARGET, call_for_value, fatal_failure, truthy};
use crate::errors::{FrameError, FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::report;
use crate::resolver::{FunctionPath, ResolvedFunction, Resolver};
use crate::scope::CallbackScope;

/// Smallest response budget when `reduce_limit` is enabled.
pub(crate) const MIN_REDUCE_BUDGET: usize = 200;

/// Rows handed to a reduce pass.
#[derive(Debug)]
pub(crate) enum ReduceInput {
    /// First pass over emitted rows.
    Rows {
        /// `[key, docId]` pairs.
        keys: Vec<Value>,
        /// Emitted values.
        values: Vec<Value>,
    },
    /// Second pass over reduced values.
    Rereduce {
        /// Values from earlier passes.
        values: Vec<Value>,
    },
}

impl ReduceInput {
    const fn kind(&self) -> FunctionKind {
        match self {
            Self::Rows { .. } => FunctionKind::Reduce,
            Self::Rereduce { .. } => FunctionKind::Rereduce,
        }
    }

    fn arguments(&self) -> Vec<Value> {
        match self {
            Self::Rows { keys, values } => vec![
                Value::Array(keys.clone()),
                Value::Array(values.clone()),
                Value::Bool(false),
            ],
            Self::Rereduce { values } => {
                vec![Value::Null, Value::Array(values.clone()), Value::Bool(true)]
            }
        }
    }
}

/// Runs each reduce function over `input` and writes `[true, results]`.
pub(crate) fn reduce<R: Resolver + ?Sized>(
    frames: &mut dyn Frames,
    style: ReportStyle,
    resolver: &R,
    query_config: &Map<String, Value>,
    paths: &[String],
    input: &ReduceInput,
) -> Result<(), ServerError> {
    let kind = input.kind();
    let phase = kind.runtime_phase();

    let mut results = Vec::with_capacity(paths.len());
    for raw in paths {
        let function = resolve(resolver, raw)?;
        match run_one(frames, kind, &function, input.arguments()) {
            Ok(result) => results.push(result),
            Err(error @ FunctionError::Callback(_)) => {
                return Err(fatal_failure(phase, &function, None, error));
            }
            Err(error) => {
                let info = report::function_reason(&error, None, function.name());
                report::nonfatal(frames, style, phase, &info)?;
                results.push(Value::Null);
            }
        }
    }

    let response = json!([true, results]);
    if query_config.get("reduce_limit").is_some_and(truthy) {
        let limit = budget(frames.last_line_len());
        debug!(target: HANDLER_TARGET, limit, "reduce output limited");
        return frames
            .write_limited(&response, limit)
            .map_err(|error| match error {
                FrameError::TooLarge { size, .. } => ServerError::output_too_large(size, limit),
                other => ServerError::Frame(other),
            });
    }
    frames.write_frame(&response)?;
    Ok(())
}

/// Response budget for a request line of `line_len` bytes.
pub(crate) fn budget(line_len: usize) -> usize {
    (line_len >> 1).max(MIN_REDUCE_BUDGET)
}

fn resolve<R: Resolver + ?Sized>(
    resolver: &R,
    raw: &str,
) -> Result<ResolvedFunction, ServerError> {
    FunctionPath::parse(raw)
        .and_then(|path| resolver.resolve(&path))
        .map_err(|error| ServerError::resolve(raw, error))
}

fn run_one(
    frames: &mut dyn Frames,
    kind: FunctionKind,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<Value, FunctionError> {
    let mut scope = CallbackScope::new(kind, frames);
    call_for_value(&mut scope, function, args)
}
