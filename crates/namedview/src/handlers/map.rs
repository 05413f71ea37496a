//! `map_doc`: every registered map function over one document.

use namedview_config::ReportStyle;
use serde_json::Value;
use tracing::debug;

use super::{HANDLER_TARGET, doc_id, drain, fatal_failure};
use crate::errors::{FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::report;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;

/// Maps `doc` through `functions` in registration order.
///
/// A function that fails at runtime contributes an empty slot and is
/// reported without ending the session; callback misuse is fatal.
pub(crate) fn map_doc(
    frames: &mut dyn Frames,
    style: ReportStyle,
    functions: &[ResolvedFunction],
    doc: &Value,
) -> Result<(), ServerError> {
    if functions.is_empty() {
        return Err(ServerError::NoMapFunctions);
    }
    let id = doc_id(doc);
    let phase = FunctionKind::Map.runtime_phase();

    let mut slots = Vec::with_capacity(functions.len());
    for function in functions {
        match run_one(frames, function, doc) {
            Ok(pairs) => slots.push(Value::Array(pairs)),
            Err(error @ FunctionError::Callback(_)) => {
                return Err(fatal_failure(phase, function, id, error));
            }
            Err(error) => {
                let info = report::function_reason(&error, id, function.name());
                report::nonfatal(frames, style, phase, &info)?;
                slots.push(Value::Array(Vec::new()));
            }
        }
    }
    debug!(target: HANDLER_TARGET, doc_id = id, functions = slots.len(), "mapped document");
    frames.output(slots)?;
    Ok(())
}

fn run_one(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    doc: &Value,
) -> Result<Vec<Value>, FunctionError> {
    let mut scope = CallbackScope::new(FunctionKind::Map, frames);
    let invocation = function.call(&mut scope, vec![doc.clone()])?;
    drain(invocation, &mut scope, |open, item| {
        let [key, value] = emitted_pair(item)?;
        open.emit(key, value)?;
        Ok(())
    })?;
    Ok(scope.take_emissions())
}

fn emitted_pair(item: Value) -> Result<[Value; 2], FunctionError> {
    match item {
        Value::Array(pair) => <[Value; 2]>::try_from(pair).map_err(|items| {
            FunctionError::runtime(format!(
                "map producers must yield [key, value] pairs, got {} items",
                items.len()
            ))
        }),
        other => Err(FunctionError::runtime(format!(
            "map producers must yield [key, value] pairs, got {other}"
        ))),
    }
}
