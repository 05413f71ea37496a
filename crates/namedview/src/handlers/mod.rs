//! Execution contracts for each function kind.
//!
//! Every handler opens a [`CallbackScope`] for each invocation, drains any
//! producer while that scope is still open, and turns the outcome into the
//! response frame its kind expects.

mod filter;
mod list;
mod map;
mod reduce;
mod show;
mod update;
mod validate;

use serde_json::Value;

use crate::errors::{CallbackError, FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::{FunctionKind, Invocation};
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;

pub(crate) use self::map::map_doc;
pub(crate) use self::reduce::{ReduceInput, reduce};

/// Tracing target for function execution.
pub(crate) const HANDLER_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::handlers");

/// Runs a function found in a design document.
pub(crate) fn run_ddoc_function(
    frames: &mut dyn Frames,
    kind: FunctionKind,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    match kind {
        FunctionKind::Show => show::show(frames, function, args),
        FunctionKind::List => list::list(frames, function, args),
        FunctionKind::Filter => filter::filter(frames, function, args),
        FunctionKind::Update => update::update(frames, function, args),
        FunctionKind::ValidateDocUpdate => validate::validate(frames, function, args),
        FunctionKind::Map | FunctionKind::Reduce | FunctionKind::Rereduce => {
            Err(ServerError::unknown_kind(kind.as_str()))
        }
    }
}

/// Drains `invocation`, handing each produced item to `each`.
///
/// Returns the directly returned value, or `None` for producers.
pub(crate) fn drain<F>(
    invocation: Invocation,
    scope: &mut CallbackScope<'_>,
    mut each: F,
) -> Result<Option<Value>, FunctionError>
where
    F: FnMut(&mut CallbackScope<'_>, Value) -> Result<(), FunctionError>,
{
    match invocation {
        Invocation::Returned(value) => Ok(Some(value)),
        Invocation::Produced(mut producer) => {
            while let Some(item) = producer.next_item(scope) {
                each(scope, item?)?;
            }
            Ok(None)
        }
    }
}

/// Calls `function` and reduces its outcome to one value.
///
/// Produced items are gathered into an array.
pub(crate) fn call_for_value(
    scope: &mut CallbackScope<'_>,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<Value, FunctionError> {
    let invocation = function.call(scope, args)?;
    let mut items = Vec::new();
    let returned = drain(invocation, scope, |_, item| {
        items.push(item);
        Ok(())
    })?;
    Ok(returned.unwrap_or(Value::Array(items)))
}

/// Converts a function failure into the fatal error for `phase`.
///
/// Channel failures surfacing through a callback keep their own identity.
pub(crate) fn fatal_failure(
    phase: &'static str,
    function: &ResolvedFunction,
    doc_id: Option<&str>,
    error: FunctionError,
) -> ServerError {
    match error {
        FunctionError::Callback(CallbackError::Frame(frame)) => ServerError::Frame(frame),
        other => ServerError::function(phase, function, doc_id, other),
    }
}

/// Whether `value` counts as true.
///
/// `null`, `false`, `0` and `""` are false; everything else is true.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The `_id` of a document, when it has a string one.
pub(crate) fn doc_id(doc: &Value) -> Option<&str> {
    doc.get("_id").and_then(Value::as_str)
}

/// Splits `args` into exactly `N` values.
pub(crate) fn exact_args<const N: usize>(
    kind: FunctionKind,
    args: Vec<Value>,
) -> Result<[Value; N], ServerError> {
    <[Value; N]>::try_from(args).map_err(|received| {
        ServerError::bad_arguments(
            kind.as_str(),
            format!("expected {N} arguments, got {}", received.len()),
        )
    })
}
