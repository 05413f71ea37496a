//! List functions: a stream of view rows rendered as one response.
//!
//! The function pulls rows itself through `get_row`, and each pull flushes
//! the output gathered so far. Once the function completes the response is
//! closed with an `end` frame.

use serde_json::Value;
use tracing::debug;

use super::show::{not_found_frame, render_item};
use super::{HANDLER_TARGET, drain, exact_args, fatal_failure};
use crate::errors::{FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;
use crate::stream::ListPhase;

pub(super) fn list(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    let kind = FunctionKind::List;
    let phase = kind.runtime_phase();
    let [head, req] = exact_args(kind, args)?;

    let mut scope = CallbackScope::new(kind, &mut *frames);
    let outcome = render(&mut scope, function, vec![head, req]);
    let (mut parts, mut stream) = scope.into_response();

    match outcome {
        Ok(()) => {}
        Err(FunctionError::NotFound { message }) => {
            frames.write_frame(&not_found_frame(message))?;
            return Ok(());
        }
        Err(FunctionError::Redirect { url, permanent })
            if stream.phase() == ListPhase::NotStarted =>
        {
            debug!(target: HANDLER_TARGET, %url, "list redirected before start");
            parts.redirect(&url, permanent);
        }
        Err(FunctionError::Redirect { url, .. }) => {
            return Err(fatal_failure(
                phase,
                function,
                None,
                FunctionError::runtime(format!(
                    "cannot redirect to {url} after the response has started"
                )),
            ));
        }
        Err(error) => return Err(fatal_failure(phase, function, None, error)),
    }

    stream
        .finish(frames, &mut parts)
        .map_err(|error| fatal_failure(phase, function, None, error.into()))
}

fn render(
    scope: &mut CallbackScope<'_>,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), FunctionError> {
    let invocation = function.call(scope, args)?;
    match drain(invocation, scope, render_item)? {
        Some(Value::String(tail)) => scope.send(tail)?,
        Some(Value::Null) | None => {}
        Some(other) => {
            return Err(FunctionError::runtime(format!(
                "list functions must return a string or null, got {other}"
            )));
        }
    }
    Ok(())
}
