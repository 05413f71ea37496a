//! Show functions: one document rendered as one response.

use serde_json::{Map, Value, json};

use super::{doc_id, drain, exact_args, fatal_failure};
use crate::errors::{DEFAULT_NOT_FOUND_MESSAGE, FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;
use crate::stream::{ResponseParts, redirect_fields};

pub(super) fn show(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    let kind = FunctionKind::Show;
    let [doc, req] = exact_args(kind, args)?;
    let id = doc_id(&doc).map(str::to_owned);

    let mut scope = CallbackScope::new(kind, &mut *frames);
    let outcome = render(&mut scope, function, vec![doc, req]);
    let (parts, _) = scope.into_response();

    let frame = match outcome.and_then(|returned| merge_response(parts, returned)) {
        Ok(response) => json!(["resp", Value::Object(response)]),
        Err(FunctionError::NotFound { message }) => not_found_frame(message),
        Err(FunctionError::Redirect { url, permanent }) => {
            json!(["resp", Value::Object(redirect_fields(&url, permanent))])
        }
        Err(error) => {
            return Err(fatal_failure(
                kind.runtime_phase(),
                function,
                id.as_deref(),
                error,
            ));
        }
    };
    frames.write_frame(&frame)?;
    Ok(())
}

/// Applies one produced item of a show or list function.
///
/// Objects set the start object and strings become body chunks.
pub(super) fn render_item(
    scope: &mut CallbackScope<'_>,
    item: Value,
) -> Result<(), FunctionError> {
    match item {
        Value::String(chunk) => scope.send(chunk)?,
        Value::Object(fields) => scope.start(Value::Object(fields))?,
        other => {
            return Err(FunctionError::runtime(format!(
                "{} producers must yield strings or response objects, got {other}",
                scope.kind()
            )));
        }
    }
    Ok(())
}

pub(super) fn not_found_frame(message: Option<String>) -> Value {
    let text = message.unwrap_or_else(|| DEFAULT_NOT_FOUND_MESSAGE.to_owned());
    json!(["error", "not_found", text])
}

fn render(
    scope: &mut CallbackScope<'_>,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<Value, FunctionError> {
    let invocation = function.call(scope, args)?;
    let returned = drain(invocation, scope, render_item)?;
    Ok(returned.unwrap_or(Value::Null))
}

/// Combines the start object, sent chunks and the returned value.
///
/// Returned fields override the start object, except `headers`, which are
/// merged key by key, and `body`, which is appended to the sent chunks.
fn merge_response(
    mut parts: ResponseParts,
    returned: Value,
) -> Result<Map<String, Value>, FunctionError> {
    let mut response = parts.take_start().unwrap_or_default();
    let chunks = parts.take_chunks();
    let mut body = (!chunks.is_empty()).then(|| chunks.concat());

    match returned {
        Value::Null => {}
        Value::String(text) => append(&mut body, &text),
        Value::Object(fields) => {
            for (name, value) in fields {
                match value {
                    Value::String(text) if name == "body" => append(&mut body, &text),
                    Value::Object(headers) if name == "headers" => {
                        merge_headers(&mut response, headers);
                    }
                    other => {
                        response.insert(name, other);
                    }
                }
            }
        }
        other => {
            return Err(FunctionError::runtime(format!(
                "show functions must return a string, an object or null, got {other}"
            )));
        }
    }

    if let Some(text) = body {
        response.insert("body".to_owned(), Value::String(text));
    }
    Ok(response)
}

fn append(body: &mut Option<String>, text: &str) {
    body.get_or_insert_with(String::new).push_str(text);
}

fn merge_headers(response: &mut Map<String, Value>, headers: Map<String, Value>) {
    match response.get_mut("headers") {
        Some(Value::Object(existing)) => existing.extend(headers),
        _ => {
            response.insert("headers".to_owned(), Value::Object(headers));
        }
    }
}
