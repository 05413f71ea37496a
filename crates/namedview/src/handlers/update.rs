//! Update functions: a new document plus a response.

use serde_json::{Value, json};

use super::{call_for_value, doc_id, exact_args, fatal_failure};
use crate::errors::{FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;

pub(super) fn update(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    let kind = FunctionKind::Update;
    let [doc, req] = exact_args(kind, args)?;
    let id = doc_id(&doc).map(str::to_owned);

    let mut scope = CallbackScope::new(kind, &mut *frames);
    let (updated, response) = call_for_value(&mut scope, function, vec![doc, req])
        .and_then(split_result)
        .map_err(|error| fatal_failure(kind.runtime_phase(), function, id.as_deref(), error))?;

    frames.write_frame(&json!(["up", updated, response]))?;
    Ok(())
}

fn split_result(returned: Value) -> Result<(Value, Value), FunctionError> {
    let shape_error = |detail: &str| {
        FunctionError::runtime(format!(
            "update functions must return [document, response], {detail}"
        ))
    };
    let Value::Array(items) = returned else {
        return Err(shape_error("got a non-array value"));
    };
    let [updated, response] =
        <[Value; 2]>::try_from(items).map_err(|_| shape_error("got the wrong length"))?;
    match response {
        Value::String(body) => Ok((updated, json!({ "body": body }))),
        Value::Object(fields) => Ok((updated, Value::Object(fields))),
        _ => Err(shape_error("the response must be a string or an object")),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::string_body(json!([{"_id": "d"}, "ok"]), json!({"_id": "d"}), json!({"body": "ok"}))]
    #[case::object(json!([null, {"code": 201}]), Value::Null, json!({"code": 201}))]
    fn accepts_document_response_pairs(
        #[case] returned: Value,
        #[case] doc: Value,
        #[case] response: Value,
    ) {
        assert_eq!(split_result(returned).expect("valid"), (doc, response));
    }

    #[rstest]
    #[case::scalar(json!("ok"))]
    #[case::short(json!([{}]))]
    #[case::bad_response(json!([{}, 3]))]
    fn rejects_other_shapes(#[case] returned: Value) {
        assert!(split_result(returned).is_err());
    }
}
