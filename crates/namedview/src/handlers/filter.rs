//! Filter functions: one boolean per document.

use serde_json::{Value, json};

use super::{call_for_value, doc_id, exact_args, fatal_failure, truthy};
use crate::errors::ServerError;
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;

pub(super) fn filter(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    let kind = FunctionKind::Filter;
    let [docs_value, req] = exact_args(kind, args)?;
    let Value::Array(docs) = docs_value else {
        return Err(ServerError::bad_arguments(
            kind.as_str(),
            "documents must be an array",
        ));
    };

    let mut passed = Vec::with_capacity(docs.len());
    for doc in docs {
        let id = doc_id(&doc).map(str::to_owned);
        let mut scope = CallbackScope::new(kind, &mut *frames);
        let verdict = call_for_value(&mut scope, function, vec![doc, req.clone()]).map_err(
            |error| fatal_failure(kind.runtime_phase(), function, id.as_deref(), error),
        )?;
        passed.push(Value::Bool(truthy(&verdict)));
    }
    frames.write_frame(&json!([true, passed]))?;
    Ok(())
}
