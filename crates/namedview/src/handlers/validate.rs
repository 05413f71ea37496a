//! `validate_doc_update`: accept or reject a document write.

use serde_json::{Value, json};

use super::{call_for_value, doc_id, exact_args, fatal_failure};
use crate::errors::{FunctionError, ServerError};
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::resolver::ResolvedFunction;
use crate::scope::CallbackScope;

pub(super) fn validate(
    frames: &mut dyn Frames,
    function: &ResolvedFunction,
    args: Vec<Value>,
) -> Result<(), ServerError> {
    let kind = FunctionKind::ValidateDocUpdate;
    let [new_doc, old_doc, user_ctx, sec_obj] = exact_args(kind, args)?;
    let id = doc_id(&new_doc).map(str::to_owned);

    let mut scope = CallbackScope::new(kind, &mut *frames);
    let call_args = vec![new_doc, old_doc, user_ctx, sec_obj];
    let verdict = match call_for_value(&mut scope, function, call_args) {
        Ok(_) => json!(1),
        Err(FunctionError::Forbidden { message }) => json!({ "forbidden": message }),
        Err(FunctionError::Unauthorized { message }) => json!({ "unauthorized": message }),
        Err(error) => {
            return Err(fatal_failure(
                kind.runtime_phase(),
                function,
                id.as_deref(),
                error,
            ));
        }
    };
    frames.write_frame(&verdict)?;
    Ok(())
}
