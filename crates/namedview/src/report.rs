//! Failure reporting towards the driver.
//!
//! Fatal failures produce one `["error", where, reason]` frame before the
//! session ends. Recoverable map and reduce failures are reported in the
//! configured [`ReportStyle`] and the session carries on.

use namedview_config::ReportStyle;
use serde_json::json;
use tracing::{error, warn};

use crate::errors::{FrameError, FunctionError, ServerError};
use crate::framing::Frames;

/// Tracing target for failure reports.
pub(crate) const REPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::report");

/// Describes a function failure with its document and function identity.
///
/// The dotted function name is split into `func_name` (last segment) and
/// `func_mod` (everything before it), e.g.
/// `boom, doc_id=d2, func_name=by_date, func_mod=app.views`.
#[must_use]
pub fn function_reason(source: &FunctionError, doc_id: Option<&str>, function: &str) -> String {
    let document = doc_id.map(|id| format!(", doc_id={id}")).unwrap_or_default();
    let identity = function.rsplit_once('.').map_or_else(
        || format!("func_name={function}"),
        |(module, name)| format!("func_name={name}, func_mod={module}"),
    );
    format!("{source}{document}, {identity}")
}

/// Writes the error frame for a fatal failure.
///
/// # Errors
///
/// Returns an error if the frame cannot be written; the session is ending
/// either way.
pub fn fatal(frames: &mut dyn Frames, failure: &ServerError) -> Result<(), FrameError> {
    let phase = failure.phase();
    let reason = failure.to_string();
    error!(target: REPORT_TARGET, phase, %reason, "fatal failure");
    frames.write_frame(&json!(["error", phase, reason]))
}

/// Reports a recoverable failure and lets the session continue.
///
/// # Errors
///
/// Returns an error if the report cannot be written.
pub fn nonfatal(
    frames: &mut dyn Frames,
    style: ReportStyle,
    phase: &str,
    info: &str,
) -> Result<(), FrameError> {
    warn!(target: REPORT_TARGET, phase, info, "ignored function failure");
    match style {
        ReportStyle::Log => frames.log(&format!("Ignored error, {phase}, {info}")),
        ReportStyle::Frame => frames.write_frame(&json!(["error", phase, info])),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rstest::rstest;

    use super::*;
    use crate::framing::Channel;

    fn output(style: ReportStyle) -> String {
        let mut frames = Channel::new(Cursor::new(Vec::new()), Vec::<u8>::new());
        nonfatal(
            &mut frames,
            style,
            "map_runtime_error",
            "boom, doc_id=d2, func_name=broken, func_mod=views",
        )
        .expect("report");
        let (_, written) = frames.into_parts();
        String::from_utf8(written).expect("utf8")
    }

    #[rstest]
    #[case::log(
        ReportStyle::Log,
        "[\"log\",\"Ignored error, map_runtime_error, boom, doc_id=d2, func_name=broken, func_mod=views\"]\n"
    )]
    #[case::frame(
        ReportStyle::Frame,
        "[\"error\",\"map_runtime_error\",\"boom, doc_id=d2, func_name=broken, func_mod=views\"]\n"
    )]
    fn nonfatal_styles(#[case] style: ReportStyle, #[case] expected: &str) {
        assert_eq!(output(style), expected);
    }

    #[test]
    fn fatal_writes_phase_and_reason() {
        let mut frames = Channel::new(Cursor::new(Vec::new()), Vec::<u8>::new());
        fatal(&mut frames, &ServerError::unknown_command("hello")).expect("fatal");
        let (_, written) = frames.into_parts();
        assert_eq!(
            String::from_utf8(written).expect("utf8"),
            "[\"error\",\"unknown_command\",\"unknown command: hello\"]\n"
        );
    }

    #[rstest]
    #[case::with_document(Some("d1"), "app.views.by_date", "bad, doc_id=d1, func_name=by_date, func_mod=app.views")]
    #[case::without_document(None, "views.f", "bad, func_name=f, func_mod=views")]
    #[case::undotted(None, "loose", "bad, func_name=loose")]
    fn reason_names_document_and_function(
        #[case] doc_id: Option<&str>,
        #[case] function: &str,
        #[case] expected: &str,
    ) {
        let reason = function_reason(&FunctionError::runtime("bad"), doc_id, function);
        assert_eq!(reason, expected);
    }
}
