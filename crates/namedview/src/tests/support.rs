//! Shared fixtures: a function table exercising every kind and an in-memory
//! session runner.

use std::io::Cursor;

use namedview_config::ReportStyle;
use serde_json::{Value, json};

use crate::errors::{FunctionError, ServerError};
use crate::framing::Channel;
use crate::function::{Invocation, view_function};
use crate::resolver::{FunctionTable, Resolver};
use crate::server::ViewServer;

/// Output and outcome of one in-memory session.
#[derive(Debug)]
pub struct Transcript {
    pub outcome: Result<(), ServerError>,
    pub frames: Vec<Value>,
    pub unread: String,
}

impl Transcript {
    /// The error frame written for a fatal failure, if any.
    pub fn error_frame(&self) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.get(0) == Some(&json!("error")))
    }
}

/// Encodes `requests` as protocol lines.
pub fn lines(requests: &[Value]) -> String {
    requests
        .iter()
        .map(|request| format!("{request}\n"))
        .collect()
}

/// Runs a session over `input` with `resolver`.
pub fn run_session<R: Resolver>(resolver: R, style: ReportStyle, input: &str) -> Transcript {
    let mut channel = Channel::new(Cursor::new(input.as_bytes().to_vec()), Vec::new());
    let mut server = ViewServer::new(resolver).with_report_style(style);
    let outcome = server.run(&mut channel);
    let (reader, written) = channel.into_parts();

    let position = usize::try_from(reader.position()).expect("cursor position fits");
    let remaining = reader.into_inner().get(position..).unwrap_or_default().to_vec();

    Transcript {
        outcome,
        frames: String::from_utf8(written)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("each output line is JSON"))
            .collect(),
        unread: String::from_utf8(remaining).expect("utf8 input"),
    }
}

/// Runs `requests` against [`sample_table`] with the default report style.
pub fn run(requests: &[Value]) -> Transcript {
    run_session(sample_table(), ReportStyle::Log, &lines(requests))
}

fn int(value: Option<&Value>) -> i64 {
    value.and_then(Value::as_i64).unwrap_or_default()
}

/// Functions covering every kind and failure path.
pub fn sample_table() -> FunctionTable {
    let mut table = FunctionTable::with_builtins();
    let mut add = |name: &str, function| {
        table.register(name, function).expect("register sample function");
    };

    // map
    add(
        "test.emit_value",
        view_function(|scope, args| {
            let doc = args.first().cloned().unwrap_or_default();
            scope.emit(json!("value"), doc.get("value").cloned().unwrap_or_default())?;
            Ok(Invocation::nothing())
        }),
    );
    add(
        "test.emit_pairs",
        view_function(|_scope, args| {
            let id = args.first().and_then(|doc| doc.get("_id")).cloned().unwrap_or_default();
            Ok(Invocation::sequence(vec![json!([id, 1]), json!(["second", 2])]))
        }),
    );
    add(
        "test.map_raises",
        view_function(|scope, _args| {
            scope.emit(json!("partial"), json!(true))?;
            Err(FunctionError::runtime("boom"))
        }),
    );
    add(
        "test.map_logs",
        view_function(|scope, _args| {
            scope.log("A kuku!")?;
            scope.emit(json!("logged"), Value::Null)?;
            Ok(Invocation::nothing())
        }),
    );
    add(
        "test.map_starts",
        view_function(|scope, _args| {
            scope.start(json!({}))?;
            Ok(Invocation::nothing())
        }),
    );

    // reduce
    add(
        "test.sum",
        view_function(|_scope, args| {
            let total: i64 = args
                .get(1)
                .and_then(Value::as_array)
                .map(|values| values.iter().map(|value| int(Some(value))).sum())
                .unwrap_or_default();
            Ok(Invocation::returned(total))
        }),
    );
    add(
        "test.reduce_raises",
        view_function(|_scope, _args| Err(FunctionError::runtime("cannot reduce"))),
    );
    add(
        "test.reduce_emits",
        view_function(|scope, _args| {
            scope.emit(json!(1), json!(2))?;
            Ok(Invocation::nothing())
        }),
    );
    add(
        "test.repeat",
        view_function(|_scope, args| {
            let count = args
                .get(1)
                .and_then(Value::as_array)
                .and_then(|values| values.first())
                .and_then(Value::as_u64)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or_default();
            Ok(Invocation::returned("a".repeat(count)))
        }),
    );

    // show
    add(
        "test.show_page",
        view_function(|scope, args| {
            let title = args
                .first()
                .and_then(|doc| doc.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("untitled")
                .to_owned();
            scope.start(json!({"headers": {"Content-Type": "text/html", "X-Start": "1"}}))?;
            scope.send("<h1>")?;
            scope.send(title)?;
            Ok(Invocation::returned(json!({
                "body": "</h1>",
                "headers": {"X-Start": "2"},
                "code": 200,
            })))
        }),
    );
    add(
        "test.show_streamed",
        view_function(|_scope, _args| {
            Ok(Invocation::sequence(vec![
                json!({"headers": {"A": "1"}}),
                json!("x"),
                json!("y"),
            ]))
        }),
    );
    add(
        "test.show_missing",
        view_function(|_scope, _args| Err(FunctionError::not_found_with("gone"))),
    );
    add(
        "test.show_missing_default",
        view_function(|_scope, _args| Err(FunctionError::not_found())),
    );
    add(
        "test.show_moved",
        view_function(|_scope, _args| Err(FunctionError::redirect("/new-home", true))),
    );
    add(
        "test.show_raises",
        view_function(|_scope, _args| Err(FunctionError::runtime("template failed"))),
    );

    // list
    add(
        "test.list_keys",
        view_function(|scope, _args| {
            scope.start(json!({"headers": {"Content-Type": "text/plain"}}))?;
            while let Some(row) = scope.get_row()? {
                scope.send(row.get("key").map(ToString::to_string).unwrap_or_default())?;
            }
            Ok(Invocation::returned("tail"))
        }),
    );
    add(
        "test.list_pull",
        view_function(|scope, args| {
            let pulls = int(args.get(1).and_then(|req| req.get("pulls")));
            for index in 0..pulls {
                scope.send(format!("c{index}"))?;
                let _row = scope.get_row()?;
            }
            Ok(Invocation::nothing())
        }),
    );
    add(
        "test.list_streamed",
        view_function(|_scope, _args| {
            Ok(Invocation::producer(|scope| match scope.get_row() {
                Ok(Some(row)) => Some(Ok(row.get("value").cloned().unwrap_or_default())),
                Ok(None) => None,
                Err(error) => Some(Err(error.into())),
            }))
        }),
    );
    add(
        "test.list_started",
        view_function(|_scope, _args| {
            Ok(Invocation::sequence(vec![json!({"code": 200}), json!("x")]))
        }),
    );
    add(
        "test.list_moved",
        view_function(|scope, _args| {
            scope.send("discarded")?;
            Err(FunctionError::redirect("/elsewhere", false))
        }),
    );
    add(
        "test.list_moved_late",
        view_function(|scope, _args| {
            let _row = scope.get_row()?;
            Err(FunctionError::redirect("/too-late", false))
        }),
    );
    add(
        "test.list_missing",
        view_function(|_scope, _args| Err(FunctionError::not_found())),
    );
    add(
        "test.list_bad_item",
        view_function(|_scope, _args| Ok(Invocation::sequence(vec![json!(42)]))),
    );

    // filter
    add(
        "test.filter_keep",
        view_function(|_scope, args| {
            Ok(Invocation::Returned(
                args.first()
                    .and_then(|doc| doc.get("keep"))
                    .cloned()
                    .unwrap_or_default(),
            ))
        }),
    );

    // update
    add(
        "test.update_stamp",
        view_function(|_scope, args| {
            let mut doc = args.first().cloned().unwrap_or_else(|| json!({}));
            if let Some(fields) = doc.as_object_mut() {
                fields.insert("stamped".to_owned(), Value::Bool(true));
            }
            Ok(Invocation::returned(json!([doc, "stamped"])))
        }),
    );
    add(
        "test.update_bad",
        view_function(|_scope, _args| Ok(Invocation::returned("not a pair"))),
    );

    // validate_doc_update
    add(
        "test.validate_author",
        view_function(|_scope, args| {
            let new_doc = args.first().cloned().unwrap_or_default();
            let user = args.get(2).cloned().unwrap_or_default();
            if user.get("name").is_none_or(Value::is_null) {
                return Err(FunctionError::unauthorized("please log in"));
            }
            if new_doc.get("author").is_none() {
                return Err(FunctionError::forbidden("no"));
            }
            Ok(Invocation::nothing())
        }),
    );
    add(
        "test.validate_raises",
        view_function(|_scope, _args| Err(FunctionError::runtime("validator crashed"))),
    );

    table
}

/// A design document pointing at the sample functions.
pub fn sample_ddoc() -> Value {
    json!({
        "_id": "_design/sample",
        "shows": {
            "page": "test.show_page",
            "streamed": "test.show_streamed",
            "missing": "test.show_missing",
            "missing_default": "test.show_missing_default",
            "moved": "test.show_moved",
            "raises": "test.show_raises",
            "broken_path": "nodots",
            "unknown": "test.nowhere",
            "pinned": "test.show_page|7",
        },
        "lists": {
            "keys": "test.list_keys",
            "pull": "test.list_pull",
            "streamed": "test.list_streamed",
            "started": "test.list_started",
            "moved": "test.list_moved",
            "moved_late": "test.list_moved_late",
            "missing": "test.list_missing",
            "bad_item": "test.list_bad_item",
        },
        "filters": {"keep": "test.filter_keep"},
        "updates": {"stamp": "test.update_stamp", "bad": "test.update_bad"},
        "validate_doc_update": "test.validate_author",
    })
}
