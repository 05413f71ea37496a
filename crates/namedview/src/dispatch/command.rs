//! Decoding of request lines into typed commands.
//!
//! Requests are JSON arrays whose first element names the command. Argument
//! shapes are checked strictly here so handlers only ever see well-formed
//! input.

use serde_json::{Map, Value};

use crate::errors::ServerError;

/// A decoded request.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Clears map functions and replaces the query configuration.
    Reset {
        /// New configuration; `None` means an empty object.
        config: Option<Map<String, Value>>,
    },
    /// Registers a map function by path.
    AddFun {
        /// Function path as received.
        path: String,
    },
    /// Replaces the shared library value.
    AddLib {
        /// Library value as received.
        lib: Value,
    },
    /// Stores a design document.
    NewDdoc {
        /// Design document id.
        id: String,
        /// Raw design document.
        doc: Value,
    },
    /// Runs a function from a stored design document.
    UseDdoc {
        /// Design document id.
        id: String,
        /// Section and name segments locating the function path.
        path: Vec<String>,
        /// Arguments for the function kind.
        args: Vec<Value>,
    },
    /// Runs every map function over one document.
    MapDoc {
        /// Document to map.
        doc: Value,
    },
    /// Reduces emitted rows.
    Reduce {
        /// Function paths, resolved per call.
        functions: Vec<String>,
        /// `[key, docId]` pairs.
        keys: Vec<Value>,
        /// Emitted values.
        values: Vec<Value>,
    },
    /// Reduces previously reduced values.
    Rereduce {
        /// Function paths, resolved per call.
        functions: Vec<String>,
        /// Values from earlier reductions.
        values: Vec<Value>,
    },
}

impl Command {
    /// Decodes a request value.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::MalformedRequest`] when the request is not an
    /// array headed by a string, [`ServerError::UnknownCommand`] for
    /// unrecognised names and [`ServerError::BadArguments`] for argument
    /// shapes that do not match the command.
    pub fn parse(request: Value) -> Result<Self, ServerError> {
        let Value::Array(mut items) = request else {
            return Err(ServerError::malformed("request must be a JSON array"));
        };
        if items.is_empty() {
            return Err(ServerError::malformed("request array is empty"));
        }
        let Value::String(name) = items.remove(0) else {
            return Err(ServerError::malformed("command name must be a string"));
        };
        Self::from_parts(&name, items)
    }

    /// Canonical command name, as used on the wire.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Reset { .. } => "reset",
            Self::AddFun { .. } => "add_fun",
            Self::AddLib { .. } => "add_lib",
            Self::NewDdoc { .. } | Self::UseDdoc { .. } => "ddoc",
            Self::MapDoc { .. } => "map_doc",
            Self::Reduce { .. } => "reduce",
            Self::Rereduce { .. } => "rereduce",
        }
    }

    fn from_parts(name: &str, args: Vec<Value>) -> Result<Self, ServerError> {
        let bad = |message: &str| ServerError::bad_arguments(name, message);
        match name {
            "reset" => match <[Value; 0]>::try_from(args) {
                Ok([]) => Ok(Self::Reset { config: None }),
                Err(given) => match one(given) {
                    Some(Value::Object(config)) => Ok(Self::Reset {
                        config: Some(config),
                    }),
                    Some(Value::Null) => Ok(Self::Reset { config: None }),
                    _ => Err(bad("expected an optional configuration object")),
                },
            },
            "add_fun" => match one(args) {
                Some(Value::String(path)) => Ok(Self::AddFun { path }),
                _ => Err(bad("expected one function path string")),
            },
            "add_lib" => one(args)
                .map(|lib| Self::AddLib { lib })
                .ok_or_else(|| bad("expected one library value")),
            "map_doc" => one(args)
                .map(|doc| Self::MapDoc { doc })
                .ok_or_else(|| bad("expected one document")),
            "ddoc" => parse_ddoc(args).ok_or_else(|| {
                bad("expected [\"new\", id, doc] or [id, path segments, arguments]")
            }),
            "reduce" => parse_reduce(args)
                .ok_or_else(|| bad("expected [function paths, [[[key, id], value], ...]]")),
            "rereduce" => match <[Value; 2]>::try_from(args) {
                Ok([functions, Value::Array(values)]) => Ok(Self::Rereduce {
                    functions: strings(functions)
                        .ok_or_else(|| bad("function paths must be strings"))?,
                    values,
                }),
                _ => Err(bad("expected [function paths, values]")),
            },
            other => Err(ServerError::unknown_command(other)),
        }
    }
}

fn one(args: Vec<Value>) -> Option<Value> {
    <[Value; 1]>::try_from(args).ok().map(|[value]| value)
}

fn strings(value: Value) -> Option<Vec<String>> {
    let Value::Array(items) = value else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(text) => Some(text),
            _ => None,
        })
        .collect()
}

fn parse_ddoc(args: Vec<Value>) -> Option<Command> {
    match <[Value; 3]>::try_from(args).ok()? {
        [Value::String(marker), Value::String(id), doc] if marker == "new" => {
            Some(Command::NewDdoc { id, doc })
        }
        [Value::String(id), path, Value::Array(call_args)] => Some(Command::UseDdoc {
            id,
            path: strings(path)?,
            args: call_args,
        }),
        _ => None,
    }
}

fn parse_reduce(args: Vec<Value>) -> Option<Command> {
    let [functions, Value::Array(data)] = <[Value; 2]>::try_from(args).ok()? else {
        return None;
    };
    let mut keys = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());
    for row in data {
        let [key, value] = <[Value; 2]>::try_from(row.as_array()?.clone()).ok()?;
        keys.push(key);
        values.push(value);
    }
    Some(Command::Reduce {
        functions: strings(functions)?,
        keys,
        values,
    })
}
