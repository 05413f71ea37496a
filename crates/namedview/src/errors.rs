//! Error types for the query protocol engine.
//!
//! Errors are split by who raises them. [`FrameError`] comes from the line
//! channel, [`CallbackError`] from misuse of the callback scope,
//! [`FunctionError`] from user functions (including the closed set of domain
//! outcomes such as `forbidden`), and [`ResolveError`] from function lookup.
//! [`ServerError`] is the fatal tier: every variant ends the session after
//! one `["error", where, reason]` frame.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::function::FunctionKind;
use crate::report;
use crate::resolver::ResolvedFunction;
use crate::scope::Callback;

/// Message used when a not-found outcome carries no text.
pub const DEFAULT_NOT_FOUND_MESSAGE: &str = "document not found";

/// Failures reading or writing protocol lines.
#[derive(Debug, Clone, Error)]
pub enum FrameError {
    /// The underlying stream failed.
    #[error("I/O error on the query channel: {0}")]
    Io(#[source] Arc<io::Error>),

    /// A request line was not valid JSON.
    #[error("request line is not valid JSON: {message}")]
    Decode {
        /// Parser diagnostic.
        message: String,
    },

    /// A response value could not be encoded.
    #[error("failed to encode response: {message}")]
    Encode {
        /// Encoder diagnostic.
        message: String,
    },

    /// A size-limited write was refused; nothing was written.
    #[error("encoded response is {size} bytes, exceeding the {limit} byte limit")]
    TooLarge {
        /// Encoded size in bytes, excluding the newline.
        size: usize,
        /// Permitted size in bytes.
        limit: usize,
    },
}

impl From<io::Error> for FrameError {
    fn from(source: io::Error) -> Self {
        Self::Io(Arc::new(source))
    }
}

/// Misuse of the callbacks exposed to a running function.
///
/// These are programming errors in the user function and are always fatal.
#[derive(Debug, Clone, Error)]
pub enum CallbackError {
    /// The callback is not on the allow-list for the running function kind.
    #[error("{callback}() is not available to {kind} functions")]
    NotPermitted {
        /// Callback that was invoked.
        callback: Callback,
        /// Kind of the running function.
        kind: FunctionKind,
    },

    /// `start()` was called a second time.
    #[error("start() was already called for this response")]
    AlreadyStarted,

    /// `start()` was called after body content was sent or rows were pulled.
    #[error("start() must be called before any body content")]
    StartAfterBody,

    /// `start()` received something other than an object.
    #[error("start() expects a response object, got {received}")]
    InvalidStart {
        /// JSON rendering of the rejected value.
        received: String,
    },

    /// The driver answered a row request with an unexpected frame.
    #[error("expected a list_row or list_end frame, got {received}")]
    UnexpectedFrame {
        /// JSON rendering of the received frame.
        received: String,
    },

    /// The driver closed the channel while a row was awaited.
    #[error("query channel closed while waiting for a list row")]
    ChannelClosed,

    /// Reading or writing a frame on behalf of the callback failed.
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Outcomes raised by a user function instead of returning normally.
///
/// The first four variants are domain outcomes that the show, list and
/// validate handlers turn into structured responses.
#[derive(Debug, Clone, Error)]
pub enum FunctionError {
    /// The validated change is not allowed.
    #[error("forbidden: {message}")]
    Forbidden {
        /// Reason reported to the client.
        message: String,
    },

    /// The validated change requires other credentials.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Reason reported to the client.
        message: String,
    },

    /// The rendered resource does not exist.
    #[error("not found: {}", not_found_text(.message.as_deref()))]
    NotFound {
        /// Optional reason; a default is used when absent.
        message: Option<String>,
    },

    /// The client should be redirected.
    #[error("redirect to {url}")]
    Redirect {
        /// Target of the `Location` header.
        url: String,
        /// `true` for 301, `false` for 302.
        permanent: bool,
    },

    /// Any other failure inside the function.
    #[error("{message}")]
    Runtime {
        /// Human-readable failure description.
        message: String,
    },

    /// The function misused a callback.
    #[error(transparent)]
    Callback(#[from] CallbackError),
}

impl FunctionError {
    /// Creates a forbidden outcome.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates an unauthorized outcome.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a not-found outcome with the default message.
    #[must_use]
    pub const fn not_found() -> Self {
        Self::NotFound { message: None }
    }

    /// Creates a not-found outcome with a custom message.
    pub fn not_found_with(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: Some(message.into()),
        }
    }

    /// Creates a redirect outcome.
    pub fn redirect(url: impl Into<String>, permanent: bool) -> Self {
        Self::Redirect {
            url: url.into(),
            permanent,
        }
    }

    /// Creates a runtime failure.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

/// Failures turning a function path into an executable function.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The path does not have the `module.name[|version]` shape.
    #[error("invalid function path '{path}'")]
    InvalidPath {
        /// Path as received.
        path: String,
    },

    /// No function is registered under the name.
    #[error("no function registered as '{name}'")]
    NotFound {
        /// Dotted function name.
        name: String,
    },

    /// The registered function declares a different version.
    #[error("function '{name}' has version {}, expected {expected}", declared_text(.declared.as_deref()))]
    VersionMismatch {
        /// Dotted function name.
        name: String,
        /// Version requested by the path suffix.
        expected: String,
        /// Version declared by the registered function.
        declared: Option<String>,
    },

    /// A function table already holds the name.
    #[error("function '{name}' is already registered")]
    AlreadyRegistered {
        /// Dotted function name.
        name: String,
    },
}

impl ResolveError {
    /// Wire `where` value for this failure.
    #[must_use]
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::InvalidPath { .. } => "compile_func_name",
            Self::NotFound { .. } | Self::AlreadyRegistered { .. } => "compile_load",
            Self::VersionMismatch { .. } => "compile_version",
        }
    }
}

/// Fatal failures that end the session.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Reading or writing the channel failed.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A request was not a `[command, args...]` array.
    #[error("malformed request: {message}")]
    MalformedRequest {
        /// What was wrong with the request.
        message: String,
    },

    /// The command name is not recognised.
    #[error("unknown command: {command}")]
    UnknownCommand {
        /// Command name as received.
        command: String,
    },

    /// The command arguments have the wrong shape.
    #[error("invalid arguments for {command}: {message}")]
    BadArguments {
        /// Command or function kind being handled.
        command: String,
        /// What was wrong with the arguments.
        message: String,
    },

    /// `ddoc` referenced an id that was never added.
    #[error("design document '{id}' has not been added")]
    UnknownDdoc {
        /// Design document id.
        id: String,
    },

    /// `ddoc` referenced a section that holds no callable kind.
    #[error("unsupported function kind '{kind}'")]
    UnknownKind {
        /// First path segment as received.
        kind: String,
    },

    /// The design document has no function path at the requested location.
    #[error("design document '{id}' has no function at {path}")]
    MissingFunction {
        /// Design document id.
        id: String,
        /// Requested segments joined with `/`.
        path: String,
    },

    /// `map_doc` arrived before any `add_fun`.
    #[error("no map functions have been added")]
    NoMapFunctions,

    /// A function path could not be resolved.
    #[error("{source} (path '{path}')")]
    Resolve {
        /// Path that failed.
        path: String,
        /// Resolution failure.
        #[source]
        source: ResolveError,
    },

    /// A user function failed in a way its handler cannot absorb.
    #[error("{}", report::function_reason(.source, .doc_id.as_deref(), .function))]
    Function {
        /// Wire `where` value.
        phase: &'static str,
        /// Identity of the failing function.
        function: String,
        /// Document being processed, when known.
        doc_id: Option<String>,
        /// What the function raised.
        #[source]
        source: FunctionError,
    },

    /// A size-limited reduce response exceeded its budget.
    #[error("reduce output is {size} bytes, exceeding the {limit} byte limit")]
    OutputTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Permitted size in bytes.
        limit: usize,
    },
}

impl ServerError {
    /// Wire `where` value reported in the error frame.
    #[must_use]
    pub const fn phase(&self) -> &'static str {
        match self {
            Self::Frame(_) | Self::MalformedRequest { .. } => "unhandled exception",
            Self::UnknownCommand { .. } => "unknown_command",
            Self::BadArguments { .. } => "bad_arguments",
            Self::UnknownDdoc { .. } => "unknown_ddoc",
            Self::UnknownKind { .. } => "unknown_function_kind",
            Self::MissingFunction { .. } => "missing_function",
            Self::NoMapFunctions => "no_map_functions",
            Self::Resolve { source, .. } => source.phase(),
            Self::Function { phase, .. } => *phase,
            Self::OutputTooLarge { .. } => "reduce_overflow_error",
        }
    }

    /// Exit status the process should terminate with.
    #[must_use]
    pub const fn exit_status(&self) -> u8 {
        1
    }

    /// Creates a malformed request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest {
            message: message.into(),
        }
    }

    /// Creates an unknown command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates a bad arguments error.
    pub fn bad_arguments(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadArguments {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Creates an unknown design document error.
    pub fn unknown_ddoc(id: impl Into<String>) -> Self {
        Self::UnknownDdoc { id: id.into() }
    }

    /// Creates an unknown function kind error.
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Creates a missing function error.
    pub fn missing_function(id: impl Into<String>, path: &[String]) -> Self {
        Self::MissingFunction {
            id: id.into(),
            path: path.join("/"),
        }
    }

    /// Creates a resolution error.
    pub fn resolve(path: impl Into<String>, source: ResolveError) -> Self {
        Self::Resolve {
            path: path.into(),
            source,
        }
    }

    /// Creates a fatal function failure.
    ///
    /// Callback misuse is always reported under `callback_error` whatever
    /// phase the caller proposes.
    #[must_use]
    pub fn function(
        phase: &'static str,
        function: &ResolvedFunction,
        doc_id: Option<&str>,
        source: FunctionError,
    ) -> Self {
        let reported = match source {
            FunctionError::Callback(_) => "callback_error",
            _ => phase,
        };
        Self::Function {
            phase: reported,
            function: function.name().to_owned(),
            doc_id: doc_id.map(str::to_owned),
            source,
        }
    }

    /// Creates an output-too-large error.
    #[must_use]
    pub const fn output_too_large(size: usize, limit: usize) -> Self {
        Self::OutputTooLarge { size, limit }
    }
}

const fn not_found_text(message: Option<&str>) -> &str {
    match message {
        Some(text) => text,
        None => DEFAULT_NOT_FOUND_MESSAGE,
    }
}

const fn declared_text(declared: Option<&str>) -> &str {
    match declared {
        Some(version) => version,
        None => "none",
    }
}
