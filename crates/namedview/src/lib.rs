//! Query server evaluating named design-document functions.
//!
//! The database driver speaks a line-delimited JSON protocol over stdin and
//! stdout. Design documents name their functions by path (for example
//! `app.views.by_date|2`) instead of embedding source, and a [`Resolver`]
//! turns those paths into Rust functions. [`FunctionTable`] is the bundled
//! resolver; the `namedview` binary serves it with the `builtin.*` reducers.
//!
//! ## Sessions
//!
//! A [`ViewServer`] keeps the per-session state: design documents with their
//! resolution caches, map functions, the query configuration and the shared
//! library value. [`ViewServer::run`] reads requests until the driver closes
//! the channel, and stops at the first fatal failure after writing a single
//! `["error", where, reason]` frame.
//!
//! ## Writing functions
//!
//! A function receives a [`CallbackScope`] and its positional arguments.
//! Callbacks such as `emit` and `get_row` are methods on the scope and are
//! checked against the kind of the running function. Domain outcomes
//! (`forbidden`, `unauthorized`, `not_found`, `redirect`) are returned as
//! [`FunctionError`] variants. Functions that stream results return an
//! [`Invocation::Produced`] producer, which the engine drains while the scope
//! is still open.

mod builtins;
pub mod dispatch;
mod errors;
mod framing;
mod function;
mod handlers;
mod registry;
mod report;
mod resolver;
mod scope;
mod server;
mod stream;
pub mod telemetry;

use std::io::{BufRead, Write};
use std::process::ExitCode;

use namedview_config::Config;
use tracing::error;

pub use self::errors::{
    CallbackError, DEFAULT_NOT_FOUND_MESSAGE, FrameError, FunctionError, ResolveError,
    ServerError,
};
pub use self::framing::{Channel, Frames};
pub use self::function::{FunctionKind, Invocation, Producer, ViewFunction, view_function};
pub use self::registry::DdocRegistry;
pub use self::resolver::{FunctionPath, FunctionTable, ResolvedFunction, Resolver};
pub use self::scope::{Callback, CallbackScope};
pub use self::server::ViewServer;
pub use self::stream::{ListPhase, ListStream, ResponseParts};
pub use self::telemetry::TelemetryError;

/// Serves one session over `input` and `output` and returns the exit code.
///
/// Success means the driver closed the channel; a fatal failure yields
/// [`ServerError::exit_status`].
pub fn serve<R, I, O>(resolver: R, config: &Config, input: I, output: O) -> ExitCode
where
    R: Resolver,
    I: BufRead,
    O: Write,
{
    let mut channel = Channel::new(input, output);
    let mut server = ViewServer::new(resolver).with_report_style(config.report_style());
    match server.run(&mut channel) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            error!(phase = failure.phase(), %failure, "query session ended");
            ExitCode::from(failure.exit_status())
        }
    }
}

#[cfg(test)]
mod tests;
