//! Request dispatch for the query protocol.
//!
//! The driver sends one request per line:
//!
//! ```json
//! ["ddoc", "_design/app", ["shows", "page"], [{"_id": "doc"}, {}]]
//! ```
//!
//! Each line is decoded into a [`Command`] and routed to its handler by
//! [`ViewServer::handle`](crate::ViewServer::handle). Unknown commands and
//! malformed arguments are fatal.

mod command;

pub use self::command::Command;

/// Tracing target for dispatch operations.
pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
