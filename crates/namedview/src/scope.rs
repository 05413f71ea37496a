//! The callback scope handed to every function invocation.
//!
//! Callbacks are methods on [`CallbackScope`], so they only exist while an
//! invocation is running. Each call is checked against the allow-list of the
//! running [`FunctionKind`] before it has any effect.

use std::fmt;

use serde_json::Value;

use crate::errors::CallbackError;
use crate::framing::Frames;
use crate::function::FunctionKind;
use crate::stream::{ListStream, ResponseParts};

/// The callbacks a function may invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Callback {
    /// Records a key/value pair from a map function.
    Emit,
    /// Writes an out-of-band log line.
    Log,
    /// Sets the response start object.
    Start,
    /// Appends a body chunk.
    Send,
    /// Pulls the next list row from the driver.
    GetRow,
}

impl Callback {
    /// Returns the callback name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emit => "emit",
            Self::Log => "log",
            Self::Start => "start",
            Self::Send => "send",
            Self::GetRow => "get_row",
        }
    }
}

impl fmt::Display for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped state for one function invocation.
pub struct CallbackScope<'a> {
    kind: FunctionKind,
    frames: &'a mut dyn Frames,
    emissions: Vec<Value>,
    parts: ResponseParts,
    list: ListStream,
}

impl<'a> CallbackScope<'a> {
    /// Opens a scope for a function of `kind` writing to `frames`.
    pub fn new(kind: FunctionKind, frames: &'a mut dyn Frames) -> Self {
        Self {
            kind,
            frames,
            emissions: Vec::new(),
            parts: ResponseParts::default(),
            list: ListStream::default(),
        }
    }

    /// Kind of the running function.
    #[must_use]
    pub const fn kind(&self) -> FunctionKind {
        self.kind
    }

    /// Records a key/value pair.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::NotPermitted`] outside map functions.
    pub fn emit(&mut self, key: Value, value: Value) -> Result<(), CallbackError> {
        self.check(Callback::Emit)?;
        self.emissions.push(Value::Array(vec![key, value]));
        Ok(())
    }

    /// Writes `["log", message]` to the driver immediately.
    ///
    /// # Errors
    ///
    /// Fails only when the channel cannot be written.
    pub fn log(&mut self, message: &str) -> Result<(), CallbackError> {
        self.check(Callback::Log)?;
        self.frames.log(message)?;
        Ok(())
    }

    /// Sets the start object of a show or list response.
    ///
    /// # Errors
    ///
    /// Fails when called twice, after body content, with a non-object value,
    /// or from a kind that does not render responses.
    pub fn start(&mut self, response: Value) -> Result<(), CallbackError> {
        self.check(Callback::Start)?;
        self.parts.set_start(response)
    }

    /// Appends a body chunk to a show or list response.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::NotPermitted`] outside show and list
    /// functions.
    pub fn send(&mut self, chunk: impl Into<String>) -> Result<(), CallbackError> {
        self.check(Callback::Send)?;
        self.parts.push_chunk(chunk.into());
        Ok(())
    }

    /// Pulls the next view row, flushing pending output first.
    ///
    /// Returns `Ok(None)` once the rows are exhausted.
    ///
    /// # Errors
    ///
    /// Fails outside list functions and when the driver answers with
    /// anything but a row or the end marker.
    pub fn get_row(&mut self) -> Result<Option<Value>, CallbackError> {
        self.check(Callback::GetRow)?;
        self.list.pull_row(&mut *self.frames, &mut self.parts)
    }

    pub(crate) fn take_emissions(&mut self) -> Vec<Value> {
        std::mem::take(&mut self.emissions)
    }

    pub(crate) fn into_response(self) -> (ResponseParts, ListStream) {
        (self.parts, self.list)
    }

    const fn check(&self, callback: Callback) -> Result<(), CallbackError> {
        if self.kind.permits(callback) {
            Ok(())
        } else {
            Err(CallbackError::NotPermitted {
                callback,
                kind: self.kind,
            })
        }
    }
}

impl fmt::Debug for CallbackScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackScope")
            .field("kind", &self.kind)
            .field("emissions", &self.emissions.len())
            .field("phase", &self.list.phase())
            .finish_non_exhaustive()
    }
}
