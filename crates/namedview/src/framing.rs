//! Line framing for the query channel.
//!
//! Every message in either direction is one JSON value followed by `\n`.
//! The driver sends exactly one further line after each response frame, so
//! reads block without timeouts and an empty read means the driver closed
//! the channel.

use std::io::{BufRead, Write};

use serde_json::Value;

use crate::errors::FrameError;

/// Reading and writing protocol frames.
///
/// [`Channel`] is the production implementation. Handlers and the callback
/// scope only see this trait so a scope can hold the channel as a trait
/// object.
pub trait Frames {
    /// Reads the next request line.
    ///
    /// Returns `Ok(None)` once the driver has closed the stream.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Io`] when reading fails and
    /// [`FrameError::Decode`] when the line is not valid JSON.
    fn read_frame(&mut self) -> Result<Option<Value>, FrameError>;

    /// Writes one value as a line and flushes it.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    fn write_frame(&mut self, value: &Value) -> Result<(), FrameError>;

    /// Writes one value only if its encoding fits in `limit` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::TooLarge`] without writing anything when the
    /// encoded value is longer than `limit`.
    fn write_limited(&mut self, value: &Value, limit: usize) -> Result<(), FrameError>;

    /// Byte length of the most recently read line, newline included.
    fn last_line_len(&self) -> usize;

    /// Writes the literal `true` acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn okay(&mut self) -> Result<(), FrameError> {
        self.write_frame(&Value::Bool(true))
    }

    /// Writes `items` as a single array frame.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn output(&mut self, items: Vec<Value>) -> Result<(), FrameError> {
        self.write_frame(&Value::Array(items))
    }

    /// Writes an out-of-band `["log", message]` frame.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn log(&mut self, message: &str) -> Result<(), FrameError> {
        self.output(vec![Value::from("log"), Value::from(message)])
    }
}

/// Newline-delimited JSON channel over a reader and a writer.
#[derive(Debug)]
pub struct Channel<R, W> {
    reader: R,
    writer: W,
    last_line_len: usize,
}

impl<R, W> Channel<R, W> {
    /// Creates a channel reading requests from `reader` and writing responses
    /// to `writer`.
    pub const fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            last_line_len: 0,
        }
    }

    /// Returns the response writer.
    pub const fn writer(&self) -> &W {
        &self.writer
    }

    /// Consumes the channel, returning the reader and writer.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl<R: BufRead, W: Write> Channel<R, W> {
    fn write_encoded(&mut self, encoded: &[u8]) -> Result<(), FrameError> {
        self.writer.write_all(encoded)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> Frames for Channel<R, W> {
    fn read_frame(&mut self) -> Result<Option<Value>, FrameError> {
        let mut line = String::new();
        let bytes_read = self.reader.read_line(&mut line)?;
        if bytes_read == 0 {
            return Ok(None);
        }
        self.last_line_len = bytes_read;

        serde_json::from_str(line.trim_end())
            .map(Some)
            .map_err(|error| FrameError::Decode {
                message: error.to_string(),
            })
    }

    fn write_frame(&mut self, value: &Value) -> Result<(), FrameError> {
        let encoded = encode(value)?;
        self.write_encoded(&encoded)
    }

    fn write_limited(&mut self, value: &Value, limit: usize) -> Result<(), FrameError> {
        let encoded = encode(value)?;
        if encoded.len() > limit {
            return Err(FrameError::TooLarge {
                size: encoded.len(),
                limit,
            });
        }
        self.write_encoded(&encoded)
    }

    fn last_line_len(&self) -> usize {
        self.last_line_len
    }
}

fn encode(value: &Value) -> Result<Vec<u8>, FrameError> {
    serde_json::to_vec(value).map_err(|error| FrameError::Encode {
        message: error.to_string(),
    })
}
