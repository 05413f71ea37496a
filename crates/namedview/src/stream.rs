//! Response assembly and the list row stream.
//!
//! Show and list functions build a response from an optional start object
//! plus body chunks ([`ResponseParts`]). List functions additionally pull
//! rows from the driver through [`ListStream`], whose phase moves strictly
//! from [`ListPhase::NotStarted`] through [`ListPhase::Streaming`] to
//! [`ListPhase::Ended`]. Every pull flushes pending output before blocking
//! on the next inbound line.

use serde_json::{Map, Value, json};

use crate::errors::CallbackError;
use crate::framing::Frames;

/// Position of a list response in its frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListPhase {
    /// No `start` frame has been written.
    #[default]
    NotStarted,
    /// The `start` frame is out and rows may still arrive.
    Streaming,
    /// The driver signalled `list_end`.
    Ended,
}

/// Start object and body chunks accumulated during one invocation.
#[derive(Debug, Default)]
pub struct ResponseParts {
    start: Option<Map<String, Value>>,
    chunks: Vec<String>,
    started: bool,
    body_begun: bool,
}

impl ResponseParts {
    /// Records the start object.
    ///
    /// # Errors
    ///
    /// Fails when a start object was already recorded, when body content was
    /// already produced, or when `response` is not an object.
    pub fn set_start(&mut self, response: Value) -> Result<(), CallbackError> {
        if self.started {
            return Err(CallbackError::AlreadyStarted);
        }
        if self.body_begun {
            return Err(CallbackError::StartAfterBody);
        }
        let Value::Object(fields) = response else {
            return Err(CallbackError::InvalidStart {
                received: response.to_string(),
            });
        };
        self.start = Some(fields);
        self.started = true;
        Ok(())
    }

    /// Appends a body chunk.
    pub fn push_chunk(&mut self, chunk: String) {
        self.chunks.push(chunk);
        self.body_begun = true;
    }

    /// Marks the body as begun without adding content.
    pub const fn mark_body(&mut self) {
        self.body_begun = true;
    }

    /// Removes and returns the pending chunks.
    pub fn take_chunks(&mut self) -> Vec<String> {
        std::mem::take(&mut self.chunks)
    }

    /// Removes and returns the start object, if one was recorded.
    pub const fn take_start(&mut self) -> Option<Map<String, Value>> {
        self.start.take()
    }

    /// Replaces any start object with a redirect and drops pending chunks.
    pub fn redirect(&mut self, url: &str, permanent: bool) {
        self.start = Some(redirect_fields(url, permanent));
        self.chunks.clear();
        self.started = true;
    }

    fn take_start_or_default(&mut self) -> Value {
        self.start
            .take()
            .map_or_else(|| json!({"headers": {}}), Value::Object)
    }
}

/// Builds the response object for a redirect.
#[must_use]
pub fn redirect_fields(url: &str, permanent: bool) -> Map<String, Value> {
    let code = if permanent { 301 } else { 302 };
    let mut fields = Map::new();
    fields.insert("code".to_owned(), Value::from(code));
    fields.insert("headers".to_owned(), json!({ "Location": url }));
    fields
}

/// Row pulling state for one list invocation.
#[derive(Debug, Default)]
pub struct ListStream {
    phase: ListPhase,
}

impl ListStream {
    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ListPhase {
        self.phase
    }

    /// Flushes pending output and reads the next row.
    ///
    /// Returns `Ok(None)` once the driver has signalled the end of the rows;
    /// later calls return `Ok(None)` without reading.
    ///
    /// # Errors
    ///
    /// Fails when the driver closes the channel, sends an unexpected frame,
    /// or the channel itself fails.
    pub fn pull_row(
        &mut self,
        frames: &mut dyn Frames,
        parts: &mut ResponseParts,
    ) -> Result<Option<Value>, CallbackError> {
        if self.phase == ListPhase::Ended {
            return Ok(None);
        }
        self.flush(frames, parts)?;
        parts.mark_body();

        let frame = frames.read_frame()?.ok_or(CallbackError::ChannelClosed)?;
        self.accept(&frame)
    }

    /// Completes the response with the final `end` frame.
    ///
    /// A list that never pulled a row still emits its `start` frame and
    /// consumes one driver answer first.
    ///
    /// # Errors
    ///
    /// Propagates failures from the final pull and from writing.
    pub fn finish(
        &mut self,
        frames: &mut dyn Frames,
        parts: &mut ResponseParts,
    ) -> Result<(), CallbackError> {
        if self.phase == ListPhase::NotStarted {
            let _discarded = self.pull_row(frames, parts)?;
        }
        let chunks = parts.take_chunks();
        frames.write_frame(&json!(["end", chunks]))?;
        Ok(())
    }

    fn flush(
        &mut self,
        frames: &mut dyn Frames,
        parts: &mut ResponseParts,
    ) -> Result<(), CallbackError> {
        let chunks = parts.take_chunks();
        let frame = if self.phase == ListPhase::NotStarted {
            self.phase = ListPhase::Streaming;
            json!(["start", chunks, parts.take_start_or_default()])
        } else {
            json!(["chunks", chunks])
        };
        frames.write_frame(&frame)?;
        Ok(())
    }

    fn accept(&mut self, frame: &Value) -> Result<Option<Value>, CallbackError> {
        match frame.as_array().map(Vec::as_slice) {
            Some([tag, row]) if tag == "list_row" => Ok(Some(row.clone())),
            Some([tag]) if tag == "list_end" => {
                self.phase = ListPhase::Ended;
                Ok(None)
            }
            _ => Err(CallbackError::UnexpectedFrame {
                received: frame.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::framing::Channel;

    fn channel(input: &str) -> Channel<Cursor<Vec<u8>>, Vec<u8>> {
        Channel::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn lines(channel: Channel<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<Value> {
        let (_, written) = channel.into_parts();
        String::from_utf8(written)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn first_pull_writes_start_then_chunks() {
        let mut frames = channel("[\"list_row\", {\"key\": 1}]\n[\"list_row\", {\"key\": 2}]\n");
        let mut parts = ResponseParts::default();
        let mut stream = ListStream::default();

        parts.push_chunk("a".to_owned());
        let first = stream.pull_row(&mut frames, &mut parts).expect("first row");
        assert_eq!(first, Some(json!({"key": 1})));
        assert_eq!(stream.phase(), ListPhase::Streaming);

        parts.push_chunk("b".to_owned());
        let second = stream.pull_row(&mut frames, &mut parts).expect("second row");
        assert_eq!(second, Some(json!({"key": 2})));

        assert_eq!(
            lines(frames),
            vec![
                json!(["start", ["a"], {"headers": {}}]),
                json!(["chunks", ["b"]]),
            ]
        );
    }

    #[test]
    fn pulls_after_end_do_not_read() {
        let mut frames = channel("[\"list_end\"]\n");
        let mut parts = ResponseParts::default();
        let mut stream = ListStream::default();

        assert_eq!(stream.pull_row(&mut frames, &mut parts).expect("end"), None);
        assert_eq!(stream.phase(), ListPhase::Ended);
        assert_eq!(stream.pull_row(&mut frames, &mut parts).expect("again"), None);
        stream.finish(&mut frames, &mut parts).expect("finish");

        assert_eq!(
            lines(frames),
            vec![json!(["start", [], {"headers": {}}]), json!(["end", []])]
        );
    }

    #[test]
    fn finish_without_pull_starts_and_discards_one_row() {
        let mut frames = channel("[\"list_row\", {\"key\": 1}]\n");
        let mut parts = ResponseParts::default();
        let mut stream = ListStream::default();

        parts
            .set_start(json!({"headers": {"Content-Type": "text/plain"}}))
            .expect("start");
        parts.push_chunk("only".to_owned());
        stream.finish(&mut frames, &mut parts).expect("finish");

        assert_eq!(
            lines(frames),
            vec![
                json!(["start", ["only"], {"headers": {"Content-Type": "text/plain"}}]),
                json!(["end", []]),
            ]
        );
    }

    #[test]
    fn unexpected_frame_is_rejected() {
        let mut frames = channel("[\"reset\"]\n");
        let mut parts = ResponseParts::default();
        let mut stream = ListStream::default();
        let error = stream
            .pull_row(&mut frames, &mut parts)
            .expect_err("reset is not a row");
        assert!(matches!(error, CallbackError::UnexpectedFrame { .. }));
    }

    #[test]
    fn closed_channel_while_waiting_is_an_error() {
        let mut frames = channel("");
        let mut parts = ResponseParts::default();
        let mut stream = ListStream::default();
        let error = stream
            .pull_row(&mut frames, &mut parts)
            .expect_err("no rows to read");
        assert!(matches!(error, CallbackError::ChannelClosed));
    }

    #[test]
    fn start_rules() {
        let mut parts = ResponseParts::default();
        assert!(matches!(
            parts.set_start(json!("text")),
            Err(CallbackError::InvalidStart { .. })
        ));
        parts.set_start(json!({})).expect("first start");
        assert!(matches!(
            parts.set_start(json!({})),
            Err(CallbackError::AlreadyStarted)
        ));

        let mut sent = ResponseParts::default();
        sent.push_chunk("x".to_owned());
        assert!(matches!(
            sent.set_start(json!({})),
            Err(CallbackError::StartAfterBody)
        ));
    }

    #[test]
    fn redirect_replaces_start_and_drops_chunks() {
        let mut parts = ResponseParts::default();
        parts.push_chunk("dropped".to_owned());
        parts.redirect("/elsewhere", true);
        assert!(parts.take_chunks().is_empty());
        assert_eq!(
            parts.take_start().map(Value::Object),
            Some(json!({"code": 301, "headers": {"Location": "/elsewhere"}}))
        );
    }
}
