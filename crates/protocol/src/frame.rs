//! SSE text framing
//!
//! One event per frame. A frame is a group of `field: value` lines
//! terminated by a blank line:
//!
//! ```text
//! event: log
//! data: {"id":"...","type":"log",...}
//! id: 1754550000000-7
//!
//! ```
//!
//! Encoding is a single pass over the event. Decoding is incremental:
//! `FrameDecoder` buffers raw transport chunks and yields complete frames
//! as they become available, tolerating frames split across chunks,
//! multiple frames per chunk, CRLF line endings, `:` comment lines
//! (keep-alives), and unknown fields.

use bytes::BytesMut;

use crate::error::ProtocolError;
use crate::event::{Event, EventKind};
use crate::Result;

/// Event type assumed when a frame has no `event:` line (SSE default)
pub const DEFAULT_EVENT_TYPE: &str = "message";

/// A decoded wire frame, not yet interpreted as an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Declared event type (`event:` line, or `"message"` if absent)
    pub event: String,
    /// Raw data payload; multiple `data:` lines are joined with `\n`
    pub data: String,
    /// Event id (`id:` line), if present
    pub id: Option<String>,
}

/// Encode an event into one wire frame
pub fn encode_event(event: &Event) -> Result<String> {
    let json = serde_json::to_string(event)?;
    Ok(format!(
        "event: {}\ndata: {}\nid: {}\n\n",
        event.kind().as_str(),
        json,
        event.id
    ))
}

/// Decode a frame into an event, checked against its declared type
///
/// The frame's `event:` field must name a known type and agree with the
/// payload's own `type` tag. Callers treat any error here as "log and
/// drop the frame" - a malformed payload never tears down the stream.
pub fn decode_event(frame: &Frame) -> Result<Event> {
    if frame.data.is_empty() {
        return Err(ProtocolError::EmptyData);
    }

    let declared = EventKind::parse(&frame.event)
        .ok_or_else(|| ProtocolError::UnknownEventType(frame.event.clone()))?;

    let event: Event = serde_json::from_str(&frame.data)?;

    if event.kind() != declared {
        return Err(ProtocolError::TypeMismatch {
            frame: frame.event.clone(),
            payload: event.kind().as_str().to_string(),
        });
    }

    Ok(event)
}

/// Incremental frame decoder
///
/// Feed raw chunks as they arrive off the transport, then drain complete
/// frames with `next_frame()`. Bytes belonging to an incomplete frame stay
/// buffered until the terminating blank line arrives.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk from the transport
    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pop the next complete frame, if one is buffered
    ///
    /// Comment-only blocks (keep-alives) are consumed silently.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let (end, resume) = find_frame_boundary(&self.buf)?;
            let raw = self.buf.split_to(resume);
            let text = String::from_utf8_lossy(&raw[..end]).into_owned();

            if let Some(frame) = parse_frame(&text) {
                return Some(frame);
            }
            // Nothing but comments/unknown fields - keep scanning
        }
    }

    /// Number of bytes currently buffered
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

/// Locate the blank line ending the first buffered frame
///
/// Returns `(frame_end, resume_at)`: the index where the frame's text ends
/// and the index just past the blank line. `None` until a full frame is
/// buffered. A trailing lone `\r` is left in place - it may be half of a
/// CRLF still in flight.
fn find_frame_boundary(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    let mut newlines = 0;
    let mut frame_end = 0;

    while i < buf.len() {
        match buf[i] {
            b'\n' => {
                if newlines == 0 {
                    frame_end = i;
                }
                newlines += 1;
                i += 1;
            }
            b'\r' if i + 1 < buf.len() && buf[i + 1] == b'\n' => {
                if newlines == 0 {
                    frame_end = i;
                }
                newlines += 1;
                i += 2;
            }
            b'\r' if i + 1 == buf.len() => return None,
            _ => {
                newlines = 0;
                i += 1;
            }
        }

        if newlines == 2 {
            return Some((frame_end, i));
        }
    }

    None
}

/// Parse the lines of one frame block
///
/// Returns `None` when the block carries no event, data, or id fields
/// (a pure keep-alive comment block).
fn parse_frame(text: &str) -> Option<Frame> {
    let mut event: Option<String> = None;
    let mut data_lines: Vec<&str> = Vec::new();
    let mut id: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };

        match field {
            "event" => event = Some(value.to_string()),
            "data" => data_lines.push(value),
            "id" => id = Some(value.to_string()),
            _ => {} // unknown field, ignore for forward compatibility
        }
    }

    if event.is_none() && data_lines.is_empty() && id.is_none() {
        return None;
    }

    Some(Frame {
        event: event.unwrap_or_else(|| DEFAULT_EVENT_TYPE.to_string()),
        data: data_lines.join("\n"),
        id,
    })
}
