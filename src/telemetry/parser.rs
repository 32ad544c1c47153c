use crate::error::ParseError;

use super::types::MetricsSnapshot;

/// Prefix of a line carrying one frame's payload.
pub const DATA_MARKER: &str = "data: ";
/// Longest unterminated line held in the carry-over buffer before it is discarded.
const MAX_PENDING_BYTES: usize = 4 * 1024 * 1024;

/// Turns the payload of a `data: ` line into an application frame.
pub trait FrameDecoder {
    type Frame;

    /// Returns `Ok(None)` when the payload carries nothing worth emitting.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` when the payload is malformed. The parser
    /// reports it for this one frame and keeps going.
    fn decode(&self, payload: &str) -> Result<Option<Self::Frame>, ParseError>;
}

/// Decodes full `MetricsSnapshot` JSON documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsDecoder;

impl FrameDecoder for MetricsDecoder {
    type Frame = MetricsSnapshot;

    fn decode(&self, payload: &str) -> Result<Option<Self::Frame>, ParseError> {
        let payload = payload.trim();
        if payload.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(payload)
            .map(Some)
            .map_err(ParseError::from)
    }
}

/// Accepts log payloads verbatim as opaque text.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogLineDecoder;

impl FrameDecoder for LogLineDecoder {
    type Frame = String;

    fn decode(&self, payload: &str) -> Result<Option<Self::Frame>, ParseError> {
        if payload.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(payload.to_owned()))
    }
}

pub type DecodedFrame<D> = Result<<D as FrameDecoder>::Frame, ParseError>;

/// Incremental decoder for a server-pushed text event stream.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; the unfinished
/// tail is carried over as raw bytes until its newline arrives. Only
/// complete lines starting with [`DATA_MARKER`] produce frames, in
/// arrival order. Everything else (keep-alives, comments, `event:`
/// fields) is dropped.
#[derive(Debug, Default)]
pub struct EventFrameParser<D> {
    decoder: D,
    carry: Vec<u8>,
    discarding: bool,
}

impl<D: FrameDecoder> EventFrameParser<D> {
    #[must_use]
    pub const fn new(decoder: D) -> Self {
        Self {
            decoder,
            carry: Vec::new(),
            discarding: false,
        }
    }

    /// Consumes one chunk and returns the frames it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<DecodedFrame<D>> {
        self.carry.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0usize;
        while let Some(offset) = self
            .carry
            .get(consumed..)
            .and_then(|rest| rest.iter().position(|byte| *byte == b'\n'))
        {
            let end = consumed.saturating_add(offset);
            if self.discarding {
                self.discarding = false;
            } else if let Some(frame) = self
                .carry
                .get(consumed..end)
                .and_then(|line| self.decode_line(line))
            {
                frames.push(frame);
            }
            consumed = end.saturating_add(1);
        }
        self.carry.drain(..consumed);

        if self.carry.len() > MAX_PENDING_BYTES {
            tracing::debug!(
                "Dropping unterminated stream line of {} bytes",
                self.carry.len()
            );
            self.carry.clear();
            if !self.discarding {
                self.discarding = true;
                frames.push(Err(ParseError::new(format!(
                    "frame exceeded {} bytes",
                    MAX_PENDING_BYTES
                ))));
            }
        }

        frames
    }

    /// Bytes of the current unterminated line.
    #[must_use]
    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }

    /// Ends the stream. An unterminated trailing line is not a frame and is
    /// dropped; the number of dropped bytes is returned.
    pub fn finish(&mut self) -> usize {
        let dropped = self.carry.len();
        self.carry.clear();
        self.discarding = false;
        dropped
    }

    fn decode_line(&self, line: &[u8]) -> Option<DecodedFrame<D>> {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let payload = line.strip_prefix(DATA_MARKER.as_bytes())?;
        let text = String::from_utf8_lossy(payload);
        self.decoder.decode(&text).transpose()
    }
}
