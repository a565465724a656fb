//! Frame Codec
//!
//! Newline-delimited JSON frames. `serde_json` compact output escapes every
//! control character inside strings and emits no whitespace, so a raw `\n`
//! byte can only ever be the delimiter.
//!
//! Decoding works on an accumulating buffer: feed whatever the socket
//! returned, then pull complete frames until none are left. A malformed
//! frame is reported and dropped; the buffer stays aligned on the next
//! delimiter.

use thiserror::Error;
use tracing::warn;

use super::protocol::Message;

/// Frame delimiter.
pub const FRAME_DELIMITER: u8 = b'\n';

/// Default cap on a single frame, delimiter excluded.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Frame codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Frame body was not a valid envelope.
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Frame exceeded the configured maximum.
    #[error("Frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge {
        /// Bytes seen so far.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Encode one message as a delimited frame.
pub fn encode_frame(msg: &Message) -> Result<Vec<u8>, serde_json::Error> {
    let mut frame = serde_json::to_vec(msg)?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

/// Incremental frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_len: usize,
    /// Dropping bytes of an oversized frame until the next delimiter.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    /// Create a decoder with a frame size limit.
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
            discarding: false,
        }
    }

    /// Append bytes read from the stream.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held waiting for a delimiter.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next complete frame, if any.
    ///
    /// Returns `None` once the buffer holds no further delimiter. Empty
    /// frames are skipped.
    pub fn next_frame(&mut self) -> Option<Result<Message, CodecError>> {
        loop {
            let Some(pos) = self.buf.iter().position(|&b| b == FRAME_DELIMITER) else {
                if self.discarding {
                    self.buf.clear();
                    return None;
                }
                if self.buf.len() > self.max_frame_len {
                    let len = self.buf.len();
                    self.buf.clear();
                    self.discarding = true;
                    return Some(Err(CodecError::FrameTooLarge {
                        len,
                        max: self.max_frame_len,
                    }));
                }
                return None;
            };

            let frame: Vec<u8> = self.buf.drain(..=pos).collect();
            let body = &frame[..frame.len() - 1];

            if self.discarding {
                self.discarding = false;
                continue;
            }
            if body.is_empty() {
                continue;
            }
            if body.len() > self.max_frame_len {
                return Some(Err(CodecError::FrameTooLarge {
                    len: body.len(),
                    max: self.max_frame_len,
                }));
            }

            return Some(Message::from_slice(body).map_err(CodecError::from));
        }
    }

    /// Feed `bytes` and return every well-formed message now complete.
    ///
    /// Malformed frames are logged and skipped.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Message> {
        self.extend(bytes);
        let mut out = Vec::new();
        while let Some(frame) = self.next_frame() {
            match frame {
                Ok(msg) => out.push(msg),
                Err(e) => warn!("Dropping frame: {}", e),
            }
        }
        out
    }
}
