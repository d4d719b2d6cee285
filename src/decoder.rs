//! Incremental UTF-8 decoding of response body chunks.
//!
//! Transport chunks are not aligned with character boundaries, so a multi-byte
//! code point may straddle two chunks. [`Utf8Decoder`] keeps the unfinished
//! tail of the previous chunk and prepends it to the next one.

use std::borrow::Cow;

use thiserror::Error;

/// Errors raised when flushing the decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("stream ended inside a multi-byte character ({pending} byte(s) pending)")]
    Truncated { pending: usize },
}

/// Stateful UTF-8 decoder owned by a single stream.
///
/// Invalid sequences in the middle of the stream are replaced with
/// U+FFFD. Only a truncated sequence at the final flush is an error.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk`, carrying any incomplete trailing sequence over to the
    /// next call. With `last` set, a leftover partial sequence is an error.
    ///
    /// # Example
    /// ```
    /// use clubstream::decoder::Utf8Decoder;
    ///
    /// let bytes = "é".as_bytes();
    /// let mut decoder = Utf8Decoder::new();
    /// assert_eq!(decoder.decode(&bytes[..1], false).unwrap(), "");
    /// assert_eq!(decoder.decode(&bytes[1..], true).unwrap(), "é");
    /// ```
    pub fn decode(&mut self, chunk: &[u8], last: bool) -> Result<String, DecodeError> {
        let buf: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(buf.len());
        let mut input: &[u8] = &buf;

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // The prefix up to `valid` was just validated, so this borrows.
                    out.push_str(&String::from_utf8_lossy(&input[..valid]));

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            input = &input[valid + len..];
                        }
                        None => {
                            let tail = &input[valid..];
                            if last {
                                return Err(DecodeError::Truncated {
                                    pending: tail.len(),
                                });
                            }
                            self.pending = tail.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        Ok(out)
    }

    /// Number of bytes held back waiting for the rest of a character.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
