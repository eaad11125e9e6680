//! Line-based codec for tokio.
//!
//! Reads and writes CR-LF terminated lines, bounded by the IRC line limit.

use crate::error::ProtocolError;
use crate::message::MAX_LINE_LEN;
use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Codec for newline-terminated IRC lines.
///
/// Lines are limited to [`MAX_LINE_LEN`] bytes by default.
pub struct LineCodec {
    /// Index of next byte to check for newline.
    next_index: usize,
    /// Maximum line length.
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the standard IRC line limit.
    pub fn new() -> Self {
        Self { next_index: 0, max_len: MAX_LINE_LEN }
    }

    /// Create a codec with a custom maximum line length.
    pub fn with_max_len(max_len: usize) -> Self {
        Self { next_index: 0, max_len }
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') {
            let line = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            if line.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: line.len(),
                    limit: self.max_len,
                });
            }

            let text = std::str::from_utf8(&line)
                .map_err(|e| ProtocolError::InvalidUtf8 { byte_pos: e.valid_up_to() })?;
            Ok(Some(text.trim_end_matches(['\r', '\n']).to_string()))
        } else {
            self.next_index = src.len();
            if src.len() > self.max_len {
                return Err(ProtocolError::MessageTooLong {
                    actual: src.len(),
                    limit: self.max_len,
                });
            }
            Ok(None)
        }
    }
}

impl Encoder<String> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if item.len() + 2 > self.max_len {
            return Err(ProtocolError::MessageTooLong {
                actual: item.len() + 2,
                limit: self.max_len,
            });
        }
        dst.reserve(item.len() + 2);
        dst.put_slice(item.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_single_line() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"PING :token\r\nPA"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("PING :token".to_string()));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"PA");
    }

    #[test]
    fn test_decode_bare_newline() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from(&b"QUIT\n"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), Some("QUIT".to_string()));
    }

    #[test]
    fn test_decode_over_limit() {
        let mut codec = LineCodec::with_max_len(16);
        let mut buf = BytesMut::from(&b"PRIVMSG #chan :aaaaaaaaaaaaaaaaaaaa\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MessageTooLong { .. })
        ));
    }

    #[test]
    fn test_encode_appends_crlf() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::new();
        codec.encode("NOTICE x :hi".to_string(), &mut buf).unwrap();
        assert_eq!(&buf[..], b"NOTICE x :hi\r\n");
    }
}
