//! # Frame
//!
//! Decoded WebSocket frames as defined in
//! [RFC 6455 Section 5.2](https://datatracker.ietf.org/doc/html/rfc6455#section-5.2).
//!
//! A [`Frame`] is the artifact the decoder hands to the caller once a full
//! protocol unit has been assembled from the chunk stream: the FIN flag, the
//! opcode, the flattened (and, where applicable, unmasked) payload, and — for
//! Close frames — the decoded status code and reason.
//!
//! Frames come in two categories:
//!
//! - **Data frames**: [`OpCode::Text`] (UTF-8 text), [`OpCode::Binary`]
//!   (raw bytes) and [`OpCode::Continuation`] (a fragment of a message
//!   started by an earlier data frame).
//! - **Control frames**: [`OpCode::Close`], [`OpCode::Ping`] and
//!   [`OpCode::Pong`]. Control frames manage the connection itself, must not
//!   be fragmented, and carry at most 125 payload bytes.
//!
//! The wire layout is documented in the [`codec`](crate::codec) module, where
//! it is parsed.

use bytes::Bytes;

use crate::{close::Close, Error};

/// WebSocket operation code determining the semantic meaning of a frame.
///
/// The numeric values are defined in
/// [RFC 6455 Section 11.8](https://datatracker.ietf.org/doc/html/rfc6455#section-11.8):
/// Continuation = 0x0, Text = 0x1, Binary = 0x2, Close = 0x8, Ping = 0x9,
/// Pong = 0xA. The ranges 0x3-0x7 and 0xB-0xF are reserved; a frame carrying
/// one of them is rejected as a protocol error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OpCode {
    Continuation,
    Text,
    Binary,
    Close,
    Ping,
    Pong,
}

impl OpCode {
    /// Returns `true` if the `OpCode` represents a control frame (`Close`,
    /// `Ping`, or `Pong`).
    ///
    /// Control frames have special constraints: they cannot be fragmented
    /// (the FIN bit must be set) and their payload must not exceed 125
    /// bytes.
    pub fn is_control(&self) -> bool {
        matches!(*self, OpCode::Close | OpCode::Ping | OpCode::Pong)
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    /// Interprets the opcode nibble from a frame header. Reserved values
    /// (0x3-0x7 and 0xB-0xF) yield [`Error::InvalidOpCode`].
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            _ => Err(Error::InvalidOpCode(value)),
        }
    }
}

impl From<OpCode> for u8 {
    fn from(val: OpCode) -> Self {
        match val {
            OpCode::Continuation => 0x0,
            OpCode::Text => 0x1,
            OpCode::Binary => 0x2,
            OpCode::Close => 0x8,
            OpCode::Ping => 0x9,
            OpCode::Pong => 0xA,
        }
    }
}

/// One decoded WebSocket frame.
///
/// Produced once per complete frame decode and immutable thereafter. The
/// payload has already been unmasked and flattened into a single contiguous
/// [`Bytes`]; for Close frames the status code and reason have been decoded
/// and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Indicates this is the final frame of a message. Unfragmented messages
    /// consist of a single frame with `fin` set.
    pub fin: bool,
    /// The opcode of the frame, defining its type.
    pub opcode: OpCode,
    /// The frame's payload, unmasked. Empty for frames that carry no content.
    pub payload: Bytes,
    /// Decoded Close payload, present only when `opcode` is [`OpCode::Close`]
    /// and the peer supplied a status code.
    close: Option<Close>,
}

impl Frame {
    pub(crate) fn new(fin: bool, opcode: OpCode, payload: Bytes, close: Option<Close>) -> Self {
        Self {
            fin,
            opcode,
            payload,
            close,
        }
    }

    /// The decoded close status and reason, when this is a Close frame that
    /// carried them.
    pub fn close(&self) -> Option<&Close> {
        self.close.as_ref()
    }

    /// Converts the frame payload to a string slice, expecting valid UTF-8.
    ///
    /// # Panics
    /// Panics if the payload is not valid UTF-8. Use this method only with
    /// frames known to carry text, such as those with [`OpCode::Text`].
    #[inline]
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.payload).expect("utf8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::close::CloseCode;

    mod opcode_tests {
        use super::*;

        #[test]
        fn test_is_control() {
            assert!(OpCode::Close.is_control());
            assert!(OpCode::Ping.is_control());
            assert!(OpCode::Pong.is_control());

            assert!(!OpCode::Continuation.is_control());
            assert!(!OpCode::Text.is_control());
            assert!(!OpCode::Binary.is_control());
        }

        #[test]
        fn test_try_from_u8_valid() {
            assert_eq!(OpCode::try_from(0x0).unwrap(), OpCode::Continuation);
            assert_eq!(OpCode::try_from(0x1).unwrap(), OpCode::Text);
            assert_eq!(OpCode::try_from(0x2).unwrap(), OpCode::Binary);
            assert_eq!(OpCode::try_from(0x8).unwrap(), OpCode::Close);
            assert_eq!(OpCode::try_from(0x9).unwrap(), OpCode::Ping);
            assert_eq!(OpCode::try_from(0xA).unwrap(), OpCode::Pong);
        }

        #[test]
        fn test_try_from_u8_reserved() {
            for &code in &[0x3, 0x4, 0x5, 0x6, 0x7, 0xB, 0xC, 0xD, 0xE, 0xF] {
                assert!(matches!(
                    OpCode::try_from(code),
                    Err(Error::InvalidOpCode(byte)) if byte == code
                ));
            }
        }

        #[test]
        fn test_opcode_to_u8() {
            assert_eq!(u8::from(OpCode::Continuation), 0x0);
            assert_eq!(u8::from(OpCode::Text), 0x1);
            assert_eq!(u8::from(OpCode::Binary), 0x2);
            assert_eq!(u8::from(OpCode::Close), 0x8);
            assert_eq!(u8::from(OpCode::Ping), 0x9);
            assert_eq!(u8::from(OpCode::Pong), 0xA);
        }
    }

    mod frame_tests {
        use super::*;

        #[test]
        fn test_text_frame_as_str() {
            let frame = Frame::new(true, OpCode::Text, Bytes::from_static(b"Hello"), None);
            assert_eq!(frame.as_str(), "Hello");
        }

        #[test]
        fn test_close_accessor() {
            let close = Close {
                code: CloseCode::Normal,
                reason: "done".to_owned(),
            };
            let frame = Frame::new(
                true,
                OpCode::Close,
                Bytes::from_static(b"\x03\xE8done"),
                Some(close.clone()),
            );
            assert_eq!(frame.close(), Some(&close));

            let frame = Frame::new(true, OpCode::Text, Bytes::from_static(b"x"), None);
            assert_eq!(frame.close(), None);
        }
    }
}
