//! # wschain
//! Incremental WebSocket (RFC 6455) frame decoding over zero-copy buffer
//! chains.
//!
//! The crate solves two tightly coupled problems:
//!
//! - [`ByteView`] represents logically contiguous byte ranges spread across
//!   multiple physical allocations, supporting slicing, concatenation and
//!   flattening without unnecessary copies. Chunks delivered by a transport
//!   stay where they landed; the decoder addresses them through views.
//! - [`FrameDecoder`] is a resumable state machine that parses frame headers
//!   one field at a time and can suspend at any byte boundary, so the
//!   transport may split the stream into chunks of any size and alignment
//!   without affecting the decoded result.
//!
//! On top of those sit [`ChunkPipe`], an asynchronous backpressure-aware
//! byte pipe, and [`Connection`], the receive facade that pulls chunks,
//! drives the decoder and acknowledges consumption.
//!
//! # Example
//! ```rust
//! use wschain::{ChunkPipe, Connection, OpCode};
//!
//! # async fn demo() -> wschain::Result<()> {
//! let pipe = ChunkPipe::new();
//! let producer = pipe.clone();
//!
//! // A producer task feeds wire bytes in arbitrary chunks...
//! tokio::spawn(async move {
//!     producer.write(&b"\x81\x05Hel"[..]).await?;
//!     producer.write(&b"lo"[..]).await?;
//!     producer.close();
//!     wschain::Result::Ok(())
//! });
//!
//! // ...and the connection reassembles complete frames.
//! let mut conn = Connection::new(pipe);
//! while let Some(frame) = conn.next_frame().await? {
//!     assert_eq!(frame.opcode, OpCode::Text);
//!     assert_eq!(frame.as_str(), "Hello");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Scope
//! This crate is the frame layer only. The HTTP upgrade handshake, TLS, the
//! outbound send path and close-handshake orchestration are the caller's
//! business; the decoder meets the transport at the [`ChunkPipe`] contract
//! and hands [`Frame`]s up.
//!
//! # Features
//! - `logging`: debug/trace logging of decode progress using the `log`
//!   crate.
//!
//! # Memory safety
//! - Maximum payload size limits (configurable, default 1 MiB) reject
//!   oversized frames before their payload is buffered.
//! - Chunk storage is reference counted; no view can dangle, and the
//!   transport's backpressure budget is released exactly when bytes are
//!   acknowledged.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod chain;
pub mod close;
pub mod codec;
pub mod connection;
pub mod frame;
mod mask;
pub mod pipe;

use thiserror::Error as ThisError;

pub use chain::ByteView;
pub use close::{Close, CloseCode};
pub use codec::{FrameDecoder, Progress};
pub use connection::Connection;
pub use frame::{Frame, OpCode};
pub use pipe::ChunkPipe;

/// The maximum allowed payload size for reading, set to 1 MiB.
///
/// Frames with a payload size larger than this limit will be rejected to
/// ensure memory safety and prevent excessively large messages from
/// impacting performance.
pub const MAX_PAYLOAD_READ: usize = 1024 * 1024;

/// A result type for decoding operations, using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents errors that can occur while decoding a WebSocket byte stream.
///
/// The errors fall into two classes, distinguishable via
/// [`is_protocol`](Error::is_protocol):
///
/// - Protocol errors — the peer sent something RFC 6455 forbids. Fatal to
///   the connection; the stream's byte alignment can no longer be trusted.
/// - Transport errors — the underlying chunk source failed or ended while a
///   frame was incomplete. Also fatal to the decode, but it means "network
///   failure", not "bad peer".
#[derive(ThisError, Debug)]
pub enum Error {
    /// Receipt of a frame whose opcode nibble is one of the reserved values
    /// (0x3-0x7 or 0xB-0xF).
    #[error("Invalid opcode (byte={0})")]
    InvalidOpCode(u8),

    /// Reserved bits in the frame header are set. Without negotiated
    /// extensions they must be 0.
    #[error("Reserved bits are not zero")]
    ReservedBitsNotZero,

    /// A control frame (close, ping, or pong) was received with the FIN bit
    /// not set. RFC 6455 requires that control frames are never fragmented.
    #[error("Control frame must not be fragmented")]
    ControlFrameFragmented,

    /// A control frame declared a payload larger than the 125 bytes RFC 6455
    /// allows.
    #[error("Control frame too large")]
    ControlFrameTooLarge,

    /// A frame's declared payload length exceeds the configured maximum.
    /// This guards against memory exhaustion.
    #[error("Frame too large")]
    FrameTooLarge,

    /// A close frame carried an invalid payload, such as a single byte
    /// (close payloads must be empty or at least 2 bytes).
    #[error("Invalid close frame")]
    InvalidCloseFrame,

    /// A close frame carried a status code that must not appear on the wire
    /// (reserved or out-of-range per RFC 6455 Section 7.4).
    #[error("Invalid close code")]
    InvalidCloseCode,

    /// A close frame's reason text was not valid UTF-8.
    #[error("Invalid UTF-8")]
    InvalidUtf8,

    /// The byte stream ended or was closed while a frame was still being
    /// assembled, or an operation was attempted on a failed connection.
    #[error("Connection is closed")]
    ConnectionClosed,

    /// Wraps I/O errors surfaced by transports feeding the pipe, such as
    /// connection resets or timeouts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` for violations of RFC 6455 by the peer, as opposed to
    /// transport-level failures.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            Error::InvalidOpCode(_)
                | Error::ReservedBitsNotZero
                | Error::ControlFrameFragmented
                | Error::ControlFrameTooLarge
                | Error::FrameTooLarge
                | Error::InvalidCloseFrame
                | Error::InvalidCloseCode
                | Error::InvalidUtf8
        )
    }

    /// The close code an endpoint should send the peer when failing the
    /// connection over this error.
    pub fn close_code(&self) -> CloseCode {
        match self {
            Error::FrameTooLarge | Error::ControlFrameTooLarge => CloseCode::Size,
            Error::InvalidOpCode(_) => CloseCode::Unsupported,
            Error::InvalidUtf8 => CloseCode::Invalid,
            Error::ReservedBitsNotZero
            | Error::ControlFrameFragmented
            | Error::InvalidCloseFrame
            | Error::InvalidCloseCode => CloseCode::Protocol,
            Error::ConnectionClosed | Error::Io(_) => CloseCode::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(Error::InvalidOpCode(0x5).is_protocol());
        assert!(Error::FrameTooLarge.is_protocol());
        assert!(Error::InvalidCloseCode.is_protocol());

        assert!(!Error::ConnectionClosed.is_protocol());
        assert!(!Error::Io(std::io::Error::other("reset")).is_protocol());
    }

    #[test]
    fn test_error_close_codes() {
        assert_eq!(Error::FrameTooLarge.close_code(), CloseCode::Size);
        assert_eq!(Error::InvalidOpCode(0xB).close_code(), CloseCode::Unsupported);
        assert_eq!(Error::InvalidUtf8.close_code(), CloseCode::Invalid);
        assert_eq!(
            Error::ControlFrameFragmented.close_code(),
            CloseCode::Protocol
        );
        assert_eq!(Error::ConnectionClosed.close_code(), CloseCode::Error);
    }
}
