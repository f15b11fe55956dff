//! # Connection
//!
//! [`Connection`] ties the pieces together: it pulls chunk views from a
//! [`ChunkPipe`], drives the [`FrameDecoder`] across them, acknowledges
//! consumed bytes back to the pipe, and hands completed [`Frame`]s to the
//! caller in stream order.
//!
//! The receive loop has exactly one suspension point — waiting for the next
//! chunk. Everything else is synchronous, so cancelling a pending
//! [`next_frame`](Connection::next_frame) call between chunks loses nothing:
//! bytes already consumed toward the current frame stay in the decoder and
//! the next call resumes where the previous one stopped.

use futures::Stream;

use crate::{
    chain::ByteView,
    codec::FrameDecoder,
    frame::Frame,
    pipe::ChunkPipe,
    Error, Result, MAX_PAYLOAD_READ,
};

/// The receiving end of a WebSocket connection, decoding frames from a
/// chunked byte pipe.
///
/// Frames are emitted in the exact order their bytes appear in the input
/// stream; the connection never buffers ahead past the frame currently being
/// assembled.
pub struct Connection {
    pipe: ChunkPipe,
    decoder: FrameDecoder,
    /// Bytes read from the pipe but not yet consumed by the decoder —
    /// typically the tail of a chunk that contained the end of one frame and
    /// the start of the next.
    active: ByteView,
}

impl Connection {
    /// Wraps a pipe with the default payload limit
    /// ([`MAX_PAYLOAD_READ`]).
    pub fn new(pipe: ChunkPipe) -> Self {
        Self::with_max_payload(pipe, MAX_PAYLOAD_READ)
    }

    /// Wraps a pipe, rejecting frames whose declared payload exceeds
    /// `max_payload` bytes.
    pub fn with_max_payload(pipe: ChunkPipe, max_payload: usize) -> Self {
        Self {
            pipe,
            decoder: FrameDecoder::new(max_payload),
            active: ByteView::new(),
        }
    }

    /// Receives the next frame.
    ///
    /// Returns `Ok(None)` when the stream ends cleanly on a frame boundary.
    /// A stream that ends mid-frame surfaces [`Error::ConnectionClosed`],
    /// and any protocol error is fatal: after an `Err` the connection will
    /// not yield further frames.
    pub async fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if self.active.is_empty() {
                match self.pipe.read().await {
                    Some(view) => self.active = view,
                    None if self.decoder.in_progress() => {
                        return Err(Error::ConnectionClosed);
                    }
                    None => return Ok(None),
                }
            }

            let progress = self.decoder.advance(&self.active)?;
            self.pipe.consumed(progress.consumed);
            self.active = self.active.slice_from(progress.consumed);

            if let Some(frame) = progress.frame {
                #[cfg(feature = "logging")]
                log::debug!(
                    "received frame opcode={:?} fin={} payload_len={}",
                    frame.opcode,
                    frame.fin,
                    frame.payload.len()
                );
                return Ok(Some(frame));
            }
        }
    }

    /// Converts the connection into a [`Stream`] of decoded frames.
    ///
    /// The stream yields `Err` at most once — a decode or transport failure
    /// is terminal — and ends after a clean close.
    pub fn into_stream(self) -> impl Stream<Item = Result<Frame>> {
        futures::stream::unfold(Some(self), |conn| async move {
            let mut conn = conn?;
            match conn.next_frame().await {
                Ok(Some(frame)) => Some((Ok(frame), Some(conn))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }
}
