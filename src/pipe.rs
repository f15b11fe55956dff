//! # Chunked byte pipe
//!
//! [`ChunkPipe`] is the asynchronous byte pipe the decoder pulls from: a
//! producer writes byte chunks in, a consumer reads them out as
//! [`ByteView`]s and acknowledges consumption. It is the in-process stand-in
//! for a network transport, and the only component in the crate that
//! suspends.
//!
//! The pipe is backpressure-aware: `write` blocks (asynchronously) while the
//! number of unacknowledged bytes is at or above the pipe's capacity, and
//! [`consumed`](ChunkPipe::consumed) releases that budget. Chunk storage is
//! reference counted, so acknowledgment is pure flow control — a view handed
//! out by [`read`](ChunkPipe::read) stays valid regardless of when the
//! producer moves on.
//!
//! The pipe is built for one producer and one consumer, matching the
//! single-connection decode pipeline; the handle is cheaply cloneable so the
//! two sides can live on different tasks.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard},
};

use bytes::Bytes;
use tokio::sync::Notify;

use crate::{chain::ByteView, Error, Result};

/// Default number of unacknowledged bytes a pipe buffers before `write`
/// applies backpressure, set to 64 KiB.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

struct PipeState {
    /// Chunks written but not yet handed to a reader.
    chunks: VecDeque<Bytes>,
    /// Bytes written but not yet acknowledged via `consumed`.
    unacked: usize,
    closed: bool,
}

struct Inner {
    state: Mutex<PipeState>,
    readable: Notify,
    writable: Notify,
    capacity: usize,
}

/// An asynchronous, backpressure-aware byte pipe delivering chunks to the
/// frame decoder. See the [module docs](self) for the contract.
#[derive(Clone)]
pub struct ChunkPipe {
    inner: Arc<Inner>,
}

impl ChunkPipe {
    /// Creates a pipe with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_PIPE_CAPACITY)
    }

    /// Creates a pipe that applies write backpressure once `capacity`
    /// unacknowledged bytes are outstanding.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(PipeState {
                    chunks: VecDeque::new(),
                    unacked: 0,
                    closed: false,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PipeState> {
        self.inner.state.lock().expect("pipe state poisoned")
    }

    /// Appends a chunk for a later [`read`](ChunkPipe::read) to observe.
    ///
    /// Suspends while the pipe already holds `capacity` or more
    /// unacknowledged bytes. Fails with [`Error::ConnectionClosed`] once the
    /// pipe has been closed.
    pub async fn write(&self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        if data.is_empty() {
            return Ok(());
        }

        loop {
            let notified = self.inner.writable.notified();
            {
                let mut state = self.lock();
                if state.closed {
                    return Err(Error::ConnectionClosed);
                }
                if state.unacked < self.inner.capacity {
                    state.unacked += data.len();
                    state.chunks.push_back(data);
                    drop(state);
                    self.inner.readable.notify_one();
                    return Ok(());
                }
            }
            notified.await;
        }
    }

    /// Returns the next available bytes, suspending until the producer has
    /// written something or closed the pipe.
    ///
    /// Everything buffered at the time of the call is drained into one
    /// (possibly multi-segment) view; bytes are never re-delivered. Returns
    /// `None` once the pipe is closed and fully drained.
    pub async fn read(&self) -> Option<ByteView> {
        loop {
            let notified = self.inner.readable.notified();
            {
                let mut state = self.lock();
                if !state.chunks.is_empty() {
                    let mut view = ByteView::new();
                    for chunk in state.chunks.drain(..) {
                        view = ByteView::concat(&view, &ByteView::from(chunk));
                    }
                    return Some(view);
                }
                if state.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Acknowledges that `n` bytes delivered by previous
    /// [`read`](ChunkPipe::read) calls are fully processed, releasing their
    /// share of the backpressure budget.
    pub fn consumed(&self, n: usize) {
        if n == 0 {
            return;
        }
        let mut state = self.lock();
        state.unacked = state.unacked.saturating_sub(n);
        let release = state.unacked < self.inner.capacity;
        drop(state);
        if release {
            self.inner.writable.notify_one();
        }
    }

    /// Ends the stream. Buffered chunks remain readable; after the pipe
    /// drains, `read` reports end-of-stream and `write` fails.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        drop(state);
        self.inner.readable.notify_one();
        self.inner.writable.notify_one();
    }

    /// The backpressure capacity this pipe was created with.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }
}

impl Default for ChunkPipe {
    fn default() -> Self {
        Self::new()
    }
}
