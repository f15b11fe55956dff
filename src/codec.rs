//! # Incremental frame decoding
//!
//! The `codec` module implements [`FrameDecoder`], a resumable state machine
//! that assembles WebSocket frames from input that arrives in arbitrarily
//! sized, arbitrarily aligned chunks.
//!
//! ### Frame binary format
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |         (16 or 64 bits)       |
//! |N|V|V|V|       |S|             |                               |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |        Extended payload length continued, if payload len == 127|
//! +---------------------------------------------------------------+
//! |                               |   Masking-key, if MASK set to 1|
//! +-------------------------------+-------------------------------+
//! |     Masking-key (continued)       |          Payload Data      |
//! +-----------------------------------+ - - - - - - - - - - - - - -+
//! :                     Payload Data continued ...                :
//! +---------------------------------------------------------------+
//! ```
//!
//! The decoder walks the header one field at a time — opcode byte,
//! mask-and-length byte, extended length, masking key, payload — and can
//! suspend between any two bytes. When an input view is exhausted mid-field,
//! the field cursor and all partial accumulators stay in [`FrameDecoder`];
//! the next call to [`advance`](FrameDecoder::advance) resumes at the exact
//! byte where the previous one stopped. No field is ever re-parsed or
//! skipped, which is what makes decoding invariant under re-chunking of the
//! input.
//!
//! Payload bytes are accumulated as a [`ByteView`] chain via `concat`, so a
//! frame spanning many transport chunks aliases their storage instead of
//! copying it; the payload is flattened (and unmasked) once, when the frame
//! completes.

use bytes::BytesMut;

use crate::{
    chain::ByteView,
    close::Close,
    frame::{Frame, OpCode},
    mask, Error, Result,
};

/// The header field the decoder expects next. Fields only ever advance in
/// this order; `ExtendedLen` and `MaskingKey` are skipped when the header
/// does not carry them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextField {
    Opcode,
    MaskedAndLen,
    ExtendedLen,
    MaskingKey,
    Payload,
}

/// Transient per-frame parse state: the field cursor plus the partial
/// accumulators for multi-byte fields. Created fresh for every frame and
/// discarded once the frame is emitted.
struct ParseState {
    field: NextField,
    fin: bool,
    opcode: OpCode,
    masked: bool,
    /// Declared payload length; accumulates big-endian one byte per step
    /// while in `ExtendedLen`.
    payload_len: u64,
    /// Extended-length bytes still to read (8, 2 or 0).
    len_bytes_left: u8,
    mask_key: [u8; 4],
    mask_filled: usize,
    /// Payload bytes collected so far, chained without copying.
    payload: ByteView,
}

impl ParseState {
    fn new() -> Self {
        Self {
            field: NextField::Opcode,
            fin: false,
            opcode: OpCode::Continuation,
            masked: false,
            payload_len: 0,
            len_bytes_left: 0,
            mask_key: [0; 4],
            mask_filled: 0,
            payload: ByteView::new(),
        }
    }
}

/// Outcome of one [`FrameDecoder::advance`] call: how many bytes of the
/// input view were consumed, and the completed frame when one was finished.
///
/// `consumed` is exact — the caller reports it to the transport
/// (acknowledging those bytes) and re-slices its buffer before the next
/// call. `consumed < input.len()` with a frame present means the leftover
/// bytes belong to the *next* frame.
#[derive(Debug)]
pub struct Progress {
    /// Bytes consumed from the input view passed to `advance`.
    pub consumed: usize,
    /// The completed frame, when this call finished one.
    pub frame: Option<Frame>,
}

/// Resumable WebSocket frame decoder.
///
/// Feed it views of the incoming byte stream in order via
/// [`advance`](FrameDecoder::advance); it consumes what it can, suspends
/// mid-field when input runs out, and yields one [`Frame`] at a time. The
/// decoder enforces a maximum declared payload length as a
/// resource-exhaustion guard.
///
/// Any decode error is fatal to the stream: byte alignment cannot be trusted
/// after a malformed header, so the decoder refuses further input once it
/// has failed.
pub struct FrameDecoder {
    state: ParseState,
    max_payload: usize,
    poisoned: bool,
}

impl FrameDecoder {
    /// Creates a decoder that rejects frames whose declared payload length
    /// exceeds `max_payload` bytes.
    pub fn new(max_payload: usize) -> Self {
        Self {
            state: ParseState::new(),
            max_payload,
            poisoned: false,
        }
    }

    /// Returns `true` while bytes have been consumed toward a frame that has
    /// not completed yet. End-of-stream in this condition is a truncation,
    /// not a clean close.
    pub fn in_progress(&self) -> bool {
        self.state.field != NextField::Opcode
    }

    /// Consumes as many bytes from `input` as the current frame needs and
    /// the view provides.
    ///
    /// Returns after completing at most one frame, so the caller can
    /// acknowledge consumption and re-slice before the next frame starts.
    /// When the view is exhausted mid-field, all partial state is kept and
    /// the next call resumes at the same byte position within the field.
    pub fn advance(&mut self, input: &ByteView) -> Result<Progress> {
        if self.poisoned {
            return Err(Error::ConnectionClosed);
        }

        let mut offset = 0;
        match self.run(input, &mut offset) {
            Ok(frame) => Ok(Progress {
                consumed: offset,
                frame,
            }),
            Err(err) => {
                self.poisoned = true;
                Err(err)
            }
        }
    }

    fn run(&mut self, input: &ByteView, offset: &mut usize) -> Result<Option<Frame>> {
        loop {
            match self.state.field {
                NextField::Opcode => {
                    let Some(byte) = input.get(*offset) else {
                        return Ok(None);
                    };
                    *offset += 1;
                    self.parse_opcode(byte)?;
                }
                NextField::MaskedAndLen => {
                    let Some(byte) = input.get(*offset) else {
                        return Ok(None);
                    };
                    *offset += 1;
                    self.parse_masked_and_len(byte)?;
                }
                NextField::ExtendedLen => {
                    let Some(byte) = input.get(*offset) else {
                        return Ok(None);
                    };
                    *offset += 1;
                    self.parse_extended_len(byte)?;
                }
                NextField::MaskingKey => {
                    if *offset >= input.len() {
                        return Ok(None);
                    }
                    let take = (4 - self.state.mask_filled).min(input.len() - *offset);
                    for i in 0..take {
                        self.state.mask_key[self.state.mask_filled + i] =
                            input.byte_at(*offset + i);
                    }
                    self.state.mask_filled += take;
                    *offset += take;
                    if self.state.mask_filled == 4 {
                        self.state.field = NextField::Payload;
                    }
                }
                NextField::Payload => {
                    // Checked before demanding input, so zero-length payloads
                    // complete even when the header ended exactly at a chunk
                    // boundary.
                    let remaining =
                        (self.state.payload_len - self.state.payload.len() as u64) as usize;
                    if remaining == 0 {
                        return Ok(Some(self.complete()?));
                    }
                    if *offset >= input.len() {
                        return Ok(None);
                    }
                    let take = remaining.min(input.len() - *offset);
                    let part = input.slice(*offset, take);
                    self.state.payload = ByteView::concat(&self.state.payload, &part);
                    *offset += take;
                }
            }
        }
    }

    fn parse_opcode(&mut self, byte: u8) -> Result<()> {
        if byte & 0b0111_0000 != 0 {
            return Err(Error::ReservedBitsNotZero);
        }
        self.state.fin = byte & 0b1000_0000 != 0;
        self.state.opcode = OpCode::try_from(byte & 0b0000_1111)?;
        self.state.field = NextField::MaskedAndLen;
        Ok(())
    }

    fn parse_masked_and_len(&mut self, byte: u8) -> Result<()> {
        self.state.masked = byte & 0b1000_0000 != 0;
        match byte & 0x7F {
            127 => {
                self.state.len_bytes_left = 8;
                self.state.field = NextField::ExtendedLen;
                Ok(())
            }
            126 => {
                self.state.len_bytes_left = 2;
                self.state.field = NextField::ExtendedLen;
                Ok(())
            }
            code => {
                self.state.payload_len = u64::from(code);
                self.header_complete()
            }
        }
    }

    fn parse_extended_len(&mut self, byte: u8) -> Result<()> {
        self.state.payload_len = (self.state.payload_len << 8) | u64::from(byte);
        self.state.len_bytes_left -= 1;
        if self.state.len_bytes_left == 0 {
            self.header_complete()
        } else {
            Ok(())
        }
    }

    /// Runs once the declared payload length is fully known: validates the
    /// header as a whole and selects the next field.
    fn header_complete(&mut self) -> Result<()> {
        if self.state.opcode.is_control() {
            if !self.state.fin {
                return Err(Error::ControlFrameFragmented);
            }
            if self.state.payload_len > 125 {
                return Err(Error::ControlFrameTooLarge);
            }
        }

        let too_large = usize::try_from(self.state.payload_len)
            .map(|len| len > self.max_payload)
            .unwrap_or(true);
        if too_large {
            return Err(Error::FrameTooLarge);
        }

        self.state.field = if self.state.masked {
            NextField::MaskingKey
        } else {
            NextField::Payload
        };
        Ok(())
    }

    /// Flattens (and unmasks) the accumulated payload and emits the frame,
    /// resetting the parse state for the next one.
    fn complete(&mut self) -> Result<Frame> {
        let state = std::mem::replace(&mut self.state, ParseState::new());

        let payload = if state.masked {
            let mut buf = BytesMut::with_capacity(state.payload.len());
            for seg in state.payload.segments() {
                buf.extend_from_slice(seg);
            }
            mask::apply_mask(&mut buf, state.mask_key);
            buf.freeze()
        } else {
            state.payload.materialize()
        };

        let close = if state.opcode == OpCode::Close {
            Close::parse(&payload)?
        } else {
            None
        };

        #[cfg(feature = "logging")]
        log::trace!(
            "decoded frame opcode={:?} fin={} payload_len={}",
            state.opcode,
            state.fin,
            payload.len()
        );

        Ok(Frame::new(state.fin, state.opcode, payload, close))
    }
}
