//! Close status codes and close-frame payload decoding per
//! [RFC 6455 Section 7.4](https://datatracker.ietf.org/doc/html/rfc6455#section-7.4).
//!
//! A Close frame's payload is either empty or carries a 2-byte big-endian
//! status code, optionally followed by a UTF-8 reason. [`Close::parse`]
//! decodes and validates that layout; [`CloseCode`] maps the numeric codes to
//! their protocol meaning.

use crate::{Error, Result};

/// Status code carried by a Close frame.
///
/// The named variants cover the codes defined in RFC 6455 Section 7.4.1.
/// Remaining ranges are kept as raw values: `Reserved` for unassigned
/// protocol-range codes, `Iana` for registered codes (3000-3999), `Library`
/// for private-use codes (4000-4999) and `Bad` for values that can never
/// legally appear on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CloseCode {
    /// 1000: normal closure, the purpose for which the connection was
    /// established has been fulfilled.
    Normal,
    /// 1001: the endpoint is going away (server shutdown, page navigation).
    Away,
    /// 1002: the endpoint received a frame that violates the protocol.
    Protocol,
    /// 1003: the endpoint cannot accept the received data type.
    Unsupported,
    /// 1005: reserved, indicates no status code was present. Must not be
    /// sent in a Close frame.
    Status,
    /// 1006: reserved, indicates the connection dropped without a Close
    /// frame. Must not be sent in a Close frame.
    Abnormal,
    /// 1007: a payload was inconsistent with its type (e.g. non-UTF-8 text).
    Invalid,
    /// 1008: a message violated the endpoint's policy.
    Policy,
    /// 1009: a message was too big to process.
    Size,
    /// 1010: the client expected an extension the server did not negotiate.
    Extension,
    /// 1011: the server encountered an unexpected condition.
    Error,
    /// 1012: the service is restarting.
    Restart,
    /// 1013: try again later, e.g. the server is overloaded.
    Again,
    /// 1015: reserved, indicates a TLS handshake failure. Must not be sent
    /// in a Close frame.
    Tls,
    /// Unassigned codes in the protocol range (1000-2999).
    Reserved(u16),
    /// Codes registered with IANA for libraries, frameworks and
    /// applications (3000-3999).
    Iana(u16),
    /// Private-use codes (4000-4999).
    Library(u16),
    /// Values outside every legal range.
    Bad(u16),
}

impl CloseCode {
    /// Returns `true` if the code may appear in a Close frame on the wire.
    ///
    /// Reserved codes (1004-1006, 1015, unassigned protocol-range values)
    /// and out-of-range values are not allowed; receiving one is a protocol
    /// violation.
    pub fn is_allowed(self) -> bool {
        !matches!(
            self,
            CloseCode::Bad(_)
                | CloseCode::Reserved(_)
                | CloseCode::Status
                | CloseCode::Abnormal
                | CloseCode::Tls
        )
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::Away => 1001,
            CloseCode::Protocol => 1002,
            CloseCode::Unsupported => 1003,
            CloseCode::Status => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::Invalid => 1007,
            CloseCode::Policy => 1008,
            CloseCode::Size => 1009,
            CloseCode::Extension => 1010,
            CloseCode::Error => 1011,
            CloseCode::Restart => 1012,
            CloseCode::Again => 1013,
            CloseCode::Tls => 1015,
            CloseCode::Reserved(code)
            | CloseCode::Iana(code)
            | CloseCode::Library(code)
            | CloseCode::Bad(code) => code,
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => CloseCode::Normal,
            1001 => CloseCode::Away,
            1002 => CloseCode::Protocol,
            1003 => CloseCode::Unsupported,
            1005 => CloseCode::Status,
            1006 => CloseCode::Abnormal,
            1007 => CloseCode::Invalid,
            1008 => CloseCode::Policy,
            1009 => CloseCode::Size,
            1010 => CloseCode::Extension,
            1011 => CloseCode::Error,
            1012 => CloseCode::Restart,
            1013 => CloseCode::Again,
            1015 => CloseCode::Tls,
            1000..=2999 => CloseCode::Reserved(code),
            3000..=3999 => CloseCode::Iana(code),
            4000..=4999 => CloseCode::Library(code),
            _ => CloseCode::Bad(code),
        }
    }
}

/// The decoded payload of a Close frame: a status code plus an optional
/// human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Close {
    /// The close status code.
    pub code: CloseCode,
    /// The UTF-8 reason text; empty when the peer sent none.
    pub reason: String,
}

impl Close {
    /// Decodes an unmasked Close payload.
    ///
    /// Returns `Ok(None)` for an empty payload (a bare Close carries no
    /// status). A 1-byte payload, a disallowed status code, or a non-UTF-8
    /// reason are protocol errors.
    pub fn parse(payload: &[u8]) -> Result<Option<Close>> {
        match payload.len() {
            0 => Ok(None),
            1 => Err(Error::InvalidCloseFrame),
            _ => {
                let code =
                    CloseCode::from(u16::from_be_bytes([payload[0], payload[1]]));
                if !code.is_allowed() {
                    return Err(Error::InvalidCloseCode);
                }
                let reason = std::str::from_utf8(&payload[2..])
                    .map_err(|_| Error::InvalidUtf8)?
                    .to_owned();
                Ok(Some(Close { code, reason }))
            }
        }
    }
}
