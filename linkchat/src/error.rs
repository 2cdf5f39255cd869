//! Error types for the Link-Chat core.
//!
//! Errors caused by data off the wire are reported to the caller and
//! the offending frame is dropped; nothing here panics on wire input.

use thiserror::Error;

/// Result type alias for Link-Chat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the protocol core.
#[derive(Debug, Error)]
pub enum Error {
    /// Ethernet frame shorter than the 14-byte link header.
    #[error("ethernet frame too short: {0} bytes")]
    FrameTooShort(usize),

    /// Link-Chat header shorter than its fixed 10 bytes.
    #[error("link-chat header too short: {0} bytes")]
    HeaderTooShort(usize),

    /// Payload too short to carry the 4-byte CRC trailer.
    #[error("payload too short for a CRC trailer: {0} bytes")]
    CrcMissing(usize),

    /// Message type byte not assigned by the protocol.
    #[error("unknown message type {0:#04x}")]
    UnknownMsgType(u8),

    /// Hardware address string that does not parse as six hex octets.
    #[error("invalid hardware address {0:?}")]
    InvalidAddr(String),

    /// A send was requested with no destination available.
    #[error("no destination address set")]
    NoDestination,

    /// Empty payloads cannot be transferred.
    #[error("refusing to send an empty payload")]
    EmptyPayload,

    /// The link endpoint was closed.
    #[error("link closed")]
    LinkClosed,

    /// Underlying link I/O failure.
    #[error("link i/o: {0}")]
    Io(#[from] std::io::Error),
}
