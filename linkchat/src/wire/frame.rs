//! Ethernet II framing.
//!
//! A frame is the plain concatenation `dst(6) ‖ src(6) ‖ ethertype(2, BE)
//! ‖ payload`. Drivers pad frames below the 60-byte wire minimum; the
//! parsed payload therefore may carry trailing padding, and upper layers
//! bound it with the protocol header's `payload_len` field.

use core::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// EtherType identifying Link-Chat frames. Everything else is ignored.
pub const ETHERTYPE: u16 = 0x88B5;

/// Length of the Ethernet II header (dst + src + ethertype).
pub const ETHER_HEADER_LEN: usize = 14;

/// A 6-byte IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address.
    pub const BROADCAST: Self = Self([0xFF; 6]);

    /// Returns the raw octets.
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Returns true for the broadcast address.
    pub fn is_broadcast(&self) -> bool {
        *self == Self::BROADCAST
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or_else(|| Error::InvalidAddr(s.into()))?;
            *octet =
                u8::from_str_radix(part, 16).map_err(|_| Error::InvalidAddr(s.into()))?;
        }
        if parts.next().is_some() {
            return Err(Error::InvalidAddr(s.into()));
        }
        Ok(Self(octets))
    }
}

/// A parsed Ethernet II frame borrowing the input buffer.
#[derive(Debug, Clone, Copy)]
pub struct EtherFrame<'a> {
    /// Destination hardware address.
    pub dst: MacAddr,

    /// Source hardware address.
    pub src: MacAddr,

    /// EtherType field.
    pub ethertype: u16,

    /// Everything after the link header, including any driver padding.
    pub payload: &'a [u8],
}

/// Builds a full Ethernet II frame.
pub fn build_frame(dst: MacAddr, src: MacAddr, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(ETHER_HEADER_LEN + payload.len());
    frame.extend_from_slice(&dst.0);
    frame.extend_from_slice(&src.0);
    frame.extend_from_slice(&ethertype.to_be_bytes());
    frame.extend_from_slice(payload);
    frame
}

/// Splits a raw frame into its link-layer fields.
///
/// Fails when the input cannot hold the 14-byte link header.
pub fn parse_frame(buf: &[u8]) -> Result<EtherFrame<'_>> {
    if buf.len() < ETHER_HEADER_LEN {
        return Err(Error::FrameTooShort(buf.len()));
    }

    let mut dst = [0u8; 6];
    let mut src = [0u8; 6];
    dst.copy_from_slice(&buf[0..6]);
    src.copy_from_slice(&buf[6..12]);
    let ethertype = u16::from_be_bytes([buf[12], buf[13]]);

    Ok(EtherFrame {
        dst: MacAddr(dst),
        src: MacAddr(src),
        ethertype,
        payload: &buf[ETHER_HEADER_LEN..],
    })
}
