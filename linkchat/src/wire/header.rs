//! The fixed Link-Chat protocol header.
//!
//! # Header format (10 bytes, network byte order)
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |            File ID            |        Total Fragments        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Fragment Index        |     Flags     |   Msg Type    |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |         Payload Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! `payload_len` counts the bytes that follow the header, including the
//! 4-byte CRC trailer on data-bearing fragments, and is 0 for ACK,
//! DISCOVERY, and REPLY messages.

use crate::error::{Error, Result};

/// Size of the packed header in bytes.
pub const HEADER_LEN: usize = 10;

/// Message type carried in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    /// Chat text.
    Chat = 1,

    /// One fragment of a binary transfer.
    FileChunk = 2,

    /// Acknowledgment of a single fragment.
    Ack = 3,

    /// Broadcast neighbor probe.
    Discovery = 4,

    /// Unicast answer to a probe.
    Reply = 5,
}

impl MsgType {
    /// Converts a wire byte to a message type.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Chat),
            2 => Some(Self::FileChunk),
            3 => Some(Self::Ack),
            4 => Some(Self::Discovery),
            5 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Flags(u8);

impl Flags {
    /// No flags set.
    pub const NONE: Self = Self(0);

    /// First fragment of a transfer.
    pub const IS_FIRST: Self = Self(1 << 0);

    /// Last fragment of a transfer.
    pub const IS_LAST: Self = Self(1 << 1);

    /// Retransmitted fragment. Reserved: retransmissions resend the
    /// cached frame byte-identical, so the bit is never set here.
    pub const RETRANS: Self = Self(1 << 2);

    /// Compressed payload. Reserved, unused.
    pub const COMPRESSED: Self = Self(1 << 3);

    /// Creates flags from a raw wire byte.
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Checks whether every bit of `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Sets the bits of `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears the bits of `other`.
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// The Link-Chat header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Transfer identifier; 0 is reserved for untracked frames.
    pub file_id: u16,

    /// Number of fragments in the transfer; 0 for control messages.
    pub total_frags: u16,

    /// Zero-based index of this fragment.
    pub frag_index: u16,

    /// Control flags.
    pub flags: Flags,

    /// Message type.
    pub msg_type: MsgType,

    /// Bytes of payload following the header, CRC trailer included.
    pub payload_len: u16,
}

impl Header {
    /// Builds a header-only control message (ACK / DISCOVERY / REPLY).
    pub const fn control(msg_type: MsgType, file_id: u16, frag_index: u16) -> Self {
        Self {
            file_id,
            total_frags: 0,
            frag_index,
            flags: Flags::NONE,
            msg_type,
            payload_len: 0,
        }
    }

    /// Packs the header into its 10-byte wire form.
    pub fn pack(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&self.file_id.to_be_bytes());
        buf[2..4].copy_from_slice(&self.total_frags.to_be_bytes());
        buf[4..6].copy_from_slice(&self.frag_index.to_be_bytes());
        buf[6] = self.flags.bits();
        buf[7] = self.msg_type as u8;
        buf[8..10].copy_from_slice(&self.payload_len.to_be_bytes());
        buf
    }

    /// Unpacks a header, returning it together with the remaining bytes.
    ///
    /// Fails when the input cannot hold the header or carries an
    /// unassigned message type.
    pub fn unpack(buf: &[u8]) -> Result<(Self, &[u8])> {
        if buf.len() < HEADER_LEN {
            return Err(Error::HeaderTooShort(buf.len()));
        }

        let msg_type = MsgType::from_u8(buf[7]).ok_or(Error::UnknownMsgType(buf[7]))?;
        let header = Self {
            file_id: u16::from_be_bytes([buf[0], buf[1]]),
            total_frags: u16::from_be_bytes([buf[2], buf[3]]),
            frag_index: u16::from_be_bytes([buf[4], buf[5]]),
            flags: Flags::from_bits(buf[6]),
            msg_type,
            payload_len: u16::from_be_bytes([buf[8], buf[9]]),
        };

        Ok((header, &buf[HEADER_LEN..]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = Header {
            file_id: 7,
            total_frags: 5,
            frag_index: 2,
            flags: Flags::IS_FIRST,
            msg_type: MsgType::Chat,
            payload_len: 10,
        };

        let mut buf = header.pack().to_vec();
        buf.extend_from_slice(b"XXXXXXXXXX");

        let (decoded, remainder) = Header::unpack(&buf).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(remainder, b"XXXXXXXXXX");
    }

    #[test]
    fn test_wire_layout() {
        // The 3-byte example transfer from the protocol definition.
        let header = Header {
            file_id: 7,
            total_frags: 1,
            frag_index: 0,
            flags: Flags::from_bits(0x03),
            msg_type: MsgType::FileChunk,
            payload_len: 7,
        };
        assert_eq!(
            header.pack(),
            [0x00, 0x07, 0x00, 0x01, 0x00, 0x00, 0x03, 0x02, 0x00, 0x07]
        );
    }

    #[test]
    fn test_short_header_rejected() {
        assert!(matches!(
            Header::unpack(&[0u8; 9]),
            Err(Error::HeaderTooShort(9))
        ));
    }

    #[test]
    fn test_unknown_msg_type_rejected() {
        let mut buf = Header::control(MsgType::Ack, 1, 0).pack();
        buf[7] = 0x77;
        assert!(matches!(
            Header::unpack(&buf),
            Err(Error::UnknownMsgType(0x77))
        ));
    }

    #[test]
    fn test_flag_operations() {
        let mut flags = Flags::NONE;
        flags.insert(Flags::IS_FIRST);
        flags.insert(Flags::IS_LAST);
        assert_eq!(flags.bits(), 0x03);
        assert!(flags.contains(Flags::IS_FIRST));

        flags.remove(Flags::IS_FIRST);
        assert!(!flags.contains(Flags::IS_FIRST));
        assert!(flags.contains(Flags::IS_LAST));
    }
}
