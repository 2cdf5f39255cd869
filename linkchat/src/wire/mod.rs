//! Wire format for the Link-Chat protocol.
//!
//! This module contains the three byte-level layers:
//! - Ethernet II framing for the private EtherType
//! - The fixed 10-byte Link-Chat header
//! - The CRC-32 payload trailer carried by data fragments

mod crc;
mod frame;
mod header;

pub use self::crc::{CRC_LEN, append_crc, checksum, verify_and_strip};
pub use frame::{ETHER_HEADER_LEN, ETHERTYPE, EtherFrame, MacAddr, build_frame, parse_frame};
pub use header::{Flags, HEADER_LEN, Header, MsgType};
