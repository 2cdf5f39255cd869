//! CRC-32 payload trailer.
//!
//! Data fragments carry a big-endian IEEE 802.3 CRC-32 of the payload
//! bytes, appended after the payload. The checksum never covers the
//! header, and retransmitted frames reuse the originally computed value.

use ::crc::{CRC_32_ISO_HDLC, Crc};

use crate::error::{Error, Result};

/// Length of the trailer in bytes.
pub const CRC_LEN: usize = 4;

/// IEEE 802.3 CRC-32, the algorithm zlib and `binascii.crc32` implement.
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Computes the CRC-32 of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

/// Returns `payload ‖ crc32(payload)`, checksum big-endian.
pub fn append_crc(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + CRC_LEN);
    out.extend_from_slice(payload);
    out.extend_from_slice(&checksum(payload).to_be_bytes());
    out
}

/// Splits a trailer-carrying payload into `(ok, payload)`.
///
/// `ok` is true iff the trailing four bytes equal the checksum of the
/// preceding bytes. Fails only when the input cannot hold a trailer.
pub fn verify_and_strip(data: &[u8]) -> Result<(bool, &[u8])> {
    if data.len() < CRC_LEN {
        return Err(Error::CrcMissing(data.len()));
    }

    let (payload, trailer) = data.split_at(data.len() - CRC_LEN);
    let received = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    Ok((checksum(payload) == received, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_value() {
        // The standard check vector for CRC-32/ISO-HDLC.
        assert_eq!(checksum(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_roundtrip() {
        let data = b"hello, segment";
        let with_crc = append_crc(data);
        let (ok, stripped) = verify_and_strip(&with_crc).unwrap();
        assert!(ok);
        assert_eq!(stripped, data);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let with_crc = append_crc(b"");
        assert_eq!(with_crc.len(), CRC_LEN);
        let (ok, stripped) = verify_and_strip(&with_crc).unwrap();
        assert!(ok);
        assert!(stripped.is_empty());
    }

    #[test]
    fn test_detects_single_byte_corruption() {
        let data = b"fragile bytes";
        let reference = append_crc(data);

        for i in 0..data.len() {
            let mut corrupted = reference.clone();
            corrupted[i] ^= 0xFF;
            let (ok, _) = verify_and_strip(&corrupted).unwrap();
            assert!(!ok, "corruption at byte {i} went undetected");
        }
    }

    #[test]
    fn test_too_short_input() {
        assert!(matches!(
            verify_and_strip(&[1, 2, 3]),
            Err(Error::CrcMissing(3))
        ));
    }
}
