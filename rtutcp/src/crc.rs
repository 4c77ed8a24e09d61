//! CRC-16/MODBUS checksum used to seal RTU request frames.
//!
//! On the wire the checksum follows the frame low byte first.
//!
//! # Example
//!
//! ```rust
//! use rtutcp::Crc16;
//!
//! let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
//! assert_eq!(Crc16::compute(&frame).to_le_bytes(), [0x84, 0x0a]);
//! ```

use ::crc::{Crc, CRC_16_MODBUS};

const CRC_MODBUS: Crc<u16> = Crc::<u16>::new(&CRC_16_MODBUS);

/// CRC-16/MODBUS helpers.
#[derive(Debug, Clone, Copy)]
pub struct Crc16;

impl Crc16 {
    /// Computes the checksum of `data`.
    #[inline]
    pub fn compute(data: &[u8]) -> u16 {
        CRC_MODBUS.checksum(data)
    }

    /// Returns true if the last two bytes of `frame` are the checksum of the
    /// bytes before them.
    pub fn verify_frame(frame: &[u8]) -> bool {
        if frame.len() < 2 {
            return false;
        }
        let (body, tail) = frame.split_at(frame.len() - 2);
        Self::compute(body).to_le_bytes() == [tail[0], tail[1]]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(Crc16::compute(b"123456789"), 0x4B37);
        assert_eq!(Crc16::compute(&[]), 0xFFFF);
    }

    #[test]
    fn test_modbus_request() {
        let frame = [0x01, 0x03, 0x00, 0x00, 0x00, 0x01];
        assert_eq!(Crc16::compute(&frame).to_le_bytes(), [0x84, 0x0A]);
    }

    #[test]
    fn test_verify_frame() {
        assert!(Crc16::verify_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x84, 0x0A]));
        assert!(!Crc16::verify_frame(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x01, 0x0A, 0x84]));
        assert!(!Crc16::verify_frame(&[0x01]));
    }
}
