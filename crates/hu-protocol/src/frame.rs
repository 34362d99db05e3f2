//! Message header encoding/decoding
//!
//! The header is six little-endian u32 words (24 bytes):
//! - command
//! - arg0
//! - arg1
//! - data_length
//! - data_crc32 (byte sum of the payload, 0 when skipped)
//! - magic (command ^ 0xFFFFFFFF)

use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;
use crate::message::Command;

/// Size of the message header in bytes
pub const HEADER_SIZE: usize = 24;

/// Maximum payload size we announce and accept (256KB)
pub const MAX_PAYLOAD_SIZE: usize = 256 * 1024;

/// Message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Command word
    pub command: Command,
    /// First argument
    pub arg0: u32,
    /// Second argument
    pub arg1: u32,
    /// Length of the payload in bytes
    pub data_length: u32,
    /// Payload checksum
    pub data_check: u32,
}

impl MessageHeader {
    /// Create a new header
    pub fn new(command: Command, arg0: u32, arg1: u32, data_length: u32, data_check: u32) -> Self {
        Self {
            command,
            arg0,
            arg1,
            data_length,
            data_check,
        }
    }

    /// Encode the header into a byte buffer
    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.command.as_u32());
        dst.put_u32_le(self.arg0);
        dst.put_u32_le(self.arg1);
        dst.put_u32_le(self.data_length);
        dst.put_u32_le(self.data_check);
        dst.put_u32_le(self.command.magic());
    }

    /// Decode a header from a byte buffer
    ///
    /// Returns None if there aren't enough bytes in the buffer.
    /// Returns Err if the command word or magic is invalid.
    pub fn decode(src: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        // Validate before consuming anything
        let word = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        let magic = u32::from_le_bytes([src[20], src[21], src[22], src[23]]);
        let command = Command::from_u32(word).ok_or(ProtocolError::UnknownCommand(word))?;
        if magic != command.magic() {
            return Err(ProtocolError::InvalidMagic { command: word });
        }

        let _ = src.get_u32_le(); // command already parsed
        let arg0 = src.get_u32_le();
        let arg1 = src.get_u32_le();
        let data_length = src.get_u32_le();
        let data_check = src.get_u32_le();
        let _ = src.get_u32_le(); // magic already checked

        Ok(Some(Self {
            command,
            arg0,
            arg1,
            data_length,
            data_check,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = MessageHeader::new(Command::Write, 3, 9, 12345, 678);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        header.encode(&mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);

        let decoded = MessageHeader::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, header);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_header_layout_is_little_endian() {
        let header = MessageHeader::new(Command::Connect, 0x0100_0001, 4096, 0, 0);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        assert_eq!(&buf[0..4], b"CNXN");
        assert_eq!(&buf[4..8], &[0x01, 0x00, 0x00, 0x01]);
        assert_eq!(&buf[20..24], &(Command::Connect.as_u32() ^ 0xFFFF_FFFF).to_le_bytes());
    }

    #[test]
    fn test_insufficient_bytes() {
        let mut buf = BytesMut::from(&[0u8; 10][..]);
        let result = MessageHeader::decode(&mut buf).unwrap();
        assert!(result.is_none());
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_unknown_command() {
        let mut buf = BytesMut::from(&[0xEEu8; HEADER_SIZE][..]);
        let result = MessageHeader::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnknownCommand(0xEEEE_EEEE))));
    }

    #[test]
    fn test_bad_magic() {
        let header = MessageHeader::new(Command::Okay, 1, 2, 0, 0);
        let mut buf = BytesMut::new();
        header.encode(&mut buf);
        buf[23] ^= 0x01;

        let result = MessageHeader::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::InvalidMagic { .. })));
    }
}
