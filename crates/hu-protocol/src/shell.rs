//! Shell protocol v2 packets
//!
//! With the `shell_v2` feature the bytes carried in `WRTE` payloads are a
//! second layer of framing: `id: u8, length: u32 (LE), data`. Packets may
//! span several `WRTE` messages, so decoding works on an accumulating buffer.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;

/// Shell packet header size (id + length)
pub const SHELL_HEADER_SIZE: usize = 5;

/// Shell packet identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShellPacketId {
    /// Data for the remote process's stdin
    Stdin = 0,
    /// Remote stdout
    Stdout = 1,
    /// Remote stderr
    Stderr = 2,
    /// Exit status (one byte)
    Exit = 3,
    /// Close remote stdin
    CloseStdin = 4,
    /// Terminal resize
    WindowSizeChange = 5,
}

impl ShellPacketId {
    /// Convert from the raw id byte
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Stdin),
            1 => Some(Self::Stdout),
            2 => Some(Self::Stderr),
            3 => Some(Self::Exit),
            4 => Some(Self::CloseStdin),
            5 => Some(Self::WindowSizeChange),
            _ => None,
        }
    }
}

/// One shell protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellPacket {
    /// Packet kind
    pub id: ShellPacketId,
    /// Packet body
    pub data: Bytes,
}

impl ShellPacket {
    /// Create a packet
    pub fn new(id: ShellPacketId, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            data: data.into(),
        }
    }

    /// Exit status carried by an `Exit` packet
    pub fn exit_code(&self) -> Option<i32> {
        match self.id {
            ShellPacketId::Exit => self.data.first().map(|code| *code as i32),
            _ => None,
        }
    }
}

/// Decoder/encoder for shell v2 packets
#[derive(Debug, Default)]
pub struct ShellPacketDecoder;

impl ShellPacketDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for ShellPacketDecoder {
    type Item = ShellPacket;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < SHELL_HEADER_SIZE {
            return Ok(None);
        }

        let id = ShellPacketId::from_u8(src[0]).ok_or(ProtocolError::UnknownShellPacket(src[0]))?;
        let len = u32::from_le_bytes([src[1], src[2], src[3], src[4]]) as usize;

        if src.len() < SHELL_HEADER_SIZE + len {
            return Ok(None);
        }

        src.advance(SHELL_HEADER_SIZE);
        let data = src.split_to(len).freeze();

        Ok(Some(ShellPacket { id, data }))
    }
}

impl Encoder<ShellPacket> for ShellPacketDecoder {
    type Error = ProtocolError;

    fn encode(&mut self, packet: ShellPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(SHELL_HEADER_SIZE + packet.data.len());
        dst.put_u8(packet.id as u8);
        dst.put_u32_le(packet.data.len() as u32);
        dst.extend_from_slice(&packet.data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_all(packets: Vec<ShellPacket>) -> BytesMut {
        let mut codec = ShellPacketDecoder::new();
        let mut buf = BytesMut::new();
        for p in packets {
            codec.encode(p, &mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn test_decode_stdout_then_exit() {
        let mut buf = encode_all(vec![
            ShellPacket::new(ShellPacketId::Stdout, Bytes::from("uid=2000(shell)\n")),
            ShellPacket::new(ShellPacketId::Exit, Bytes::from_static(&[0])),
        ]);

        let mut codec = ShellPacketDecoder::new();
        let out = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(out.id, ShellPacketId::Stdout);
        assert_eq!(&out.data[..], b"uid=2000(shell)\n");

        let exit = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(exit.exit_code(), Some(0));
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_packet_split_across_writes() {
        let full = encode_all(vec![ShellPacket::new(
            ShellPacketId::Stderr,
            Bytes::from("Permission denied"),
        )]);

        let mut codec = ShellPacketDecoder::new();
        let mut buf = BytesMut::from(&full[..7]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&full[7..]);
        let packet = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(packet.id, ShellPacketId::Stderr);
        assert_eq!(&packet.data[..], b"Permission denied");
    }

    #[test]
    fn test_exit_code_above_127() {
        let packet = ShellPacket::new(ShellPacketId::Exit, Bytes::from_static(&[255]));
        assert_eq!(packet.exit_code(), Some(255));
        let stdout = ShellPacket::new(ShellPacketId::Stdout, Bytes::from_static(&[3]));
        assert_eq!(stdout.exit_code(), None);
    }

    #[test]
    fn test_unknown_packet_id() {
        let mut buf = BytesMut::from(&[9u8, 0, 0, 0, 0][..]);
        let mut codec = ShellPacketDecoder::new();
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::UnknownShellPacket(9))
        ));
    }
}
