//! Tokio codec for framed ADB messages

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{MessageHeader, MAX_PAYLOAD_SIZE};
use crate::message::{checksum, AdbMessage};

/// Codec for encoding/decoding ADB messages
#[derive(Debug)]
pub struct AdbCodec {
    /// Current header being decoded (if any)
    pending_header: Option<MessageHeader>,
    /// Largest payload accepted or sent
    max_payload: usize,
}

impl AdbCodec {
    /// Create a new codec with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload(MAX_PAYLOAD_SIZE)
    }

    /// Create a codec with a specific payload limit
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self {
            pending_header: None,
            max_payload,
        }
    }

    /// Payload limit currently enforced
    pub fn max_payload(&self) -> usize {
        self.max_payload
    }
}

impl Default for AdbCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for AdbCodec {
    type Item = AdbMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending_header.take() {
            Some(h) => h,
            None => match MessageHeader::decode(src)? {
                Some(h) => h,
                None => return Ok(None),
            },
        };

        let payload_len = header.data_length as usize;
        if payload_len > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload,
            });
        }

        if src.len() < payload_len {
            self.pending_header = Some(header);
            src.reserve(payload_len - src.len());
            return Ok(None);
        }

        let payload = src.split_to(payload_len).freeze();

        // Devices at ADB_VERSION and later send 0 here
        if header.data_check != 0 {
            let actual = checksum(&payload);
            if actual != header.data_check {
                return Err(ProtocolError::ChecksumMismatch {
                    expected: header.data_check,
                    actual,
                });
            }
        }

        Ok(Some(AdbMessage {
            command: header.command,
            arg0: header.arg0,
            arg1: header.arg1,
            payload,
        }))
    }
}

impl Encoder<AdbMessage> for AdbCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: AdbMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload_len = message.payload.len();
        if payload_len > self.max_payload {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len,
                max: self.max_payload,
            });
        }

        let header = MessageHeader::new(
            message.command,
            message.arg0,
            message.arg1,
            payload_len as u32,
            message.checksum(),
        );
        header.encode(dst);
        dst.extend_from_slice(&message.payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::HEADER_SIZE;
    use crate::message::Command;
    use crate::stream::StreamId;
    use bytes::Bytes;

    #[test]
    fn test_codec_write_message() {
        let mut codec = AdbCodec::new();

        let msg = AdbMessage::write(StreamId::new(1), StreamId::new(42), Bytes::from("Hello"));

        let mut buf = BytesMut::new();
        codec.encode(msg.clone(), &mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE + 5);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_codec_partial_read() {
        let mut codec = AdbCodec::new();

        let msg = AdbMessage::open(StreamId::new(3), "shell,v2,raw:echo 1");

        let mut full_buf = BytesMut::new();
        codec.encode(msg, &mut full_buf).unwrap();

        // Header complete, payload cut short
        let mut partial = full_buf.split_to(HEADER_SIZE + 4);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        partial.extend_from_slice(&full_buf);

        let decoded = codec.decode(&mut partial).unwrap().unwrap();
        assert_eq!(decoded.command, Command::Open);
        assert_eq!(&decoded.payload[..], b"shell,v2,raw:echo 1\0");
    }

    #[test]
    fn test_codec_rejects_bad_checksum() {
        let mut codec = AdbCodec::new();
        let msg = AdbMessage::write(StreamId::new(1), StreamId::new(2), Bytes::from("abc"));

        let mut buf = BytesMut::new();
        codec.encode(msg, &mut buf).unwrap();
        // Corrupt one payload byte
        let last = buf.len() - 1;
        buf[last] = b'z';

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_codec_accepts_zero_checksum() {
        let mut codec = AdbCodec::new();
        let mut buf = BytesMut::new();
        MessageHeader::new(Command::Write, 1, 2, 2, 0).encode(&mut buf);
        buf.extend_from_slice(b"ok");

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded.payload[..], b"ok");
    }

    #[test]
    fn test_codec_payload_limit() {
        assert_eq!(AdbCodec::new().max_payload(), MAX_PAYLOAD_SIZE);
        let mut codec = AdbCodec::with_max_payload(4);
        assert_eq!(codec.max_payload(), 4);
        let mut buf = BytesMut::new();
        MessageHeader::new(Command::Write, 1, 2, 5, 0).encode(&mut buf);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::PayloadTooLarge { size: 5, max: 4 })
        ));
    }
}
