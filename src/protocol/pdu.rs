use std::fmt;

use bincode::{
    Decode, Encode,
    config::{BigEndian, Configuration, Fixint},
};
use thiserror::Error;

use crate::crypto::{self, CryptoKey};

/// Size of the fixed PDU header on the wire.
pub const HEADER_SIZE: usize = 4;
/// Size of one receive; a whole PDU has to fit in it.
pub const BUFFER_SIZE: usize = 1024;
/// Largest payload a single PDU can carry.
pub const MAX_PAYLOAD: usize = BUFFER_SIZE - HEADER_SIZE;

const MSG_TYPE_OFFSET: usize = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated pdu: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("unknown direction {0:#04x}")]
    UnknownDirection(u8),

    #[error("unknown message type {0:#04x}")]
    UnknownType(u8),

    #[error("payload length {0} exceeds maximum of {max}", max = MAX_PAYLOAD)]
    Oversized(usize),

    #[error("incomplete payload: header announced {expected} bytes, got {actual}")]
    IncompletePayload { expected: usize, actual: usize },

    #[error("malformed header: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum PduError {
    #[error("payload of {len} bytes exceeds maximum of {max}", max = MAX_PAYLOAD)]
    PayloadTooLarge { len: usize },

    #[error("failed to encode header: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl TryFrom<u8> for Direction {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(Direction::Request),
            0x1 => Ok(Direction::Response),
            other => Err(DecodeError::UnknownDirection(other)),
        }
    }
}

impl From<Direction> for u8 {
    fn from(value: Direction) -> Self {
        match value {
            Direction::Request => 0x0,
            Direction::Response => 0x1,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Request => write!(f, "REQUEST"),
            Direction::Response => write!(f, "RESPONSE"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    KeyExchange,
    Data,
    EncryptedData,
    ClientStop,
    ServerStop,
}

impl MessageType {
    /// Control commands change the connection lifecycle instead of carrying data.
    pub fn is_control(self) -> bool {
        matches!(self, MessageType::ClientStop | MessageType::ServerStop)
    }
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x0 => Ok(MessageType::KeyExchange),
            0x1 => Ok(MessageType::Data),
            0x2 => Ok(MessageType::EncryptedData),
            0x3 => Ok(MessageType::ClientStop),
            0x4 => Ok(MessageType::ServerStop),
            other => Err(DecodeError::UnknownType(other)),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::KeyExchange => 0x0,
            MessageType::Data => 0x1,
            MessageType::EncryptedData => 0x2,
            MessageType::ClientStop => 0x3,
            MessageType::ServerStop => 0x4,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageType::KeyExchange => "KEY_EXCHANGE",
            MessageType::Data => "DATA",
            MessageType::EncryptedData => "ENCRYPTED_DATA",
            MessageType::ClientStop => "CMD_CLIENT_STOP",
            MessageType::ServerStop => "CMD_SERVER_STOP",
        };
        write!(f, "{name}")
    }
}

/// Header exactly as it sits on the wire, before any field is validated.
#[derive(Debug, Encode, Decode)]
struct RawHeader {
    direction: u8,
    msg_type: u8,
    payload_len: u16,
}

fn wire_config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub direction: Direction,
    pub msg_type: MessageType,
    pub payload_len: u16,
}

impl Header {
    /// Reads only the message type, without validating the rest of the header.
    pub fn peek_msg_type(bytes: &[u8]) -> Result<MessageType, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        MessageType::try_from(bytes[MSG_TYPE_OFFSET])
    }

    /// Parses and validates the header at the start of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let (raw, _): (RawHeader, usize) =
            bincode::decode_from_slice(&bytes[..HEADER_SIZE], wire_config())
                .map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let direction = Direction::try_from(raw.direction)?;
        let msg_type = MessageType::try_from(raw.msg_type)?;
        if raw.payload_len as usize > MAX_PAYLOAD {
            return Err(DecodeError::Oversized(raw.payload_len as usize));
        }

        Ok(Self {
            direction,
            msg_type,
            payload_len: raw.payload_len,
        })
    }

    fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), PduError> {
        let raw = RawHeader {
            direction: self.direction.into(),
            msg_type: self.msg_type.into(),
            payload_len: self.payload_len,
        };
        bincode::encode_into_std_write(raw, out, wire_config())?;
        Ok(())
    }
}

/// One complete protocol message: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    header: Header,
    payload: Vec<u8>,
}

impl Pdu {
    pub fn new(
        direction: Direction,
        msg_type: MessageType,
        payload: Vec<u8>,
    ) -> Result<Self, PduError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(PduError::PayloadTooLarge { len: payload.len() });
        }

        Ok(Self {
            header: Header {
                direction,
                msg_type,
                payload_len: payload.len() as u16,
            },
            payload,
        })
    }

    pub fn request(msg_type: MessageType, payload: Vec<u8>) -> Result<Self, PduError> {
        Self::new(Direction::Request, msg_type, payload)
    }

    pub fn response(msg_type: MessageType, payload: Vec<u8>) -> Result<Self, PduError> {
        Self::new(Direction::Response, msg_type, payload)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn direction(&self) -> Direction {
        self.header.direction
    }

    pub fn msg_type(&self) -> MessageType {
        self.header.msg_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Header size plus payload length.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Decodes a PDU from the start of `bytes`. Bytes past the announced payload are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let header = Header::decode(bytes)?;
        let end = HEADER_SIZE + header.payload_len as usize;

        if bytes.len() < end {
            return Err(DecodeError::IncompletePayload {
                expected: header.payload_len as usize,
                actual: bytes.len() - HEADER_SIZE,
            });
        }

        Ok(Self {
            header,
            payload: bytes[HEADER_SIZE..end].to_vec(),
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, PduError> {
        let mut out = Vec::with_capacity(self.wire_size());
        self.header.encode_into(&mut out)?;
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Describes the PDU for logging, decrypting encrypted payloads when `key` allows it.
    pub fn info<'a>(&'a self, key: &'a CryptoKey) -> PduInfo<'a> {
        PduInfo { pdu: self, key }
    }
}

/// Log-friendly view of a [`Pdu`].
pub struct PduInfo<'a> {
    pdu: &'a Pdu,
    key: &'a CryptoKey,
}

impl fmt::Display for PduInfo<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pdu = self.pdu;
        write!(
            f,
            "[{}] {} len={}",
            pdu.direction(),
            pdu.msg_type(),
            pdu.header.payload_len
        )?;

        match pdu.msg_type() {
            MessageType::Data => {
                write!(f, " payload={:?}", String::from_utf8_lossy(pdu.payload()))
            }
            MessageType::EncryptedData => match crypto::decrypt(self.key, pdu.payload()) {
                Ok(plain) => write!(f, " decrypted={:?}", String::from_utf8_lossy(&plain)),
                Err(_) => write!(f, " ciphertext=<{} bytes>", pdu.payload().len()),
            },
            MessageType::KeyExchange if !pdu.payload().is_empty() => {
                write!(f, " key=<{} bytes>", pdu.payload().len())
            }
            _ => Ok(()),
        }
    }
}
