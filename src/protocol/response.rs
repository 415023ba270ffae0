use thiserror::Error;

use crate::crypto::{self, CryptoError, KeyGenError, SessionKeys};

use super::{MessageType, Pdu, PduError};

/// Prefix the server puts in front of every echoed message.
pub const ECHO_PREFIX: &[u8] = b"echo ";

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("key generation failed: {0}")]
    KeyGen(#[from] KeyGenError),

    #[error("no session key established for encrypted data")]
    NoSessionKey,

    #[error("failed to decrypt request: {0}")]
    Decrypt(CryptoError),

    #[error("failed to encrypt response: {0}")]
    Encrypt(CryptoError),

    #[error("response does not fit: {0}")]
    Payload(#[from] PduError),
}

/// A response PDU ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub pdu: Pdu,
    /// Header size plus payload length.
    pub wire_size: usize,
}

impl From<Pdu> for Response {
    fn from(pdu: Pdu) -> Self {
        let wire_size = pdu.wire_size();
        Self { pdu, wire_size }
    }
}

fn echo(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ECHO_PREFIX.len() + message.len());
    out.extend_from_slice(ECHO_PREFIX);
    out.extend_from_slice(message);
    out
}

/// Builds the reply to `request`, updating the connection's session keys on key exchange.
///
/// The response always mirrors the request's message type. A key exchange replaces both
/// keys, so any earlier session on the connection stops decrypting.
pub fn build_response(request: &Pdu, keys: &mut SessionKeys) -> Result<Response, BuildError> {
    let payload = match request.msg_type() {
        MessageType::KeyExchange => {
            let (server_key, client_key) = crypto::generate_key_pair()?;
            keys.server_key = server_key;
            keys.client_key = client_key;

            // The client gets its own half of the pair back.
            keys.client_key.as_bytes().to_vec()
        }
        MessageType::Data => echo(request.payload()),
        MessageType::EncryptedData => {
            if !keys.is_established() {
                return Err(BuildError::NoSessionKey);
            }

            let plain =
                crypto::decrypt(&keys.server_key, request.payload()).map_err(BuildError::Decrypt)?;
            crypto::encrypt(&keys.server_key, &echo(&plain)).map_err(BuildError::Encrypt)?
        }
        MessageType::ClientStop | MessageType::ServerStop => Vec::new(),
    };

    let pdu = Pdu::response(request.msg_type(), payload)?;
    Ok(pdu.into())
}
