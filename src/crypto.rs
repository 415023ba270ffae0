//! Session cipher used to protect echo payloads.
//!
//! This module provides the key material and the symmetric transforms that back the
//! `ENCRYPTED_DATA` message type. It is a toy cipher: a repeating key stream XORed over
//! the payload. It offers no confidentiality against anyone who looks at the traffic and
//! exists only so the protocol has a session to establish and tear down.
//!
//! # Overview
//!
//! A [`generate_key_pair`] call produces a `(server_key, client_key)` pair. Anything one
//! key encrypts, the other key of the same pair decrypts, and every key decrypts its own
//! ciphertext. Keys from different calls are unrelated.
//!
//! The all-zero key is reserved as the null sentinel ([`CryptoKey::NULL`]) and means "no
//! session established yet". Both transforms refuse to run with it.
//!
//! # See Also
//!
//! - [`protocol`](crate::protocol): Message types that carry keys and ciphertext.
use std::fmt;

use rand::Rng;
use thiserror::Error;

use crate::protocol::MAX_PAYLOAD;

/// Size in bytes of a [`CryptoKey`] on the wire.
pub const KEY_SIZE: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("no session key established")]
    NullKey,

    #[error("input of {len} bytes exceeds maximum payload of {max} bytes", max = MAX_PAYLOAD)]
    TooLarge { len: usize },

    #[error("invalid key length {0}, expected {size} bytes", size = KEY_SIZE)]
    InvalidKeyLength(usize),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyGenError {
    #[error("generated key collides with the null key")]
    Degenerate,
}

/// Symmetric key for a single connection.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct CryptoKey([u8; KEY_SIZE]);

impl CryptoKey {
    /// Sentinel for "no key established yet".
    pub const NULL: CryptoKey = CryptoKey([0; KEY_SIZE]);

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Byte of the key stream at `position`.
    ///
    /// The key is cycled, and every full cycle is offset by its index so that
    /// long runs of identical plaintext do not repeat with period `KEY_SIZE`.
    fn stream_byte(&self, position: usize) -> u8 {
        let cycle = (position / KEY_SIZE) as u8;
        self.0[position % KEY_SIZE].wrapping_add(cycle)
    }
}

impl TryFrom<&[u8]> for CryptoKey {
    type Error = CryptoError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; KEY_SIZE] = value
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyLength(value.len()))?;
        Ok(Self(bytes))
    }
}

// Keys end up in debug logs; only a short fingerprint is printed.
impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "CryptoKey(null)");
        }
        write!(f, "CryptoKey({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// The two key slots a connection owns.
///
/// Both start out as [`CryptoKey::NULL`] and are replaced together on every key exchange.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionKeys {
    /// Used by the server to decrypt client ciphertext and encrypt its replies.
    pub server_key: CryptoKey,
    /// Handed to the client during the key exchange.
    pub client_key: CryptoKey,
}

impl SessionKeys {
    pub fn is_established(&self) -> bool {
        !self.server_key.is_null()
    }
}

/// Produces a fresh `(server_key, client_key)` pair.
pub fn generate_key_pair() -> Result<(CryptoKey, CryptoKey), KeyGenError> {
    let mut material = [0u8; KEY_SIZE];
    rand::rng().fill(&mut material);

    let key = CryptoKey(material);
    if key.is_null() {
        return Err(KeyGenError::Degenerate);
    }

    // Both halves share the same stream; the pair is symmetric.
    Ok((key, key))
}

pub fn encrypt(key: &CryptoKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    apply_stream(key, plaintext)
}

pub fn decrypt(key: &CryptoKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    apply_stream(key, ciphertext)
}

fn apply_stream(key: &CryptoKey, input: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if key.is_null() {
        return Err(CryptoError::NullKey);
    }
    if input.len() > MAX_PAYLOAD {
        return Err(CryptoError::TooLarge { len: input.len() });
    }

    Ok(input
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ key.stream_byte(i))
        .collect())
}
