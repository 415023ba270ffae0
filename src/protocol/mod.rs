//! Client-server communication protocol.
//!
//! This module defines the binary protocol spoken between echo clients and the echo server:
//! the PDU format, the server-side dispatch of each message type, the per-connection session
//! loop, the sequential connection acceptor, and the client-side transport.
//!
//! # Overview
//!
//! A client opens one TCP connection and exchanges request/response PDUs with the server.
//! Plain `DATA` is echoed back with an `"echo "` prefix. A `KEY_EXCHANGE` establishes a
//! session key for the connection, after which `ENCRYPTED_DATA` is decrypted, echoed and
//! re-encrypted. Two control commands end the connection or the whole server; neither gets
//! a reply.
//!
//! Failed requests are dropped without a reply. The protocol has no error PDU.
//!
//! # Key Components
//!
//! - [`Pdu`]: A single protocol message, with its [`Header`].
//! - [`build_response`]: Maps a request and the connection's session keys to a reply.
//! - [`ClientSession`]: Serves one connection until it ends, producing an [`Outcome`].
//! - [`EchoServer`]: Accepts connections one at a time and runs a session for each.
//! - [`ProtocolTransport`] / [`CryptoClient`]: The client side of the conversation.
//!
//! # Binary Format
//!
//! Every PDU starts with a fixed 4-byte header, followed by the payload:
//!
//! - `direction` (1 byte): `0` request, `1` response.
//! - `msg_type` (1 byte): `0` key exchange, `1` data, `2` encrypted data,
//!   `3` client stop, `4` server stop.
//! - `payload_len` (2 bytes, big-endian): at most [`MAX_PAYLOAD`].
//!
//! A PDU is expected to arrive whole in a single read of [`BUFFER_SIZE`] bytes. Partial reads
//! are not reassembled.
//!
//! # See Also
//!
//! - [`crypto`](crate::crypto): The session cipher behind `ENCRYPTED_DATA`.
mod pdu;
mod response;
mod server;
mod session;
mod transport;

pub use pdu::{
    BUFFER_SIZE, DecodeError, Direction, HEADER_SIZE, Header, MAX_PAYLOAD, MessageType, Pdu,
    PduError, PduInfo,
};
pub use response::{BuildError, ECHO_PREFIX, Response, build_response};
pub use server::{DEFAULT_PORT, EchoServer, ServerConfig, ServerError};
pub use session::{ClientSession, Outcome};
pub use transport::{CryptoClient, ProtocolTransport, TransportError};
