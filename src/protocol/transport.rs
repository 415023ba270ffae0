use std::io::{self, Read, Write};

use log::debug;
use thiserror::Error;

use crate::{
    Command,
    crypto::{self, CryptoError, CryptoKey},
};

use super::{BUFFER_SIZE, DecodeError, Direction, MessageType, Pdu, PduError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    Pdu(#[from] PduError),
    #[error("failed to decode response: {0}")]
    Decode(#[from] DecodeError),
    #[error("session cipher error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Transport IO Error: {0}")]
    Io(#[from] io::Error),
    #[error("server closed the connection")]
    ConnectionClosed,
    #[error("no session key; run a key exchange first")]
    NoSessionKey,
    #[error("expected {expected} response, got {direction} {actual}")]
    UnexpectedResponse {
        expected: MessageType,
        actual: MessageType,
        direction: Direction,
    },
}

/// Client side of the wire: writes request PDUs and reads one response PDU per read.
pub struct ProtocolTransport<T: Read + Write> {
    stream: T,
    buffer: [u8; BUFFER_SIZE],
}

impl<T: Read + Write> ProtocolTransport<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            buffer: [0; BUFFER_SIZE],
        }
    }

    pub fn write_request(&mut self, request: &Pdu) -> Result<(), TransportError> {
        self.stream.write_all(&request.encode()?)?;
        self.stream.flush()?;
        Ok(())
    }

    pub fn read_response(&mut self) -> Result<Pdu, TransportError> {
        let n = self.stream.read(&mut self.buffer)?;
        if n == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        Ok(Pdu::decode(&self.buffer[..n])?)
    }
}

/// Talks to an echo server, keeping the session key handed out by the last key exchange.
pub struct CryptoClient<T: Read + Write> {
    transport: ProtocolTransport<T>,
    key: CryptoKey,
}

impl<T: Read + Write> CryptoClient<T> {
    pub fn new(stream: T) -> Self {
        Self {
            transport: ProtocolTransport::new(stream),
            key: CryptoKey::NULL,
        }
    }

    pub fn key(&self) -> &CryptoKey {
        &self.key
    }

    fn exchange(&mut self, msg_type: MessageType, payload: Vec<u8>) -> Result<Pdu, TransportError> {
        let request = Pdu::request(msg_type, payload)?;
        debug!("sending {}", request.info(&self.key));
        self.transport.write_request(&request)?;

        let response = self.transport.read_response()?;
        debug!("received {}", response.info(&self.key));
        if response.direction() != Direction::Response || response.msg_type() != msg_type {
            return Err(TransportError::UnexpectedResponse {
                expected: msg_type,
                actual: response.msg_type(),
                direction: response.direction(),
            });
        }
        Ok(response)
    }

    /// Starts a new session, replacing any key from an earlier exchange.
    pub fn key_exchange(&mut self) -> Result<(), TransportError> {
        let response = self.exchange(MessageType::KeyExchange, Vec::new())?;
        self.key = CryptoKey::try_from(response.payload())?;
        Ok(())
    }

    pub fn send_data(&mut self, text: &str) -> Result<String, TransportError> {
        let response = self.exchange(MessageType::Data, text.as_bytes().to_vec())?;
        Ok(String::from_utf8_lossy(response.payload()).into_owned())
    }

    pub fn send_encrypted(&mut self, text: &str) -> Result<String, TransportError> {
        if self.key.is_null() {
            return Err(TransportError::NoSessionKey);
        }

        let ciphertext = crypto::encrypt(&self.key, text.as_bytes())?;
        let response = self.exchange(MessageType::EncryptedData, ciphertext)?;
        let plain = crypto::decrypt(&self.key, response.payload())?;
        Ok(String::from_utf8_lossy(&plain).into_owned())
    }

    /// Ends this client's connection. The server does not reply.
    pub fn stop_client(&mut self) -> Result<(), TransportError> {
        self.transport
            .write_request(&Pdu::request(MessageType::ClientStop, Vec::new())?)
    }

    /// Asks the server to shut down. The server does not reply.
    pub fn stop_server(&mut self) -> Result<(), TransportError> {
        self.transport
            .write_request(&Pdu::request(MessageType::ServerStop, Vec::new())?)
    }

    /// Runs a user command, returning the text to show for it, if any.
    pub fn execute(&mut self, command: Command) -> Result<Option<String>, TransportError> {
        match command {
            Command::KeyExchange => {
                self.key_exchange()?;
                Ok(Some(format!("session established, key {:?}", self.key)))
            }
            Command::Data(text) => self.send_data(&text).map(Some),
            Command::Encrypted(text) => self.send_encrypted(&text).map(Some),
            Command::ExitClient => self.stop_client().map(|_| None),
            Command::ExitServer => self.stop_server().map(|_| None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        io::{Cursor, Seek},
    };

    use crate::{
        crypto::SessionKeys,
        protocol::build_response,
    };

    use super::*;

    /// In-memory server: every write is answered the way the real session would.
    #[derive(Default)]
    struct LoopbackServer {
        muted: bool,
        keys: SessionKeys,
        replies: VecDeque<Vec<u8>>,
        requests: Vec<Pdu>,
    }

    impl Write for LoopbackServer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let request = Pdu::decode(buf).map_err(io::Error::other)?;
            if !self.muted && !request.msg_type().is_control() {
                if let Ok(response) = build_response(&request, &mut self.keys) {
                    self.replies.push_back(response.pdu.encode().unwrap());
                }
            }
            self.requests.push(request);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Read for LoopbackServer {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.replies.pop_front() {
                Some(reply) => {
                    buf[..reply.len()].copy_from_slice(&reply);
                    Ok(reply.len())
                }
                None => Ok(0),
            }
        }
    }

    #[test]
    fn read_write_request() {
        let stream = Cursor::new(Vec::new());
        let mut transport = ProtocolTransport::new(stream);
        let request = Pdu::request(MessageType::Data, b"ping".to_vec()).unwrap();

        transport.write_request(&request).unwrap();
        transport.stream.seek(io::SeekFrom::Start(0)).unwrap();
        let read = transport.read_response().unwrap();
        assert_eq!(read, request);
    }

    #[test]
    fn closed_connection() {
        let mut transport = ProtocolTransport::new(Cursor::new(Vec::new()));

        assert!(matches!(
            transport.read_response(),
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[test]
    fn plain_echo() {
        let mut client = CryptoClient::new(LoopbackServer::default());

        assert_eq!(client.send_data("ping").unwrap(), "echo ping");
    }

    #[test]
    fn encrypted_echo_after_key_exchange() {
        let mut client = CryptoClient::new(LoopbackServer::default());

        client.key_exchange().unwrap();
        assert!(!client.key().is_null());
        assert_eq!(client.send_encrypted("hi").unwrap(), "echo hi");

        let server = &client.transport.stream;
        assert_eq!(*client.key(), server.keys.client_key);
        let sent = &server.requests[1];
        assert_eq!(sent.msg_type(), MessageType::EncryptedData);
        assert_ne!(sent.payload(), b"hi");
    }

    #[test]
    fn encrypted_without_key() {
        let mut client = CryptoClient::new(LoopbackServer::default());

        assert!(matches!(
            client.send_encrypted("hi"),
            Err(TransportError::NoSessionKey)
        ));
        assert!(client.transport.stream.requests.is_empty());
    }

    #[test]
    fn stop_commands_expect_no_reply() {
        let mut client = CryptoClient::new(LoopbackServer::default());

        assert_eq!(client.execute(Command::ExitClient).unwrap(), None);
        assert_eq!(client.execute(Command::ExitServer).unwrap(), None);

        let kinds: Vec<_> = client
            .transport
            .stream
            .requests
            .iter()
            .map(Pdu::msg_type)
            .collect();
        assert_eq!(kinds, vec![MessageType::ClientStop, MessageType::ServerStop]);
    }

    #[test]
    fn mismatched_response_is_rejected() {
        let reply = Pdu::response(MessageType::KeyExchange, vec![1; 16])
            .unwrap()
            .encode()
            .unwrap();
        let server = LoopbackServer {
            muted: true,
            replies: VecDeque::from([reply]),
            ..Default::default()
        };
        let mut client = CryptoClient::new(server);

        assert!(matches!(
            client.send_data("ping"),
            Err(TransportError::UnexpectedResponse {
                expected: MessageType::Data,
                actual: MessageType::KeyExchange,
                direction: Direction::Response,
            })
        ));
    }

    #[test]
    fn execute_round_trip() {
        let mut client = CryptoClient::new(LoopbackServer::default());

        assert_eq!(
            client.execute(Command::Data("ping".into())).unwrap(),
            Some("echo ping".to_string())
        );
        assert!(client.execute(Command::KeyExchange).unwrap().is_some());
        assert_eq!(
            client.execute(Command::Encrypted("hi".into())).unwrap(),
            Some("echo hi".to_string())
        );
    }
}
