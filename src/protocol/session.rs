use std::io::{self, ErrorKind, Read, Write};

use log::{debug, info, warn};

use crate::crypto::SessionKeys;

use super::{BUFFER_SIZE, Header, MessageType, Pdu, build_response};

/// How a single step, or a whole session, ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep serving the current connection.
    Continue,
    /// The peer left, either on request or by closing the socket.
    ClientExited,
    /// The peer asked the whole server to stop.
    ServerShutdownRequested,
    /// The connection failed in a way that is not a plain disconnect.
    Error(ErrorKind),
}

/// Serves requests from one connected client until it leaves.
///
/// The session owns the connection's key slots; they start out null and are dropped
/// together with the session.
pub struct ClientSession<T: Read + Write> {
    stream: T,
    keys: SessionKeys,
    buffer: [u8; BUFFER_SIZE],
}

impl<T: Read + Write> ClientSession<T> {
    pub fn new(stream: T) -> Self {
        Self {
            stream,
            keys: SessionKeys::default(),
            buffer: [0; BUFFER_SIZE],
        }
    }

    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Runs the session to completion. Never returns [`Outcome::Continue`].
    pub fn run(mut self) -> Outcome {
        loop {
            match self.step() {
                Outcome::Continue => continue,
                outcome => return outcome,
            }
        }
    }

    /// Receives one request and answers it.
    ///
    /// A request that cannot be decoded or answered is dropped and the session carries on;
    /// the protocol has no way to report the failure to the client.
    pub fn step(&mut self) -> Outcome {
        let received = match self.receive() {
            Ok(0) => {
                info!("client disconnected");
                return Outcome::ClientExited;
            }
            Ok(n) => n,
            Err(e) => return read_failure(e),
        };
        let bytes = &self.buffer[..received];

        // Stop commands are honoured on the message type alone, even when the rest of
        // the header would not validate.
        let msg_type = match Header::peek_msg_type(bytes) {
            Ok(msg_type) => msg_type,
            Err(e) => {
                warn!("dropping request: {e}");
                return Outcome::Continue;
            }
        };

        if msg_type.is_control() {
            if msg_type == MessageType::ServerStop {
                info!("client requested server shutdown");
                return Outcome::ServerShutdownRequested;
            }
            info!("client is exiting");
            return Outcome::ClientExited;
        }

        let request = match Pdu::decode(bytes) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping request: {e}");
                return Outcome::Continue;
            }
        };
        debug!("received {}", request.info(&self.keys.server_key));

        let response = match build_response(&request, &mut self.keys) {
            Ok(response) => response,
            Err(e) => {
                warn!("failed to build response to {}: {e}", request.msg_type());
                return Outcome::Continue;
            }
        };
        debug!("sending {}", response.pdu.info(&self.keys.server_key));

        let bytes = match response.pdu.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("failed to encode response: {e}");
                return Outcome::Continue;
            }
        };

        if let Err(e) = self.send(&bytes) {
            warn!("failed to send response, client may have disconnected: {e}");
            return Outcome::ClientExited;
        }

        Outcome::Continue
    }

    fn receive(&mut self) -> io::Result<usize> {
        loop {
            match self.stream.read(&mut self.buffer) {
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                res => return res,
            }
        }
    }

    fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stream.write_all(bytes)?;
        self.stream.flush()
    }
}

fn read_failure(e: io::Error) -> Outcome {
    match e.kind() {
        // Only reachable when a read timeout was configured on the socket.
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            warn!("client idle past read timeout");
            Outcome::Error(e.kind())
        }
        _ => {
            warn!("error receiving from client: {e}");
            Outcome::ClientExited
        }
    }
}
