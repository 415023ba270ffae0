use std::{
    io,
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream},
    time::Duration,
};

use log::{error, info, warn};
use thiserror::Error;

use super::{ClientSession, Outcome};

pub const DEFAULT_PORT: u16 = 1234;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        source: io::Error,
    },
}

/// Process-level settings for [`EchoServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    /// Drop a client that stays silent this long. `None` or a zero duration waits forever.
    pub read_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            read_timeout: None,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// Sequential echo server: one client is served to completion before the next is accepted.
pub struct EchoServer {
    listener: TcpListener,
    read_timeout: Option<Duration>,
}

impl EchoServer {
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        let address = config.socket_addr();
        let listener =
            TcpListener::bind(address).map_err(|source| ServerError::Bind { address, source })?;

        // Sockets refuse a zero timeout, which would fail every connection.
        let read_timeout = config.read_timeout.filter(|timeout| !timeout.is_zero());

        Ok(Self {
            listener,
            read_timeout,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts and serves clients until one of them asks the server to stop.
    ///
    /// Returns the number of connections that were served.
    pub fn listen(self) -> usize {
        match self.local_addr() {
            Ok(address) => info!("listening at {address}"),
            Err(e) => warn!("listening at unknown address: {e}"),
        }

        let mut served = 0;
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("failed to accept connection: {e}");
                    continue;
                }
            };
            served += 1;

            match self.handle_connection(stream) {
                Outcome::ServerShutdownRequested => {
                    info!("server shutdown requested by client");
                    break;
                }
                Outcome::Error(kind) => error!("connection closed after error: {kind}"),
                Outcome::ClientExited | Outcome::Continue => info!("client connection closed"),
            }
        }

        served
    }

    fn handle_connection(&self, stream: TcpStream) -> Outcome {
        match stream.peer_addr() {
            Ok(peer) => info!("client connected from {peer}"),
            Err(e) => warn!("client connected from unknown address: {e}"),
        }

        if let Err(e) = stream.set_read_timeout(self.read_timeout) {
            warn!("failed to apply read timeout: {e}");
            return Outcome::Error(e.kind());
        }

        // The stream, and the session keys with it, are dropped when the session ends.
        ClientSession::new(stream).run()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        thread,
    };

    use crate::{
        crypto::{self, CryptoKey},
        protocol::{BUFFER_SIZE, MessageType, Pdu},
    };

    use super::*;

    fn local_server(read_timeout: Option<Duration>) -> (EchoServer, SocketAddr) {
        let config = ServerConfig {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            read_timeout,
        };
        let server = EchoServer::bind(&config).unwrap();
        let address = server.local_addr().unwrap();
        (server, address)
    }

    fn send(stream: &mut TcpStream, msg_type: MessageType, payload: &[u8]) {
        let pdu = Pdu::request(msg_type, payload.to_vec()).unwrap();
        stream.write_all(&pdu.encode().unwrap()).unwrap();
    }

    fn receive(stream: &mut TcpStream) -> Pdu {
        let mut buffer = [0; BUFFER_SIZE];
        let n = stream.read(&mut buffer).unwrap();
        Pdu::decode(&buffer[..n]).unwrap()
    }

    #[test]
    fn default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:1234");
        assert_eq!(config.read_timeout, None);
    }

    #[test]
    fn bind_failure_is_reported() {
        let (_server, address) = local_server(None);
        let config = ServerConfig {
            address: address.ip(),
            port: address.port(),
            read_timeout: None,
        };

        assert!(matches!(
            EchoServer::bind(&config),
            Err(ServerError::Bind { .. })
        ));
    }

    #[test]
    fn client_stop_keeps_server_running() {
        let (server, address) = local_server(None);
        let handle = thread::spawn(move || server.listen());

        let mut first = TcpStream::connect(address).unwrap();
        send(&mut first, MessageType::Data, b"ping");
        assert_eq!(receive(&mut first).payload(), b"echo ping");
        send(&mut first, MessageType::ClientStop, b"");

        let mut second = TcpStream::connect(address).unwrap();
        send(&mut second, MessageType::Data, b"pong");
        assert_eq!(receive(&mut second).payload(), b"echo pong");
        send(&mut second, MessageType::ServerStop, b"");

        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn disconnect_keeps_server_running() {
        let (server, address) = local_server(None);
        let handle = thread::spawn(move || server.listen());

        drop(TcpStream::connect(address).unwrap());

        let mut next = TcpStream::connect(address).unwrap();
        send(&mut next, MessageType::ServerStop, b"");

        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn sessions_do_not_share_keys() {
        let (server, address) = local_server(None);
        let handle = thread::spawn(move || server.listen());

        let mut first = TcpStream::connect(address).unwrap();
        send(&mut first, MessageType::KeyExchange, b"");
        let key = CryptoKey::try_from(receive(&mut first).payload()).unwrap();

        let ciphertext = crypto::encrypt(&key, b"hi").unwrap();
        send(&mut first, MessageType::EncryptedData, &ciphertext);
        let resp = receive(&mut first);
        assert_eq!(crypto::decrypt(&key, resp.payload()).unwrap(), b"echo hi");
        send(&mut first, MessageType::ClientStop, b"");

        // A new connection starts without a session, so the encrypted request is dropped
        // and the next reply belongs to the plain request.
        let mut second = TcpStream::connect(address).unwrap();
        send(&mut second, MessageType::EncryptedData, &ciphertext);
        thread::sleep(Duration::from_millis(50));
        send(&mut second, MessageType::Data, b"plain");
        let resp = receive(&mut second);
        assert_eq!(resp.msg_type(), MessageType::Data);
        assert_eq!(resp.payload(), b"echo plain");
        send(&mut second, MessageType::ServerStop, b"");

        assert_eq!(handle.join().unwrap(), 2);
    }

    #[test]
    fn zero_read_timeout_waits_forever() {
        let (server, address) = local_server(Some(Duration::ZERO));
        assert_eq!(server.read_timeout, None);
        let handle = thread::spawn(move || server.listen());

        let mut client = TcpStream::connect(address).unwrap();
        send(&mut client, MessageType::Data, b"ping");
        assert_eq!(receive(&mut client).payload(), b"echo ping");
        send(&mut client, MessageType::ServerStop, b"");

        assert_eq!(handle.join().unwrap(), 1);
    }

    #[test]
    fn idle_client_times_out() {
        let (server, address) = local_server(Some(Duration::from_millis(50)));
        let handle = thread::spawn(move || server.listen());

        let _idle = TcpStream::connect(address).unwrap();

        let mut next = TcpStream::connect(address).unwrap();
        send(&mut next, MessageType::ServerStop, b"");

        assert_eq!(handle.join().unwrap(), 2);
    }
}
