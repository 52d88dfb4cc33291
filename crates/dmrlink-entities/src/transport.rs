use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use tracing::debug;

/// Transport failure, surfaced to the caller as a connection error.
#[derive(Debug)]
pub enum NetworkError {
    ConnectionFailed(String),
    SendFailed(String),
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::ConnectionFailed(e) => write!(f, "connection failed: {}", e),
            NetworkError::SendFailed(e) => write!(f, "send failed: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

/// UDP transport to the network server.
pub struct UdpTransport {
    socket: UdpSocket,
    server_addr: SocketAddr,
}

impl UdpTransport {
    /// Resolve the server hostname and bind a local socket.
    pub fn connect(host: &str, port: u16) -> Result<Self, NetworkError> {
        let addr = format!("{}:{}", host, port);
        let server_addr = addr
            .to_socket_addrs()
            .map_err(|e| NetworkError::ConnectionFailed(format!("DNS resolve failed for '{}': {}", addr, e)))?
            .next()
            .ok_or_else(|| NetworkError::ConnectionFailed(format!("no addresses found for '{}'", addr)))?;

        debug!("UdpTransport: resolved {} -> {}", addr, server_addr);

        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| NetworkError::ConnectionFailed(format!("UDP bind failed: {}", e)))?;
        socket
            .set_read_timeout(Some(Duration::from_millis(100)))
            .map_err(|e| NetworkError::ConnectionFailed(format!("Failed to set timeout: {}", e)))?;

        Ok(Self { socket, server_addr })
    }

    pub fn send(&self, payload: &[u8]) -> Result<(), NetworkError> {
        self.socket
            .send_to(payload, self.server_addr)
            .map_err(|e| NetworkError::SendFailed(format!("UDP send failed: {}", e)))?;
        Ok(())
    }

    /// Drain all pending datagrams without blocking. Datagrams from other
    /// peers than the server are ignored.
    pub fn receive(&mut self) -> Vec<Vec<u8>> {
        let mut messages = Vec::new();

        if self.socket.set_nonblocking(true).is_err() {
            return messages;
        }

        loop {
            let mut buffer = vec![0u8; 2048];
            match self.socket.recv_from(&mut buffer) {
                Ok((len, addr)) => {
                    if addr != self.server_addr {
                        debug!("UdpTransport: ignoring datagram from {}", addr);
                        continue;
                    }
                    buffer.truncate(len);
                    messages.push(buffer);
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(_) => break,
            }
        }

        let _ = self.socket.set_nonblocking(false);
        messages
    }
}
