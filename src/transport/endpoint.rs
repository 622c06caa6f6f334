// ────────────────────────────────
// src/transport/endpoint.rs
// One connect/write/read-to-close session against a stats socket.
// ────────────────────────────────
use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

/// Something that can run a single command session.
///
/// Every call opens a fresh connection, writes `command` followed by a
/// newline and returns everything the peer sent before closing.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn exchange(&self, command: &str) -> io::Result<String>;

    /// Human readable location, used in logs, errors and metric labels.
    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct UnixEndpoint {
    path: PathBuf,
}

impl UnixEndpoint {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Endpoint for UnixEndpoint {
    async fn exchange(&self, command: &str) -> io::Result<String> {
        let stream = UnixStream::connect(&self.path).await?;
        exchange_over(stream, command).await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct TcpEndpoint {
    addr: String,
}

impl TcpEndpoint {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl From<SocketAddr> for TcpEndpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.to_string())
    }
}

#[async_trait]
impl Endpoint for TcpEndpoint {
    async fn exchange(&self, command: &str) -> io::Result<String> {
        let stream = TcpStream::connect(self.addr.as_str()).await?;
        exchange_over(stream, command).await
    }

    fn describe(&self) -> String {
        self.addr.clone()
    }
}

/// Write the command, half-close, and read until the peer closes.
async fn exchange_over<S>(mut stream: S, command: &str) -> io::Result<String>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut line = String::with_capacity(command.len() + 1);
    line.push_str(command);
    line.push('\n');

    stream.write_all(line.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
