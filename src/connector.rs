//! Connector to a server.
//!
//! For more information, see the [`Connector`](Connector) trait.

use std::fmt::Debug;
use std::marker::Unpin;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::{Path, PathBuf};

use futures_core::future::BoxFuture;
use tokio::io::{self, AsyncRead, AsyncWrite};
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio::net::{lookup_host, TcpStream};

use crate::config::Address;

/// Connector to a server.
///
/// Servers accept connection in various way
/// including TCP and Unix domain socket.
/// A `Connector` should have enough information to connect to a certain server
/// and should be capable of producing multiple connections to it.
///
/// Used by the [`Client`](crate::Client) to establish its session lazily,
/// and again after [`Client::close()`](crate::Client::close).
pub trait Connector: Send + Sync {
    /// Connection stream this connector produces.
    type Stream: AsyncRead + AsyncWrite + Debug + Unpin + Send;

    /// Connect to the server and return the stream to it.
    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>>;
}

/// Any bidirectional stream a connector may produce.
pub trait Transport: AsyncRead + AsyncWrite + Debug + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Debug + Unpin + Send> Transport for T {}

/// TCP socket connector.
#[derive(Debug)]
pub struct TcpConnector {
    addr: SocketAddr,
}

/// Unix domain socket connector.
#[cfg(unix)]
#[derive(Debug)]
pub struct UnixConnector {
    path: PathBuf,
}

/// Connector to the [`Address`] of the config.
///
/// Host names are resolved on every connect.
#[derive(Debug, Clone)]
pub struct AddressConnector {
    address: Address,
}

/// DNS lookup error
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// IO error during DNS lookup
    #[error("IO error during DNS lookup")]
    Io(#[from] std::io::Error),
    /// DNS record is not found
    #[error("DNS record not found")]
    NotFound,
}

impl TcpConnector {
    /// Constructs a `TcpConnector` using IP address and port.
    pub fn new(addr: SocketAddr) -> Self {
        TcpConnector { addr }
    }

    /// Constructs a `TcpConnector` from a string representation of a socket address
    /// like `example.com:8080`, `localhost:6379`, or `192.168.0.7:18080`.
    pub async fn lookup(addr: &str) -> Result<Self, LookupError> {
        let addr = lookup_host(addr)
            .await?
            .next()
            .ok_or(LookupError::NotFound)?;
        Ok(TcpConnector::new(addr))
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(async move {
            let stream = TcpStream::connect(self.addr).await?;
            stream.set_nodelay(true)?;
            Ok(stream)
        })
    }
}

#[cfg(unix)]
impl UnixConnector {
    /// Constructs a `UnixConnector`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        UnixConnector {
            path: path.as_ref().to_owned(),
        }
    }
}

#[cfg(unix)]
impl Connector for UnixConnector {
    type Stream = UnixStream;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(UnixStream::connect(&self.path))
    }
}

impl AddressConnector {
    /// Constructs an `AddressConnector`.
    pub fn new(address: Address) -> Self {
        AddressConnector { address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

impl Connector for AddressConnector {
    type Stream = Box<dyn Transport>;

    fn connect(&self) -> BoxFuture<'_, io::Result<Self::Stream>> {
        Box::pin(async move {
            match &self.address {
                Address::Tcp { host, port } => {
                    let addr = if host.contains(':') {
                        format!("[{}]:{}", host, port)
                    } else {
                        format!("{}:{}", host, port)
                    };
                    let connector = TcpConnector::lookup(&addr).await?;
                    Ok(Box::new(connector.connect().await?) as Box<dyn Transport>)
                }
                #[cfg(unix)]
                Address::Unix(path) => {
                    let connector = UnixConnector::new(path);
                    Ok(Box::new(connector.connect().await?) as Box<dyn Transport>)
                }
                #[cfg(not(unix))]
                Address::Unix(_) => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix domain sockets are not supported on this platform",
                )),
            }
        })
    }
}

impl From<LookupError> for io::Error {
    fn from(err: LookupError) -> Self {
        match err {
            LookupError::Io(err) => err,
            LookupError::NotFound => io::Error::new(io::ErrorKind::NotFound, err),
        }
    }
}
