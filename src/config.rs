//! Client configuration.
//!
//! A [`Config`] is built once from the defaults and the [`Builder`] overrides,
//! and is immutable afterwards.
//!
//! ```
//! # use std::time::Duration;
//! # use pipedis::config::{Address, Config, ErrorPolicy};
//! let config = Config::builder()
//!     .server("unix:///run/redis.sock".parse()?)
//!     .timeout(Duration::from_secs(1))
//!     .build();
//! assert_eq!(Duration::from_secs(1), config.timeout());
//! assert_eq!(ErrorPolicy::Raise, config.error_policy());
//! assert_eq!("unix:///run/redis.sock", config.server().to_string());
//! # Ok::<_, pipedis::config::AddressError>(())
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// What to do with the error replies from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorPolicy {
    /// Return them as [`Error::Server`](crate::Error::Server).
    /// In a pipeline the first error reply fails the whole batch.
    Raise,
    /// Return them as values: [`Response::Failed`](crate::client::Response::Failed),
    /// or `Err` results within the [`Batch`](crate::pipeline::Batch).
    ReturnAsValue,
}

/// Location of the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Address {
    /// `tcp://host:port` or just `host:port`.
    Tcp { host: String, port: u16 },
    /// `unix:///path/to/socket`
    Unix(PathBuf),
}

/// Error from parsing an [`Address`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("port is missing")]
    MissingPort,
    #[error("invalid port `{0}`")]
    InvalidPort(String),
    #[error("host is empty")]
    EmptyHost,
    #[error("socket path is empty")]
    EmptyPath,
}

/// Immutable client configuration.
#[derive(Debug, Clone)]
pub struct Config {
    server: Address,
    timeout: Duration,
    error_policy: ErrorPolicy,
}

/// Builder of the [`Config`]. Unset options keep their defaults.
#[derive(Debug, Clone)]
pub struct Builder {
    config: Config,
}

pub const DEFAULT_PORT: u16 = 6379;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(100);

impl Default for ErrorPolicy {
    fn default() -> Self {
        ErrorPolicy::Raise
    }
}

impl Default for Address {
    fn default() -> Self {
        Address::Tcp {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = match s.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("tcp", s),
        };

        match scheme {
            "tcp" | "redis" => {
                let (host, port) = rest.rsplit_once(':').ok_or(AddressError::MissingPort)?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(AddressError::EmptyHost);
                }
                let port = port
                    .trim_end_matches('/')
                    .parse()
                    .map_err(|_| AddressError::InvalidPort(port.into()))?;
                Ok(Address::Tcp {
                    host: host.into(),
                    port,
                })
            }
            "unix" => {
                if rest.is_empty() {
                    return Err(AddressError::EmptyPath);
                }
                Ok(Address::Unix(rest.into()))
            }
            other => Err(AddressError::UnsupportedScheme(other.into())),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp { host, port } if host.contains(':') => write!(f, "tcp://[{}]:{}", host, port),
            Address::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            Address::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl Config {
    /// Create a config builder starting from the defaults.
    pub fn builder() -> Builder {
        Builder {
            config: Config::default(),
        }
    }

    /// Server to connect.
    pub fn server(&self) -> &Address {
        &self.server
    }

    /// Deadline of each connect, write and read.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }
}

impl Default for Config {
    /// `tcp://127.0.0.1:6379`, 100ms timeout, raise server errors.
    fn default() -> Self {
        Config {
            server: Address::default(),
            timeout: DEFAULT_TIMEOUT,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl Builder {
    pub fn server(mut self, server: Address) -> Self {
        self.config.server = server;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn error_policy(mut self, error_policy: ErrorPolicy) -> Self {
        self.config.error_policy = error_policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
