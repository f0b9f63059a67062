use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;

use super::socket_factory::{DefaultSocketFactory, SocketFactory};
use crate::error::Error;

/// Stream-oriented network kinds a dialer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Tcp,
    Tcp4,
    Tcp6,
}

impl Network {
    /// Whether a resolved proxy address belongs to this network.
    pub fn accepts(&self, addr: &SocketAddr) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => addr.is_ipv4(),
            Network::Tcp6 => addr.is_ipv6(),
        }
    }
}

impl FromStr for Network {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            other => Err(Error::UnsupportedNetwork {
                network: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        })
    }
}

/// How the proxy itself is reached: over the TCP family or a Unix socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyNetwork {
    Tcp(Network),
    Unix,
}

impl From<Network> for ProxyNetwork {
    fn from(network: Network) -> Self {
        ProxyNetwork::Tcp(network)
    }
}

impl FromStr for ProxyNetwork {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unix" => Ok(ProxyNetwork::Unix),
            other => other.parse().map(ProxyNetwork::Tcp),
        }
    }
}

impl fmt::Display for ProxyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyNetwork::Tcp(network) => network.fmt(f),
            ProxyNetwork::Unix => f.write_str("unix"),
        }
    }
}

#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DialerConfig {
    /// Bound on opening the TCP connection to the proxy.
    #[builder(default)]
    pub connect_timeout: Option<Duration>,
    /// Read/write timeout applied to a blocking stream while negotiating.
    #[builder(default)]
    pub io_timeout: Option<Duration>,
    /// Bound on the whole negotiation for async dials.
    #[builder(default = "Duration::from_secs(30)")]
    pub handshake_timeout: Duration,
    #[builder(default = "true")]
    pub nodelay: bool,
    #[builder(default = "DefaultSocketFactory::arc()")]
    pub socket_factory: Arc<dyn SocketFactory>,
}

impl DialerConfig {
    pub fn builder() -> DialerConfigBuilder {
        DialerConfigBuilder::default()
    }
}

impl Default for DialerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: None,
            io_timeout: None,
            handshake_timeout: Duration::from_secs(30),
            nodelay: true,
            socket_factory: DefaultSocketFactory::arc(),
        }
    }
}
