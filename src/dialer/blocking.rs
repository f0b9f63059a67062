use std::io;
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::types::{DialerConfig, Network, ProxyNetwork};
use crate::error::Error;
use crate::handshake::{self, Phase};
use crate::stream::ProxyStream;

/// Dials targets through a SOCKS5 proxy with blocking I/O.
///
/// Every [`dial`](Dialer::dial) opens its own proxy connection, so one
/// dialer can be shared freely between threads.
#[derive(Debug, Clone)]
pub struct Dialer {
    network: ProxyNetwork,
    address: Arc<str>,
    config: DialerConfig,
}

impl Dialer {
    /// `address` is `host:port` for the TCP family and a socket path for
    /// [`ProxyNetwork::Unix`].
    pub fn new(network: impl Into<ProxyNetwork>, address: impl Into<String>) -> Self {
        Self::with_config(network, address, DialerConfig::default())
    }

    pub fn with_config(
        network: impl Into<ProxyNetwork>,
        address: impl Into<String>,
        config: DialerConfig,
    ) -> Self {
        let address: String = address.into();
        Self {
            network: network.into(),
            address: Arc::from(address),
            config,
        }
    }

    pub fn proxy_address(&self) -> &str {
        &self.address
    }

    /// Opens a tunnel to `addr` (`host:port`) through the proxy.
    ///
    /// `network` names the kind of connection the caller wants and must be
    /// one of `tcp`, `tcp4` or `tcp6`.
    pub fn dial(&self, network: &str, addr: &str) -> Result<ProxyStream, Error> {
        network.parse::<Network>()?;

        let mut stream = self.open()?;
        if let Err(e) = self.negotiate(&mut stream, addr) {
            warn!("Closing connection to {} after failed handshake: {}", self.address, e);
            let _ = stream.shutdown(Shutdown::Both);
            return Err(e);
        }

        info!("Established tunnel to {} via {}", addr, self.address);
        Ok(stream)
    }

    fn open(&self) -> Result<ProxyStream, Error> {
        match self.network {
            ProxyNetwork::Tcp(network) => self.open_tcp(network),
            ProxyNetwork::Unix => self.open_unix(),
        }
    }

    #[cfg(unix)]
    fn open_unix(&self) -> Result<ProxyStream, Error> {
        self.config
            .socket_factory
            .create_unix_connection(Path::new(&*self.address))
            .map(ProxyStream::Unix)
            .map_err(|e| self.dial_error(e))
    }

    #[cfg(not(unix))]
    fn open_unix(&self) -> Result<ProxyStream, Error> {
        Err(self.dial_error(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )))
    }

    fn open_tcp(&self, network: Network) -> Result<ProxyStream, Error> {
        let addrs = resolve(network, &self.address).map_err(|e| self.dial_error(e))?;

        let mut last_err = None;
        for addr in addrs {
            match self
                .config
                .socket_factory
                .create_tcp_connection(addr, self.config.connect_timeout)
            {
                Ok(stream) => return Ok(ProxyStream::Tcp(stream)),
                Err(e) => last_err = Some(e),
            }
        }

        Err(self.dial_error(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {} address for proxy", network),
            )
        })))
    }

    fn negotiate(&self, stream: &mut ProxyStream, addr: &str) -> Result<(), Error> {
        let setup = |stream: &ProxyStream| -> io::Result<()> {
            stream.set_nodelay(self.config.nodelay)?;
            stream.set_read_timeout(self.config.io_timeout)?;
            stream.set_write_timeout(self.config.io_timeout)
        };
        setup(stream).map_err(|e| self.configure_error(e))?;

        handshake::connect(stream, addr, &self.address)?;

        if self.config.io_timeout.is_some() {
            stream
                .set_read_timeout(None)
                .and_then(|_| stream.set_write_timeout(None))
                .map_err(|e| self.configure_error(e))?;
        }
        Ok(())
    }

    fn configure_error(&self, source: io::Error) -> Error {
        Error::Io {
            phase: Phase::ConfigureStream,
            proxy: self.address.to_string(),
            source,
        }
    }

    fn dial_error(&self, source: io::Error) -> Error {
        Error::Dial {
            proxy: self.address.to_string(),
            source,
        }
    }
}

/// Builds a dial function for the proxy at `proxy_address`.
///
/// The returned closure has the `(network, addr)` shape HTTP clients expect
/// from a custom connector. `proxy_network` is `tcp`, `tcp4`, `tcp6` or
/// `unix`; an unsupported one is reported by every call.
pub fn make_dialer(
    proxy_network: &str,
    proxy_address: &str,
) -> impl Fn(&str, &str) -> Result<ProxyStream, Error> + Send + Sync + Clone {
    let dialer = proxy_network
        .parse::<ProxyNetwork>()
        .map(|network| Dialer::new(network, proxy_address))
        .map_err(|_| proxy_network.to_string());

    move |network: &str, addr: &str| match &dialer {
        Ok(dialer) => dialer.dial(network, addr),
        Err(proxy_network) => Err(Error::UnsupportedNetwork {
            network: proxy_network.clone(),
        }),
    }
}

fn resolve(network: Network, address: &str) -> io::Result<Vec<SocketAddr>> {
    Ok(address
        .to_socket_addrs()?
        .filter(|addr| network.accepts(addr))
        .collect())
}
