use std::io;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{error, info, warn};

use super::types::{DialerConfig, Network, ProxyNetwork};
use crate::error::Error;
use crate::handshake::{self, Phase};
use crate::stream::AsyncProxyStream;

/// Tokio flavour of [`Dialer`](super::Dialer).
#[derive(Debug, Clone)]
pub struct AsyncDialer {
    network: ProxyNetwork,
    address: Arc<str>,
    config: DialerConfig,
}

impl AsyncDialer {
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

    pub async fn dial(&self, network: &str, addr: &str) -> Result<AsyncProxyStream, Error> {
        network.parse::<Network>()?;

        let mut stream = self.open().await?;
        if let Err(e) = self.negotiate(&mut stream, addr).await {
            warn!("Closing connection to {} after failed handshake: {}", self.address, e);
            let _ = stream.shutdown().await;
            return Err(e);
        }

        info!("Established tunnel to {} via {}", addr, self.address);
        Ok(stream)
    }

    async fn open(&self) -> Result<AsyncProxyStream, Error> {
        match self.network {
            ProxyNetwork::Tcp(network) => self.open_tcp(network).await,
            ProxyNetwork::Unix => self.open_unix().await,
        }
    }

    #[cfg(unix)]
    async fn open_unix(&self) -> Result<AsyncProxyStream, Error> {
        let path = Path::new(&*self.address);
        let connect = self.config.socket_factory.create_async_unix_connection(path);
        self.with_connect_timeout(connect)
            .await
            .map(AsyncProxyStream::Unix)
            .map_err(|e| self.dial_error(e))
    }

    #[cfg(not(unix))]
    async fn open_unix(&self) -> Result<AsyncProxyStream, Error> {
        Err(self.dial_error(io::Error::new(
            io::ErrorKind::Unsupported,
            "unix sockets are not available on this platform",
        )))
    }

    async fn open_tcp(&self, network: Network) -> Result<AsyncProxyStream, Error> {
        let addrs = self.resolve(network).await.map_err(|e| self.dial_error(e))?;

        let mut last_err = None;
        for addr in addrs {
            let connect = self.config.socket_factory.create_async_tcp_connection(addr);
            match self.with_connect_timeout(connect).await {
                Ok(stream) => return Ok(AsyncProxyStream::Tcp(stream)),
                Err(e) => {
                    error!("Failed to connect to proxy {} at {}: {}", self.address, addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(self.dial_error(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no {} address for proxy", network),
            )
        })))
    }

    async fn with_connect_timeout<F, T>(&self, connect: F) -> io::Result<T>
    where
        F: std::future::Future<Output = io::Result<T>>,
    {
        match self.config.connect_timeout {
            Some(limit) => match timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "proxy connection timed out",
                )),
            },
            None => connect.await,
        }
    }

    async fn negotiate(&self, stream: &mut AsyncProxyStream, addr: &str) -> Result<(), Error> {
        stream
            .set_nodelay(self.config.nodelay)
            .map_err(|source| Error::Io {
                phase: Phase::ConfigureStream,
                proxy: self.address.to_string(),
                source,
            })?;

        let limit = self.config.handshake_timeout;
        timeout(limit, handshake::connect_async(stream, addr, &self.address))
            .await
            .map_err(|_| Error::HandshakeTimeout {
                proxy: self.address.to_string(),
                timeout: limit,
            })?
    }

    async fn resolve(&self, network: Network) -> io::Result<Vec<SocketAddr>> {
        Ok(tokio::net::lookup_host(&*self.address)
            .await?
            .filter(|addr| network.accepts(addr))
            .collect())
    }

    fn dial_error(&self, source: io::Error) -> Error {
        Error::Dial {
            proxy: self.address.to_string(),
            source,
        }
    }
}
