use std::future::Future;
use std::io;
use std::net::SocketAddr;
#[cfg(unix)]
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Opens raw connections to the proxy.
pub trait SocketFactory: Send + Sync + std::fmt::Debug {
    fn create_tcp_connection(
        &self,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> io::Result<std::net::TcpStream>;

    fn create_async_tcp_connection(
        &self,
        addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<tokio::net::TcpStream>> + Send + '_>>;

    #[cfg(unix)]
    fn create_unix_connection(&self, path: &Path) -> io::Result<std::os::unix::net::UnixStream> {
        std::os::unix::net::UnixStream::connect(path)
    }

    #[cfg(unix)]
    fn create_async_unix_connection<'a>(
        &'a self,
        path: &'a Path,
    ) -> Pin<Box<dyn Future<Output = io::Result<tokio::net::UnixStream>> + Send + 'a>> {
        Box::pin(async move { tokio::net::UnixStream::connect(path).await })
    }
}

#[derive(Debug, Clone)]
pub struct DefaultSocketFactory;

impl DefaultSocketFactory {
    pub fn new() -> Self {
        Self
    }

    pub fn arc() -> Arc<dyn SocketFactory> {
        Arc::new(Self::new())
    }
}

impl SocketFactory for DefaultSocketFactory {
    fn create_tcp_connection(
        &self,
        addr: SocketAddr,
        timeout: Option<Duration>,
    ) -> io::Result<std::net::TcpStream> {
        match timeout {
            Some(timeout) => std::net::TcpStream::connect_timeout(&addr, timeout),
            None => std::net::TcpStream::connect(addr),
        }
    }

    fn create_async_tcp_connection(
        &self,
        addr: SocketAddr,
    ) -> Pin<Box<dyn Future<Output = io::Result<tokio::net::TcpStream>> + Send + '_>> {
        Box::pin(async move { tokio::net::TcpStream::connect(addr).await })
    }
}

impl Default for DefaultSocketFactory {
    fn default() -> Self {
        Self::new()
    }
}
