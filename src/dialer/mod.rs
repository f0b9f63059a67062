mod async_dialer;
mod blocking;
mod socket_factory;
mod types;

pub use async_dialer::AsyncDialer;
pub use blocking::{make_dialer, Dialer};
pub use socket_factory::{DefaultSocketFactory, SocketFactory};
pub use types::{DialerConfig, DialerConfigBuilder, Network, ProxyNetwork};
