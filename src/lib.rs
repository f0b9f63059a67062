pub mod codec;
pub mod dialer;
pub mod error;
pub mod handshake;
pub mod message_types;
pub mod stream;

// Re-export commonly used items for convenience
pub use codec::{CodecError, ConnectCodec, GreetingCodec};
pub use dialer::{
    make_dialer, AsyncDialer, DefaultSocketFactory, Dialer, DialerConfig, DialerConfigBuilder,
    Network, ProxyNetwork, SocketFactory,
};
pub use error::{Error, ErrorKind, TargetError};
pub use handshake::{connect, connect_async, Handshake, Phase};
pub use message_types::{AddressType, AuthMethod, Host, ReplyStatus, TargetAddress};
pub use stream::{AsyncProxyStream, ProxyStream};
