//! SOCKS5 client handshake: greeting, CONNECT request, reply parsing.
//!
//! [`Handshake`] is the protocol state machine and performs no I/O. The
//! [`connect`] and [`connect_async`] drivers run it over a blocking or a
//! tokio stream respectively.

mod async_io;
mod blocking;
mod machine;

pub use async_io::{connect_async, connect_target_async};
pub use blocking::{connect, connect_target};
pub use machine::{Action, Handshake, Phase, SCRATCH_CAPACITY};
