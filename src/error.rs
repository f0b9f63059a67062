use std::io;
use std::time::Duration;

use crate::handshake::Phase;
use crate::message_types::ReplyStatus;

/// Errors returned while dialing through a SOCKS5 proxy.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("proxy: no support for SOCKS5 proxy connections of type {network}")]
    UnsupportedNetwork { network: String },

    #[error("proxy: failed to dial SOCKS5 proxy at {proxy}: {source}")]
    Dial {
        proxy: String,
        #[source]
        source: io::Error,
    },

    #[error("proxy: {0}")]
    Target(#[from] TargetError),

    #[error("proxy: SOCKS5 proxy at {proxy} has unexpected version {version}")]
    UnexpectedVersion { proxy: String, version: u8 },

    #[error("proxy: SOCKS5 proxy at {proxy} requires authentication (selected method {method:#04x})")]
    AuthRequired { proxy: String, method: u8 },

    #[error("proxy: SOCKS5 proxy at {proxy} failed to connect: {}", .status.reason())]
    Rejected { proxy: String, status: ReplyStatus },

    #[error("proxy: got unknown address type {atyp} from SOCKS5 proxy at {proxy}")]
    UnknownAddressType { proxy: String, atyp: u8 },

    #[error("proxy: failed to {phase} SOCKS5 proxy at {proxy}: {source}")]
    Io {
        phase: Phase,
        proxy: String,
        #[source]
        source: io::Error,
    },

    #[error("proxy: SOCKS5 handshake with {proxy} timed out after {timeout:?}")]
    HandshakeTimeout { proxy: String, timeout: Duration },
}

/// Malformed `host:port` target strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("missing port in address {addr}")]
    MissingPort { addr: String },

    #[error("invalid host in address {addr}")]
    InvalidHost { addr: String },

    #[error("failed to parse port number: {port}")]
    InvalidPort { port: String },

    #[error("port number out of range: {port}")]
    PortOutOfRange { port: String },

    #[error("destination host name too long: {host}")]
    DomainTooLong { host: String },
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    UnsupportedNetwork,
    DialFailure,
    MalformedTarget,
    ProtocolViolation,
    AuthRequired,
    ProxyRejected,
    TransportIo,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnsupportedNetwork { .. } => ErrorKind::UnsupportedNetwork,
            Error::Dial { .. } => ErrorKind::DialFailure,
            Error::Target(_) => ErrorKind::MalformedTarget,
            Error::UnexpectedVersion { .. } | Error::UnknownAddressType { .. } => {
                ErrorKind::ProtocolViolation
            }
            Error::AuthRequired { .. } => ErrorKind::AuthRequired,
            Error::Rejected { .. } => ErrorKind::ProxyRejected,
            Error::Io { .. } | Error::HandshakeTimeout { .. } => ErrorKind::TransportIo,
        }
    }

    /// Status reported by the proxy, if it refused the connect request.
    pub fn reply_status(&self) -> Option<ReplyStatus> {
        match self {
            Error::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
