use std::fmt;
use std::io;

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::codec::{
    CodecError, ConnectCodec, GreetingCodec, CONNECT_REPLY_HEADER_LEN, GREETING_REPLY_LEN,
};
use crate::error::{Error, TargetError};
use crate::message_types::{
    AddressType, AuthMethod, ConnectRequest, Greeting, Host, TargetAddress, Version,
    MAX_DOMAIN_LEN,
};

/// Largest frame exchanged: connect request carrying a 255 byte domain.
pub const SCRATCH_CAPACITY: usize = 4 + 1 + MAX_DOMAIN_LEN + 2;

/// The I/O step a handshake is currently performing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Socket options on the freshly opened proxy connection.
    ConfigureStream,
    WriteGreeting,
    ReadGreeting,
    WriteConnectRequest,
    ReadConnectReply,
    ReadDomainLength,
    ReadBoundAddress,
    ReadBoundPort,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::ConfigureStream => "configure connection to",
            Phase::WriteGreeting => "write greeting to",
            Phase::ReadGreeting => "read greeting from",
            Phase::WriteConnectRequest => "write connect request to",
            Phase::ReadConnectReply => "read connect reply from",
            Phase::ReadDomainLength => "read domain length from",
            Phase::ReadBoundAddress => "read address from",
            Phase::ReadBoundPort => "read port from",
        };
        f.write_str(s)
    }
}

/// What the driver has to do before calling [`Handshake::step`] again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Write the whole scratch buffer to the proxy.
    Write(Phase),
    /// Fill the scratch buffer, already sized to exactly this many bytes.
    Read(Phase, usize),
    /// The tunnel is established.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    GreetingSent,
    GreetingRead,
    RequestSent,
    ReplyHeaderRead,
    DomainLengthRead,
    BoundAddressRead,
    BoundPortRead,
    Established,
}

/// SOCKS5 CONNECT negotiation with no authentication.
///
/// The caller owns one scratch buffer and passes it to every [`step`]:
/// after [`Action::Write`] it holds exactly the frame to send, after
/// [`Action::Read`] it has been resized to exactly the number of bytes to
/// read. A handshake that returned an error must be discarded together with
/// its connection.
///
/// [`step`]: Handshake::step
#[derive(Debug, Clone)]
pub struct Handshake {
    target: TargetAddress,
    proxy: String,
    state: State,
}

impl Handshake {
    /// Parses `addr` as `host:port`. Nothing is written on failure.
    pub fn new(addr: &str, proxy: impl Into<String>) -> Result<Self, Error> {
        let target = TargetAddress::parse(addr)?;
        Self::with_target(target, proxy)
    }

    pub fn with_target(target: TargetAddress, proxy: impl Into<String>) -> Result<Self, Error> {
        if let Host::Domain(domain) = &target.host {
            if domain.len() > MAX_DOMAIN_LEN {
                return Err(TargetError::DomainTooLong {
                    host: domain.clone(),
                }
                .into());
            }
        }

        Ok(Self {
            target,
            proxy: proxy.into(),
            state: State::Start,
        })
    }

    pub fn target(&self) -> &TargetAddress {
        &self.target
    }

    pub fn proxy(&self) -> &str {
        &self.proxy
    }

    pub fn is_established(&self) -> bool {
        self.state == State::Established
    }

    /// Advances the negotiation using the bytes the driver just read (if
    /// any) and prepares `buf` for the next action.
    pub fn step(&mut self, buf: &mut BytesMut) -> Result<Action, Error> {
        let (next, action) = match self.state {
            State::Start => {
                buf.clear();
                GreetingCodec
                    .encode(
                        Greeting {
                            method: AuthMethod::NoAuth,
                        },
                        buf,
                    )
                    .map_err(|e| self.codec_error(Phase::WriteGreeting, e))?;
                (State::GreetingSent, Action::Write(Phase::WriteGreeting))
            }
            State::GreetingSent => (
                State::GreetingRead,
                read_exact(buf, Phase::ReadGreeting, GREETING_REPLY_LEN),
            ),
            State::GreetingRead => {
                let reply = self.decode(GreetingCodec, buf, Phase::ReadGreeting)?;
                if reply.version != Version::V5 as u8 {
                    return Err(Error::UnexpectedVersion {
                        proxy: self.proxy.clone(),
                        version: reply.version,
                    });
                }
                if reply.method != AuthMethod::NoAuth {
                    return Err(Error::AuthRequired {
                        proxy: self.proxy.clone(),
                        method: reply.method.into(),
                    });
                }

                buf.clear();
                let request = ConnectRequest {
                    target: self.target.clone(),
                };
                ConnectCodec
                    .encode(request, buf)
                    .map_err(|e| self.codec_error(Phase::WriteConnectRequest, e))?;
                debug!("Sending connect request for {} to {}", self.target, self.proxy);
                (
                    State::RequestSent,
                    Action::Write(Phase::WriteConnectRequest),
                )
            }
            State::RequestSent => (
                State::ReplyHeaderRead,
                read_exact(buf, Phase::ReadConnectReply, CONNECT_REPLY_HEADER_LEN),
            ),
            State::ReplyHeaderRead => {
                let header = self.decode(ConnectCodec, buf, Phase::ReadConnectReply)?;
                if !header.status.is_success() {
                    return Err(Error::Rejected {
                        proxy: self.proxy.clone(),
                        status: header.status,
                    });
                }

                match AddressType::try_from(header.atyp) {
                    Ok(AddressType::IPv4) => (
                        State::BoundAddressRead,
                        read_exact(buf, Phase::ReadBoundAddress, 4),
                    ),
                    Ok(AddressType::IPv6) => (
                        State::BoundAddressRead,
                        read_exact(buf, Phase::ReadBoundAddress, 16),
                    ),
                    Ok(AddressType::Domain) => (
                        State::DomainLengthRead,
                        read_exact(buf, Phase::ReadDomainLength, 1),
                    ),
                    Err(_) => {
                        return Err(Error::UnknownAddressType {
                            proxy: self.proxy.clone(),
                            atyp: header.atyp,
                        })
                    }
                }
            }
            State::DomainLengthRead => {
                let len = buf.first().copied().ok_or_else(|| {
                    self.io_error(Phase::ReadDomainLength, short_frame())
                })?;
                (
                    State::BoundAddressRead,
                    read_exact(buf, Phase::ReadBoundAddress, len as usize),
                )
            }
            State::BoundAddressRead => (
                State::BoundPortRead,
                read_exact(buf, Phase::ReadBoundPort, 2),
            ),
            State::BoundPortRead | State::Established => {
                buf.clear();
                (State::Established, Action::Done)
            }
        };

        self.state = next;
        Ok(action)
    }

    /// Wraps a transport failure with the phase and the proxy address.
    pub fn io_error(&self, phase: Phase, source: io::Error) -> Error {
        Error::Io {
            phase,
            proxy: self.proxy.clone(),
            source,
        }
    }

    fn decode<D>(&self, mut codec: D, buf: &mut BytesMut, phase: Phase) -> Result<D::Item, Error>
    where
        D: Decoder<Error = CodecError>,
    {
        match codec.decode(buf) {
            Ok(Some(item)) => Ok(item),
            Ok(None) => Err(self.io_error(phase, short_frame())),
            Err(e) => Err(self.codec_error(phase, e)),
        }
    }

    fn codec_error(&self, phase: Phase, err: CodecError) -> Error {
        match err {
            CodecError::Io(source) => self.io_error(phase, source),
            CodecError::DomainTooLong(_) => TargetError::DomainTooLong {
                host: self.target.host.to_string(),
            }
            .into(),
            CodecError::InvalidAddressType(atyp) => Error::UnknownAddressType {
                proxy: self.proxy.clone(),
                atyp,
            },
        }
    }
}

fn read_exact(buf: &mut BytesMut, phase: Phase, len: usize) -> Action {
    buf.clear();
    buf.resize(len, 0);
    Action::Read(phase, len)
}

fn short_frame() -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, "short handshake frame")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::message_types::ReplyStatus;

    fn feed(hs: &mut Handshake, buf: &mut BytesMut, bytes: &[u8]) -> Result<Action, Error> {
        buf.copy_from_slice(bytes);
        hs.step(buf)
    }

    #[test]
    fn walks_every_phase_for_domain_reply() {
        let mut hs = Handshake::new("example.onion:80", "127.0.0.1:9150").unwrap();
        let mut buf = BytesMut::with_capacity(SCRATCH_CAPACITY);

        assert_eq!(hs.step(&mut buf).unwrap(), Action::Write(Phase::WriteGreeting));
        assert_eq!(&buf[..], &[5, 1, 0]);

        assert_eq!(hs.step(&mut buf).unwrap(), Action::Read(Phase::ReadGreeting, 2));
        assert_eq!(buf.len(), 2);

        let action = feed(&mut hs, &mut buf, &[5, 0]).unwrap();
        assert_eq!(action, Action::Write(Phase::WriteConnectRequest));
        assert_eq!(buf[3], 3);
        assert_eq!(buf[4], 13);
        assert_eq!(&buf[5..18], b"example.onion");
        assert_eq!(&buf[18..], &[0x00, 0x50]);

        assert_eq!(
            hs.step(&mut buf).unwrap(),
            Action::Read(Phase::ReadConnectReply, 4)
        );
        assert_eq!(
            feed(&mut hs, &mut buf, &[5, 0, 0, 3]).unwrap(),
            Action::Read(Phase::ReadDomainLength, 1)
        );
        assert_eq!(
            feed(&mut hs, &mut buf, &[7]).unwrap(),
            Action::Read(Phase::ReadBoundAddress, 7)
        );
        assert_eq!(
            feed(&mut hs, &mut buf, b"bound.x").unwrap(),
            Action::Read(Phase::ReadBoundPort, 2)
        );
        assert!(!hs.is_established());
        assert_eq!(feed(&mut hs, &mut buf, &[0, 80]).unwrap(), Action::Done);
        assert!(hs.is_established());
        assert!(buf.is_empty());
    }

    #[test]
    fn buffer_never_carries_stale_bytes() {
        let mut hs = Handshake::new("10.1.2.3:443", "proxy").unwrap();
        let mut buf = BytesMut::from(&[9u8; 32][..]);

        hs.step(&mut buf).unwrap();
        assert_eq!(buf.len(), 3);
        hs.step(&mut buf).unwrap();
        assert_eq!(buf.len(), 2);
        feed(&mut hs, &mut buf, &[5, 0]).unwrap();
        assert_eq!(&buf[..], &[5, 1, 0, 1, 10, 1, 2, 3, 0x01, 0xBB]);
    }

    #[test]
    fn rejects_auth_demand() {
        let mut hs = Handshake::new("host:80", "proxy").unwrap();
        let mut buf = BytesMut::new();
        hs.step(&mut buf).unwrap();
        hs.step(&mut buf).unwrap();

        let err = feed(&mut hs, &mut buf, &[5, 0xFF]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
    }

    #[test]
    fn rejects_unsupported_method_selection() {
        let mut hs = Handshake::new("host:80", "proxy").unwrap();
        let mut buf = BytesMut::new();
        hs.step(&mut buf).unwrap();
        hs.step(&mut buf).unwrap();

        let err = feed(&mut hs, &mut buf, &[5, 0x02]).unwrap_err();
        assert!(matches!(err, Error::AuthRequired { method: 2, .. }));
    }

    #[test]
    fn rejects_wrong_greeting_version() {
        let mut hs = Handshake::new("host:80", "proxy:1080").unwrap();
        let mut buf = BytesMut::new();
        hs.step(&mut buf).unwrap();
        hs.step(&mut buf).unwrap();

        let err = feed(&mut hs, &mut buf, &[4, 0]).unwrap_err();
        assert!(matches!(err, Error::UnexpectedVersion { version: 4, .. }));
        assert_eq!(
            err.to_string(),
            "proxy: SOCKS5 proxy at proxy:1080 has unexpected version 4"
        );
    }

    #[test]
    fn failure_status_stops_before_bound_address() {
        let mut hs = Handshake::new("host:80", "proxy").unwrap();
        let mut buf = BytesMut::new();
        hs.step(&mut buf).unwrap();
        hs.step(&mut buf).unwrap();
        feed(&mut hs, &mut buf, &[5, 0]).unwrap();
        hs.step(&mut buf).unwrap();

        let err = feed(&mut hs, &mut buf, &[5, 5, 0, 1]).unwrap_err();
        assert_eq!(err.reply_status(), Some(ReplyStatus::ConnectionRefused));
        assert!(err.to_string().ends_with("failed to connect: connection refused"));
    }

    #[test]
    fn unknown_status_and_address_type() {
        let mut hs = Handshake::new("host:80", "proxy").unwrap();
        let mut buf = BytesMut::new();
        hs.step(&mut buf).unwrap();
        hs.step(&mut buf).unwrap();
        feed(&mut hs, &mut buf, &[5, 0]).unwrap();
        hs.step(&mut buf).unwrap();
        let mut unknown = hs.clone();

        let err = feed(&mut unknown, &mut buf, &[5, 42, 0, 1]).unwrap_err();
        assert!(err.to_string().ends_with("unknown error"));

        let mut buf = BytesMut::from(&[0u8; 4][..]);
        let err = feed(&mut hs, &mut buf, &[5, 0, 0, 2]).unwrap_err();
        assert!(matches!(err, Error::UnknownAddressType { atyp: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn oversized_domain_target_is_refused_up_front() {
        let target = TargetAddress {
            host: Host::Domain("d".repeat(256)),
            port: 80,
        };
        let err = Handshake::with_target(target, "proxy").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedTarget);
    }
}
