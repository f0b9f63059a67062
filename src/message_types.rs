use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::num::IntErrorKind;
use std::str::FromStr;

use crate::codec::CodecError;
use crate::error::TargetError;

pub const MAX_DOMAIN_LEN: usize = u8::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Version {
    V5 = 0x05,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    NoAuth,
    NoAcceptable,
    Other(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AddressType {
    IPv4 = 0x01,
    Domain = 0x03,
    IPv6 = 0x04,
}

/// Status byte of a connect reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Succeeded,
    GeneralFailure,
    ConnectionNotAllowed,
    NetworkUnreachable,
    HostUnreachable,
    ConnectionRefused,
    TtlExpired,
    CommandNotSupported,
    AddressTypeNotSupported,
    Unknown(u8),
}

/// Destination the proxy is asked to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress {
    pub host: Host,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Host {
    IPv4(Ipv4Addr),
    IPv6(Ipv6Addr),
    Domain(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Greeting {
    pub method: AuthMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GreetingReply {
    pub version: u8,
    pub method: AuthMethod,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub target: TargetAddress,
}

/// Fixed four-byte prefix of a connect reply. The bound address and port
/// that follow it are skipped by the handshake, never decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyHeader {
    pub version: u8,
    pub status: ReplyStatus,
    pub atyp: u8,
}

impl From<u8> for AuthMethod {
    fn from(value: u8) -> Self {
        match value {
            0x00 => AuthMethod::NoAuth,
            0xFF => AuthMethod::NoAcceptable,
            other => AuthMethod::Other(other),
        }
    }
}

impl From<AuthMethod> for u8 {
    fn from(method: AuthMethod) -> Self {
        match method {
            AuthMethod::NoAuth => 0x00,
            AuthMethod::NoAcceptable => 0xFF,
            AuthMethod::Other(value) => value,
        }
    }
}

impl TryFrom<u8> for AddressType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(AddressType::IPv4),
            0x03 => Ok(AddressType::Domain),
            0x04 => Ok(AddressType::IPv6),
            _ => Err(CodecError::InvalidAddressType(value)),
        }
    }
}

impl From<u8> for ReplyStatus {
    fn from(value: u8) -> Self {
        match value {
            0x00 => ReplyStatus::Succeeded,
            0x01 => ReplyStatus::GeneralFailure,
            0x02 => ReplyStatus::ConnectionNotAllowed,
            0x03 => ReplyStatus::NetworkUnreachable,
            0x04 => ReplyStatus::HostUnreachable,
            0x05 => ReplyStatus::ConnectionRefused,
            0x06 => ReplyStatus::TtlExpired,
            0x07 => ReplyStatus::CommandNotSupported,
            0x08 => ReplyStatus::AddressTypeNotSupported,
            other => ReplyStatus::Unknown(other),
        }
    }
}

impl ReplyStatus {
    /// Human readable failure reason. Empty for [`ReplyStatus::Succeeded`].
    pub fn reason(&self) -> &'static str {
        match self {
            ReplyStatus::Succeeded => "",
            ReplyStatus::GeneralFailure => "general failure",
            ReplyStatus::ConnectionNotAllowed => "connection forbidden",
            ReplyStatus::NetworkUnreachable => "network unreachable",
            ReplyStatus::HostUnreachable => "host unreachable",
            ReplyStatus::ConnectionRefused => "connection refused",
            ReplyStatus::TtlExpired => "TTL expired",
            ReplyStatus::CommandNotSupported => "command not supported",
            ReplyStatus::AddressTypeNotSupported => "address type not supported",
            ReplyStatus::Unknown(_) => "unknown error",
        }
    }

    pub fn is_success(&self) -> bool {
        self.reason().is_empty()
    }
}

impl fmt::Display for ReplyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyStatus::Succeeded => f.write_str("succeeded"),
            other => f.write_str(other.reason()),
        }
    }
}

impl Host {
    pub fn address_type(&self) -> AddressType {
        match self {
            Host::IPv4(_) => AddressType::IPv4,
            Host::IPv6(_) => AddressType::IPv6,
            Host::Domain(_) => AddressType::Domain,
        }
    }
}

impl FromStr for Host {
    type Err = TargetError;

    /// IPv4 literal first, then IPv6, everything else is a domain name.
    fn from_str(host: &str) -> Result<Self, Self::Err> {
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(Host::IPv4(ip));
        }
        if let Ok(ip) = host.parse::<Ipv6Addr>() {
            // IPv4-mapped addresses go out as plain IPv4.
            return Ok(match ip.to_ipv4_mapped() {
                Some(v4) => Host::IPv4(v4),
                None => Host::IPv6(ip),
            });
        }
        if host.len() > MAX_DOMAIN_LEN {
            return Err(TargetError::DomainTooLong {
                host: host.to_string(),
            });
        }
        Ok(Host::Domain(host.to_string()))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::IPv4(ip) => write!(f, "{}", ip),
            Host::IPv6(ip) => write!(f, "[{}]", ip),
            Host::Domain(domain) => f.write_str(domain),
        }
    }
}

impl TargetAddress {
    /// Parses `host:port`. IPv6 hosts must be bracketed (`[::1]:443`).
    pub fn parse(addr: &str) -> Result<Self, TargetError> {
        let (host, port) = split_host_port(addr)?;

        let port_num = match port.parse::<i64>() {
            Ok(num) => num,
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                i64::MAX
            }
            Err(_) => {
                return Err(TargetError::InvalidPort {
                    port: port.to_string(),
                })
            }
        };
        if !(1..=u16::MAX as i64).contains(&port_num) {
            return Err(TargetError::PortOutOfRange {
                port: port.to_string(),
            });
        }

        Ok(Self {
            host: host.parse()?,
            port: port_num as u16,
        })
    }
}

impl FromStr for TargetAddress {
    type Err = TargetError;

    fn from_str(addr: &str) -> Result<Self, Self::Err> {
        Self::parse(addr)
    }
}

impl fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn split_host_port(addr: &str) -> Result<(&str, &str), TargetError> {
    let missing_port = || TargetError::MissingPort {
        addr: addr.to_string(),
    };
    let invalid_host = || TargetError::InvalidHost {
        addr: addr.to_string(),
    };

    let colon = addr.rfind(':').ok_or_else(missing_port)?;
    let (host, port) = (&addr[..colon], &addr[colon + 1..]);

    let host = if let Some(inner) = host.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(invalid_host)?;
        if inner.contains(['[', ']']) {
            return Err(invalid_host());
        }
        inner
    } else {
        if host.contains([':', '[', ']']) {
            return Err(invalid_host());
        }
        host
    };

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_host_kind() {
        let v4 = TargetAddress::parse("10.0.0.1:8080").unwrap();
        assert_eq!(v4.host, Host::IPv4(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(v4.port, 8080);

        let v6 = TargetAddress::parse("[2001:db8::1]:443").unwrap();
        assert_eq!(v6.host, Host::IPv6("2001:db8::1".parse().unwrap()));
        assert_eq!(v6.host.address_type(), AddressType::IPv6);

        let domain = TargetAddress::parse("example.onion:80").unwrap();
        assert_eq!(domain.host, Host::Domain("example.onion".into()));
        assert_eq!(domain.to_string(), "example.onion:80");
    }

    #[test]
    fn ipv4_mapped_literal_is_sent_as_ipv4() {
        let target = TargetAddress::parse("[::ffff:1.2.3.4]:80").unwrap();
        assert_eq!(target.host, Host::IPv4(Ipv4Addr::new(1, 2, 3, 4)));
        assert_eq!(target.host.address_type(), AddressType::IPv4);

        let compat = TargetAddress::parse("[::1]:80").unwrap();
        assert_eq!(compat.host, Host::IPv6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn port_bounds() {
        assert!(TargetAddress::parse("host:1").is_ok());
        assert!(TargetAddress::parse("host:65535").is_ok());
        assert!(matches!(
            TargetAddress::parse("host:0"),
            Err(TargetError::PortOutOfRange { .. })
        ));
        assert!(matches!(
            TargetAddress::parse("host:65536"),
            Err(TargetError::PortOutOfRange { .. })
        ));
        assert!(matches!(
            TargetAddress::parse("host:-1"),
            Err(TargetError::PortOutOfRange { .. })
        ));
        let err = TargetAddress::parse("host:99999999999999999999").unwrap_err();
        assert_eq!(
            err.to_string(),
            "port number out of range: 99999999999999999999"
        );
        assert!(matches!(
            TargetAddress::parse("host:99999999999"),
            Err(TargetError::PortOutOfRange { .. })
        ));
        assert!(matches!(
            TargetAddress::parse("host:http"),
            Err(TargetError::InvalidPort { .. })
        ));
    }

    #[test]
    fn rejects_malformed_targets() {
        assert!(matches!(
            TargetAddress::parse("no-port-here"),
            Err(TargetError::MissingPort { .. })
        ));
        assert!(matches!(
            TargetAddress::parse("::1:80"),
            Err(TargetError::InvalidHost { .. })
        ));
        assert!(matches!(
            TargetAddress::parse("[::1:80"),
            Err(TargetError::InvalidHost { .. })
        ));
    }

    #[test]
    fn domain_length_limit() {
        let max = "a".repeat(255);
        assert!(TargetAddress::parse(&format!("{}:80", max)).is_ok());

        let long = "a".repeat(256);
        let err = TargetAddress::parse(&format!("{}:80", long)).unwrap_err();
        assert!(matches!(err, TargetError::DomainTooLong { .. }));
    }

    #[test]
    fn status_reasons() {
        assert_eq!(ReplyStatus::from(0).reason(), "");
        assert!(ReplyStatus::from(0).is_success());
        assert_eq!(ReplyStatus::from(2).reason(), "connection forbidden");
        assert_eq!(ReplyStatus::from(6).reason(), "TTL expired");
        assert_eq!(ReplyStatus::from(8).reason(), "address type not supported");
        assert_eq!(ReplyStatus::from(9), ReplyStatus::Unknown(9));
        assert_eq!(ReplyStatus::from(0xFF).reason(), "unknown error");
    }

    #[test]
    fn auth_method_bytes() {
        assert_eq!(AuthMethod::from(0x00), AuthMethod::NoAuth);
        assert_eq!(AuthMethod::from(0xFF), AuthMethod::NoAcceptable);
        assert_eq!(AuthMethod::from(0x02), AuthMethod::Other(2));
        assert_eq!(u8::from(AuthMethod::Other(2)), 2);
    }
}
