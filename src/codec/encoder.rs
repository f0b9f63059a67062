use crate::codec::types::{CodecError, ConnectCodec, GreetingCodec};
use crate::message_types::{
    Command, ConnectRequest, Greeting, Host, Version, MAX_DOMAIN_LEN,
};
use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

impl Encoder<Greeting> for GreetingCodec {
    type Error = CodecError;

    // +----+----------+----------+
    // |VER | NMETHODS | METHODS  |
    // +----+----------+----------+
    fn encode(&mut self, greeting: Greeting, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(3);
        dst.put_u8(Version::V5 as u8);
        dst.put_u8(1);
        dst.put_u8(greeting.method.into());
        Ok(())
    }
}

impl Encoder<ConnectRequest> for ConnectCodec {
    type Error = CodecError;

    // +----+-----+-------+------+----------+----------+
    // |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
    // +----+-----+-------+------+----------+----------+
    fn encode(&mut self, req: ConnectRequest, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let host = &req.target.host;
        if let Host::Domain(domain) = host {
            if domain.len() > MAX_DOMAIN_LEN {
                return Err(CodecError::DomainTooLong(domain.len()));
            }
        }

        dst.reserve(Self::request_len(host));
        dst.put_u8(Version::V5 as u8);
        dst.put_u8(Command::Connect as u8);
        dst.put_u8(0x00);
        dst.put_u8(host.address_type() as u8);

        match host {
            Host::IPv4(ip) => dst.put_slice(&ip.octets()),
            Host::IPv6(ip) => dst.put_slice(&ip.octets()),
            Host::Domain(domain) => {
                dst.put_u8(domain.len() as u8);
                dst.put_slice(domain.as_bytes());
            }
        }

        dst.put_u16(req.target.port);
        Ok(())
    }
}

impl ConnectCodec {
    fn request_len(host: &Host) -> usize {
        let addr_len = match host {
            Host::IPv4(_) => 4,
            Host::IPv6(_) => 16,
            Host::Domain(domain) => 1 + domain.len(),
        };
        4 + addr_len + 2
    }
}
