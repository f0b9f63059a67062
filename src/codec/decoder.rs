use crate::codec::types::{
    CodecError, ConnectCodec, GreetingCodec, CONNECT_REPLY_HEADER_LEN, GREETING_REPLY_LEN,
};
use crate::message_types::{GreetingReply, ReplyHeader};
use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

impl Decoder for GreetingCodec {
    type Item = GreetingReply;
    type Error = CodecError;

    // +----+--------+
    // |VER | METHOD |
    // +----+--------+
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < GREETING_REPLY_LEN {
            return Ok(None);
        }

        let mut data = src.split_to(GREETING_REPLY_LEN);
        let version = data.get_u8();
        let method = data.get_u8().into();

        Ok(Some(GreetingReply { version, method }))
    }
}

impl Decoder for ConnectCodec {
    type Item = ReplyHeader;
    type Error = CodecError;

    // +----+-----+-------+------+
    // |VER | REP |  RSV  | ATYP |
    // +----+-----+-------+------+
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < CONNECT_REPLY_HEADER_LEN {
            return Ok(None);
        }

        let mut data = src.split_to(CONNECT_REPLY_HEADER_LEN);
        let version = data.get_u8();
        let status = data.get_u8().into();
        data.advance(1);
        let atyp = data.get_u8();

        Ok(Some(ReplyHeader {
            version,
            status,
            atyp,
        }))
    }
}
