mod decoder;
mod encoder;
mod types;

pub use types::{
    CodecError, ConnectCodec, GreetingCodec, CONNECT_REPLY_HEADER_LEN, GREETING_REPLY_LEN,
};
