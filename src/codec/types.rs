/// Greeting frames: encodes the method offer, decodes the method selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreetingCodec;

/// Connect frames: encodes the CONNECT request, decodes the reply header.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectCodec;

pub const GREETING_REPLY_LEN: usize = 2;
pub const CONNECT_REPLY_HEADER_LEN: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Domain name too long: {0} bytes (max 255)")]
    DomainTooLong(usize),

    #[error("Invalid address type: {0}")]
    InvalidAddressType(u8),
}
