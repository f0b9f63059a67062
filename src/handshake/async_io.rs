use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::machine::{Action, Handshake, SCRATCH_CAPACITY};
use crate::error::Error;
use crate::message_types::TargetAddress;

/// Async counterpart of [`connect`](super::connect).
///
/// Reads are exact, so no tunnelled bytes are buffered away from the
/// caller once this returns.
pub async fn connect_async<S>(stream: &mut S, addr: &str, proxy: &str) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    drive(stream, Handshake::new(addr, proxy)?).await
}

pub async fn connect_target_async<S>(
    stream: &mut S,
    target: TargetAddress,
    proxy: &str,
) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    drive(stream, Handshake::with_target(target, proxy)?).await
}

async fn drive<S>(stream: &mut S, mut handshake: Handshake) -> Result<(), Error>
where
    S: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(SCRATCH_CAPACITY);
    loop {
        match handshake.step(&mut buf)? {
            Action::Write(phase) => {
                debug!("{} {}", phase, handshake.proxy());
                stream
                    .write_all(&buf)
                    .await
                    .map_err(|e| handshake.io_error(phase, e))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| handshake.io_error(phase, e))?;
            }
            Action::Read(phase, _) => {
                stream
                    .read_exact(&mut buf)
                    .await
                    .map_err(|e| handshake.io_error(phase, e))?;
            }
            Action::Done => return Ok(()),
        }
    }
}
