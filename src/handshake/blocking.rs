use std::io::{Read, Write};

use bytes::BytesMut;
use tracing::debug;

use super::machine::{Action, Handshake, SCRATCH_CAPACITY};
use crate::error::Error;
use crate::message_types::TargetAddress;

/// Runs the handshake for `addr` (`host:port`) over a blocking stream.
///
/// On success the stream is positioned at the first tunnelled byte. On
/// failure the stream is in an unspecified state and must be closed.
pub fn connect<S>(stream: &mut S, addr: &str, proxy: &str) -> Result<(), Error>
where
    S: Read + Write + ?Sized,
{
    drive(stream, Handshake::new(addr, proxy)?)
}

pub fn connect_target<S>(stream: &mut S, target: TargetAddress, proxy: &str) -> Result<(), Error>
where
    S: Read + Write + ?Sized,
{
    drive(stream, Handshake::with_target(target, proxy)?)
}

fn drive<S>(stream: &mut S, mut handshake: Handshake) -> Result<(), Error>
where
    S: Read + Write + ?Sized,
{
    let mut buf = BytesMut::with_capacity(SCRATCH_CAPACITY);
    loop {
        match handshake.step(&mut buf)? {
            Action::Write(phase) => {
                debug!("{} {}", phase, handshake.proxy());
                stream
                    .write_all(&buf)
                    .and_then(|_| stream.flush())
                    .map_err(|e| handshake.io_error(phase, e))?;
            }
            Action::Read(phase, _) => {
                stream
                    .read_exact(&mut buf)
                    .map_err(|e| handshake.io_error(phase, e))?;
            }
            Action::Done => return Ok(()),
        }
    }
}
