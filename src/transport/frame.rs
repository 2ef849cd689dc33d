//! Length-prefixed framing.
//!
//! A frame is a 4-byte little-endian payload length followed by the bincode
//! encoding of one [`Message`].

use crate::error::{KnnError, Result};
use crate::transport::message::Message;
use std::io::{ErrorKind, Read, Write};

/// Largest payload accepted from a peer.
pub const MAX_FRAME_LEN: usize = 1 << 30;

const HEADER_LEN: usize = 4;

/// Encode `msg` and write it as one frame. Flushes the writer.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, msg: &Message) -> Result<()> {
    let payload = bincode::serialize(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(KnnError::invalid_argument(format!(
            "{} message of {} bytes exceeds the {} byte frame limit",
            msg.kind(),
            payload.len(),
            MAX_FRAME_LEN
        )));
    }

    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame and decode it.
///
/// End of stream before the first header byte means the peer hung up
/// (`Unavailable`); end of stream inside a frame is a truncated message
/// (`DataLoss`).
pub fn read_frame<R: Read + ?Sized>(reader: &mut R) -> Result<Message> {
    let mut header = [0u8; HEADER_LEN];
    let got = read_full(reader, &mut header)?;
    if got == 0 {
        return Err(KnnError::unavailable("peer closed the connection"));
    }
    if got < HEADER_LEN {
        return Err(KnnError::data_loss(format!(
            "truncated frame header ({got} of {HEADER_LEN} bytes)"
        )));
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(KnnError::data_loss(format!(
            "frame length {len} exceeds the {MAX_FRAME_LEN} byte limit"
        )));
    }

    let mut payload = vec![0u8; len];
    let got = read_full(reader, &mut payload)?;
    if got < len {
        return Err(KnnError::data_loss(format!(
            "truncated frame ({got} of {len} payload bytes)"
        )));
    }

    Ok(bincode::deserialize(&payload)?)
}

/// Fill `buf` unless the stream ends first. Returns the number of bytes read.
fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
