//! Point-to-point links between two ranks.

use crate::error::{KnnError, Result};
use crate::transport::frame::{read_frame, write_frame};
use crate::transport::message::Message;
use crate::types::Rank;
use log::debug;
use std::io::{BufReader, BufWriter, Read, Write};
use std::sync::mpsc::{channel, Receiver, Sender};

/// A blocking, FIFO, point-to-point connection to one peer rank.
///
/// Errors returned by a link are attributed to the peer's rank.
pub trait Link: Send {
    /// Rank of the process at the other end.
    fn peer(&self) -> Rank;

    /// Send one message. Blocks until the message is handed to the transport.
    fn send(&mut self, msg: Message) -> Result<()>;

    /// Receive the next message from the peer. Blocks until one arrives.
    fn recv(&mut self) -> Result<Message>;
}

/// In-process link built on a pair of channels.
#[derive(Debug)]
pub struct ChannelLink {
    peer: Rank,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl ChannelLink {
    /// Connect rank `a` and rank `b`. The first link lives on `a` and talks to `b`.
    pub fn pair(a: Rank, b: Rank) -> (ChannelLink, ChannelLink) {
        let (a_tx, b_rx) = channel();
        let (b_tx, a_rx) = channel();
        (
            ChannelLink {
                peer: b,
                tx: a_tx,
                rx: a_rx,
            },
            ChannelLink {
                peer: a,
                tx: b_tx,
                rx: b_rx,
            },
        )
    }
}

impl Link for ChannelLink {
    fn peer(&self) -> Rank {
        self.peer
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        let kind = msg.kind();
        self.tx.send(msg).map_err(|_| {
            KnnError::unavailable(format!("cannot send {kind}: peer has exited")).at_rank(self.peer)
        })?;
        debug!("[->{}] {}", self.peer, kind);
        Ok(())
    }

    fn recv(&mut self) -> Result<Message> {
        let msg = self.rx.recv().map_err(|_| {
            KnnError::unavailable("peer exited without replying").at_rank(self.peer)
        })?;
        debug!("[<-{}] {}", self.peer, msg.kind());
        Ok(msg)
    }
}

/// Link that exchanges framed messages over a byte stream, such as the
/// stdin/stdout pipes of a worker process.
pub struct StreamLink<R: Read, W: Write> {
    peer: Rank,
    reader: BufReader<R>,
    writer: BufWriter<W>,
}

impl<R: Read, W: Write> StreamLink<R, W> {
    /// Wrap a reader/writer pair connected to `peer`.
    pub fn new(peer: Rank, reader: R, writer: W) -> Self {
        Self {
            peer,
            reader: BufReader::new(reader),
            writer: BufWriter::new(writer),
        }
    }
}

impl<R: Read + Send, W: Write + Send> Link for StreamLink<R, W> {
    fn peer(&self) -> Rank {
        self.peer
    }

    fn send(&mut self, msg: Message) -> Result<()> {
        write_frame(&mut self.writer, &msg).map_err(|e| e.at_rank(self.peer))?;
        debug!("[->{}] {}", self.peer, msg.kind());
        Ok(())
    }

    fn recv(&mut self) -> Result<Message> {
        let msg = read_frame(&mut self.reader).map_err(|e| e.at_rank(self.peer))?;
        debug!("[<-{}] {}", self.peer, msg.kind());
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::io::Cursor;

    #[test]
    fn test_channel_pair_is_fifo() {
        let (mut a, mut b) = ChannelLink::pair(0, 2);
        assert_eq!(a.peer(), 2);
        assert_eq!(b.peer(), 0);

        a.send(Message::Query { values: vec![1.0] }).unwrap();
        a.send(Message::Shutdown).unwrap();
        assert_eq!(b.recv().unwrap(), Message::Query { values: vec![1.0] });
        assert_eq!(b.recv().unwrap(), Message::Shutdown);
    }

    #[test]
    fn test_channel_dropped_peer() {
        let (mut a, b) = ChannelLink::pair(0, 1);
        drop(b);
        let err = a.recv().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Unavailable);
        assert_eq!(err.rank(), Some(1));
        assert!(a.send(Message::Shutdown).is_err());
    }

    #[test]
    fn test_stream_link_reads_what_was_written() {
        let mut out = Vec::new();
        {
            let mut link = StreamLink::new(0, Cursor::new(Vec::new()), &mut out);
            link.send(Message::Shutdown).unwrap();
        }

        let mut link = StreamLink::new(4, Cursor::new(out), Vec::new());
        assert_eq!(link.recv().unwrap(), Message::Shutdown);
        let err = link.recv().unwrap_err();
        assert_eq!(err.rank(), Some(4));
    }
}
