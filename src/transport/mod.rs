//! Coordinator/worker message passing.
//!
//! Every message exchanged between two ranks is a [`Message`]. In-process
//! workers exchange them over channels ([`ChannelLink`]); worker processes
//! exchange length-prefixed bincode frames over a byte stream
//! ([`StreamLink`]). Both sides of the protocol only see the [`Link`] trait.

mod frame;
mod link;
mod message;

pub use frame::{read_frame, write_frame, MAX_FRAME_LEN};
pub use link::{ChannelLink, Link, StreamLink};
pub use message::Message;
