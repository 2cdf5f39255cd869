//! Delivery sink: where decoded traffic leaves the core.
//!
//! The dispatcher deposits completed chat messages, reassembled blobs,
//! and noteworthy errors into a [`DeliverySink`]. What happens next —
//! display, disk, a test assertion — is the sink's business; the core
//! neither names nor persists anything.

use std::sync::mpsc;

use crate::wire::MacAddr;

/// A delivery event produced by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Chat text from a peer.
    Chat { src: MacAddr, text: String },

    /// A fully reassembled binary transfer.
    Blob { src: MacAddr, data: Vec<u8> },

    /// A non-fatal protocol error worth surfacing.
    Error { message: String },
}

/// Consumer of completed chat messages, blobs, and errors.
///
/// Implementations must not block: they are invoked from the dispatcher
/// and sender threads, in the arrival order the dispatcher observed.
pub trait DeliverySink: Send + Sync {
    /// Decoded chat text arrived from `src`.
    fn on_chat(&self, src: MacAddr, text: String);

    /// A binary transfer from `src` completed.
    fn on_blob(&self, src: MacAddr, data: Vec<u8>);

    /// A non-fatal error occurred.
    fn on_error(&self, _message: String) {}
}

/// Sink backed by an unbounded channel of [`Event`]s.
///
/// Sends never block. If the receiving half is gone the event is
/// silently discarded rather than stalling the dispatcher.
pub struct ChannelSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelSink {
    /// Creates the sink together with the receiver that drains it.
    pub fn new() -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

impl DeliverySink for ChannelSink {
    fn on_chat(&self, src: MacAddr, text: String) {
        let _ = self.tx.send(Event::Chat { src, text });
    }

    fn on_blob(&self, src: MacAddr, data: Vec<u8>) {
        let _ = self.tx.send(Event::Blob { src, data });
    }

    fn on_error(&self, message: String) {
        let _ = self.tx.send(Event::Error { message });
    }
}
