//! Frame dispatch: one blocking thread routing inbound traffic.
//!
//! The dispatcher reads raw frames off the link, filters them by
//! EtherType, and routes them by message type to discovery, the
//! receiver, or the sender's ACK handler. Malformed input of any kind
//! costs exactly the offending frame; the loop keeps running until the
//! node shuts down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::{debug, trace, warn};

use crate::discovery::Discovery;
use crate::link::Link;
use crate::sink::DeliverySink;
use crate::transfer::{Receiver, Sender};
use crate::wire::{self, Header, MsgType};

/// Pause after a transient receive error before reading again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Routes inbound frames to the protocol components.
pub struct Dispatcher {
    link: Arc<dyn Link>,
    discovery: Arc<Discovery>,
    sender: Arc<Sender>,
    receiver: Receiver,
    sink: Arc<dyn DeliverySink>,
    running: Arc<AtomicBool>,
}

impl Dispatcher {
    pub(crate) fn new(
        link: Arc<dyn Link>,
        discovery: Arc<Discovery>,
        sender: Arc<Sender>,
        receiver: Receiver,
        sink: Arc<dyn DeliverySink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            link,
            discovery,
            sender,
            receiver,
            sink,
            running,
        }
    }

    /// Runs until the link is closed; meant to be the body of a
    /// dedicated thread.
    ///
    /// Receive errors while the node is still running are logged and
    /// retried after a short pause; once the running flag clears, the
    /// next error ends the loop.
    pub fn run(mut self) {
        loop {
            let frame = match self.link.recv() {
                Ok(frame) => frame,
                Err(e) => {
                    if !self.running.load(Ordering::Acquire) {
                        debug!("dispatcher exiting: {e}");
                        return;
                    }
                    warn!("link receive failed: {e}");
                    thread::sleep(RECV_ERROR_BACKOFF);
                    continue;
                }
            };
            self.handle_frame(&frame);
        }
    }

    /// Parses and routes one raw frame.
    fn handle_frame(&mut self, frame: &[u8]) {
        let parsed = match wire::parse_frame(frame) {
            Ok(parsed) => parsed,
            Err(e) => {
                trace!("unparseable frame: {e}");
                return;
            }
        };
        if parsed.ethertype != wire::ETHERTYPE {
            return;
        }

        let (header, body) = match Header::unpack(parsed.payload) {
            Ok(split) => split,
            Err(e) => {
                debug!("bad header from {}: {e}", parsed.src);
                return;
            }
        };

        match header.msg_type {
            MsgType::Discovery | MsgType::Reply => self.discovery.on_frame(parsed.src, &header),

            MsgType::Ack => self.sender.on_ack(&header),

            // Untracked single-frame chat: text follows the header
            // directly, no CRC trailer, no ACK.
            MsgType::Chat if header.file_id == 0 => {
                let len = header.payload_len as usize;
                if body.len() < len {
                    debug!("truncated chat frame from {}", parsed.src);
                    return;
                }
                let text = String::from_utf8_lossy(&body[..len]).into_owned();
                self.sink.on_chat(parsed.src, text);
            }

            // Reliable path. Fragmented chat reassembles like a blob
            // and is decoded once complete.
            MsgType::Chat | MsgType::FileChunk => {
                match self.receiver.on_fragment(parsed.payload, parsed.src) {
                    Ok(Some(data)) if header.msg_type == MsgType::Chat => {
                        let text = String::from_utf8_lossy(&data).into_owned();
                        self.sink.on_chat(parsed.src, text);
                    }
                    Ok(Some(data)) => self.sink.on_blob(parsed.src, data),
                    Ok(None) => {}
                    Err(e) => debug!("dropped fragment from {}: {e}", parsed.src),
                }
            }
        }
    }
}
