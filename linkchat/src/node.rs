//! Node wiring: component construction, service threads, shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use log::info;

use crate::config::Config;
use crate::discovery::Discovery;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::link::Link;
use crate::sink::DeliverySink;
use crate::transfer::{Receiver, Sender};
use crate::wire::{MacAddr, MsgType};

/// A running Link-Chat endpoint.
///
/// Owns the dispatcher thread (blocking on the link) and the sender's
/// retransmission sweeper. Completed traffic is pushed into the sink;
/// the operations below are safe to call from any thread. Dropping the
/// node shuts both threads down.
pub struct Node {
    link: Arc<dyn Link>,
    local: MacAddr,
    sender: Arc<Sender>,
    discovery: Arc<Discovery>,
    running: Arc<AtomicBool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Wires the protocol components around `link` and starts the
    /// service threads.
    pub fn spawn(link: Arc<dyn Link>, sink: Arc<dyn DeliverySink>, config: Config) -> Node {
        let local = link.local_addr();
        let running = Arc::new(AtomicBool::new(true));

        let discovery = Arc::new(Discovery::new(Arc::clone(&link), config.neighbor_ttl));
        let sender = Arc::new(Sender::new(
            Arc::clone(&link),
            Arc::clone(&sink),
            config.clone(),
        ));
        let receiver = Receiver::new(Arc::clone(&link), config.reassembly_ttl);

        let sweeper = sender.spawn_sweeper();
        let dispatcher = Dispatcher::new(
            Arc::clone(&link),
            Arc::clone(&discovery),
            Arc::clone(&sender),
            receiver,
            sink,
            Arc::clone(&running),
        );
        let dispatcher = thread::spawn(move || dispatcher.run());

        info!("node up on {local}");
        Node {
            link,
            local,
            sender,
            discovery,
            running,
            dispatcher: Mutex::new(Some(dispatcher)),
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// The local hardware address.
    pub fn local_addr(&self) -> MacAddr {
        self.local
    }

    /// Sends chat text; `dst` falls back to the stored destination.
    ///
    /// Short text is fire-and-forget; longer text blocks like
    /// [`send_blob`](Self::send_blob).
    pub fn send_chat(&self, text: &str, dst: Option<MacAddr>) -> Result<()> {
        self.sender.send_chat(text, dst)
    }

    /// Reliably sends a binary blob, blocking until every fragment is
    /// acknowledged or abandoned.
    pub fn send_blob(&self, data: &[u8], dst: Option<MacAddr>) -> Result<()> {
        self.sender.send_blob(data, dst, MsgType::FileChunk)
    }

    /// Sets the default destination for subsequent sends.
    pub fn set_destination(&self, dst: MacAddr) {
        self.sender.set_destination(dst);
    }

    /// Broadcasts a discovery probe. Replies need a moment to arrive
    /// before [`neighbors`](Self::neighbors) will show them.
    pub fn probe(&self) -> Result<()> {
        self.discovery.probe()
    }

    /// The live neighbor addresses, pruned by TTL.
    pub fn neighbors(&self) -> Vec<MacAddr> {
        self.discovery.neighbors()
    }

    /// Stops the service threads and closes the link. Idempotent; also
    /// runs on drop.
    pub fn shutdown(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.sender.stop();
        self.link.close();
        if let Some(handle) = self.dispatcher.lock().unwrap().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("node on {} stopped", self.local);
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MemSegment;
    use crate::sink::ChannelSink;

    #[test]
    fn test_spawn_and_shutdown() {
        let segment = MemSegment::new();
        let link = Arc::new(segment.attach(MacAddr([2, 0, 0, 0, 0, 1])));
        let (sink, _events) = ChannelSink::new();

        let node = Node::spawn(link, Arc::new(sink), Config::default());
        assert_eq!(node.local_addr(), MacAddr([2, 0, 0, 0, 0, 1]));

        node.shutdown();
        // A second shutdown (and the one in drop) must be a no-op.
        node.shutdown();
    }
}
