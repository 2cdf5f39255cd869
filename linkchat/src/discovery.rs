//! Neighbor discovery on the local segment.
//!
//! Probes are broadcast header-only frames; peers answer each probe
//! with a unicast reply, and replies refresh the sender's entry in the
//! neighbor set. Nothing is retransmitted — callers probe again if
//! nobody answers, and should give replies a moment (~600 ms) to
//! arrive before reading the neighbor list.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::Result;
use crate::link::Link;
use crate::wire::{self, Header, MacAddr, MsgType};

/// Broadcast-probe / unicast-reply neighbor tracker.
///
/// The neighbor map is written by the dispatcher thread and read by
/// caller threads, so it lives behind a lock. Entries older than the
/// TTL are pruned whenever the list is read.
pub struct Discovery {
    link: Arc<dyn Link>,
    local: MacAddr,
    ttl: Duration,
    neighbors: Mutex<HashMap<MacAddr, Instant>>,
}

impl Discovery {
    /// Creates a tracker over `link` with the given neighbor TTL.
    pub fn new(link: Arc<dyn Link>, ttl: Duration) -> Self {
        let local = link.local_addr();
        Self {
            link,
            local,
            ttl,
            neighbors: Mutex::new(HashMap::new()),
        }
    }

    /// Broadcasts a `DISCOVERY` probe.
    pub fn probe(&self) -> Result<()> {
        let header = Header::control(MsgType::Discovery, 0, 0);
        let frame =
            wire::build_frame(MacAddr::BROADCAST, self.local, wire::ETHERTYPE, &header.pack());
        debug!("broadcasting discovery probe");
        self.link.send(&frame)
    }

    /// Handles a `DISCOVERY` or `REPLY` header received from `src`.
    pub fn on_frame(&self, src: MacAddr, header: &Header) {
        match header.msg_type {
            MsgType::Discovery => {
                debug!("probe from {src}, answering");
                let reply = Header::control(MsgType::Reply, 0, 0);
                let frame = wire::build_frame(src, self.local, wire::ETHERTYPE, &reply.pack());
                if let Err(e) = self.link.send(&frame) {
                    warn!("failed to answer probe from {src}: {e}");
                }
            }
            MsgType::Reply => {
                debug!("neighbor reply from {src}");
                self.neighbors.lock().unwrap().insert(src, Instant::now());
            }
            _ => {}
        }
    }

    /// Prunes expired entries and returns the surviving addresses.
    pub fn neighbors(&self) -> Vec<MacAddr> {
        let ttl = self.ttl;
        let mut map = self.neighbors.lock().unwrap();
        map.retain(|_, last_seen| last_seen.elapsed() < ttl);
        map.keys().copied().collect()
    }
}
