//! Receive path: reassembly, duplicate suppression, and ACK emission.
//!
//! Fragments may arrive in any order after a retransmission round trip.
//! Each transfer gets a slot vector sized to its fragment count; a slot
//! is filled by the first valid fragment with that index and never
//! overwritten. Corrupt fragments are dropped without an ACK so the
//! sender retries them, while duplicates are re-acknowledged in case
//! the original ACK was lost.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::Result;
use crate::link::Link;
use crate::wire::{self, Header, MacAddr, MsgType};

/// A transfer being reassembled.
struct Reassembly {
    /// Slot `i` holds fragment `i` once it has arrived.
    slots: Vec<Option<Vec<u8>>>,

    /// Number of filled slots.
    filled: usize,

    /// Last time a fragment of this transfer arrived.
    last_update: Instant,
}

/// Validates fragments, acknowledges them, and hands back the assembled
/// payload once every slot is filled.
///
/// Owned and driven by the dispatcher thread alone; no lock needed.
pub struct Receiver {
    link: Arc<dyn Link>,
    local: MacAddr,
    reassembly_ttl: Duration,
    buffers: HashMap<u16, Reassembly>,
}

impl Receiver {
    /// Creates a receiver emitting ACKs through `link`.
    pub fn new(link: Arc<dyn Link>, reassembly_ttl: Duration) -> Self {
        let local = link.local_addr();
        Self {
            link,
            local,
            reassembly_ttl,
            buffers: HashMap::new(),
        }
    }

    /// Processes one data fragment (everything after the L2 header).
    ///
    /// Returns the reassembled transfer iff this fragment completed it.
    /// Truncated and corrupt fragments are dropped without an ACK;
    /// duplicates are re-acknowledged and dropped.
    pub fn on_fragment(&mut self, payload: &[u8], src: MacAddr) -> Result<Option<Vec<u8>>> {
        let (header, remainder) = Header::unpack(payload)?;
        let payload_len = header.payload_len as usize;

        if remainder.len() < payload_len {
            debug!(
                "truncated fragment from {src}: {} of {payload_len} bytes",
                remainder.len()
            );
            return Ok(None);
        }
        // The link layer pads short frames; payload_len bounds the
        // actual fragment, anything beyond it is padding.
        let payload_with_crc = &remainder[..payload_len];

        let (ok, body) = wire::verify_and_strip(payload_with_crc)?;
        if !ok {
            debug!(
                "crc mismatch on transfer {} fragment {} from {src}",
                header.file_id, header.frag_index
            );
            return Ok(None);
        }

        if header.total_frags == 0 || header.frag_index >= header.total_frags {
            debug!(
                "inconsistent fragment counts from {src}: index {} of {}",
                header.frag_index, header.total_frags
            );
            return Ok(None);
        }

        self.evict_stale();

        let entry = self.buffers.entry(header.file_id).or_insert_with(|| Reassembly {
            slots: vec![None; header.total_frags as usize],
            filled: 0,
            last_update: Instant::now(),
        });

        let index = header.frag_index as usize;
        if index >= entry.slots.len() {
            // total_frags disagrees with the transfer this id opened with.
            debug!(
                "fragment {index} outside transfer {} ({} slots)",
                header.file_id,
                entry.slots.len()
            );
            return Ok(None);
        }

        let duplicate = entry.slots[index].is_some();
        if duplicate {
            debug!(
                "duplicate fragment {} of transfer {} from {src}",
                header.frag_index, header.file_id
            );
        } else {
            entry.slots[index] = Some(body.to_vec());
            entry.filled += 1;
            entry.last_update = Instant::now();
        }
        let complete = entry.filled == entry.slots.len();

        // Ack stored fragments and duplicates alike: the sender may
        // have missed the first ACK.
        self.send_ack(header.file_id, header.frag_index, src);

        if duplicate || !complete {
            return Ok(None);
        }

        let Some(done) = self.buffers.remove(&header.file_id) else {
            return Ok(None);
        };
        let mut data = Vec::new();
        for slot in done.slots.into_iter().flatten() {
            data.extend_from_slice(&slot);
        }
        debug!(
            "transfer {} complete: {} bytes from {src}",
            header.file_id,
            data.len()
        );
        Ok(Some(data))
    }

    /// Discards reassembly buffers whose transfer has gone idle.
    ///
    /// A sender that abandoned a fragment leaves a partial buffer
    /// behind; without eviction it would live until process exit.
    fn evict_stale(&mut self) {
        let ttl = self.reassembly_ttl;
        self.buffers.retain(|file_id, entry| {
            let stale = entry.last_update.elapsed() >= ttl;
            if stale {
                warn!(
                    "discarding idle partial transfer {file_id} ({}/{} fragments)",
                    entry.filled,
                    entry.slots.len()
                );
            }
            !stale
        });
    }

    /// Emits a header-only ACK for one fragment, unicast to its source.
    fn send_ack(&self, file_id: u16, frag_index: u16, dst: MacAddr) {
        let header = Header::control(MsgType::Ack, file_id, frag_index);
        let frame = wire::build_frame(dst, self.local, wire::ETHERTYPE, &header.pack());
        if let Err(e) = self.link.send(&frame) {
            warn!("failed to ack transfer {file_id} fragment {frag_index} to {dst}: {e}");
        }
    }
}
