//! Reliable transmit path.
//!
//! Payloads are sliced into fragments of at most `max_payload` bytes,
//! each carrying a CRC trailer. The sender is stop-and-wait: a fragment
//! must be acknowledged (or abandoned) before the next one goes out.
//! Every transmitted-but-unacknowledged fragment lives in the
//! outstanding table, which three code paths share under one lock: the
//! foreground wait loop, the dispatcher's ACK handler, and the
//! background retransmission sweep.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use log::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::link::Link;
use crate::sink::DeliverySink;
use crate::wire::{self, Flags, Header, MacAddr, MsgType};

/// A transmitted fragment awaiting acknowledgment.
///
/// An entry exists iff the fragment has been put on the wire and is
/// neither acknowledged nor abandoned.
struct Outstanding {
    /// The cached L2 frame; retransmissions resend it byte-identical,
    /// CRC included.
    frame: Vec<u8>,

    /// When the fragment last went out.
    last_send: Instant,

    /// Transmissions beyond the first.
    retries: u32,
}

/// Reliable transmitter for blobs and chat text.
pub struct Sender {
    link: Arc<dyn Link>,
    local: MacAddr,
    sink: Arc<dyn DeliverySink>,
    config: Config,

    /// Default destination, used when a call does not name one.
    dst: Mutex<Option<MacAddr>>,

    /// Next transfer id candidate; ids wrap and skip 0.
    next_file_id: Mutex<u16>,

    /// Fragments in flight, keyed by `(file_id, frag_index)`.
    outstanding: Mutex<HashMap<(u16, u16), Outstanding>>,

    /// Cleared to stop the sweeper.
    running: AtomicBool,
}

impl Sender {
    /// Creates a sender over `link`, reporting abandoned fragments to `sink`.
    pub fn new(link: Arc<dyn Link>, sink: Arc<dyn DeliverySink>, config: Config) -> Self {
        let local = link.local_addr();
        Self {
            link,
            local,
            sink,
            config,
            dst: Mutex::new(None),
            next_file_id: Mutex::new(1),
            outstanding: Mutex::new(HashMap::new()),
            running: AtomicBool::new(true),
        }
    }

    /// Sets the default destination used when a call omits one.
    pub fn set_destination(&self, dst: MacAddr) {
        *self.dst.lock().unwrap() = Some(dst);
    }

    fn resolve_dst(&self, dst: Option<MacAddr>) -> Result<MacAddr> {
        dst.or(*self.dst.lock().unwrap()).ok_or(Error::NoDestination)
    }

    /// Allocates a fresh transfer id.
    ///
    /// Skips 0 and, after the u16 counter wraps, any id that still has
    /// fragments in flight, so an old transfer is never aliased.
    fn alloc_file_id(&self) -> u16 {
        let mut next = self.next_file_id.lock().unwrap();
        let outstanding = self.outstanding.lock().unwrap();
        let mut id = *next;
        while id == 0 || outstanding.keys().any(|&(file_id, _)| file_id == id) {
            id = id.wrapping_add(1);
        }
        *next = id.wrapping_add(1);
        id
    }

    /// Sends chat text.
    ///
    /// Text that fits a single fragment goes out as one untracked frame
    /// with `file_id` 0 and no CRC trailer — fire and forget. Longer
    /// text takes the reliable fragmented path.
    pub fn send_chat(&self, text: &str, dst: Option<MacAddr>) -> Result<()> {
        let dst = self.resolve_dst(dst)?;
        let data = text.as_bytes();

        if data.len() <= self.config.max_payload {
            let header = Header {
                file_id: 0,
                total_frags: 1,
                frag_index: 0,
                flags: Flags::NONE,
                msg_type: MsgType::Chat,
                payload_len: data.len() as u16,
            };
            let mut payload = header.pack().to_vec();
            payload.extend_from_slice(data);
            let frame = wire::build_frame(dst, self.local, wire::ETHERTYPE, &payload);
            debug!("chat ({} bytes) to {dst}, fire-and-forget", data.len());
            return self.link.send(&frame);
        }

        self.send_blob(data, Some(dst), MsgType::Chat)
    }

    /// Reliably delivers `data` to one peer, fragmenting as needed.
    ///
    /// Blocks until every fragment is acknowledged or abandoned; at most
    /// one fragment of the transfer is in flight at a time. An abandoned
    /// fragment is reported on the sink and the transfer moves on, so
    /// the receiver ends up with an incomplete buffer rather than this
    /// call hanging forever.
    pub fn send_blob(&self, data: &[u8], dst: Option<MacAddr>, msg_type: MsgType) -> Result<()> {
        let dst = self.resolve_dst(dst)?;
        if data.is_empty() {
            return Err(Error::EmptyPayload);
        }

        let file_id = self.alloc_file_id();
        let total = data.len().div_ceil(self.config.max_payload) as u16;
        info!(
            "transfer {file_id}: {} bytes in {total} fragment(s) to {dst}",
            data.len()
        );

        for (index, chunk) in data.chunks(self.config.max_payload).enumerate() {
            let index = index as u16;
            let mut flags = Flags::NONE;
            if index == 0 {
                flags.insert(Flags::IS_FIRST);
            }
            if index == total - 1 {
                flags.insert(Flags::IS_LAST);
            }

            let payload_with_crc = wire::append_crc(chunk);
            let header = Header {
                file_id,
                total_frags: total,
                frag_index: index,
                flags,
                msg_type,
                payload_len: payload_with_crc.len() as u16,
            };
            let mut payload = header.pack().to_vec();
            payload.extend_from_slice(&payload_with_crc);
            let frame = wire::build_frame(dst, self.local, wire::ETHERTYPE, &payload);

            self.transmit_tracked(file_id, index, frame)?;
            self.wait_for_ack(file_id, index);
        }

        Ok(())
    }

    /// Records the fragment in the outstanding table, then puts it on
    /// the wire. The table is never held across the send.
    fn transmit_tracked(&self, file_id: u16, frag_index: u16, frame: Vec<u8>) -> Result<()> {
        self.outstanding.lock().unwrap().insert(
            (file_id, frag_index),
            Outstanding {
                frame: frame.clone(),
                last_send: Instant::now(),
                retries: 0,
            },
        );
        self.link.send(&frame)
    }

    /// Polls the outstanding table until the ACK handler removes the
    /// entry, retransmitting the cached frame on each timeout and
    /// abandoning the fragment once the retry budget is spent.
    ///
    /// The timeout is measured from `last_send`, so a retransmission by
    /// the background sweep pushes the next foreground one out too.
    fn wait_for_ack(&self, file_id: u16, frag_index: u16) {
        let key = (file_id, frag_index);
        loop {
            thread::sleep(self.config.poll_interval);

            let frame = {
                let mut table = self.outstanding.lock().unwrap();
                let Some(entry) = table.get_mut(&key) else {
                    // Acked, or already abandoned by the sweeper.
                    return;
                };
                if entry.last_send.elapsed() < self.config.ack_timeout {
                    continue;
                }
                if entry.retries >= self.config.max_retries {
                    table.remove(&key);
                    None
                } else {
                    entry.retries += 1;
                    entry.last_send = Instant::now();
                    Some(entry.frame.clone())
                }
            };

            match frame {
                Some(frame) => {
                    debug!("resending transfer {file_id} fragment {frag_index}");
                    if let Err(e) = self.link.send(&frame) {
                        warn!("resend of transfer {file_id} fragment {frag_index} failed: {e}");
                    }
                }
                None => {
                    self.report_abandoned(file_id, frag_index);
                    return;
                }
            }
        }
    }

    /// Removes the acknowledged fragment from the outstanding table.
    ///
    /// Called by the dispatcher for every `ACK` header; unknown keys
    /// (late or duplicate ACKs) are ignored.
    pub fn on_ack(&self, header: &Header) {
        let key = (header.file_id, header.frag_index);
        if self.outstanding.lock().unwrap().remove(&key).is_some() {
            debug!(
                "ack for transfer {} fragment {}",
                header.file_id, header.frag_index
            );
        }
    }

    /// Starts the background retransmission sweep.
    ///
    /// The sweep covers fragments whose foreground wait has not come
    /// around yet, e.g. during concurrent transfers.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let sender = Arc::clone(self);
        thread::spawn(move || {
            while sender.running.load(Ordering::Acquire) {
                thread::sleep(sender.config.sweep_interval);
                sender.sweep_once();
            }
        })
    }

    /// One pass over the outstanding table: retransmit timed-out
    /// entries, drop entries past the retry budget.
    ///
    /// Frames to resend are collected under the lock and sent after it
    /// is released.
    fn sweep_once(&self) {
        let mut resend = Vec::new();
        let mut abandoned = Vec::new();
        {
            let mut table = self.outstanding.lock().unwrap();
            table.retain(|&(file_id, frag_index), entry| {
                if entry.last_send.elapsed() < self.config.ack_timeout {
                    return true;
                }
                if entry.retries >= self.config.max_retries {
                    abandoned.push((file_id, frag_index));
                    return false;
                }
                entry.retries += 1;
                entry.last_send = Instant::now();
                resend.push((file_id, frag_index, entry.frame.clone()));
                true
            });
        }

        for (file_id, frag_index, frame) in resend {
            debug!("sweep resending transfer {file_id} fragment {frag_index}");
            if let Err(e) = self.link.send(&frame) {
                warn!("sweep resend of transfer {file_id} fragment {frag_index} failed: {e}");
            }
        }
        for (file_id, frag_index) in abandoned {
            self.report_abandoned(file_id, frag_index);
        }
    }

    fn report_abandoned(&self, file_id: u16, frag_index: u16) {
        warn!("transfer {file_id}: fragment {frag_index} exhausted its retries, abandoning");
        self.sink.on_error(format!(
            "transfer {file_id}: fragment {frag_index} abandoned after {} transmissions",
            self.config.max_retries + 1
        ));
    }

    /// Tells the sweeper to exit after its current pass.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::testutil::CaptureLink;
    use crate::sink::Event;
    use crate::wire::{ETHER_HEADER_LEN, parse_frame};
    use std::time::Duration;

    fn addr(last: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, last])
    }

    fn fast_config() -> Config {
        Config::default()
            .with_max_payload(4)
            .with_ack_timeout(Duration::from_millis(40))
            .with_poll_interval(Duration::from_millis(5))
            .with_sweep_interval(Duration::from_millis(10))
            .with_max_retries(2)
    }

    struct NullSink;
    impl DeliverySink for NullSink {
        fn on_chat(&self, _src: MacAddr, _text: String) {}
        fn on_blob(&self, _src: MacAddr, _data: Vec<u8>) {}
    }

    fn new_sender(link: Arc<CaptureLink>, config: Config) -> Arc<Sender> {
        Arc::new(Sender::new(link, Arc::new(NullSink), config))
    }

    /// Headers of the data frames captured so far.
    fn data_headers(link: &CaptureLink) -> Vec<(Header, Vec<u8>)> {
        link.sent_frames()
            .iter()
            .map(|frame| {
                let (header, body) = Header::unpack(&frame[ETHER_HEADER_LEN..]).unwrap();
                (header, body.to_vec())
            })
            .collect()
    }

    /// Acks every captured data frame until `running` clears.
    fn spawn_acker(
        link: Arc<CaptureLink>,
        sender: Arc<Sender>,
        running: Arc<AtomicBool>,
    ) -> thread::JoinHandle<()> {
        thread::spawn(move || {
            while running.load(Ordering::Acquire) {
                for (header, _) in data_headers(&link) {
                    let ack = Header::control(MsgType::Ack, header.file_id, header.frag_index);
                    sender.on_ack(&ack);
                }
                thread::sleep(Duration::from_millis(2));
            }
        })
    }

    #[test]
    fn test_fragmentation_covers_input() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());

        let running = Arc::new(AtomicBool::new(true));
        let acker = spawn_acker(Arc::clone(&link), Arc::clone(&sender), Arc::clone(&running));

        let data = b"fragmentation totality".to_vec();
        sender
            .send_blob(&data, Some(addr(2)), MsgType::FileChunk)
            .unwrap();
        running.store(false, Ordering::Release);
        acker.join().unwrap();

        let headers = data_headers(&link);
        assert_eq!(headers.len(), data.len().div_ceil(4));

        let mut reassembled = Vec::new();
        for (i, (header, body)) in headers.iter().enumerate() {
            assert_eq!(header.frag_index as usize, i);
            assert_eq!(header.total_frags as usize, headers.len());
            assert_eq!(header.msg_type, MsgType::FileChunk);
            assert_eq!(
                header.flags.contains(Flags::IS_FIRST),
                i == 0,
                "IS_FIRST on fragment {i}"
            );
            assert_eq!(
                header.flags.contains(Flags::IS_LAST),
                i == headers.len() - 1,
                "IS_LAST on fragment {i}"
            );

            let payload = &body[..header.payload_len as usize];
            let (ok, chunk) = wire::verify_and_strip(payload).unwrap();
            assert!(ok);
            reassembled.extend_from_slice(chunk);
        }
        assert_eq!(reassembled, data);
        assert!(sender.outstanding.lock().unwrap().is_empty());
    }

    #[test]
    fn test_short_chat_is_fire_and_forget() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());

        sender.send_chat("hi", Some(addr(2))).unwrap();

        let frames = link.sent_frames();
        assert_eq!(frames.len(), 1);
        // Header plus the two text bytes, no CRC trailer.
        assert_eq!(frames[0].len(), ETHER_HEADER_LEN + 10 + 2);

        let parsed = parse_frame(&frames[0]).unwrap();
        let (header, body) = Header::unpack(parsed.payload).unwrap();
        assert_eq!(header.file_id, 0);
        assert_eq!(header.total_frags, 1);
        assert_eq!(header.frag_index, 0);
        assert_eq!(header.msg_type, MsgType::Chat);
        assert_eq!(&body[..2], b"hi");

        assert!(sender.outstanding.lock().unwrap().is_empty());
    }

    #[test]
    fn test_long_chat_takes_reliable_path() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());

        let running = Arc::new(AtomicBool::new(true));
        let acker = spawn_acker(Arc::clone(&link), Arc::clone(&sender), Arc::clone(&running));

        sender.send_chat("longer than four", Some(addr(2))).unwrap();
        running.store(false, Ordering::Release);
        acker.join().unwrap();

        let headers = data_headers(&link);
        assert!(headers.len() > 1);
        assert!(headers.iter().all(|(h, _)| h.msg_type == MsgType::Chat));
        assert!(headers.iter().all(|(h, _)| h.file_id != 0));
    }

    #[test]
    fn test_empty_blob_rejected() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(link, fast_config());
        assert!(matches!(
            sender.send_blob(&[], Some(addr(2)), MsgType::FileChunk),
            Err(Error::EmptyPayload)
        ));
    }

    #[test]
    fn test_missing_destination_rejected() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());
        assert!(matches!(
            sender.send_chat("hello", None),
            Err(Error::NoDestination)
        ));

        // A stored default destination fixes it.
        sender.set_destination(addr(2));
        sender.send_chat("hello", None).unwrap();
        assert_eq!(link.sent_frames().len(), 1);
    }

    #[test]
    fn test_retry_budget_bounds_transmissions() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let (sink, events) = crate::sink::ChannelSink::new();
        let sender = Arc::new(Sender::new(
            Arc::clone(&link) as Arc<dyn Link>,
            Arc::new(sink),
            fast_config(),
        ));

        // Nobody acks: the single fragment must go out exactly
        // max_retries + 1 times, then be abandoned.
        sender
            .send_blob(b"data", Some(addr(2)), MsgType::FileChunk)
            .unwrap();

        assert_eq!(link.sent_frames().len(), 3);
        assert!(sender.outstanding.lock().unwrap().is_empty());
        assert!(matches!(
            events.try_recv().unwrap(),
            Event::Error { .. }
        ));

        // Retransmissions are byte-identical to the original.
        let frames = link.sent_frames();
        assert_eq!(frames[0], frames[1]);
        assert_eq!(frames[1], frames[2]);
    }

    #[test]
    fn test_sweeper_retransmits_and_abandons() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());

        let sweeper = sender.spawn_sweeper();
        let frame = wire::build_frame(addr(2), addr(1), wire::ETHERTYPE, b"x");
        sender.transmit_tracked(9, 0, frame).unwrap();

        // 3 transmissions at ~40 ms apart, then the entry is dropped.
        thread::sleep(Duration::from_millis(250));
        assert_eq!(link.sent_frames().len(), 3);
        assert!(sender.outstanding.lock().unwrap().is_empty());

        sender.stop();
        sweeper.join().unwrap();
    }

    #[test]
    fn test_file_id_allocation_skips_zero_and_in_flight() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(link, fast_config());

        assert_eq!(sender.alloc_file_id(), 1);
        assert_eq!(sender.alloc_file_id(), 2);

        // Force the counter to wrap; id 0 must be skipped.
        *sender.next_file_id.lock().unwrap() = u16::MAX;
        assert_eq!(sender.alloc_file_id(), u16::MAX);
        assert_eq!(sender.alloc_file_id(), 1);

        // An id with fragments still in flight is never reused.
        *sender.next_file_id.lock().unwrap() = 5;
        sender.outstanding.lock().unwrap().insert(
            (5, 0),
            Outstanding {
                frame: Vec::new(),
                last_send: Instant::now(),
                retries: 0,
            },
        );
        assert_eq!(sender.alloc_file_id(), 6);
    }

    #[test]
    fn test_ack_removes_outstanding_entry() {
        let link = Arc::new(CaptureLink::new(addr(1)));
        let sender = new_sender(Arc::clone(&link), fast_config());

        let frame = wire::build_frame(addr(2), addr(1), wire::ETHERTYPE, b"x");
        sender.transmit_tracked(3, 1, frame).unwrap();
        assert_eq!(sender.outstanding.lock().unwrap().len(), 1);

        sender.on_ack(&Header::control(MsgType::Ack, 3, 1));
        assert!(sender.outstanding.lock().unwrap().is_empty());

        // A duplicate ACK is a no-op.
        sender.on_ack(&Header::control(MsgType::Ack, 3, 1));
    }
}
