//! Link endpoint abstraction.
//!
//! The core talks to the wire exclusively through the [`Link`] trait,
//! so it never depends on the raw-socket mechanism that implements it
//! in production.
//!
//! # Implementations
//!
//! - `MemSegment` / `MemLink`: an in-memory Ethernet segment for tests
//!   and demos, delivering frames by destination address

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::wire::{ETHER_HEADER_LEN, MacAddr};

/// A raw Ethernet endpoint bound to one interface.
///
/// `recv` blocks until a frame arrives; closing the endpoint from
/// another thread must wake a blocked `recv` with [`Error::LinkClosed`].
pub trait Link: Send + Sync {
    /// Transmits one full Ethernet II frame.
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Blocks until the next frame arrives on the bound interface.
    fn recv(&self) -> Result<Vec<u8>>;

    /// The hardware address the endpoint is bound to.
    fn local_addr(&self) -> MacAddr;

    /// Shuts the endpoint down, waking any blocked `recv`.
    fn close(&self);
}

/// Minimum Ethernet frame length on the wire; shorter frames are padded.
const MIN_WIRE_FRAME: usize = 60;

/// How often a blocked in-memory `recv` rechecks the closed flag.
const RECV_POLL: Duration = Duration::from_millis(25);

struct Port {
    addr: MacAddr,
    tx: mpsc::Sender<Vec<u8>>,
}

/// An in-memory broadcast segment connecting [`MemLink`] endpoints.
///
/// A frame sent by one endpoint is delivered to every other endpoint
/// whose address matches the destination, or to all others when the
/// destination is broadcast. Frames are zero-padded to the 60-byte wire
/// minimum, mimicking what drivers do on a real segment. Nothing is
/// echoed back to the sender.
#[derive(Default)]
pub struct MemSegment {
    ports: Mutex<Vec<Port>>,
}

impl MemSegment {
    /// Creates an empty segment.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attaches a new endpoint with the given address.
    pub fn attach(self: &Arc<Self>, addr: MacAddr) -> MemLink {
        let (tx, rx) = mpsc::channel();
        self.ports.lock().unwrap().push(Port { addr, tx });
        MemLink {
            segment: Arc::clone(self),
            addr,
            rx: Mutex::new(rx),
            closed: AtomicBool::new(false),
        }
    }

    fn deliver(&self, src: MacAddr, frame: &[u8]) {
        let mut padded = frame.to_vec();
        if padded.len() < MIN_WIRE_FRAME {
            padded.resize(MIN_WIRE_FRAME, 0);
        }

        let mut dst = [0u8; 6];
        dst.copy_from_slice(&frame[0..6]);
        let dst = MacAddr(dst);

        for port in self.ports.lock().unwrap().iter() {
            if port.addr == src {
                continue;
            }
            if dst.is_broadcast() || dst == port.addr {
                let _ = port.tx.send(padded.clone());
            }
        }
    }
}

/// One endpoint attached to a [`MemSegment`].
pub struct MemLink {
    segment: Arc<MemSegment>,
    addr: MacAddr,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    closed: AtomicBool,
}

impl Link for MemLink {
    fn send(&self, frame: &[u8]) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::LinkClosed);
        }
        if frame.len() < ETHER_HEADER_LEN {
            return Err(Error::FrameTooShort(frame.len()));
        }
        self.segment.deliver(self.addr, frame);
        Ok(())
    }

    fn recv(&self) -> Result<Vec<u8>> {
        let rx = self.rx.lock().unwrap();
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(Error::LinkClosed);
            }
            match rx.recv_timeout(RECV_POLL) {
                Ok(frame) => return Ok(frame),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(Error::LinkClosed),
            }
        }
    }

    fn local_addr(&self) -> MacAddr {
        self.addr
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    //! Link doubles shared by the unit tests.

    use super::*;

    /// Records every transmitted frame; never produces inbound traffic.
    pub(crate) struct CaptureLink {
        addr: MacAddr,
        pub(crate) sent: Mutex<Vec<Vec<u8>>>,
    }

    impl CaptureLink {
        pub(crate) fn new(addr: MacAddr) -> Self {
            Self {
                addr,
                sent: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Link for CaptureLink {
        fn send(&self, frame: &[u8]) -> Result<()> {
            self.sent.lock().unwrap().push(frame.to_vec());
            Ok(())
        }

        fn recv(&self) -> Result<Vec<u8>> {
            Err(Error::LinkClosed)
        }

        fn local_addr(&self) -> MacAddr {
            self.addr
        }

        fn close(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_unicast_delivery() {
        let segment = MemSegment::new();
        let a = segment.attach(addr(1));
        let b = segment.attach(addr(2));
        let c = segment.attach(addr(3));

        let mut frame = Vec::new();
        frame.extend_from_slice(&addr(2).octets());
        frame.extend_from_slice(&addr(1).octets());
        frame.extend_from_slice(&[0x88, 0xB5]);
        frame.extend_from_slice(b"hello");
        a.send(&frame).unwrap();

        let received = b.recv().unwrap();
        assert_eq!(&received[..frame.len()], frame.as_slice());

        // Padded to the wire minimum, and not delivered elsewhere.
        assert_eq!(received.len(), 60);
        c.close();
        assert!(matches!(c.recv(), Err(Error::LinkClosed)));
    }

    #[test]
    fn test_broadcast_reaches_all_but_sender() {
        let segment = MemSegment::new();
        let a = segment.attach(addr(1));
        let b = segment.attach(addr(2));
        let c = segment.attach(addr(3));

        let mut frame = Vec::new();
        frame.extend_from_slice(&MacAddr::BROADCAST.octets());
        frame.extend_from_slice(&addr(1).octets());
        frame.extend_from_slice(&[0x88, 0xB5]);
        a.send(&frame).unwrap();

        assert!(b.recv().is_ok());
        assert!(c.recv().is_ok());
        a.close();
        assert!(matches!(a.recv(), Err(Error::LinkClosed)));
    }

    #[test]
    fn test_close_wakes_receiver() {
        let segment = MemSegment::new();
        let a = Arc::new(segment.attach(addr(1)));

        let link = Arc::clone(&a);
        let handle = std::thread::spawn(move || link.recv());
        std::thread::sleep(Duration::from_millis(50));
        a.close();

        assert!(matches!(handle.join().unwrap(), Err(Error::LinkClosed)));
    }

    #[test]
    fn test_send_rejects_short_frames() {
        let segment = MemSegment::new();
        let a = segment.attach(addr(1));
        assert!(matches!(
            a.send(&[0u8; 10]),
            Err(Error::FrameTooShort(10))
        ));
    }
}
