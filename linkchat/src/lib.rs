//! Link-Chat: reliable unicast/broadcast messaging directly over raw
//! Ethernet frames — no IP involved.
//!
//! The core provides neighbor discovery on a local segment, reliable
//! in-order reassembly of fragmented payloads with per-fragment
//! acknowledgment and bounded retransmission, and CRC-32 integrity
//! verification. Two payload classes are carried: short chat text and
//! arbitrary binary blobs.
//!
//! The crate is wired from five components:
//!
//! - [`wire`]: Ethernet II framing, the 10-byte protocol header, and
//!   the CRC-32 payload trailer
//! - [`discovery`]: broadcast probes, unicast replies, TTL-pruned
//!   neighbor set
//! - [`transfer`]: the stop-and-wait sender and the reassembling
//!   receiver
//! - [`dispatcher`]: the blocking read loop routing frames by type
//! - [`node`]: thread wiring and the public operations
//!
//! I/O goes through the [`Link`] trait; completed traffic leaves
//! through a [`DeliverySink`]. Both are supplied by the embedder, which
//! keeps the core independent of raw sockets, disks, and displays.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use linkchat::{ChannelSink, Config, Event, MacAddr, MemSegment, Node};
//!
//! let segment = MemSegment::new();
//! let a_addr = MacAddr([0x02, 0, 0, 0, 0, 0xA]);
//! let b_addr = MacAddr([0x02, 0, 0, 0, 0, 0xB]);
//!
//! let (sink_a, _events_a) = ChannelSink::new();
//! let (sink_b, events_b) = ChannelSink::new();
//! let a = Node::spawn(Arc::new(segment.attach(a_addr)), Arc::new(sink_a), Config::default());
//! let _b = Node::spawn(Arc::new(segment.attach(b_addr)), Arc::new(sink_b), Config::default());
//!
//! a.send_chat("hello over raw ethernet", Some(b_addr)).unwrap();
//! match events_b.recv().unwrap() {
//!     Event::Chat { src, text } => {
//!         assert_eq!(src, a_addr);
//!         assert_eq!(text, "hello over raw ethernet");
//!     }
//!     other => panic!("unexpected event: {other:?}"),
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod link;
pub mod node;
pub mod sink;
pub mod transfer;
pub mod wire;

pub use config::{Config, MAX_PAYLOAD};
pub use error::{Error, Result};
pub use link::{Link, MemLink, MemSegment};
pub use node::Node;
pub use sink::{ChannelSink, DeliverySink, Event};
pub use wire::{ETHERTYPE, Header, MacAddr, MsgType};
