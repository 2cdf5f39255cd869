//! Reliable transfer: the sending and receiving halves.
//!
//! - `Sender`: fragmentation, per-fragment stop-and-wait, bounded
//!   retransmission driven by a background sweep
//! - `Receiver`: CRC validation, out-of-order reassembly, duplicate
//!   suppression, and ACK emission

mod receiver;
mod sender;

pub use receiver::Receiver;
pub use sender::Sender;
