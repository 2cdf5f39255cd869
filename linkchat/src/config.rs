//! Timing and sizing knobs for a node.

use std::time::Duration;

/// Largest data payload per fragment, before the CRC trailer.
///
/// Link header (14) + protocol header (10) + payload + CRC (4) must fit
/// a 1500-byte Ethernet MTU.
pub const MAX_PAYLOAD: usize = 1472;

/// Runtime configuration for a [`Node`](crate::Node).
///
/// The defaults match the protocol definition; tests shrink the timing
/// knobs. Wire-format constants are deliberately not configurable.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum data bytes per fragment.
    pub max_payload: usize,

    /// How long a fragment may stay unacknowledged before retransmission.
    pub ack_timeout: Duration,

    /// Retransmissions allowed per fragment before it is abandoned.
    pub max_retries: u32,

    /// Period of the background retransmission sweep.
    pub sweep_interval: Duration,

    /// Poll period of the foreground ACK wait.
    pub poll_interval: Duration,

    /// Age at which a neighbor disappears from the neighbor list.
    pub neighbor_ttl: Duration,

    /// Idle age at which an incomplete reassembly buffer is discarded.
    pub reassembly_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_payload: MAX_PAYLOAD,
            ack_timeout: Duration::from_secs(2),
            max_retries: 8,
            sweep_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            neighbor_ttl: Duration::from_secs(300),
            reassembly_ttl: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Sets the maximum data bytes per fragment.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    /// Sets the ACK timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Sets the retransmission budget per fragment.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the background sweep period.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the foreground ACK poll period.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the neighbor time-to-live.
    pub fn with_neighbor_ttl(mut self, ttl: Duration) -> Self {
        self.neighbor_ttl = ttl;
        self
    }

    /// Sets the idle eviction age for incomplete reassembly buffers.
    pub fn with_reassembly_ttl(mut self, ttl: Duration) -> Self {
        self.reassembly_ttl = ttl;
        self
    }
}
