//! Causal channel and sink: fan-out of timestamped, fixed-size events from one
//! producer to a bounded set of consumers, with per-channel watermark
//! bookkeeping.
//!
//! A sink's ring buffer is written by exactly one producer (the host
//! channel's [`insert_event`](Channel::insert_event)) and drained by exactly
//! one consumer (the clock domain that registered it) — the same
//! single-writer/single-reader contract [`RingBuffer`](crate::ring_buffer::RingBuffer)
//! assumes. Sinks hold a shared handle to their host channel's watermark
//! (`Arc<AtomicU64>`) rather than a raw back-pointer, per the arena-style
//! sharing this crate uses in place of the original's cyclic owning pointers.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::constants::{DATAGRAM_HEADER_SIZE, MAX_SINKS_PER_CHANNEL, NO_EVENT_TIMESTAMP};
use crate::governor::{CancelToken, Governor};
use crate::ring_buffer::RingBuffer;

/// Callback invoked once per delivered event: `(effective_timestamp, payload)`.
pub type EventCallback = Box<dyn FnMut(u64, &[u8]) + Send>;

struct CallbackSlot {
    callback: EventCallback,
    scratch: Vec<u8>,
}

/// One consumer's inbox on a [`Channel`].
pub struct Sink {
    ring: RingBuffer,
    enabled: AtomicBool,
    message_size: usize,
    host_simulated_until: Arc<AtomicU64>,
    slot: Mutex<Option<CallbackSlot>>,
    name: String,
}

impl Sink {
    fn new(ring_capacity: usize, message_size: usize, host_simulated_until: Arc<AtomicU64>, name: String) -> Self {
        Self {
            ring: RingBuffer::new(ring_capacity),
            enabled: AtomicBool::new(false),
            message_size,
            host_simulated_until,
            slot: Mutex::new(None),
            name,
        }
    }

    /// Enable or disable this sink, installing (or clearing) its callback.
    ///
    /// # Panics
    /// Panics if a callback is installed with a scratch buffer smaller than
    /// `message_size + 8` — an undersized scratch buffer is a programmer
    /// error, not a recoverable condition.
    pub fn set_enabled(&self, enabled: bool, callback: Option<EventCallback>, scratch: Vec<u8>) {
        let mut slot = self.slot.lock();
        *slot = callback.map(|callback| {
            assert!(
                scratch.len() >= self.message_size + DATAGRAM_HEADER_SIZE,
                "scratch buffer ({} bytes) too small for message_size {} + header",
                scratch.len(),
                self.message_size
            );
            CallbackSlot { callback, scratch }
        });
        self.enabled.store(enabled, Ordering::Release);
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Peek the timestamp of the next undelivered event, or
    /// [`NO_EVENT_TIMESTAMP`] if the sink is empty. Never blocks.
    pub fn next_event_timestamp(&self) -> u64 {
        let mut header = [0u8; DATAGRAM_HEADER_SIZE];
        if self.ring.peek(&mut header) {
            u64::from_le_bytes(header)
        } else {
            NO_EVENT_TIMESTAMP
        }
    }

    /// Drain events with effective timestamp `<= target`, invoking the
    /// installed callback for each, in FIFO order. Does not wait for more
    /// data to arrive. Returns the number of events delivered.
    pub fn process_events_until_no_wait(&self, target: u64) -> usize {
        let mut delivered = 0;
        loop {
            let mut header = [0u8; DATAGRAM_HEADER_SIZE];
            if !self.ring.peek(&mut header) {
                break;
            }
            let ts = u64::from_le_bytes(header);
            if ts > target {
                break;
            }

            let mut slot_guard = self.slot.lock();
            let Some(slot) = slot_guard.as_mut() else {
                // No callback installed: drop the datagram so the producer
                // isn't wedged behind a disabled-but-still-draining sink.
                self.ring.skip(DATAGRAM_HEADER_SIZE + self.message_size);
                delivered += 1;
                continue;
            };

            let total = DATAGRAM_HEADER_SIZE + self.message_size;
            slot.scratch.resize(total, 0);
            self.ring.read(&mut slot.scratch[..total]);
            (slot.callback)(ts, &slot.scratch[DATAGRAM_HEADER_SIZE..total]);
            delivered += 1;
        }
        delivered
    }

    /// Spin (governed) until the host channel's watermark reaches `target`,
    /// checking `exit` each iteration, then drain as
    /// [`process_events_until_no_wait`](Self::process_events_until_no_wait) does.
    pub fn process_events_until(&self, target: u64, exit: &CancelToken) -> usize {
        let mut governor = Governor::new();
        loop {
            crate::governor::check_exit(exit, &self.name);
            let until = self.host_simulated_until.load(Ordering::Acquire);
            if until >= target {
                break;
            }
            governor.iterate(until, target, &self.name);
        }
        governor.done(&self.name);
        self.process_events_until_no_wait(target)
    }

    #[inline]
    pub fn channel_simulated_until(&self) -> u64 {
        self.host_simulated_until.load(Ordering::Acquire)
    }

    /// Spin (governed) until the host channel's watermark reaches `ts`,
    /// without draining anything — used by the horizon scan to force a
    /// stalled producer to publish before computing `horizon`.
    pub fn wait_channel_until(&self, ts: u64, exit: &CancelToken) {
        let mut governor = Governor::new();
        loop {
            crate::governor::check_exit(exit, &self.name);
            let current = self.host_simulated_until.load(Ordering::Acquire);
            if current >= ts {
                break;
            }
            governor.iterate(current, ts, &self.name);
        }
        governor.done(&self.name);
    }
}

/// One producer, fanning timestamped fixed-size events out to up to
/// [`MAX_SINKS_PER_CHANNEL`] sinks.
pub struct Channel {
    message_size: usize,
    minimal_latency: u64,
    simulated_until: Arc<AtomicU64>,
    sinks: Vec<Arc<Sink>>,
    debug_name: String,
}

impl Channel {
    /// Create a channel carrying fixed `message_size`-byte payloads.
    pub fn new(message_size: usize, debug_name: impl Into<String>) -> Self {
        let debug_name = debug_name.into();
        assert!(
            debug_name.len() <= crate::constants::MAX_CHANNEL_NAME_LEN,
            "channel debug name exceeds {} bytes",
            crate::constants::MAX_CHANNEL_NAME_LEN
        );
        Self {
            message_size,
            minimal_latency: 1,
            simulated_until: Arc::new(AtomicU64::new(0)),
            sinks: Vec::with_capacity(MAX_SINKS_PER_CHANNEL),
            debug_name,
        }
    }

    /// Create a channel from a validated [`ChannelConfig`](crate::config::ChannelConfig).
    pub fn from_config(config: crate::config::ChannelConfig) -> Self {
        let mut channel = Self::new(config.message_size, config.debug_name);
        channel.minimal_latency = config.minimal_latency;
        channel
    }

    pub fn message_size(&self) -> usize {
        self.message_size
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn simulated_until(&self) -> u64 {
        self.simulated_until.load(Ordering::Acquire)
    }

    /// Set the minimum propagation latency applied to every future insert.
    ///
    /// # Panics
    /// Panics if `latency == 0`: a zero latency floor would allow zero-delay
    /// cycles between domains, violating forward-progress of the distributed
    /// watermark protocol.
    pub fn set_minimal_latency(&mut self, latency: u64) {
        assert!(latency > 0, "minimal_latency must be > 0");
        self.minimal_latency = latency;
    }

    /// Allocate a new sink, with a ring buffer sized to hold at least one
    /// datagram (`ring_capacity` bytes, usable capacity `ring_capacity - 1`).
    ///
    /// # Panics
    /// Panics if the channel's fixed sink table is already full.
    pub fn allocate_sink(&mut self, ring_capacity: usize) -> Arc<Sink> {
        assert!(
            self.sinks.len() < MAX_SINKS_PER_CHANNEL,
            "channel {:?} has no free sink slots",
            self.debug_name
        );
        assert!(
            ring_capacity > self.message_size + DATAGRAM_HEADER_SIZE,
            "sink ring buffer too small to hold one datagram"
        );
        let sink_name = format!("{}/sink{}", self.debug_name, self.sinks.len());
        let sink = Arc::new(Sink::new(ring_capacity, self.message_size, self.simulated_until.clone(), sink_name));
        self.sinks.push(sink.clone());
        sink
    }

    /// Insert an event requested at `requested_ts`. The channel clamps the
    /// timestamp forward so that effective timestamps are strictly
    /// increasing, spins (governed) on any enabled sink whose ring buffer
    /// lacks room, and returns the effective timestamp actually used.
    ///
    /// # Panics
    /// Panics if `payload.len() != message_size`.
    pub fn insert_event(&mut self, requested_ts: u64, payload: &[u8]) -> u64 {
        assert_eq!(payload.len(), self.message_size, "payload size mismatch");

        let current = self.simulated_until.load(Ordering::Acquire);
        let effective = if requested_ts <= current { current + 1 } else { requested_ts };

        let header = effective.to_le_bytes();
        for sink in &self.sinks {
            if !sink.is_enabled() {
                continue;
            }
            let mut governor = Governor::new();
            let needed = DATAGRAM_HEADER_SIZE + self.message_size;
            while sink.ring.available_write() < needed {
                governor.iterate(sink.ring.available_write() as u64, needed as u64, &self.debug_name);
            }
            governor.done(&self.debug_name);
            sink.ring.write(&header);
            sink.ring.write(payload);
            trace!(channel = %self.debug_name, effective, "event inserted");
        }

        self.simulated_until.store(effective, Ordering::Release);
        effective
    }

    /// Announce that no future event on this channel will carry an effective
    /// timestamp at or below `ts + minimal_latency - 1`.
    pub fn update_time(&self, ts: u64) {
        let floor = ts.saturating_add(self.minimal_latency);
        self.simulated_until.fetch_max(floor, Ordering::AcqRel);
    }

    /// Spin (governed) until `simulated_until >= ts`.
    pub fn wait_simulated_until(&self, ts: u64, exit: &CancelToken) {
        let mut governor = Governor::new();
        loop {
            crate::governor::check_exit(exit, &self.debug_name);
            let current = self.simulated_until.load(Ordering::Acquire);
            if current >= ts {
                break;
            }
            governor.iterate(current, ts, &self.debug_name);
        }
        governor.done(&self.debug_name);
    }
}
