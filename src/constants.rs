//! Compile-time limits for the co-simulation core.
//!
//! These are fixed-capacity bounds, not tunables: every table they describe is a
//! plain array sized at compile time so that a clock domain's state has a fixed
//! layout, mappable byte-for-byte across process boundaries.

/// Maximum number of sinks a single channel can fan out to.
pub const MAX_SINKS_PER_CHANNEL: usize = 4;

/// Maximum number of outbound, flush, and simulate channels a clock domain may
/// register, per list.
pub const MAX_CHANNELS_PER_CLOCK: usize = 8;

/// Number of timer slots per clock domain.
pub const MAX_TIMERS_PER_CLOCK: usize = 8;

/// Number of ISR slots per clock domain; also the bit width of the pending and
/// enable bitmaps.
pub const ISR_VECTOR_SIZE: usize = 64;

/// Maximum length, in bytes, of a channel's debug name.
pub const MAX_CHANNEL_NAME_LEN: usize = 255;

/// Maximum length, in bytes, of a clock domain's debug name.
pub const MAX_CLOCK_NAME_LEN: usize = 63;

/// Bytes of header (an 8-byte little-endian timestamp) prefixed to every
/// datagram written into a sink's ring buffer.
pub const DATAGRAM_HEADER_SIZE: usize = 8;

/// Denominator implicit in every fixed-point rate multiplier (`2^32`).
pub const FIXED_POINT_DENOMINATOR_SHIFT: u32 = 32;

/// Sentinel returned by `next_event_timestamp` when a sink has no pending event.
pub const NO_EVENT_TIMESTAMP: u64 = u64::MAX;

/// Wall-clock threshold after which a governed spin emits its first stall diagnostic.
pub const GOVERNOR_STALL_THRESHOLD_MILLIS: u64 = 10;

/// Coarse back-off sleep used once a spin has already logged a stall, on the
/// assumption that the peer is paused (e.g. in a debugger) rather than merely slow.
pub const GOVERNOR_BACKOFF_MILLIS: u64 = 1;

static_assertions::const_assert_eq!(ISR_VECTOR_SIZE, 64);
static_assertions::const_assert!(MAX_SINKS_PER_CHANNEL > 0);
static_assertions::const_assert!(MAX_CHANNEL_NAME_LEN < 256);
