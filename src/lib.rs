//! Deterministic discrete-event co-simulation core.
//!
//! Several independently-scheduled [`ClockDomain`](clock::ClockDomain)s — each
//! modelling an MCU, peripheral, or bus — exchange timestamped events over
//! [`Channel`](channel::Channel)s backed by lock-free SPSC
//! [`RingBuffer`](ring_buffer::RingBuffer)s, cooperatively advancing a shared
//! global-time watermark without ever reordering causally-related events.
//!
//! Start with [`config::ClockConfig`] and [`config::ChannelConfig`] to build a
//! domain and its channels, then drive it with
//! [`ClockDomain::wait_until_global`](clock::ClockDomain::wait_until_global).

pub mod channel;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fixed_point;
pub mod governor;
pub mod ring_buffer;
pub mod shared_memory;

pub use channel::{Channel, Sink};
pub use clock::ClockDomain;
pub use config::{ChannelConfig, ClockConfig};
pub use error::{Result, SimError};
pub use governor::CancelToken;
pub use ring_buffer::RingBuffer;

/// Crate version, exposed for diagnostics the way the teacher exposes its own.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
