//! Local clock domain: the cooperative single-threaded scheduler that owns a
//! simulated MCU, peripheral, or bus process's view of time.
//!
//! A domain owns its outbound channels, subscribes to peer channels via
//! sinks, schedules timers and ISRs, and advances a monotonic `global_time`
//! watermark in lock-step with its peers through [`try_advance_time_global`].
//! ISR handlers need mutable access to the owning domain (the original's
//! `localClock_isrCallback_t` takes the clock pointer); since a handler
//! stored inside the domain can't also borrow the domain while running, each
//! dispatch takes the handler out of its slot, invokes it, and restores it —
//! unless the handler installed a replacement for itself, in which case the
//! replacement wins. Timer callbacks take no such parameter (the original's
//! `localClock_timerCallback_t` carries only an opaque parameter) and so are
//! plain `FnMut()` closures capturing whatever state they need.

use tracing::trace;

use crate::channel::{Channel, Sink};
use crate::config::ClockConfig;
use crate::constants::{ISR_VECTOR_SIZE, MAX_CHANNELS_PER_CLOCK, MAX_TIMERS_PER_CLOCK};
use crate::fixed_point;
use crate::governor::CancelToken;
use std::sync::Arc;

/// Timer callback: captures whatever state it needs, takes no parameters.
pub type TimerCallback = Box<dyn FnMut() + Send>;

/// ISR callback: receives the owning domain (for timer/channel/ISR
/// manipulation from within the handler) and the firing ISR's index.
pub type IsrCallback = Box<dyn FnMut(&mut ClockDomain, u32) + Send>;

#[derive(Default)]
struct TimerSlot {
    allocated: bool,
    enabled: bool,
    timeout_at_global: u64,
    period: u64,
    callback: Option<TimerCallback>,
}

#[derive(Default)]
struct IsrSlot {
    callback: Option<IsrCallback>,
}

/// One simulated process's clock: owns outbound channels, watches inbound
/// sinks, and fires timers/ISRs as `global_time` advances.
pub struct ClockDomain {
    global_time: u64,
    multiplier_to_local: u64,
    multiplier_to_us: u64,
    multiplier_us_to_ticks: u64,
    add_global_to_local_ticks: i64,
    channels_out: Vec<Channel>,
    sinks_simulate: Vec<Arc<Sink>>,
    sinks_flush: Vec<Arc<Sink>>,
    timers: Vec<TimerSlot>,
    isrs: Vec<IsrSlot>,
    isr_global_enabled: bool,
    isr_pending: u64,
    isr_enabled_mask: u64,
    exit: CancelToken,
    debug_name: String,
}

impl ClockDomain {
    /// Construct a domain from a validated [`ClockConfig`].
    pub fn new(config: ClockConfig) -> Self {
        let mut timers = Vec::with_capacity(MAX_TIMERS_PER_CLOCK);
        timers.resize_with(MAX_TIMERS_PER_CLOCK, TimerSlot::default);
        let mut isrs = Vec::with_capacity(ISR_VECTOR_SIZE);
        isrs.resize_with(ISR_VECTOR_SIZE, IsrSlot::default);

        Self {
            global_time: config.initial_global_time,
            multiplier_to_local: config.multiplier_to_local,
            multiplier_to_us: config.multiplier_to_us,
            multiplier_us_to_ticks: config.multiplier_us_to_ticks,
            add_global_to_local_ticks: config.add_global_to_local_ticks,
            channels_out: Vec::with_capacity(MAX_CHANNELS_PER_CLOCK),
            sinks_simulate: Vec::with_capacity(MAX_CHANNELS_PER_CLOCK),
            sinks_flush: Vec::with_capacity(MAX_CHANNELS_PER_CLOCK),
            timers,
            isrs,
            isr_global_enabled: false,
            isr_pending: 0,
            isr_enabled_mask: 0,
            exit: CancelToken::new(),
            debug_name: config.debug_name,
        }
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }

    pub fn global_time(&self) -> u64 {
        self.global_time
    }

    /// Clone of this domain's cancellation token, for a supervisor to request
    /// shutdown from another thread.
    pub fn exit_token(&self) -> CancelToken {
        self.exit.clone()
    }

    // -- time and unit conversion ------------------------------------------

    pub fn current_local(&self) -> u64 {
        fixed_point::to_local(self.global_time, self.multiplier_to_local, self.add_global_to_local_ticks)
    }

    pub fn to_local(&self, global: u64) -> u64 {
        fixed_point::to_local(global, self.multiplier_to_local, self.add_global_to_local_ticks)
    }

    pub fn us_to_ticks(&self, us: u64) -> u64 {
        fixed_point::us_to_ticks(us, self.multiplier_us_to_ticks)
    }

    pub fn ticks_to_us(&self, ticks: u64) -> u64 {
        fixed_point::ticks_to_us(ticks, self.multiplier_us_to_ticks)
    }

    /// Converts microseconds to global ticks. See
    /// [`fixed_point::local_us_to_global`] for why this does not route
    /// through any of this domain's own rate multipliers.
    pub fn local_us_to_global(&self, us: u64) -> u64 {
        fixed_point::local_us_to_global(us)
    }

    // -- registration --------------------------------------------------------

    /// Register an owned outbound channel.
    ///
    /// # Panics
    /// Panics if the domain's fixed outbound-channel table is full.
    pub fn register_channel(&mut self, channel: Channel) -> usize {
        assert!(
            self.channels_out.len() < MAX_CHANNELS_PER_CLOCK,
            "clock {:?} has no free outbound channel slots",
            self.debug_name
        );
        self.channels_out.push(channel);
        self.channels_out.len() - 1
    }

    pub fn channel(&mut self, idx: usize) -> &mut Channel {
        &mut self.channels_out[idx]
    }

    /// Register a sink that gates time advancement: the domain will not
    /// advance `global_time` past this sink's host channel's watermark
    /// without first forcing the producer to catch up.
    ///
    /// # Panics
    /// Panics if the domain's fixed simulate-sink table is full.
    pub fn register_sink_to_simulate(&mut self, sink: Arc<Sink>) {
        assert!(
            self.sinks_simulate.len() < MAX_CHANNELS_PER_CLOCK,
            "clock {:?} has no free simulate-sink slots",
            self.debug_name
        );
        self.sinks_simulate.push(sink);
    }

    /// Register a sink drained opportunistically every tick, never gating
    /// time advancement.
    ///
    /// # Panics
    /// Panics if the domain's fixed flush-sink table is full.
    pub fn register_sink_to_flush(&mut self, sink: Arc<Sink>) {
        assert!(
            self.sinks_flush.len() < MAX_CHANNELS_PER_CLOCK,
            "clock {:?} has no free flush-sink slots",
            self.debug_name
        );
        self.sinks_flush.push(sink);
    }

    // -- timers ----------------------------------------------------------------

    /// Allocate the lowest-indexed free timer slot.
    ///
    /// # Panics
    /// Panics if every timer slot is already allocated.
    pub fn allocate_timer(&mut self) -> usize {
        let idx = self.timers.iter().position(|t| !t.allocated).unwrap_or_else(|| {
            panic!("clock {:?} has no free timer slots", self.debug_name)
        });
        self.timers[idx].allocated = true;
        idx
    }

    pub fn release_timer(&mut self, idx: usize) {
        self.timers[idx] = TimerSlot::default();
    }

    /// Configure timer `idx`. `period == 0` makes it one-shot.
    ///
    /// # Panics
    /// Panics if `idx` is out of range.
    pub fn set_timer(&mut self, idx: usize, enabled: bool, timeout_at_global: u64, period: u64, callback: TimerCallback) {
        assert!(idx < self.timers.len(), "timer index {idx} out of range");
        let slot = &mut self.timers[idx];
        slot.allocated = true;
        slot.enabled = enabled;
        slot.timeout_at_global = timeout_at_global;
        slot.period = period;
        slot.callback = Some(callback);
    }

    // -- ISRs --------------------------------------------------------------

    /// Install (or clear) the handler for ISR slot `idx`.
    ///
    /// # Panics
    /// Panics if `idx >= ISR_VECTOR_SIZE`.
    pub fn set_isr_handler(&mut self, idx: u32, callback: Option<IsrCallback>) {
        assert!((idx as usize) < self.isrs.len(), "ISR index {idx} out of range");
        self.isrs[idx as usize].callback = callback;
    }

    pub fn set_global_isr_enabled(&mut self, enabled: bool) {
        self.isr_global_enabled = enabled;
    }

    pub fn set_isr_enabled(&mut self, idx: u32, enabled: bool) {
        assert!(idx < ISR_VECTOR_SIZE as u32, "ISR index {idx} out of range");
        if enabled {
            self.isr_enabled_mask |= 1u64 << idx;
        } else {
            self.isr_enabled_mask &= !(1u64 << idx);
        }
    }

    /// Mark ISR `idx` pending (or clear its pending bit).
    ///
    /// # Panics
    /// Panics if `idx >= ISR_VECTOR_SIZE`.
    pub fn set_isr_active(&mut self, idx: u32, active: bool) {
        assert!(idx < ISR_VECTOR_SIZE as u32, "ISR index {idx} out of range");
        if active {
            self.isr_pending |= 1u64 << idx;
        } else {
            self.isr_pending &= !(1u64 << idx);
        }
    }

    /// Dispatch every pending-and-enabled ISR, lowest index first, clearing
    /// each bit before its handler runs (so a handler that wants to remain
    /// pending must re-arm itself via `set_isr_active`).
    fn dispatch_isrs(&mut self) {
        loop {
            if !self.isr_global_enabled {
                break;
            }
            crate::governor::check_exit(&self.exit, &self.debug_name);
            let ready = self.isr_pending & self.isr_enabled_mask;
            if ready == 0 {
                break;
            }
            let idx = ready.trailing_zeros() as usize;
            self.isr_pending &= !(1u64 << idx);

            if let Some(mut callback) = self.isrs[idx].callback.take() {
                callback(self, idx as u32);
                if self.isrs[idx].callback.is_none() {
                    self.isrs[idx].callback = Some(callback);
                }
            }
        }
    }

    /// Run enabled timers whose deadline is `<= horizon`, lowest slot index
    /// first; periodic timers are re-armed (deadline += period) before their
    /// callback runs, one-shot timers are disabled before their callback runs.
    fn fire_timers(&mut self, horizon: u64) {
        for idx in 0..self.timers.len() {
            if !self.timers[idx].enabled || self.timers[idx].timeout_at_global > horizon {
                continue;
            }
            if self.timers[idx].period > 0 {
                self.timers[idx].timeout_at_global += self.timers[idx].period;
            } else {
                self.timers[idx].enabled = false;
            }
            if let Some(callback) = self.timers[idx].callback.as_mut() {
                callback();
            }
        }
    }

    /// Compute the horizon: the furthest `global_time` may safely advance to
    /// this tick, clamped to `target`. Forces any simulate-sink whose host
    /// channel has already caught up to `global_time` to publish at least one
    /// more tick, so a stalled peer cannot silently freeze this domain's clock
    /// below its own watermark.
    fn scan_horizon(&self, target: u64) -> u64 {
        let now = self.global_time;
        let mut horizon = u64::MAX;

        for sink in &self.sinks_simulate {
            if sink.channel_simulated_until() <= now {
                sink.wait_channel_until(now + 1, &self.exit);
            }
            horizon = horizon.min(sink.channel_simulated_until());
            horizon = horizon.min(sink.next_event_timestamp());
        }

        for timer in &self.timers {
            if timer.enabled {
                horizon = horizon.min(timer.timeout_at_global);
            }
        }

        horizon.min(target)
    }

    /// One step of the nine-stage time-advance protocol: ISR pre-dispatch,
    /// horizon scan, commit, fire timers, publish watermark, flush, drain,
    /// ISR post-dispatch. Returns the new horizon.
    pub fn try_advance_time_global(&mut self, target: u64) -> u64 {
        self.dispatch_isrs();

        let horizon = self.scan_horizon(target);
        if horizon > self.global_time {
            self.global_time = horizon;
        }

        self.fire_timers(horizon);

        for channel in &self.channels_out {
            channel.update_time(horizon);
        }

        for sink in &self.sinks_flush {
            sink.process_events_until_no_wait(horizon);
        }

        for sink in &self.sinks_simulate {
            sink.process_events_until(horizon, &self.exit);
        }

        self.dispatch_isrs();

        trace!(clock = %self.debug_name, horizon, "advanced");
        horizon
    }

    /// Drive `try_advance_time_global` until the returned horizon reaches
    /// `target`, or the domain's exit flag is observed (which terminates the
    /// process from inside the governed spin, per [`crate::governor::check_exit`]).
    pub fn wait_until_global(&mut self, target: u64) -> u64 {
        loop {
            let horizon = self.try_advance_time_global(target);
            if horizon >= target {
                return horizon;
            }
        }
    }
}
