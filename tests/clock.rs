use causalsim::{CancelToken, Channel, ChannelConfig, ClockConfig, ClockDomain};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const EXIT_MID_SPIN_CHILD_ENV: &str = "CAUSALSIM_EXIT_MID_SPIN_CHILD";

/// `check_exit` terminates the whole process on cancellation (it's a
/// cooperative-shutdown-as-process-exit design, not a `Result`/`Err`
/// return), so a governed spin cancelled from a sibling thread can only be
/// observed honestly from outside that process — exercising it in this test
/// process directly would tear down the entire test binary. This re-execs
/// the test binary as a child, running only the isolated scenario below.
#[test]
fn exit_flag_terminates_a_spinning_domain() {
    if std::env::var(EXIT_MID_SPIN_CHILD_ENV).is_ok() {
        run_real_governed_spin_cancelled_from_another_thread();
        unreachable!("check_exit must terminate the process before this returns");
    }

    let exe = std::env::current_exe().unwrap();
    let start = Instant::now();
    let status = std::process::Command::new(exe)
        .args(["--exact", "exit_flag_terminates_a_spinning_domain", "--nocapture"])
        .env(EXIT_MID_SPIN_CHILD_ENV, "1")
        .status()
        .expect("failed to re-exec test binary for child scenario");

    assert!(status.success(), "a domain cancelled mid-spin must still exit(0)");
    assert!(start.elapsed() < Duration::from_secs(5), "cancellation must unblock the spin promptly");
}

/// Runs only inside the child process spawned above: puts a channel into a
/// real governed spin on its own thread (waiting for a watermark that no
/// producer will ever reach), then cancels it from this thread and relies
/// on `check_exit` to terminate the process.
fn run_real_governed_spin_cancelled_from_another_thread() {
    let cfg = ChannelConfig::builder(1, "exit_spin").build().unwrap();
    let channel = Channel::from_config(cfg);
    let exit = CancelToken::new();
    let exit_for_spinner = exit.clone();

    let spinner = thread::spawn(move || {
        channel.wait_simulated_until(1, &exit_for_spinner);
    });

    thread::sleep(Duration::from_millis(20));
    exit.cancel();
    spinner.join().unwrap();
}

#[test]
fn flush_sinks_never_gate_time_but_still_drain() {
    let mut clk = ClockDomain::new(ClockConfig::builder("flush").build().unwrap());
    let cfg = ChannelConfig::builder(1, "flush_ch").build().unwrap();
    let mut channel = causalsim::Channel::from_config(cfg);
    let sink = channel.allocate_sink(4096);
    let delivered = Arc::new(AtomicUsize::new(0));
    let delivered2 = delivered.clone();
    sink.set_enabled(true, Some(Box::new(move |_, _| { delivered2.fetch_add(1, Ordering::SeqCst); })), vec![0u8; 4096]);

    for ts in [5u64, 6, 7] {
        channel.insert_event(ts, &[0]);
    }
    clk.register_channel(channel);
    clk.register_sink_to_flush(sink);

    let horizon = clk.wait_until_global(10);
    assert_eq!(horizon, 10);
    assert_eq!(delivered.load(Ordering::SeqCst), 3);
}

#[test]
fn isr_handler_can_rearm_itself() {
    let mut clk = ClockDomain::new(ClockConfig::builder("rearm").build().unwrap());
    clk.set_global_isr_enabled(true);
    clk.set_isr_enabled(0, true);
    let calls = Arc::new(AtomicUsize::new(0));
    let calls2 = calls.clone();
    clk.set_isr_handler(0, Some(Box::new(move |clk, idx| {
        let n = calls2.fetch_add(1, Ordering::SeqCst);
        if n < 2 {
            clk.set_isr_active(idx, true);
        }
    })));
    clk.set_isr_active(0, true);

    // dispatch_isrs is private; drive it indirectly through a no-op advance.
    let _ = clk.try_advance_time_global(0);
    assert!(calls.load(Ordering::SeqCst) >= 1);
}

#[test]
fn us_to_ticks_roundtrips_through_clock_config() {
    let cfg = ClockConfig::builder("units")
        .with_multiplier_us_to_ticks(3u64 << 32)
        .build()
        .unwrap();
    let clk = ClockDomain::new(cfg);
    let ticks = clk.us_to_ticks(1_000);
    let back = clk.ticks_to_us(ticks);
    assert!(back.abs_diff(1_000) <= 1);
}
