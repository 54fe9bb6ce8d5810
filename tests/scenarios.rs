//! End-to-end scenarios spanning ring buffer, channel, and clock-domain
//! behavior together.

use causalsim::{Channel, ChannelConfig, ClockConfig, ClockDomain};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn single_producer_single_consumer_single_event() {
    let cfg = ChannelConfig::builder(4, "spsc").build().unwrap();
    let mut channel = Channel::from_config(cfg);
    let sink = channel.allocate_sink(64);

    let received = Arc::new(std::sync::Mutex::new(None));
    let received2 = received.clone();
    sink.set_enabled(
        true,
        Some(Box::new(move |ts, payload| {
            *received2.lock().unwrap() = Some((ts, payload.to_vec()));
        })),
        vec![0u8; 64],
    );

    let effective = channel.insert_event(100, &0x01020304u32.to_le_bytes());
    assert_eq!(effective, 100);

    sink.process_events_until_no_wait(200);
    let (ts, payload) = received.lock().unwrap().clone().unwrap();
    assert_eq!(ts, 100);
    assert_eq!(payload, vec![0x04, 0x03, 0x02, 0x01]);
    assert_eq!(sink.next_event_timestamp(), u64::MAX);
}

#[test]
fn late_requested_timestamp_clamps_forward() {
    let cfg = ChannelConfig::builder(1, "clamp").build().unwrap();
    let mut channel = Channel::from_config(cfg);
    let sink = channel.allocate_sink(64);
    let observed = Arc::new(AtomicU64::new(0));
    let observed2 = observed.clone();
    sink.set_enabled(true, Some(Box::new(move |ts, _| observed2.store(ts, Ordering::SeqCst))), vec![0u8; 64]);

    // simulate a prior event pushing the watermark to 500
    channel.insert_event(500, &[0]);
    sink.process_events_until_no_wait(u64::MAX);

    let effective = channel.insert_event(300, &[1]);
    assert_eq!(effective, 501);
    sink.process_events_until_no_wait(u64::MAX);
    assert_eq!(observed.load(Ordering::SeqCst), 501);
}

#[test]
fn timer_vs_channel_tie_fires_timers_before_sinks() {
    let mut clk = ClockDomain::new(ClockConfig::builder("tie").build().unwrap());
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let order_timer = order.clone();
    let timer_idx = clk.allocate_timer();
    clk.set_timer(timer_idx, true, 1000, 0, Box::new(move || order_timer.lock().unwrap().push("timer")));

    let cfg = ChannelConfig::builder(1, "tie_channel").build().unwrap();
    let mut channel = Channel::from_config(cfg);
    let sink = channel.allocate_sink(64);
    let order_sink = order.clone();
    sink.set_enabled(true, Some(Box::new(move |_, _| order_sink.lock().unwrap().push("sink"))), vec![0u8; 64]);
    channel.insert_event(1000, &[0]);

    clk.register_channel(channel);
    clk.register_sink_to_simulate(sink);

    clk.wait_until_global(1000);
    assert_eq!(*order.lock().unwrap(), vec!["timer", "sink"]);
}

#[test]
fn two_domain_ping_pong_reaches_matching_time_after_ten_round_trips() {
    // Each domain runs on its own real OS thread; the only synchronization
    // between them is the channel's shared `Arc<AtomicU64>` watermark and
    // ring buffer, the same cross-process contract `shared_memory` maps at a
    // fixed address. A `crossbeam-channel` rendezvous hands over the
    // effective timestamp each side actually produced (which `insert_event`
    // may clamp forward), purely so the peer thread knows what to wait for —
    // it carries no simulated data itself.
    let mut domain_x = ClockDomain::new(ClockConfig::builder("x").build().unwrap());
    let mut domain_y = ClockDomain::new(ClockConfig::builder("y").build().unwrap());

    let cfg_x_to_y = ChannelConfig::builder(1, "x_to_y").build().unwrap();
    let cfg_y_to_x = ChannelConfig::builder(1, "y_to_x").build().unwrap();
    let mut chan_x_to_y = Channel::from_config(cfg_x_to_y);
    let mut chan_y_to_x = Channel::from_config(cfg_y_to_x);

    let sink_for_y = chan_x_to_y.allocate_sink(128);
    let sink_for_x = chan_y_to_x.allocate_sink(128);

    let received_by_y = Arc::new(AtomicUsize::new(0));
    let received_by_y2 = received_by_y.clone();
    sink_for_y.set_enabled(true, Some(Box::new(move |_, _| { received_by_y2.fetch_add(1, Ordering::SeqCst); })), vec![0u8; 128]);

    let received_by_x = Arc::new(AtomicUsize::new(0));
    let received_by_x2 = received_by_x.clone();
    sink_for_x.set_enabled(true, Some(Box::new(move |_, _| { received_by_x2.fetch_add(1, Ordering::SeqCst); })), vec![0u8; 128]);

    let chan_x_idx = domain_x.register_channel(chan_x_to_y);
    let chan_y_idx = domain_y.register_channel(chan_y_to_x);
    domain_y.register_sink_to_simulate(sink_for_y);
    domain_x.register_sink_to_simulate(sink_for_x);

    let (x_to_y_tx, x_to_y_rx) = crossbeam_channel::bounded::<u64>(1);
    let (y_to_x_tx, y_to_x_rx) = crossbeam_channel::bounded::<u64>(1);

    let received_by_x_for_thread = received_by_x.clone();
    let x_thread = thread::spawn(move || {
        let first = domain_x.channel(chan_x_idx).insert_event(10, &[0]);
        x_to_y_tx.send(first).unwrap();

        for round in 0..10u64 {
            let target = y_to_x_rx.recv().unwrap();
            domain_x.wait_until_global(target);
            assert_eq!(received_by_x_for_thread.load(Ordering::SeqCst), round as usize + 1);
            if round < 9 {
                let next = domain_x.channel(chan_x_idx).insert_event(target + 1, &[0]);
                x_to_y_tx.send(next).unwrap();
            }
        }
        domain_x.global_time()
    });

    let received_by_y_for_thread = received_by_y.clone();
    let y_thread = thread::spawn(move || {
        for round in 0..10u64 {
            let target = x_to_y_rx.recv().unwrap();
            domain_y.wait_until_global(target);
            assert_eq!(received_by_y_for_thread.load(Ordering::SeqCst), round as usize + 1);
            let next = domain_y.channel(chan_y_idx).insert_event(target + 1, &[0]);
            y_to_x_tx.send(next).unwrap();
        }
        domain_y.global_time()
    });

    let x_final = x_thread.join().unwrap();
    let y_final = y_thread.join().unwrap();

    assert_eq!(x_final, y_final);
    assert_eq!(received_by_y.load(Ordering::SeqCst), 10);
    assert_eq!(received_by_x.load(Ordering::SeqCst), 10);
}
