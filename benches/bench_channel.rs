//! Causal channel throughput benchmarks: insert-and-drain cost for a single
//! sink and for the full fan-out of `MAX_SINKS_PER_CHANNEL` sinks.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use causalsim::constants::MAX_SINKS_PER_CHANNEL;
use causalsim::Channel;

const TOTAL_EVENTS: u64 = 200_000;
const MESSAGE_SIZE: usize = 16;

fn single_sink_round_trip(events: u64) -> u64 {
    let mut channel = Channel::new(MESSAGE_SIZE, "bench_single");
    let sink = channel.allocate_sink(1 << 16);
    sink.set_enabled(true, Some(Box::new(|_ts, payload| black_box(payload))), vec![0u8; 4096]);

    let payload = vec![0u8; MESSAGE_SIZE];
    for ts in 0..events {
        channel.insert_event(ts, &payload);
        sink.process_events_until_no_wait(ts);
    }
    events
}

fn fanout_round_trip(events: u64) -> u64 {
    let mut channel = Channel::new(MESSAGE_SIZE, "bench_fanout");
    let sinks: Vec<_> = (0..MAX_SINKS_PER_CHANNEL)
        .map(|_| {
            let sink = channel.allocate_sink(1 << 16);
            sink.set_enabled(true, Some(Box::new(|_ts, payload| black_box(payload))), vec![0u8; 4096]);
            sink
        })
        .collect();

    let payload = vec![0u8; MESSAGE_SIZE];
    for ts in 0..events {
        channel.insert_event(ts, &payload);
        for sink in &sinks {
            sink.process_events_until_no_wait(ts);
        }
    }
    events
}

fn benchmark_channel(c: &mut Criterion) {
    let mut group = c.benchmark_group("Channel (200k events)");
    group.throughput(Throughput::Elements(TOTAL_EVENTS));
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("sinks", "single"), |b| {
        b.iter(|| single_sink_round_trip(TOTAL_EVENTS))
    });

    group.bench_function(BenchmarkId::new("sinks", "fanout_max"), |b| {
        b.iter(|| fanout_round_trip(TOTAL_EVENTS))
    });

    group.finish();
}

criterion_group!(benches, benchmark_channel);
criterion_main!(benches);
