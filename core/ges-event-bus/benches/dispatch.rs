use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ges_event_bus::{Callable, EventKey, EventRegistry, Listener, ObjectTable, Payload, World};

fn registry_with_listeners(count: usize) -> (EventRegistry, World, EventKey, Arc<AtomicU64>) {
    let host = Arc::new(ObjectTable::new());
    let registry = EventRegistry::new(host.clone());
    let key = EventKey::new("bench", "fan_out");
    let total = Arc::new(AtomicU64::new(0));
    for i in 0..count {
        let owner = host.spawn(format!("receiver-{i}"));
        let sink = Arc::clone(&total);
        host.add_function(owner, "OnValue", Callable::int(move |v| {
            sink.fetch_add(v as u64, Ordering::Relaxed);
        }));
        registry.subscribe(&key, Listener::function(owner, "OnValue"));
    }
    (registry, World::new("bench"), key, total)
}

fn bench_emit_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("emit_fan_out");
    for count in [1usize, 10, 100] {
        let (registry, world, key, total) = registry_with_listeners(count);
        let scope = world.handle();
        let payload = Payload::from(1);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| registry.emit(black_box(&key), black_box(&payload), false, Some(&scope)));
        });
        black_box(total.load(Ordering::Relaxed));
    }
    group.finish();
}

fn bench_pinned_replay(c: &mut Criterion) {
    let host = Arc::new(ObjectTable::new());
    let registry = EventRegistry::new(host.clone());
    let world = World::new("bench");
    let key = EventKey::new("bench", "pinned");
    registry.emit(&key, &Payload::from("ready"), true, Some(&world.handle()));

    let owner = host.spawn("late");
    host.add_function(owner, "OnReady", Callable::string(|s| {
        black_box(s);
    }));
    let listener = Listener::function(owner, "OnReady");

    c.bench_function("subscribe_with_replay", |b| {
        b.iter(|| {
            registry.subscribe(&key, listener.clone());
            registry.unsubscribe(&key, &listener);
        });
    });
}

criterion_group!(benches, bench_emit_fan_out, bench_pinned_replay);
criterion_main!(benches);
