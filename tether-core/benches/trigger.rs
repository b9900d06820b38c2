use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tether_core::observe::ReactiveRecord;
use tether_core::{EffectRunner, Runtime};

fn fan_out(c: &mut Criterion) {
    let runtime = Runtime::new();
    let state = Rc::new(ReactiveRecord::new_in(&runtime).with_entries([("k", 0_i32)]));
    let total = Rc::new(Cell::new(0_i32));
    let _runners: Vec<EffectRunner> = (0..100)
        .map(|_| {
            let (s, t) = (state.clone(), total.clone());
            runtime.effect(move || t.set(t.get().wrapping_add(s.get("k").unwrap_or_default())))
        })
        .collect();

    let mut value = 0;
    c.bench_function("trigger_100_effects", |b| {
        b.iter(|| {
            value += 1_i32;
            state.set("k", black_box(value));
        })
    });
}

fn rerun_stable_deps(c: &mut Criterion) {
    let runtime = Runtime::new();
    let entries = (0..50).map(|i: i32| (i.to_string(), i));
    let state = Rc::new(ReactiveRecord::new_in(&runtime).with_entries(entries));
    let s = state.clone();
    let runner = runtime.effect(move || {
        for i in 0..50 {
            black_box(s.get(&i.to_string()));
        }
    });

    c.bench_function("rerun_50_stable_deps", |b| b.iter(|| runner.run()));
}

criterion_group!(benches, fan_out, rerun_stable_deps);
criterion_main!(benches);
