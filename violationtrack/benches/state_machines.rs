//! Benchmarks for the per-track state machines

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::Rng;
use std::collections::BTreeMap;
use std::hint::black_box;
use violationtrack::{
    Bbox, ComplianceTracker, EquipmentItem, ItemSignal, MachineObservation, PersonObservation,
    Polygon, ProximityDetector, TrackedObject, ZoneMonitor,
};

const FRAME_W: u32 = 1920;
const FRAME_H: u32 = 1080;

fn random_box(rng: &mut impl Rng) -> Bbox {
    let x = rng.random_range(0.0..(FRAME_W as f32 - 80.0));
    let y = rng.random_range(0.0..(FRAME_H as f32 - 160.0));
    Bbox::new(x, y, x + 80.0, y + 160.0)
}

fn bench_compliance_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("compliance_update");

    for &n_tracks in &[10u32, 50, 200] {
        let mut rng = rand::rng();
        let signals: Vec<Vec<(u32, EquipmentItem, ItemSignal)>> = (0..30)
            .map(|_| {
                (0..n_tracks)
                    .flat_map(|id| {
                        EquipmentItem::ALL.into_iter().map(move |item| (id, item))
                    })
                    .map(|(id, item)| {
                        let signal = match rng.random_range(0..3) {
                            0 => ItemSignal::Present,
                            1 => ItemSignal::Missing,
                            _ => ItemSignal::Unknown,
                        };
                        (id, item, signal)
                    })
                    .collect()
            })
            .collect();

        group.bench_with_input(BenchmarkId::new("tracks", n_tracks), &signals, |b, signals| {
            b.iter_batched(
                ComplianceTracker::default,
                |mut tracker| {
                    for (frame, updates) in signals.iter().enumerate() {
                        let now = frame as f64 / 30.0;
                        for &(id, item, signal) in updates {
                            tracker.update(id, item, black_box(signal), 0.9, now);
                        }
                        for id in 0..n_tracks {
                            black_box(tracker.evaluate(id, now));
                        }
                    }
                },
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_proximity_process(c: &mut Criterion) {
    let mut rng = rand::rng();
    let persons: Vec<PersonObservation> = (0..50)
        .map(|id| PersonObservation {
            track_id: Some(id),
            bbox: random_box(&mut rng),
        })
        .collect();
    let machines: Vec<MachineObservation> = (0..8)
        .map(|i| MachineObservation {
            label: if i % 2 == 0 { "excavator" } else { "dump_truck" }.to_string(),
            bbox: random_box(&mut rng),
        })
        .collect();

    c.bench_function("proximity_50_persons_8_machines", |b| {
        b.iter_batched(
            ProximityDetector::default,
            |mut detector| {
                for frame in 0..30 {
                    let now = frame as f64 / 30.0;
                    black_box(detector.process(
                        black_box(&persons),
                        black_box(&machines),
                        FRAME_W,
                        FRAME_H,
                        now,
                    ));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

fn bench_zone_check(c: &mut Criterion) {
    let mut rng = rand::rng();
    let objects: Vec<TrackedObject> = (0..100)
        .map(|id| TrackedObject {
            track_id: Some(id),
            label: "person".to_string(),
            bbox: random_box(&mut rng),
        })
        .collect();

    let mut zones = BTreeMap::new();
    for i in 0..4 {
        let x0 = i as f32 * 480.0;
        let polygon = Polygon::from_points(&[
            [x0, 200.0],
            [x0 + 300.0, 200.0],
            [x0 + 400.0, 700.0],
            [x0 + 150.0, 900.0],
            [x0, 700.0],
        ])
        .unwrap();
        zones.insert(format!("zone-{}", i), polygon);
    }

    c.bench_function("zone_check_100_objects_4_zones", |b| {
        b.iter_batched(
            || {
                let mut monitor = ZoneMonitor::default();
                monitor.set_zones(zones.clone()).unwrap();
                monitor
            },
            |mut monitor| {
                for frame in 0..30 {
                    let now = frame as f64 / 30.0;
                    black_box(monitor.check(black_box(&objects), now));
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

criterion_group!(
    benches,
    bench_compliance_update,
    bench_proximity_process,
    bench_zone_check
);
criterion_main!(benches);
