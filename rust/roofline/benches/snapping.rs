// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapping and connectivity validation on synthetic multi-wing roofs.
//!
//! Run with: cargo bench -p roofline-core --bench snapping

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nalgebra::Vector2;
use roofline_core::connectivity::find_floating;
use roofline_core::{snap_features, DetectedFeatureSet, GeoPoint, LineSource, Perimeter, RoofLine};

const CENTER: GeoPoint = GeoPoint::new(-97.7431, 30.2672);

fn at(x: f64, y: f64) -> GeoPoint {
    GeoPoint::from_local_feet(&CENTER, &Vector2::new(x, y))
}

/// A row of `wings` hip-roofed wings, each 40 ft wide, with small
/// deterministic noise on every detected endpoint.
fn generate_roof(wings: usize) -> (Perimeter, DetectedFeatureSet) {
    let width = 40.0 * wings as f64;
    let perimeter = Perimeter::from_footprint(&[
        at(0.0, -20.0),
        at(width, -20.0),
        at(width, 20.0),
        at(0.0, 20.0),
    ])
    .expect("valid footprint");

    let noise = |i: usize| ((i * 7919) % 13) as f64 / 10.0 - 0.6;
    let mut features = DetectedFeatureSet::new();
    for w in 0..wings {
        let x0 = 40.0 * w as f64;
        let (a, b) = (x0 + 12.0, x0 + 28.0);
        features
            .ridges
            .push(RoofLine::new(at(a, noise(w)), at(b, -noise(w)), 90.0, LineSource::Oracle));
        for (k, (rx, cx, cy)) in [(a, x0, -20.0), (a, x0, 20.0), (b, x0 + 40.0, -20.0), (b, x0 + 40.0, 20.0)]
            .into_iter()
            .enumerate()
        {
            let n = noise(w * 4 + k);
            features.hips.push(RoofLine::new(
                at(rx + n, n),
                at(cx - n, cy + n),
                88.0,
                LineSource::Oracle,
            ));
        }
        if w > 0 {
            features.valleys.push(RoofLine::new(
                at(x0 + noise(w), -20.0),
                at(x0, 20.0 - noise(w)),
                80.0,
                LineSource::Oracle,
            ));
        }
    }
    (perimeter, features)
}

fn bench_snapping(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapping");

    for wings in [1usize, 4, 16, 64] {
        let (perimeter, features) = generate_roof(wings);
        group.throughput(Throughput::Elements(features.total_lines() as u64));

        group.bench_with_input(
            BenchmarkId::new("snap", wings),
            &(&perimeter, &features),
            |b, (perimeter, features)| b.iter(|| snap_features(black_box(features), perimeter, 3.0)),
        );

        let snapped = snap_features(&features, &perimeter, 3.0);
        group.bench_with_input(
            BenchmarkId::new("validate", wings),
            &(&perimeter, &snapped),
            |b, (perimeter, snapped)| b.iter(|| find_floating(black_box(snapped), perimeter, 4.5)),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_snapping);
criterion_main!(benches);
