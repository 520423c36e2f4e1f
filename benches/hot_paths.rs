//! Benchmarks for the per-frame work of the map engine:
//! - forward projection of every registered crs
//! - label overlap resolution
//! - one animated zoom frame of a full chart

use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mapchart::data;
use mapchart::geo::Rect;
use mapchart::map::labels::{self, LabelCandidate};
use mapchart::map::{Crs, MapChart, MapSeries, SeriesType};

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection/forward");
    let points: Vec<(f64, f64)> = (0..1000)
        .map(|i| {
            let t = i as f64 / 1000.0;
            (-180.0 + 360.0 * t, -85.0 + 170.0 * ((t * 7.0) % 1.0))
        })
        .collect();

    for crs in Crs::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(crs.name()), &crs, |b, &crs| {
            b.iter(|| {
                for &(lon, lat) in &points {
                    black_box(crs.forward(lon, lat));
                }
            });
        });
    }
    group.finish();
}

fn candidates(count: usize) -> Vec<LabelCandidate> {
    (0..count)
        .map(|i| {
            let x = (i * 37 % 400) as f64;
            let y = (i * 91 % 200) as f64;
            LabelCandidate {
                series: i % 3,
                index: i,
                series_type: if i % 3 == 0 { SeriesType::Choropleth } else { SeriesType::Marker },
                bounds: Some(Rect::new(x, y, 24.0, 4.0)),
                rank: (i % 17) as f64,
                overlap_forbidden: true,
            }
        })
        .collect()
}

fn bench_label_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("labels/resolve");
    for count in [50, 200, 1000] {
        let input = candidates(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &input, |b, input| {
            b.iter(|| black_box(labels::resolve(input)));
        });
    }
    group.finish();
}

fn demo_chart() -> MapChart {
    let mut chart = MapChart::new();
    chart.set_geo_data(data::demo_world());
    chart.add_series(Box::new(MapSeries::choropleth(data::demo_regions())));
    chart.add_series(Box::new(MapSeries::bubble(data::demo_cities())));
    chart.set_bounds(Rect::new(0.0, 0.0, 400.0, 200.0));
    chart.draw();
    chart
}

fn bench_zoom_frame(c: &mut Criterion) {
    c.bench_function("chart/zoom_frame", |b| {
        let mut chart = demo_chart();
        b.iter(|| {
            chart.zoom(1.3, Some(200.0), Some(100.0), Some(Duration::from_millis(200)));
            chart.tick(Duration::from_millis(16));
            chart.draw();
            chart.zoom_home(Some(Duration::ZERO));
            chart.draw();
        });
    });
}

criterion_group!(benches, bench_projection, bench_label_resolution, bench_zoom_frame);
criterion_main!(benches);
