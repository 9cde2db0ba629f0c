//! Benchmarks for the scheduler render loop.
//!
//! Run with: cargo bench --bench scheduler_bench -p mp-engine

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use mp_engine::{DeviceClock, ManualClock, PlaybackConfig, RecordingDevice, Scheduler};
use mp_ir::{Cell, EffectTag, Instrument, ModuleFormat, Note, Pattern, Sample, Song};

/// Four busy channels: a note every fourth row with a slide on the rest.
fn busy_song(positions: u16) -> Song {
    let mut song = Song::new("bench", ModuleFormat::Mod);
    let mut sample = Sample::new(1, "saw");
    sample.data = Arc::from((0..2048).map(|i| (i % 64) as f32 / 32.0 - 1.0).collect::<Vec<_>>());
    song.samples.push(sample);
    song.instruments.push(Instrument::with_default_sample(1, "saw", 0));

    let mut pattern = Pattern::new(64, 4);
    for row in 0..64 {
        for channel in 0..4u8 {
            let cell = pattern.cell_mut(row, channel);
            if row % 4 == 0 {
                *cell = Cell {
                    instrument: 1,
                    note: Note::On(37 + channel * 5),
                    ..Cell::empty()
                };
            } else {
                cell.effect = EffectTag::from_mod_command(0x4);
                cell.effect_value = 0x48;
            }
        }
    }
    song.patterns.push(pattern);
    song.pattern_table = vec![0; positions as usize];
    song.position_count = positions;
    song
}

fn bench_render_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_window");

    for lookahead in [1.0, 10.0, 60.0] {
        group.bench_with_input(
            BenchmarkId::from_parameter(lookahead),
            &lookahead,
            |b, &lookahead| {
                let song = Arc::new(busy_song(16));
                let config = PlaybackConfig {
                    lookahead,
                    ..PlaybackConfig::default()
                };
                b.iter(|| {
                    let device =
                        RecordingDevice::with_clock(44_100, DeviceClock::Manual(ManualClock::new(0.0)));
                    let mut scheduler = Scheduler::new(song.clone(), device, config);
                    scheduler.start();
                    black_box(scheduler.processed_time());
                });
            },
        );
    }

    group.finish();
}

fn bench_steady_refill(c: &mut Criterion) {
    let song = Arc::new(busy_song(16));
    let clock = ManualClock::new(0.0);
    let device = RecordingDevice::with_clock(44_100, DeviceClock::Manual(clock.clone()));
    let mut scheduler = Scheduler::new(song, device, PlaybackConfig::default());
    scheduler.start();

    c.bench_function("poll_refill", |b| {
        b.iter(|| {
            clock.advance(5.0);
            scheduler.poll();
            scheduler.device().log().clear();
            black_box(scheduler.active_voices());
        });
    });
}

criterion_group!(benches, bench_render_window, bench_steady_refill);
criterion_main!(benches);
