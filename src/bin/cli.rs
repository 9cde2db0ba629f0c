//! modplay CLI: module info and headless playback.
//!
//! Usage:
//!   modplay-cli path/to/file.mod
//!   modplay-cli path/to/file.xm --seconds 30 --seek 4
//!
//! Playback drives a recording device on wall-clock time and prints each
//! row as it becomes audible. Set `RUST_LOG=debug` for decoder and
//! scheduler logs.

use modplay::{Controller, DeviceCommand, RecordingDevice, RowRef};
use std::time::{Duration, Instant};
use std::{env, fs};

const SAMPLE_RATE: u32 = 48_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let path = args.get(1).unwrap_or_else(|| {
        eprintln!("Usage: modplay-cli <file> [--seconds N] [--seek POSITION]");
        std::process::exit(1);
    });

    let seconds: f64 = flag(&args, "--seconds").unwrap_or(10.0);
    let seek: Option<u16> = flag(&args, "--seek");

    let data = fs::read(path).unwrap_or_else(|e| {
        eprintln!("Failed to read {}: {}", path, e);
        std::process::exit(1);
    });

    let mut ctrl = Controller::new(RecordingDevice::realtime(SAMPLE_RATE));
    ctrl.load(&data).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path, e);
        std::process::exit(1);
    });

    let song = ctrl.song();
    println!("Title:     {}", song.title);
    if song.sub_format.is_empty() {
        println!("Format:    {}", song.format);
    } else {
        println!("Format:    {} ({})", song.format, song.sub_format);
    }
    if !song.tracker_name.is_empty() {
        println!("Tracker:   {}", song.tracker_name);
    }
    println!("Channels:  {}", song.channel_count);
    println!("Patterns:  {}", song.patterns.len());
    println!("Positions: {} (restart {})", song.position_count, song.restart);
    println!("Tempo:     {} BPM, Speed: {}", song.initial_tempo, song.initial_speed);
    let samples_with_data = song.samples.iter().filter(|s| !s.is_empty()).count();
    println!("Samples:   {} (with data)", samples_with_data);
    println!();

    if let Some(position) = seek {
        ctrl.seek(position);
    }
    play(&mut ctrl, Duration::from_secs_f64(seconds.max(0.0)));
}

fn flag<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .and_then(|v| v.parse().ok())
}

fn play(ctrl: &mut Controller<RecordingDevice>, duration: Duration) {
    let log = ctrl.with_device(|device| device.log());
    let mut voices = 0;
    ctrl.play();
    let started = Instant::now();
    let mut last = None;

    while started.elapsed() < duration {
        ctrl.with_device(|device| device.reap_finished());
        voices += count_starts(log.take());

        let position = ctrl.position();
        if last != Some(position) {
            println!(
                "{:02X}:{:02X}  {}",
                position.0,
                position.1,
                ctrl.row_to_string(RowRef::Current)
            );
            last = Some(position);
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    ctrl.stop();
    voices += count_starts(log.take());
    println!("Done. {} voices started.", voices);
}

fn count_starts(commands: Vec<DeviceCommand>) -> usize {
    commands
        .iter()
        .filter(|c| matches!(c, DeviceCommand::Start { .. }))
        .count()
}
