//! Headless controller for modplay.
//!
//! Owns a scheduler and a device, loads songs, and keeps the lookahead
//! window topped up from a background pump thread while playing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use mp_engine::{PositionTracker, Scheduler, DEFAULT_VOICE_END_CAPACITY};
use parking_lot::Mutex;
use tracing::{debug, info};

// Re-export common types so callers don't need mp-ir/mp-engine directly.
pub use mp_engine::{AudioDevice, EventKind, ListenerId, PlaybackConfig, PlaybackEvent};
pub use mp_formats::FormatError;
pub use mp_ir::{ModuleFormat, Song};

/// Controller settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ControllerConfig {
    pub playback: PlaybackConfig,
    /// How often the pump thread polls the scheduler
    pub pump_interval: Duration,
    /// Capacity of the device's voice-ended queue
    pub voice_end_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            pump_interval: Duration::from_millis(10),
            voice_end_capacity: DEFAULT_VOICE_END_CAPACITY,
        }
    }
}

/// Which row [`Controller::row_to_string`] renders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowRef {
    /// The row audible now
    Current,
    /// Rows before (negative) or after the audible one
    Offset(i32),
    At { position: u16, row: u16 },
}

/// Headless tracker controller. Owns a song and manages playback.
pub struct Controller<D: AudioDevice + 'static> {
    scheduler: Arc<Mutex<Scheduler<D>>>,
    tracker: PositionTracker<D::Clock>,
    config: ControllerConfig,
    pump: Option<PumpHandle>,
}

struct PumpHandle {
    stop_signal: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl<D: AudioDevice + 'static> Controller<D> {
    pub fn new(device: D) -> Self {
        Self::with_config(device, ControllerConfig::default())
    }

    pub fn with_config(device: D, config: ControllerConfig) -> Self {
        let song = Arc::new(Song::new("Untitled", ModuleFormat::Mod));
        let scheduler = Scheduler::with_voice_end_capacity(
            song,
            device,
            config.playback,
            config.voice_end_capacity,
        );
        let tracker = scheduler.tracker();
        Self {
            scheduler: Arc::new(Mutex::new(scheduler)),
            tracker,
            config,
            pump: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    // --- Song management ---

    pub fn song(&self) -> Arc<Song> {
        self.scheduler.lock().song().clone()
    }

    /// Stop playback, then decode `data` and make it the current song.
    ///
    /// On error the previous song stays loaded.
    pub fn load(&mut self, data: &[u8]) -> Result<(), FormatError> {
        self.stop();
        let song = mp_formats::load_module(data)?;
        self.load_song(song);
        Ok(())
    }

    pub fn load_song(&mut self, song: Song) {
        self.stop();
        info!(
            title = %song.title,
            format = %song.format,
            positions = song.position_count,
            "song loaded"
        );
        self.scheduler.lock().replace_song(Arc::new(song));
    }

    // --- Playback ---

    pub fn play(&mut self) {
        self.scheduler.lock().start();
        if self.pump.is_none() {
            self.pump = Some(self.spawn_pump());
        }
    }

    pub fn stop(&mut self) {
        self.stop_pump();
        self.scheduler.lock().stop();
    }

    /// Jump to the start of `position`, keeping the play state.
    pub fn seek(&mut self, position: u16) {
        self.scheduler.lock().seek(position);
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.lock().is_playing()
    }

    /// Deliver due notifications and refill if needed. The pump thread
    /// does this on its own while playing.
    pub fn poll(&self) {
        self.scheduler.lock().poll();
    }

    // --- Queries ---

    /// `(position, row)` audible now.
    pub fn position(&self) -> (u16, u16) {
        self.tracker.position()
    }

    pub fn current_speed(&self) -> u16 {
        self.tracker.speed()
    }

    pub fn current_tempo(&self) -> u16 {
        self.tracker.tempo()
    }

    /// Lock-free position handle for other threads.
    pub fn tracker(&self) -> PositionTracker<D::Clock> {
        self.tracker.clone()
    }

    /// Render a row of the current song for display.
    ///
    /// Returns an empty string when the row does not exist.
    pub fn row_to_string(&self, at: RowRef) -> String {
        let target = match at {
            RowRef::Current => Some(self.tracker.position()),
            RowRef::Offset(offset) => self.tracker.relative(offset),
            RowRef::At { position, row } => Some((position, row)),
        };
        let song = self.song();
        target
            .and_then(|(position, row)| mp_ir::row_to_string(&song, position, row))
            .unwrap_or_default()
    }

    // --- Listeners ---

    /// Register a listener. It runs with the controller's scheduler locked,
    /// so it must not call back into the controller.
    pub fn add_listener<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: FnMut(&PlaybackEvent) + Send + 'static,
    {
        self.scheduler.lock().add_listener(kind, Box::new(listener))
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.scheduler.lock().remove_listener(id)
    }

    /// Run `f` against the device.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(self.scheduler.lock().device_mut())
    }

    fn spawn_pump(&self) -> PumpHandle {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop = stop_signal.clone();
        let scheduler = self.scheduler.clone();
        let interval = self.config.pump_interval;

        let thread = std::thread::spawn(move || {
            pump_thread(scheduler, stop, interval);
        });

        PumpHandle {
            stop_signal,
            thread: Some(thread),
        }
    }

    fn stop_pump(&mut self) {
        if let Some(mut pump) = self.pump.take() {
            pump.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pump.thread.take() {
                let _ = handle.join();
            }
        }
    }
}

impl<D: AudioDevice + 'static> Drop for Controller<D> {
    fn drop(&mut self) {
        self.stop_pump();
    }
}

fn pump_thread<D: AudioDevice>(
    scheduler: Arc<Mutex<Scheduler<D>>>,
    stop_signal: Arc<AtomicBool>,
    interval: Duration,
) {
    debug!(?interval, "pump thread started");
    while !stop_signal.load(Ordering::Relaxed) {
        scheduler.lock().poll();
        std::thread::sleep(interval);
    }
    debug!("pump thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mp_engine::{DeviceClock, ManualClock, RecordingDevice};
    use mp_formats::testing::{mod_cell, ModBuilder, ModSample};
    use std::sync::Mutex as StdMutex;

    fn two_position_mod() -> Vec<u8> {
        ModBuilder::tagged(b"M.K.", 4)
            .title("controller")
            .sample(ModSample::new("tone", vec![40; 64], 64))
            .positions(&[0, 1])
            .cell(0, 0, 0, mod_cell(1, 428, 0xC, 0x20))
            .cell(1, 0, 1, mod_cell(1, 214, 0, 0))
            .build()
    }

    fn controller() -> (Controller<RecordingDevice>, ManualClock) {
        let clock = ManualClock::new(0.0);
        let device = RecordingDevice::with_clock(48_000, DeviceClock::Manual(clock.clone()));
        (Controller::new(device), clock)
    }

    #[test]
    fn starts_with_empty_song() {
        let (ctrl, _clock) = controller();
        assert_eq!(ctrl.song().title.as_str(), "Untitled");
        assert!(!ctrl.is_playing());
        assert_eq!(ctrl.position(), (0, 0));
        assert_eq!(ctrl.row_to_string(RowRef::Current), "");
    }

    #[test]
    fn load_replaces_song() {
        let (mut ctrl, _clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();
        let song = ctrl.song();
        assert_eq!(song.title.as_str(), "controller");
        assert_eq!(song.position_count, 2);
        assert_eq!(ctrl.current_speed(), 6);
        assert_eq!(ctrl.current_tempo(), 125);
    }

    #[test]
    fn failed_load_keeps_previous_song() {
        let (mut ctrl, _clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();
        ctrl.play();
        let err = ctrl.load(&[]).unwrap_err();
        assert!(matches!(err, FormatError::BufferUnderrun { .. }));
        assert!(!ctrl.is_playing());
        assert_eq!(ctrl.song().title.as_str(), "controller");
    }

    #[test]
    fn play_and_stop() {
        let (mut ctrl, clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();
        ctrl.play();
        assert!(ctrl.is_playing());
        assert_eq!(ctrl.position(), (0, 0));

        clock.advance(0.13);
        assert_eq!(ctrl.position(), (0, 1));

        ctrl.stop();
        assert!(!ctrl.is_playing());
        assert_eq!(ctrl.position(), (0, 1));
        ctrl.stop();
        assert!(!ctrl.is_playing());
    }

    #[test]
    fn seek_keeps_play_state() {
        let (mut ctrl, clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();

        ctrl.seek(1);
        assert!(!ctrl.is_playing());
        assert_eq!(ctrl.position(), (1, 0));

        ctrl.play();
        clock.advance(0.5);
        ctrl.seek(0);
        assert!(ctrl.is_playing());
        assert_eq!(ctrl.position(), (0, 0));
        ctrl.stop();
    }

    #[test]
    fn loading_stops_playback() {
        let (mut ctrl, _clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();
        ctrl.play();
        let log = ctrl.with_device(|device| device.log());
        ctrl.load(&two_position_mod()).unwrap();
        assert!(!ctrl.is_playing());
        assert!(log
            .snapshot()
            .iter()
            .any(|c| matches!(c, mp_engine::DeviceCommand::Stop { .. })));
    }

    #[test]
    fn rows_render_as_text() {
        let (mut ctrl, clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();

        let first = ctrl.row_to_string(RowRef::At { position: 0, row: 0 });
        assert!(first.starts_with("C-5 01 C20 | --- -- ---"), "{first}");
        assert_eq!(first.matches(" | ").count(), 3);
        assert_eq!(ctrl.row_to_string(RowRef::Current), first);
        assert_eq!(ctrl.row_to_string(RowRef::At { position: 2, row: 0 }), "");
        assert_eq!(ctrl.row_to_string(RowRef::At { position: 0, row: 64 }), "");
        assert_eq!(ctrl.row_to_string(RowRef::Offset(1)), "");

        ctrl.play();
        clock.advance(0.13);
        assert_eq!(ctrl.row_to_string(RowRef::Offset(-1)), first);
        assert_eq!(
            ctrl.row_to_string(RowRef::Offset(1)),
            ctrl.row_to_string(RowRef::At { position: 0, row: 2 })
        );
        ctrl.stop();
    }

    #[test]
    fn listeners_receive_rows() {
        let (mut ctrl, clock) = controller();
        ctrl.load(&two_position_mod()).unwrap();

        let rows = Arc::new(StdMutex::new(Vec::new()));
        let sink = rows.clone();
        let id = ctrl.add_listener(EventKind::RowPlay, move |event| {
            sink.lock().unwrap().push(event.row);
        });

        ctrl.play();
        clock.advance(0.25);
        ctrl.poll();
        assert_eq!(*rows.lock().unwrap(), vec![0, 1, 2]);

        assert!(ctrl.remove_listener(id));
        clock.advance(0.12);
        ctrl.poll();
        assert_eq!(rows.lock().unwrap().len(), 3);
        ctrl.stop();
    }
}
