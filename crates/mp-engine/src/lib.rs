//! Playback engine for modplay.
//!
//! Turns a [`mp_ir::Song`] into timestamped voice commands on an
//! [`AudioDevice`], scheduling a fixed lookahead window ahead of the
//! device clock. No audio is mixed here; the device owns synthesis.

mod channel;
mod config;
mod device;
mod events;
pub mod frequency;
pub mod interpreter;
pub mod recording;
mod row_log;
pub mod scheduler;
mod voice_end;

pub use channel::{ChannelState, RowTiming};
pub use config::PlaybackConfig;
pub use device::{AudioDevice, Clock, VoiceSpec};
pub use events::{EventKind, ListenerFn, ListenerId, Listeners, PlaybackEvent, TimedEvents};
pub use frequency::{note_to_framerate, note_to_period, period_to_framerate, period_to_note};
pub use interpreter::{process_row, row_duration, Jump, RowContext, RowOutcome, Transport};
pub use recording::{CommandLog, DeviceClock, DeviceCommand, ManualClock, RecordingDevice, VoiceKey};
pub use row_log::{PositionTracker, RowLog, ScheduledRowRecord};
pub use scheduler::{PlaybackState, Scheduler, DEFAULT_VOICE_END_CAPACITY};
pub use voice_end::{voice_end_channel, VoiceEndReceiver, VoiceEndSender};
