//! MOD/XM tracker module decoding and lookahead playback scheduling.
//!
//! The [`Controller`] loads a module, plays it against an
//! [`AudioDevice`], and answers position queries from any thread.

pub use mp_engine::{DeviceClock, DeviceCommand, ManualClock, RecordingDevice};
pub use mp_master::*;
