//! Core IR types for modplay.
//!
//! This crate defines the canonical, format-agnostic song representation.
//! Every module decoder emits a [`Song`], and the playback scheduler
//! consumes it read-only.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod display;
mod effects;
mod instrument;
mod pattern;
mod sample;
pub mod song;

pub use display::{format_cell, format_effect, format_instrument, period_name, row_to_string};
pub use effects::{Effect, EffectSpace, EffectTag};
pub use instrument::{
    AutoVibrato, DuplicateCheck, DuplicateCheckAction, Envelope, EnvelopeFlags, Instrument,
    NewNoteAction, KEYMAP_SIZE,
};
pub use pattern::{Cell, Note, Pattern, NOTE_OFF};
pub use sample::{LoopType, Sample};
pub use song::{ModuleFormat, Name, Song};
