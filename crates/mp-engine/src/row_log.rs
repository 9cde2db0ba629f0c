//! Time-ordered log of scheduled rows.
//!
//! The scheduler appends one record per rendered row. Readers on other
//! threads map a device time back to the row audible at that time.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::device::Clock;

/// One scheduled row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScheduledRowRecord {
    /// Device time the row starts
    pub time: f64,
    pub position: u16,
    pub row: u16,
    pub speed: u16,
    pub tempo: u16,
}

/// Append-only record sequence, trimmed from the front.
#[derive(Clone, Debug, Default)]
pub struct RowLog {
    records: VecDeque<ScheduledRowRecord>,
}

impl RowLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record. Records must arrive in time order.
    pub fn push(&mut self, record: ScheduledRowRecord) {
        debug_assert!(self.records.back().map_or(true, |last| last.time <= record.time));
        self.records.push_back(record);
    }

    /// Drop records that ended before `now`, keeping the one audible at `now`.
    pub fn trim(&mut self, now: f64) {
        while self.records.len() > 1 && self.records[1].time <= now {
            self.records.pop_front();
        }
    }

    /// The latest record starting at or before `now`.
    pub fn at(&self, now: f64) -> Option<&ScheduledRowRecord> {
        let idx = self.records.partition_point(|r| r.time <= now);
        idx.checked_sub(1).and_then(|i| self.records.get(i))
    }

    /// Record `offset` rows away from the one audible at `now`.
    pub fn relative(&self, now: f64, offset: i32) -> Option<&ScheduledRowRecord> {
        let idx = self.records.partition_point(|r| r.time <= now).checked_sub(1)?;
        let target = idx as i64 + offset as i64;
        usize::try_from(target).ok().and_then(|i| self.records.get(i))
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScheduledRowRecord> {
        self.records.iter()
    }
}

/// Row log plus what to report when nothing is scheduled.
#[derive(Clone, Debug, Default)]
pub(crate) struct TrackerState {
    pub(crate) log: RowLog,
    pub(crate) idle: ScheduledRowRecord,
}

impl Default for ScheduledRowRecord {
    fn default() -> Self {
        Self {
            time: 0.0,
            position: 0,
            row: 0,
            speed: 6,
            tempo: 125,
        }
    }
}

pub(crate) type SharedTracker = Arc<RwLock<TrackerState>>;

/// Cloneable, thread-safe view of what is playing now.
#[derive(Clone)]
pub struct PositionTracker<C> {
    state: SharedTracker,
    clock: C,
}

impl<C: Clock> PositionTracker<C> {
    pub(crate) fn new(state: SharedTracker, clock: C) -> Self {
        Self { state, clock }
    }

    /// The row audible now, or the idle cursor when nothing is scheduled.
    pub fn current(&self) -> ScheduledRowRecord {
        let now = self.clock.now();
        let state = self.state.read();
        state.log.at(now).copied().unwrap_or(state.idle)
    }

    /// `(position, row)` audible now.
    pub fn position(&self) -> (u16, u16) {
        let record = self.current();
        (record.position, record.row)
    }

    pub fn speed(&self) -> u16 {
        self.current().speed
    }

    pub fn tempo(&self) -> u16 {
        self.current().tempo
    }

    /// `(position, row)` of the record `offset` rows from the audible one.
    pub fn relative(&self, offset: i32) -> Option<(u16, u16)> {
        let now = self.clock.now();
        let state = self.state.read();
        if state.log.is_empty() {
            return (offset == 0).then_some((state.idle.position, state.idle.row));
        }
        state.log.relative(now, offset).map(|r| (r.position, r.row))
    }

    /// Number of records currently retained.
    pub fn retained(&self) -> usize {
        self.state.read().log.len()
    }
}

impl<C> core::fmt::Debug for PositionTracker<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PositionTracker").finish_non_exhaustive()
    }
}
