//! Playback notifications.
//!
//! `row.render` fires as a row is scheduled. `row.play` and
//! `position.play` fire when the device clock reaches the row, so they are
//! queued until due and delivered by [`crate::Scheduler::poll`].

use std::fmt;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle returned by listener registration.
    pub struct ListenerId;
}

/// Kinds of playback notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A row is about to be scheduled
    RowRender,
    /// A row has become audible
    RowPlay,
    /// A new position has become audible
    PositionPlay,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::RowRender => "row.render",
            EventKind::RowPlay => "row.play",
            EventKind::PositionPlay => "position.play",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification delivered to listeners.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlaybackEvent {
    pub kind: EventKind,
    pub position: u16,
    pub row: u16,
    /// Device time the row starts
    pub time: f64,
}

pub type ListenerFn = Box<dyn FnMut(&PlaybackEvent) + Send>;

struct Listener {
    kind: EventKind,
    callback: ListenerFn,
}

/// Registered listeners, keyed by [`ListenerId`].
#[derive(Default)]
pub struct Listeners {
    listeners: SlotMap<ListenerId, Listener>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: EventKind, callback: ListenerFn) -> ListenerId {
        self.listeners.insert(Listener { kind, callback })
    }

    /// Returns false if the listener was already removed.
    pub fn remove(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Call every listener registered for the event's kind.
    pub fn dispatch(&mut self, event: &PlaybackEvent) {
        for listener in self.listeners.values_mut() {
            if listener.kind == event.kind {
                (listener.callback)(event);
            }
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

/// Events waiting for their time, kept in time order.
///
/// Events with equal times keep their insertion order, so rows are always
/// delivered in content order.
#[derive(Clone, Debug, Default)]
pub struct TimedEvents {
    events: Vec<PlaybackEvent>,
}

impl TimedEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: PlaybackEvent) {
        let pos = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(pos, event);
    }

    /// Remove and return every event due at or before `now`.
    pub fn pop_until(&mut self, now: f64) -> Vec<PlaybackEvent> {
        let due = self.events.partition_point(|e| e.time <= now);
        self.events.drain(..due).collect()
    }

    pub fn peek(&self) -> Option<&PlaybackEvent> {
        self.events.first()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn event(kind: EventKind, row: u16, time: f64) -> PlaybackEvent {
        PlaybackEvent { kind, position: 0, row, time }
    }

    #[test]
    fn names() {
        assert_eq!(EventKind::RowRender.to_string(), "row.render");
        assert_eq!(EventKind::RowPlay.to_string(), "row.play");
        assert_eq!(EventKind::PositionPlay.to_string(), "position.play");
    }

    #[test]
    fn timed_events_stay_ordered() {
        let mut queue = TimedEvents::new();
        queue.push(event(EventKind::RowPlay, 2, 0.24));
        queue.push(event(EventKind::RowPlay, 0, 0.0));
        queue.push(event(EventKind::PositionPlay, 1, 0.12));
        queue.push(event(EventKind::RowPlay, 1, 0.12));

        let due = queue.pop_until(0.12);
        let order: Vec<_> = due.iter().map(|e| (e.kind, e.row)).collect();
        assert_eq!(
            order,
            vec![
                (EventKind::RowPlay, 0),
                (EventKind::PositionPlay, 1),
                (EventKind::RowPlay, 1),
            ]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().map(|e| e.row), Some(2));
    }

    #[test]
    fn dispatch_filters_by_kind() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::new();
        let sink = seen.clone();
        let id = listeners.add(
            EventKind::RowPlay,
            Box::new(move |e| sink.lock().unwrap().push(e.row)),
        );

        listeners.dispatch(&event(EventKind::RowRender, 7, 0.0));
        listeners.dispatch(&event(EventKind::RowPlay, 8, 0.0));
        assert_eq!(*seen.lock().unwrap(), vec![8]);

        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.dispatch(&event(EventKind::RowPlay, 9, 0.0));
        assert_eq!(*seen.lock().unwrap(), vec![8]);
    }
}
