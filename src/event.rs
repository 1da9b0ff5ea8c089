use std::sync::Arc;

use parking_lot::Mutex;

/// Status of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-1", derive(serde::Serialize, serde::Deserialize))]
pub enum EventStatus {
    Reset,
    Signaled,
}

#[derive(Debug)]
struct EventState {
    status: EventStatus,
    revision: u32,
}

/// Completion flag guarded by a revision counter.
///
/// Each [`Event::reset`] starts a new use of the event and returns its revision.
/// Only a signal carrying the current revision marks the event as signaled,
/// so a late completion of a previous use can't complete the current one.
///
/// This is a polling primitive, there is no way to block until signaled.
#[derive(Debug)]
pub struct Event {
    state: Mutex<EventState>,
}

impl Default for Event {
    fn default() -> Self {
        Event::new()
    }
}

impl Event {
    /// Creates signaled event with revision 0.
    pub fn new() -> Self {
        Event {
            state: Mutex::new(EventState {
                status: EventStatus::Signaled,
                revision: 0,
            }),
        }
    }

    /// Resets the event and returns new revision.
    pub fn reset(&self) -> u32 {
        let mut state = self.state.lock();
        state.status = EventStatus::Reset;
        state.revision = state.revision.wrapping_add(1);
        state.revision
    }

    /// Signals the event if `revision` is current.
    /// Stale revisions are ignored.
    pub fn signal(&self, revision: u32) {
        let mut state = self.state.lock();
        if state.revision == revision {
            state.status = EventStatus::Signaled;
        }
    }

    pub fn status(&self) -> EventStatus {
        self.state.lock().status
    }

    pub fn revision(&self) -> u32 {
        self.state.lock().revision
    }
}

/// Event paired with revision to signal.
#[derive(Clone, Debug)]
pub struct EventRevision {
    pub event: Arc<Event>,
    pub revision: u32,
}

impl EventRevision {
    /// Resets the event and captures new revision.
    pub fn reset(event: &Arc<Event>) -> Self {
        let revision = event.reset();
        EventRevision {
            event: Arc::clone(event),
            revision,
        }
    }

    pub fn signal(&self) {
        self.event.signal(self.revision);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_signaled() {
        let event = Event::new();
        assert_eq!(event.status(), EventStatus::Signaled);
        assert_eq!(event.revision(), 0);
    }

    #[test]
    fn revisions_increase() {
        let event = Event::new();
        let revisions: Vec<u32> = (0..5).map(|_| event.reset()).collect();
        assert!(revisions.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn stale_signal_is_ignored() {
        let event = Event::new();
        let r1 = event.reset();
        let r2 = event.reset();

        event.signal(r1);
        assert_eq!(event.status(), EventStatus::Reset);

        event.signal(r2);
        assert_eq!(event.status(), EventStatus::Signaled);
    }

    #[test]
    fn revision_handle_signals_its_use() {
        let event = Arc::new(Event::new());
        let first = EventRevision::reset(&event);
        let second = EventRevision::reset(&event);

        first.signal();
        assert_eq!(event.status(), EventStatus::Reset);

        second.signal();
        assert_eq!(event.status(), EventStatus::Signaled);
    }
}
