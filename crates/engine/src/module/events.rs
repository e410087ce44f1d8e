use std::collections::VecDeque;

use crate::world::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Forward,
    Backward,
    TurnLeft,
    TurnRight,
    Run,
    FreeCamera,
    Walkmesh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Key { key: Key, pressed: bool },
    /// Runs `script` with `owner` as the calling object.
    ScriptTrigger {
        script: String,
        owner: Option<ObjectId>,
        triggerer: Option<ObjectId>,
    },
    Quit,
}

/// A runtime notification; `origin` names the subsystem that raised it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub origin: &'static str,
    pub kind: EventKind,
}

impl Event {
    pub fn new(origin: &'static str, kind: EventKind) -> Self {
        Self { origin, kind }
    }

    pub fn key(key: Key, pressed: bool) -> Self {
        Self::new("input", EventKind::Key { key, pressed })
    }

    pub fn quit() -> Self {
        Self::new("input", EventKind::Quit)
    }
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<Event>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Takes every queued event in arrival order. Events pushed afterwards
    /// stay queued for the next drain.
    pub fn drain(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events).into()
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

    #[test]
    fn drain_returns_push_order() {
        let mut queue = EventQueue::new();
        queue.push(Event::key(Key::Forward, true));
        queue.push(Event::quit());
        queue.push(Event::key(Key::Forward, false));

        let drained = queue.drain();

        assert_eq!(
            drained,
            vec![
                Event::key(Key::Forward, true),
                Event::quit(),
                Event::key(Key::Forward, false)
            ]
        );
        assert!(queue.is_empty());
    }

    #[test]
    fn events_pushed_during_processing_wait_for_next_drain() {
        let mut queue = EventQueue::new();
        queue.push(Event::key(Key::Run, true));

        let drained = queue.drain();
        for _ in &drained {
            queue.push(Event::quit());
        }

        assert_eq!(drained.len(), 1);
        assert_eq!(queue.drain(), vec![Event::quit()]);
    }
}
