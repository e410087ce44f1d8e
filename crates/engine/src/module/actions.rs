use std::collections::BTreeMap;

use crate::script::ScriptState;
use crate::world::ObjectId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Script,
}

/// A script invocation scheduled for a simulated timestamp.
///
/// `owner` and `triggerer` are ids, not objects: they are resolved when the
/// action fires and may no longer exist by then.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub script: String,
    pub state: ScriptState,
    pub owner: Option<ObjectId>,
    pub triggerer: Option<ObjectId>,
    pub timestamp: u64,
}

impl Action {
    pub fn script(
        script: impl Into<String>,
        state: ScriptState,
        owner: Option<ObjectId>,
        triggerer: Option<ObjectId>,
        timestamp: u64,
    ) -> Self {
        Self {
            kind: ActionKind::Script,
            script: script.into(),
            state,
            owner,
            triggerer,
            timestamp,
        }
    }
}

/// Pending actions ordered by timestamp, then by insertion.
#[derive(Debug, Default)]
pub struct DeferredActionQueue {
    actions: BTreeMap<(u64, u64), Action>,
    next_sequence: u64,
}

impl DeferredActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, action: Action) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.actions.insert((action.timestamp, sequence), action);
    }

    /// Removes and returns every action due at or before `now`.
    ///
    /// The result is detached from the queue, so actions inserted while the
    /// caller processes it wait for the next call.
    pub fn pop_ready(&mut self, now: u64) -> Vec<Action> {
        let ready = match now.checked_add(1) {
            Some(cutoff) => {
                let pending = self.actions.split_off(&(cutoff, 0));
                std::mem::replace(&mut self.actions, pending)
            }
            None => std::mem::take(&mut self.actions),
        };
        ready.into_values().collect()
    }

    pub fn next_timestamp(&self) -> Option<u64> {
        self.actions.keys().next().map(|(timestamp, _)| *timestamp)
    }

    pub fn clear(&mut self) {
        self.actions.clear();
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(script: &str, timestamp: u64) -> Action {
        Action::script(script, ScriptState::default(), None, None, timestamp)
    }

    fn names(actions: &[Action]) -> Vec<&str> {
        actions.iter().map(|action| action.script.as_str()).collect()
    }

    #[test]
    fn pop_ready_orders_by_timestamp_then_insertion() {
        let mut queue = DeferredActionQueue::new();
        queue.insert(action("late", 7));
        queue.insert(action("first_at_3", 3));
        queue.insert(action("too_late", 12));
        queue.insert(action("second_at_3", 3));
        queue.insert(action("early", 1));
        queue.insert(action("third_at_3", 3));

        let ready = queue.pop_ready(10);

        assert_eq!(
            names(&ready),
            vec!["early", "first_at_3", "second_at_3", "third_at_3", "late"]
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_timestamp(), Some(12));
    }

    #[test]
    fn boundary_timestamp_is_inclusive() {
        let mut queue = DeferredActionQueue::new();
        queue.insert(action("at_5", 5));
        queue.insert(action("at_6", 6));

        assert!(queue.pop_ready(4).is_empty());
        assert_eq!(names(&queue.pop_ready(5)), vec!["at_5"]);
        assert_eq!(names(&queue.pop_ready(6)), vec!["at_6"]);
    }

    #[test]
    fn actions_inserted_while_processing_wait_for_next_pop() {
        let mut queue = DeferredActionQueue::new();
        queue.insert(action("parent", 2));

        let ready = queue.pop_ready(2);
        for fired in &ready {
            queue.insert(action(&format!("{}_child", fired.script), 2));
        }

        assert_eq!(names(&ready), vec!["parent"]);
        assert_eq!(names(&queue.pop_ready(2)), vec!["parent_child"]);
    }

    #[test]
    fn max_timestamp_drains_everything() {
        let mut queue = DeferredActionQueue::new();
        queue.insert(action("a", u64::MAX));
        queue.insert(action("b", 0));

        assert_eq!(names(&queue.pop_ready(u64::MAX)), vec!["b", "a"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_drops_pending_actions() {
        let mut queue = DeferredActionQueue::new();
        queue.insert(action("doomed", 100));
        queue.clear();

        assert!(queue.pop_ready(u64::MAX).is_empty());
    }
}
