use std::sync::{Mutex, MutexGuard};

use crate::world::ObjectId;

use super::RenderBackend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderCall {
    LockFrame,
    UnlockFrame,
    LoadModel(ObjectId, String),
    UnloadModel(ObjectId),
    Show(ObjectId),
    Hide(ObjectId),
    ShowArea(ObjectId),
    HideArea(ObjectId),
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<RenderCall>,
    depth: u32,
    unlocked_visual_ops: u32,
    unbalanced_unlocks: u32,
}

/// Test double that records every call and flags visual operations issued
/// outside a locked frame.
#[derive(Debug, Default)]
pub struct RecordingRenderBackend {
    recording: Mutex<Recording>,
}

impl RecordingRenderBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.lock().calls.clone()
    }

    pub fn clear(&self) {
        self.lock().calls.clear();
    }

    pub fn count(&self, matches: impl Fn(&RenderCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| matches(call)).count()
    }

    pub fn hides_of(&self, object: ObjectId) -> usize {
        self.count(|call| *call == RenderCall::Hide(object))
    }

    pub fn shows_of(&self, object: ObjectId) -> usize {
        self.count(|call| *call == RenderCall::Show(object))
    }

    /// True when every lock was paired and no visual op ran unlocked.
    pub fn is_well_formed(&self) -> bool {
        let recording = self.lock();
        recording.depth == 0 && recording.unlocked_visual_ops == 0 && recording.unbalanced_unlocks == 0
    }

    pub fn is_locked(&self) -> bool {
        self.lock().depth > 0
    }

    fn record_visual(&self, call: RenderCall) {
        let mut recording = self.lock();
        if recording.depth == 0 {
            recording.unlocked_visual_ops += 1;
        }
        recording.calls.push(call);
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        match self.recording.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RenderBackend for RecordingRenderBackend {
    fn lock_frame(&self) {
        let mut recording = self.lock();
        recording.depth += 1;
        recording.calls.push(RenderCall::LockFrame);
    }

    fn unlock_frame(&self) {
        let mut recording = self.lock();
        if recording.depth == 0 {
            recording.unbalanced_unlocks += 1;
        } else {
            recording.depth -= 1;
        }
        recording.calls.push(RenderCall::UnlockFrame);
    }

    fn load_model(&self, object: ObjectId, model: &str) {
        self.record_visual(RenderCall::LoadModel(object, model.to_string()));
    }

    fn unload_model(&self, object: ObjectId) {
        self.record_visual(RenderCall::UnloadModel(object));
    }

    fn show(&self, object: ObjectId) {
        self.record_visual(RenderCall::Show(object));
    }

    fn hide(&self, object: ObjectId) {
        self.record_visual(RenderCall::Hide(object));
    }

    fn show_area(&self, area: ObjectId, _resref: &str) {
        self.record_visual(RenderCall::ShowArea(area));
    }

    fn hide_area(&self, area: ObjectId, _resref: &str) {
        self.record_visual(RenderCall::HideArea(area));
    }
}
