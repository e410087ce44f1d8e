use std::sync::Arc;

use tracing::debug;

use crate::world::ObjectId;

use super::frame_lock::FrameLock;
use super::RenderBackend;

/// Renderer stand-in with a real frame lock and logged visual operations.
///
/// The frame lock is shared so a presenting thread can take it too.
#[derive(Debug, Clone, Default)]
pub struct HeadlessRenderBackend {
    frame_lock: Arc<FrameLock>,
}

impl HeadlessRenderBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_lock(&self) -> Arc<FrameLock> {
        Arc::clone(&self.frame_lock)
    }
}

impl RenderBackend for HeadlessRenderBackend {
    fn lock_frame(&self) {
        self.frame_lock.lock();
    }

    fn unlock_frame(&self) {
        self.frame_lock.unlock();
    }

    fn load_model(&self, object: ObjectId, model: &str) {
        debug!(object = object.0, model, "model_loaded");
    }

    fn unload_model(&self, object: ObjectId) {
        debug!(object = object.0, "model_unloaded");
    }

    fn show(&self, object: ObjectId) {
        debug!(object = object.0, "object_shown");
    }

    fn hide(&self, object: ObjectId) {
        debug!(object = object.0, "object_hidden");
    }

    fn show_area(&self, area: ObjectId, resref: &str) {
        debug!(area = area.0, resref, "area_shown");
    }

    fn hide_area(&self, area: ObjectId, resref: &str) {
        debug!(area = area.0, resref, "area_hidden");
    }
}
