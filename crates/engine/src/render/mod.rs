mod frame_lock;
mod headless;
mod recording;

use crate::world::ObjectId;

pub use frame_lock::FrameLock;
pub use headless::HeadlessRenderBackend;
pub use recording::{RecordingRenderBackend, RenderCall};

/// The renderer as seen from the simulation thread.
///
/// `lock_frame`/`unlock_frame` must be paired and are not reentrant. Visual
/// operations are only issued while the frame is locked.
pub trait RenderBackend: Send + Sync {
    fn lock_frame(&self);
    fn unlock_frame(&self);

    fn load_model(&self, object: ObjectId, model: &str);
    fn unload_model(&self, object: ObjectId);
    fn show(&self, object: ObjectId);
    fn hide(&self, object: ObjectId);

    fn show_area(&self, _area: ObjectId, _resref: &str) {}
    fn hide_area(&self, _area: ObjectId, _resref: &str) {}
}

/// Holds the frame lock for its lifetime.
pub struct FrameGuard<'a> {
    backend: &'a dyn RenderBackend,
}

impl<'a> FrameGuard<'a> {
    pub fn lock(backend: &'a dyn RenderBackend) -> Self {
        backend.lock_frame();
        Self { backend }
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.backend.unlock_frame();
    }
}
