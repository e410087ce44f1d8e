use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::render::{FrameGuard, RenderBackend};
use crate::world::{Area, GameObject, ObjectContainer, ObjectId, Vec3};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("object {0:?} does not exist")]
    UnknownObject(ObjectId),
    #[error("object {0:?} is not in any area")]
    NoSourceArea(ObjectId),
    #[error("no destination area given for object {0:?}")]
    NoDestinationArea(ObjectId),
    #[error("area {0:?} is not part of the running module")]
    UnknownArea(ObjectId),
    #[error("destination position is not finite")]
    InvalidPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocateOutcome {
    pub from: ObjectId,
    pub to: ObjectId,
    pub area_changed: bool,
}

/// Moves objects between areas while keeping the presented area's visuals
/// consistent.
pub struct AreaTransitionCoordinator<'a> {
    render: &'a dyn RenderBackend,
}

impl<'a> AreaTransitionCoordinator<'a> {
    pub fn new(render: &'a dyn RenderBackend) -> Self {
        Self { render }
    }

    /// Relocates `entity` to `position` inside `destination`.
    ///
    /// Nothing is mutated when a precondition fails. All mutation happens
    /// under the frame lock; the caller is responsible for any follow-up
    /// once the lock is released (camera refresh when the PC moved).
    pub fn relocate(
        &self,
        objects: &mut ObjectContainer,
        areas: &BTreeMap<ObjectId, Area>,
        entity: ObjectId,
        destination: Option<ObjectId>,
        position: Vec3,
    ) -> Result<RelocateOutcome, TransitionError> {
        let from = objects
            .get(entity)
            .ok_or(TransitionError::UnknownObject(entity))?
            .area
            .ok_or(TransitionError::NoSourceArea(entity))?;
        let to = destination.ok_or(TransitionError::NoDestinationArea(entity))?;
        if !areas.contains_key(&to) {
            return Err(TransitionError::UnknownArea(to));
        }
        if !position.is_finite() {
            return Err(TransitionError::InvalidPosition);
        }

        let presented = areas
            .values()
            .find(|area| area.is_presented())
            .map(|area| area.id);

        let _frame = FrameGuard::lock(self.render);
        let Some(object) = objects.get_mut(entity) else {
            return Err(TransitionError::UnknownObject(entity));
        };

        let area_changed = from != to;
        if area_changed {
            if Some(from) == presented {
                self.withdraw(object);
            } else if Some(to) == presented {
                self.present(object);
            }
        }

        object.area = Some(to);
        object.position = position;

        debug!(
            object = entity.0,
            tag = %object.tag,
            from = from.0,
            to = to.0,
            area_changed,
            "object_relocated"
        );
        Ok(RelocateOutcome {
            from,
            to,
            area_changed,
        })
    }

    fn withdraw(&self, object: &mut GameObject) {
        if object.visible {
            self.render.hide(object.id);
            object.visible = false;
        }
        if object.model_loaded {
            self.render.unload_model(object.id);
            object.model_loaded = false;
        }
    }

    fn present(&self, object: &mut GameObject) {
        if !object.kind.has_model() {
            return;
        }
        let Some(model) = object.model.as_deref() else {
            warn!(object = object.id.0, tag = %object.tag, "object_without_model");
            return;
        };
        if !object.model_loaded {
            self.render.load_model(object.id, model);
            object.model_loaded = true;
        }
        if !object.visible {
            self.render.show(object.id);
            object.visible = true;
        }
    }
}
