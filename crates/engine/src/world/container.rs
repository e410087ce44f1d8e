use std::collections::BTreeMap;

use super::object::{GameObject, ObjectId, ObjectKind};

#[derive(Debug)]
pub struct ObjectIdAllocator {
    next: u64,
}

impl Default for ObjectIdAllocator {
    fn default() -> Self {
        // Id 0 is never handed out so a zeroed id cannot alias a live object.
        Self { next: 1 }
    }
}

impl ObjectIdAllocator {
    pub fn allocate(&mut self) -> ObjectId {
        let id = ObjectId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

/// Registry of every live object, keyed by id.
///
/// Weak references elsewhere in the runtime (deferred actions, script
/// parameters) are plain [`ObjectId`]s resolved through this container, so
/// removing an object never requires touching the holders of those ids.
#[derive(Debug, Default)]
pub struct ObjectContainer {
    allocator: ObjectIdAllocator,
    objects: BTreeMap<ObjectId, GameObject>,
}

impl ObjectContainer {
    pub fn allocate_id(&mut self) -> ObjectId {
        self.allocator.allocate()
    }

    /// Assigns a fresh id and takes ownership of `object`.
    pub fn insert(&mut self, mut object: GameObject) -> ObjectId {
        let id = self.allocator.allocate();
        object.id = id;
        self.objects.insert(id, object);
        id
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameObject> {
        self.objects.values()
    }

    pub fn ids_in_area(&self, area: ObjectId) -> Vec<ObjectId> {
        self.objects
            .values()
            .filter(|object| object.area == Some(area))
            .map(|object| object.id)
            .collect()
    }

    /// Finds the `nth` object (in id order) carrying `tag`, optionally
    /// restricted to one kind.
    pub fn find_by_tag(&self, tag: &str, kind: Option<ObjectKind>, nth: usize) -> Option<ObjectId> {
        self.objects
            .values()
            .filter(|object| object.tag == tag)
            .filter(|object| kind.map_or(true, |required| object.kind == required))
            .nth(nth)
            .map(|object| object.id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&GameObject) -> bool) {
        self.objects.retain(|_, object| keep(object));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Vec3;

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = ObjectIdAllocator::default();
        let first = allocator.allocate();
        let second = allocator.allocate();
        let third = allocator.allocate();

        assert_eq!(first.0, 1);
        assert_eq!(second.0, 2);
        assert_eq!(third.0, 3);
    }

    #[test]
    fn removed_ids_stay_unresolvable() {
        let mut container = ObjectContainer::default();
        let doomed = container.insert(GameObject::new("doomed", ObjectKind::Creature));
        let survivor = container.insert(GameObject::new("survivor", ObjectKind::Creature));

        assert!(container.remove(doomed).is_some());
        let replacement = container.insert(GameObject::new("doomed", ObjectKind::Creature));

        assert!(container.get(doomed).is_none());
        assert_ne!(replacement, doomed);
        assert!(container.contains(survivor));
    }

    #[test]
    fn find_by_tag_respects_kind_filter_and_index() {
        let mut container = ObjectContainer::default();
        let door = container.insert(GameObject::new("gate", ObjectKind::Door));
        let first_wp = container.insert(
            GameObject::new("gate", ObjectKind::Waypoint).with_position(Vec3::new(1.0, 0.0, 0.0)),
        );
        let second_wp = container.insert(GameObject::new("gate", ObjectKind::Waypoint));

        assert_eq!(container.find_by_tag("gate", None, 0), Some(door));
        assert_eq!(
            container.find_by_tag("gate", Some(ObjectKind::Waypoint), 0),
            Some(first_wp)
        );
        assert_eq!(
            container.find_by_tag("gate", Some(ObjectKind::Waypoint), 1),
            Some(second_wp)
        );
        assert_eq!(container.find_by_tag("gate", Some(ObjectKind::Trigger), 0), None);
    }

    #[test]
    fn ids_in_area_filters_by_back_reference() {
        let mut container = ObjectContainer::default();
        let area = container.allocate_id();
        let mut inside = GameObject::new("inside", ObjectKind::Placeable);
        inside.area = Some(area);
        let inside = container.insert(inside);
        container.insert(GameObject::new("nowhere", ObjectKind::Placeable));

        assert_eq!(container.ids_in_area(area), vec![inside]);
    }
}
