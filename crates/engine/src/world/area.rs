use crate::content::{AreaDef, ExitRegion, WalkFace, WalkableSurfaces};

use super::object::ObjectId;

/// A loaded area of the running module.
///
/// Objects in the area are not owned here; they live in the
/// [`ObjectContainer`](super::ObjectContainer) and point back by id.
#[derive(Debug, Clone)]
pub struct Area {
    pub id: ObjectId,
    pub resref: String,
    pub name: String,
    walkmesh: Vec<WalkFace>,
    exits: Vec<ExitRegion>,
    pub(crate) presented: bool,
}

impl Area {
    pub fn from_def(id: ObjectId, def: &AreaDef) -> Self {
        Self {
            id,
            resref: def.resref.clone(),
            name: def.name.clone(),
            walkmesh: def.walkmesh.clone(),
            exits: def.exits.clone(),
            presented: false,
        }
    }

    /// Whether this is the area currently shown to the viewer.
    pub fn is_presented(&self) -> bool {
        self.presented
    }

    pub fn walkmesh(&self) -> &[WalkFace] {
        &self.walkmesh
    }

    pub fn exits(&self) -> &[ExitRegion] {
        &self.exits
    }

    /// Height of the walkable ground at `(x, y)`, or `None` when the point is
    /// off the walkmesh or only over non-walkable surfaces. Later faces win
    /// where faces overlap.
    pub fn walkable_elevation(&self, x: f32, y: f32, surfaces: &WalkableSurfaces) -> Option<f32> {
        self.walkmesh
            .iter()
            .rev()
            .find(|face| face.bounds.contains(x, y))
            .filter(|face| surfaces.is_walkable(face.surface))
            .map(|face| face.z)
    }

    pub fn exit_at(&self, x: f32, y: f32) -> Option<&ExitRegion> {
        self.exits.iter().find(|exit| exit.bounds.contains(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{ExitTarget, Rect};

    fn rect(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Rect {
        Rect {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn area() -> Area {
        let def = AreaDef {
            resref: "dock".to_string(),
            name: "Dock".to_string(),
            walkmesh: vec![
                WalkFace {
                    bounds: rect(0.0, 0.0, 10.0, 10.0),
                    surface: 0,
                    z: 1.0,
                },
                WalkFace {
                    bounds: rect(4.0, 4.0, 6.0, 6.0),
                    surface: 1,
                    z: 0.0,
                },
            ],
            objects: Vec::new(),
            exits: vec![ExitRegion {
                bounds: rect(9.0, 0.0, 10.0, 10.0),
                target: ExitTarget::Module {
                    module: "inland".to_string(),
                    tag: None,
                },
            }],
        };
        Area::from_def(ObjectId(5), &def)
    }

    #[test]
    fn elevation_comes_from_walkable_face() {
        let surfaces = WalkableSurfaces::from_flags(vec![true, false]);
        assert_eq!(area().walkable_elevation(1.0, 1.0, &surfaces), Some(1.0));
    }

    #[test]
    fn overlapping_non_walkable_face_blocks_movement() {
        let surfaces = WalkableSurfaces::from_flags(vec![true, false]);
        assert_eq!(area().walkable_elevation(5.0, 5.0, &surfaces), None);
        assert_eq!(area().walkable_elevation(50.0, 5.0, &surfaces), None);
    }

    #[test]
    fn exit_lookup_uses_region_bounds() {
        let area = area();
        assert!(area.exit_at(9.5, 3.0).is_some());
        assert!(area.exit_at(8.5, 3.0).is_none());
    }
}
