use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObjectId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    Module,
    Area,
    Creature,
    Placeable,
    Door,
    Waypoint,
    Trigger,
}

impl ObjectKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "creature" => Some(Self::Creature),
            "placeable" => Some(Self::Placeable),
            "door" => Some(Self::Door),
            "waypoint" => Some(Self::Waypoint),
            "trigger" => Some(Self::Trigger),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Area => "area",
            Self::Creature => "creature",
            Self::Placeable => "placeable",
            Self::Door => "door",
            Self::Waypoint => "waypoint",
            Self::Trigger => "trigger",
        }
    }

    /// Waypoints and triggers never get a visual representation.
    pub fn has_model(self) -> bool {
        matches!(self, Self::Creature | Self::Placeable | Self::Door)
    }
}

/// An object placed in the simulated world.
///
/// `area` is a back-reference by id; the owning area never holds the object
/// itself, which keeps relocation a matter of rewriting one field.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub id: ObjectId,
    pub tag: String,
    pub kind: ObjectKind,
    pub area: Option<ObjectId>,
    pub position: Vec3,
    pub orientation_degrees: f32,
    pub model: Option<String>,
    pub(crate) visible: bool,
    pub(crate) model_loaded: bool,
}

impl GameObject {
    /// Build a detached object. The id is assigned when the object is
    /// inserted into an [`ObjectContainer`](super::ObjectContainer).
    pub fn new(tag: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id: ObjectId(0),
            tag: tag.into(),
            kind,
            area: None,
            position: Vec3::default(),
            orientation_degrees: 0.0,
            model: None,
            visible: false,
            model_loaded: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_orientation(mut self, orientation_degrees: f32) -> Self {
        self.orientation_degrees = orientation_degrees;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model_loaded
    }
}
