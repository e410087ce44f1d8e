mod area;
mod container;
mod object;

pub use area::Area;
pub use container::{ObjectContainer, ObjectIdAllocator};
pub use object::{GameObject, ObjectId, ObjectKind, Vec3};
