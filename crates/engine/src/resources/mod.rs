mod memory;
mod scope;

pub use memory::{MemoryResourceSystem, ScopeEvent};
pub use scope::{
    ResourceError, ResourceScope, ResourceSource, ResourceSourceKind, ResourceSystem, ScopeToken,
};
