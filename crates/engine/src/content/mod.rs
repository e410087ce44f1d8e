mod area;
mod info;
mod scripts;
mod source;
mod surface;
mod xml;

pub use area::{parse_area_def, AreaDef, ExitRegion, ExitTarget, PlacedObject, Rect, WalkFace};
pub use info::{parse_module_info, ModuleInfo, ModuleScripts};
pub use scripts::parse_script_library;
pub use source::{
    ContentError, ContentKind, ContentSource, FsContentSource, MemoryContentSource, AREAS_DIR,
    MODULES_DIR, MODULE_INFO_FILE, SCRIPTS_FILE, SURFACE_TABLE_FILE, TEXTURE_PACKS_DIR,
};
pub use surface::{parse_surface_table, WalkableSurfaces};
pub use xml::{ContentErrorCode, ContentParseError, SourceLocation};
