use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::resources::ResourceSource;
use crate::script::ScriptLibrary;

use super::area::{parse_area_def, AreaDef};
use super::info::{parse_module_info, ModuleInfo};
use super::scripts::parse_script_library;
use super::surface::{parse_surface_table, WalkableSurfaces};
use super::xml::ContentParseError;

pub const MODULES_DIR: &str = "modules";
pub const MODULE_INFO_FILE: &str = "module.xml";
pub const AREAS_DIR: &str = "areas";
pub const SCRIPTS_FILE: &str = "scripts.xml";
pub const SURFACE_TABLE_FILE: &str = "surfacemat.xml";
pub const TEXTURE_PACKS_DIR: &str = "texturepacks";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Module,
    Area,
    TexturePack,
    SurfaceTable,
    Object,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Module => "module",
            Self::Area => "area",
            Self::TexturePack => "texture pack",
            Self::SurfaceTable => "surface table",
            Self::Object => "object",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ContentKind, name: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Malformed(#[from] ContentParseError),
}

/// Where module content comes from.
///
/// Game-specific layouts plug in here; the controller never touches files.
pub trait ContentSource: Send {
    fn module_info(&self, module: &str) -> Result<ModuleInfo, ContentError>;
    fn area(&self, module: &str, resref: &str) -> Result<AreaDef, ContentError>;
    fn surface_table(&self) -> Result<WalkableSurfaces, ContentError>;
    fn module_resources(&self, module: &str) -> Result<Vec<ResourceSource>, ContentError>;
    fn texture_pack(&self, archive: &str) -> Result<Vec<ResourceSource>, ContentError>;
    /// Modules without scripts yield an empty library.
    fn scripts(&self, module: &str) -> Result<ScriptLibrary, ContentError>;
}

/// Directory-backed content:
///
/// ```text
/// <root>/surfacemat.xml
/// <root>/modules/<name>/module.xml
/// <root>/modules/<name>/areas/<resref>.xml
/// <root>/modules/<name>/scripts.xml      (optional)
/// <root>/modules/<name>/*.rim|*.erf      (registered with the module scope)
/// <root>/texturepacks/<archive>.erf
/// ```
#[derive(Debug, Clone)]
pub struct FsContentSource {
    root: PathBuf,
}

impl FsContentSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn module_dir(&self, module: &str) -> PathBuf {
        self.root.join(MODULES_DIR).join(module)
    }

    fn read_required(
        &self,
        path: &Path,
        kind: ContentKind,
        name: &str,
    ) -> Result<String, ContentError> {
        fs::read_to_string(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                ContentError::NotFound {
                    kind,
                    name: name.to_string(),
                }
            } else {
                ContentError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }
}

impl ContentSource for FsContentSource {
    fn module_info(&self, module: &str) -> Result<ModuleInfo, ContentError> {
        if !is_valid_name(module) {
            return Err(ContentError::NotFound {
                kind: ContentKind::Module,
                name: module.to_string(),
            });
        }
        let path = self.module_dir(module).join(MODULE_INFO_FILE);
        let raw = self.read_required(&path, ContentKind::Module, module)?;
        Ok(parse_module_info(module, &path, &raw)?)
    }

    fn area(&self, module: &str, resref: &str) -> Result<AreaDef, ContentError> {
        if !is_valid_name(resref) {
            return Err(ContentError::NotFound {
                kind: ContentKind::Area,
                name: resref.to_string(),
            });
        }
        let path = self
            .module_dir(module)
            .join(AREAS_DIR)
            .join(format!("{resref}.xml"));
        let raw = self.read_required(&path, ContentKind::Area, resref)?;
        Ok(parse_area_def(resref, &path, &raw)?)
    }

    fn surface_table(&self) -> Result<WalkableSurfaces, ContentError> {
        let path = self.root.join(SURFACE_TABLE_FILE);
        let raw = self.read_required(&path, ContentKind::SurfaceTable, SURFACE_TABLE_FILE)?;
        Ok(parse_surface_table(&path, &raw)?)
    }

    fn module_resources(&self, module: &str) -> Result<Vec<ResourceSource>, ContentError> {
        let dir = self.module_dir(module);
        if !is_valid_name(module) || !dir.is_dir() {
            return Err(ContentError::NotFound {
                kind: ContentKind::Module,
                name: module.to_string(),
            });
        }
        let entries = fs::read_dir(&dir).map_err(|source| ContentError::Io {
            path: dir.clone(),
            source,
        })?;
        let mut archives = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| ContentError::Io {
                path: dir.clone(),
                source,
            })?;
            let path = entry.path();
            let is_archive = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("rim") || ext.eq_ignore_ascii_case("erf"));
            if path.is_file() && is_archive {
                archives.push(path);
            }
        }
        archives.sort();

        let mut sources = vec![ResourceSource::directory(dir)];
        sources.extend(archives.into_iter().map(ResourceSource::archive));
        Ok(sources)
    }

    fn texture_pack(&self, archive: &str) -> Result<Vec<ResourceSource>, ContentError> {
        let path = self.root.join(TEXTURE_PACKS_DIR).join(archive);
        if !path.is_file() {
            return Err(ContentError::NotFound {
                kind: ContentKind::TexturePack,
                name: archive.to_string(),
            });
        }
        Ok(vec![ResourceSource::archive(path)])
    }

    fn scripts(&self, module: &str) -> Result<ScriptLibrary, ContentError> {
        let path = self.module_dir(module).join(SCRIPTS_FILE);
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(parse_script_library(&path, &raw)?),
            Err(source) if source.kind() == io::ErrorKind::NotFound => Ok(ScriptLibrary::default()),
            Err(source) => Err(ContentError::Io { path, source }),
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
}

#[derive(Debug, Clone, Default)]
struct MemoryModule {
    info: Option<ModuleInfo>,
    malformed: Option<ContentParseError>,
    areas: HashMap<String, AreaDef>,
    resources: Vec<ResourceSource>,
    scripts: ScriptLibrary,
}

/// In-process content, for tests and embedders that generate modules.
#[derive(Debug, Clone, Default)]
pub struct MemoryContentSource {
    modules: HashMap<String, MemoryModule>,
    surfaces: Option<WalkableSurfaces>,
    missing_texture_packs: Vec<String>,
}

impl MemoryContentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surfaces(mut self, surfaces: WalkableSurfaces) -> Self {
        self.surfaces = Some(surfaces);
        self
    }

    /// Registers a module; its resource list defaults to one directory
    /// source named after the module.
    pub fn with_module(mut self, info: ModuleInfo, areas: Vec<AreaDef>) -> Self {
        let name = info.name.clone();
        let module = self.modules.entry(name.clone()).or_default();
        module.info = Some(info);
        module.malformed = None;
        module.resources = vec![ResourceSource::directory(PathBuf::from(MODULES_DIR).join(&name))];
        for area in areas {
            module.areas.insert(area.resref.clone(), area);
        }
        self
    }

    /// Registers a module whose info record fails to parse.
    pub fn with_malformed_module(mut self, name: &str, error: ContentParseError) -> Self {
        let module = self.modules.entry(name.to_string()).or_default();
        module.info = None;
        module.malformed = Some(error);
        module.resources = vec![ResourceSource::directory(PathBuf::from(MODULES_DIR).join(name))];
        self
    }

    pub fn with_resources(mut self, module: &str, resources: Vec<ResourceSource>) -> Self {
        self.modules.entry(module.to_string()).or_default().resources = resources;
        self
    }

    /// Every texture pack resolves unless marked missing here.
    pub fn without_texture_pack(mut self, archive: &str) -> Self {
        self.missing_texture_packs.push(archive.to_string());
        self
    }

    pub fn with_scripts(mut self, module: &str, scripts: ScriptLibrary) -> Self {
        self.modules.entry(module.to_string()).or_default().scripts = scripts;
        self
    }

    fn module(&self, module: &str) -> Result<&MemoryModule, ContentError> {
        self.modules.get(module).ok_or_else(|| ContentError::NotFound {
            kind: ContentKind::Module,
            name: module.to_string(),
        })
    }
}

impl ContentSource for MemoryContentSource {
    fn module_info(&self, module: &str) -> Result<ModuleInfo, ContentError> {
        let entry = self.module(module)?;
        if let Some(error) = &entry.malformed {
            return Err(ContentError::Malformed(error.clone()));
        }
        entry.info.clone().ok_or_else(|| ContentError::NotFound {
            kind: ContentKind::Module,
            name: module.to_string(),
        })
    }

    fn area(&self, module: &str, resref: &str) -> Result<AreaDef, ContentError> {
        self.module(module)?
            .areas
            .get(resref)
            .cloned()
            .ok_or_else(|| ContentError::NotFound {
                kind: ContentKind::Area,
                name: resref.to_string(),
            })
    }

    fn surface_table(&self) -> Result<WalkableSurfaces, ContentError> {
        self.surfaces.clone().ok_or_else(|| ContentError::NotFound {
            kind: ContentKind::SurfaceTable,
            name: SURFACE_TABLE_FILE.to_string(),
        })
    }

    fn module_resources(&self, module: &str) -> Result<Vec<ResourceSource>, ContentError> {
        Ok(self.module(module)?.resources.clone())
    }

    fn texture_pack(&self, archive: &str) -> Result<Vec<ResourceSource>, ContentError> {
        if self.missing_texture_packs.iter().any(|missing| missing == archive) {
            return Err(ContentError::NotFound {
                kind: ContentKind::TexturePack,
                name: archive.to_string(),
            });
        }
        Ok(vec![ResourceSource::archive(
            PathBuf::from(TEXTURE_PACKS_DIR).join(archive),
        )])
    }

    fn scripts(&self, module: &str) -> Result<ScriptLibrary, ContentError> {
        Ok(self.module(module)?.scripts.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::content::ContentErrorCode;
    use crate::resources::ResourceSourceKind;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create dirs");
        }
        fs::write(path, contents).expect("write");
    }

    fn setup_harbour(root: &Path) {
        let module_dir = root.join(MODULES_DIR).join("harbour");
        write(
            &module_dir.join(MODULE_INFO_FILE),
            r#"<Module>
                <entryArea>dock</entryArea>
                <entryPosition x="0" y="0"/>
                <areas><area>dock</area></areas>
            </Module>"#,
        );
        write(
            &module_dir.join(AREAS_DIR).join("dock.xml"),
            r#"<Area resref="dock"><walkmesh><face surface="0" minX="-1" minY="-1" maxX="1" maxY="1"/></walkmesh></Area>"#,
        );
        write(&module_dir.join("harbour_s.rim"), "");
        write(&module_dir.join("harbour.rim"), "");
        write(&module_dir.join("notes.txt"), "");
        write(
            &root.join(SURFACE_TABLE_FILE),
            r#"<SurfaceTypes><surface index="0" walk="1"/></SurfaceTypes>"#,
        );
    }

    #[test]
    fn reads_module_area_and_surface_table_from_disk() {
        let temp = TempDir::new().expect("temp");
        setup_harbour(temp.path());
        let source = FsContentSource::new(temp.path());

        let info = source.module_info("harbour").expect("info");
        assert_eq!(info.display_name, "harbour");
        let area = source.area("harbour", "dock").expect("area");
        assert_eq!(area.walkmesh.len(), 1);
        assert!(source.surface_table().expect("surfaces").is_walkable(0));
        assert!(source.scripts("harbour").expect("scripts").is_empty());
    }

    #[test]
    fn module_resources_list_directory_then_sorted_archives() {
        let temp = TempDir::new().expect("temp");
        setup_harbour(temp.path());
        let source = FsContentSource::new(temp.path());

        let resources = source.module_resources("harbour").expect("resources");
        let kinds = resources.iter().map(|source| source.kind).collect::<Vec<_>>();
        assert_eq!(
            kinds,
            vec![
                ResourceSourceKind::Directory,
                ResourceSourceKind::Archive,
                ResourceSourceKind::Archive
            ]
        );
        assert!(resources[1].path.ends_with("harbour.rim"));
        assert!(resources[2].path.ends_with("harbour_s.rim"));
    }

    #[test]
    fn texture_pack_must_exist_on_disk() {
        let temp = TempDir::new().expect("temp");
        setup_harbour(temp.path());
        write(&temp.path().join(TEXTURE_PACKS_DIR).join("tex_tpa.erf"), "");
        let source = FsContentSource::new(temp.path());

        let pack = source.texture_pack("tex_tpa.erf").expect("pack");
        assert_eq!(pack.len(), 1);
        assert!(matches!(
            source.texture_pack("tex_tpc.erf"),
            Err(ContentError::NotFound {
                kind: ContentKind::TexturePack,
                ..
            })
        ));
    }

    #[test]
    fn missing_module_and_area_are_not_found() {
        let temp = TempDir::new().expect("temp");
        setup_harbour(temp.path());
        let source = FsContentSource::new(temp.path());

        assert!(matches!(
            source.module_info("nowhere"),
            Err(ContentError::NotFound {
                kind: ContentKind::Module,
                ..
            })
        ));
        assert!(matches!(
            source.area("harbour", "cave"),
            Err(ContentError::NotFound {
                kind: ContentKind::Area,
                ..
            })
        ));
        assert!(matches!(
            source.module_resources("../etc"),
            Err(ContentError::NotFound { .. })
        ));
    }

    #[test]
    fn unparsable_module_info_is_malformed() {
        let temp = TempDir::new().expect("temp");
        setup_harbour(temp.path());
        write(
            &temp.path().join(MODULES_DIR).join("harbour").join(MODULE_INFO_FILE),
            "<Module><entryArea>",
        );
        let source = FsContentSource::new(temp.path());

        match source.module_info("harbour") {
            Err(ContentError::Malformed(error)) => {
                assert_eq!(error.code, ContentErrorCode::XmlMalformed)
            }
            other => panic!("expected malformed content, got {other:?}"),
        }
    }
}
