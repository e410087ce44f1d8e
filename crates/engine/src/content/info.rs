use std::path::Path;

use crate::world::Vec3;

use super::xml::{parse_document, ContentErrorCode, ContentParseError, XmlReader};

/// Script hooks a module fires on lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleScripts {
    pub on_module_load: Option<String>,
    pub on_client_enter: Option<String>,
    pub on_heartbeat: Option<String>,
}

/// Read-only description of a module: entry point, area list, display name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleInfo {
    pub name: String,
    pub display_name: String,
    pub entry_area: String,
    pub entry_position: Vec3,
    pub entry_angle_degrees: f32,
    pub areas: Vec<String>,
    pub scripts: ModuleScripts,
}

/// Parses a `<Module>` document.
///
/// ```xml
/// <Module>
///   <name>Harbour</name>
///   <entryArea>dock</entryArea>
///   <entryPosition x="1" y="2" z="0" angle="90"/>
///   <areas><area>dock</area><area>bay</area></areas>
///   <scripts onModuleLoad="mod_load" onHeartbeat="mod_hb"/>
/// </Module>
/// ```
pub fn parse_module_info(
    module: &str,
    file_path: &Path,
    raw: &str,
) -> Result<ModuleInfo, ContentParseError> {
    let doc = parse_document(file_path, raw)?;
    let (reader, root) = XmlReader::root(&doc, file_path, "Module")?;

    let mut display_name: Option<String> = None;
    let mut entry_area: Option<String> = None;
    let mut entry_position: Option<(Vec3, f32)> = None;
    let mut areas: Option<Vec<String>> = None;
    let mut scripts = ModuleScripts::default();

    for (field_name, field) in reader.unique_fields(root)? {
        match field_name.as_str() {
            "name" => display_name = Some(reader.required_text(field, "name")?),
            "entryArea" => entry_area = Some(reader.required_text(field, "entryArea")?),
            "entryPosition" => {
                let position = Vec3::new(
                    reader.f32_attr(field, "x")?,
                    reader.f32_attr(field, "y")?,
                    reader.f32_attr_or(field, "z", 0.0)?,
                );
                let angle = reader.f32_attr_or(field, "angle", 0.0)?;
                entry_position = Some((position, angle));
            }
            "areas" => {
                let mut list = Vec::new();
                for area in field.children().filter(|child| child.is_element()) {
                    if area.tag_name().name() != "area" {
                        return Err(reader.unknown_field("areas", area));
                    }
                    let resref = reader.required_text(area, "area")?;
                    if list.contains(&resref) {
                        return Err(reader.error_at(
                            ContentErrorCode::DuplicateEntry,
                            format!("area '{resref}' listed twice"),
                            area,
                        ));
                    }
                    list.push(resref);
                }
                areas = Some(list);
            }
            "scripts" => {
                scripts = ModuleScripts {
                    on_module_load: reader.optional_attr(field, "onModuleLoad"),
                    on_client_enter: reader.optional_attr(field, "onClientEnter"),
                    on_heartbeat: reader.optional_attr(field, "onHeartbeat"),
                };
            }
            _ => return Err(reader.unknown_field("Module", field)),
        }
    }

    let Some(entry_area) = entry_area else {
        return Err(reader.missing_field("Module", "entryArea", root));
    };
    let Some((entry_position, entry_angle_degrees)) = entry_position else {
        return Err(reader.missing_field("Module", "entryPosition", root));
    };
    let areas = match areas {
        Some(list) if !list.is_empty() => list,
        _ => return Err(reader.missing_field("Module", "areas", root)),
    };
    if !areas.contains(&entry_area) {
        return Err(reader.error_at(
            ContentErrorCode::InvalidValue,
            format!("entryArea '{entry_area}' is not listed in <areas>"),
            root,
        ));
    }

    Ok(ModuleInfo {
        name: module.to_string(),
        display_name: display_name.unwrap_or_else(|| module.to_string()),
        entry_area,
        entry_position,
        entry_angle_degrees,
        areas,
        scripts,
    })
}
