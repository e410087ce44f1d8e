use std::path::Path;

use crate::world::{ObjectKind, Vec3};

use super::xml::{parse_document, ContentErrorCode, ContentParseError, XmlReader};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Rect {
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// One walkable patch of an area: a flat rectangle tagged with a surface type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkFace {
    pub bounds: Rect,
    pub surface: u32,
    pub z: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlacedObject {
    pub tag: String,
    pub kind: ObjectKind,
    pub position: Vec3,
    pub orientation_degrees: f32,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitTarget {
    /// Another area of the same module; the PC lands on the tagged object.
    Area { resref: String, tag: String },
    /// A different module; an absent tag means the module's own entry point.
    Module { module: String, tag: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExitRegion {
    pub bounds: Rect,
    pub target: ExitTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AreaDef {
    pub resref: String,
    pub name: String,
    pub walkmesh: Vec<WalkFace>,
    pub objects: Vec<PlacedObject>,
    pub exits: Vec<ExitRegion>,
}

/// Parses an `<Area>` document.
pub fn parse_area_def(
    expected_resref: &str,
    file_path: &Path,
    raw: &str,
) -> Result<AreaDef, ContentParseError> {
    let doc = parse_document(file_path, raw)?;
    let (reader, root) = XmlReader::root(&doc, file_path, "Area")?;

    let resref = reader.required_attr(root, "resref")?;
    if resref != expected_resref {
        return Err(reader.error_at(
            ContentErrorCode::InvalidValue,
            format!("area resref '{resref}' does not match requested '{expected_resref}'"),
            root,
        ));
    }

    let mut name: Option<String> = None;
    let mut walkmesh = Vec::new();
    let mut objects = Vec::new();
    let mut exits = Vec::new();

    for (field_name, field) in reader.unique_fields(root)? {
        match field_name.as_str() {
            "name" => name = Some(reader.required_text(field, "name")?),
            "walkmesh" => {
                for face in field.children().filter(|child| child.is_element()) {
                    if face.tag_name().name() != "face" {
                        return Err(reader.unknown_field("walkmesh", face));
                    }
                    walkmesh.push(WalkFace {
                        bounds: parse_rect(&reader, face)?,
                        surface: reader.u32_attr(face, "surface")?,
                        z: reader.f32_attr_or(face, "z", 0.0)?,
                    });
                }
            }
            "objects" => {
                for object in field.children().filter(|child| child.is_element()) {
                    if object.tag_name().name() != "object" {
                        return Err(reader.unknown_field("objects", object));
                    }
                    objects.push(parse_placed_object(&reader, object)?);
                }
            }
            "exits" => {
                for exit in field.children().filter(|child| child.is_element()) {
                    if exit.tag_name().name() != "exit" {
                        return Err(reader.unknown_field("exits", exit));
                    }
                    exits.push(parse_exit(&reader, exit)?);
                }
            }
            _ => return Err(reader.unknown_field("Area", field)),
        }
    }

    Ok(AreaDef {
        name: name.unwrap_or_else(|| resref.clone()),
        resref,
        walkmesh,
        objects,
        exits,
    })
}

fn parse_rect(reader: &XmlReader<'_, '_>, node: roxmltree::Node<'_, '_>) -> Result<Rect, ContentParseError> {
    let rect = Rect {
        min_x: reader.f32_attr(node, "minX")?,
        min_y: reader.f32_attr(node, "minY")?,
        max_x: reader.f32_attr(node, "maxX")?,
        max_y: reader.f32_attr(node, "maxY")?,
    };
    if rect.min_x > rect.max_x || rect.min_y > rect.max_y {
        return Err(reader.error_at(
            ContentErrorCode::InvalidValue,
            "rectangle min must not exceed max".to_string(),
            node,
        ));
    }
    Ok(rect)
}

fn parse_placed_object(
    reader: &XmlReader<'_, '_>,
    node: roxmltree::Node<'_, '_>,
) -> Result<PlacedObject, ContentParseError> {
    let tag = reader.required_attr(node, "tag")?;
    let raw_kind = reader.required_attr(node, "kind")?;
    let Some(kind) = ObjectKind::parse(&raw_kind) else {
        return Err(reader.error_at(
            ContentErrorCode::InvalidValue,
            format!(
                "invalid kind '{raw_kind}'; allowed values: creature, placeable, door, waypoint, trigger"
            ),
            node,
        ));
    };
    Ok(PlacedObject {
        tag,
        kind,
        position: Vec3::new(
            reader.f32_attr(node, "x")?,
            reader.f32_attr(node, "y")?,
            reader.f32_attr_or(node, "z", 0.0)?,
        ),
        orientation_degrees: reader.f32_attr_or(node, "angle", 0.0)?,
        model: reader.optional_attr(node, "model"),
    })
}

fn parse_exit(
    reader: &XmlReader<'_, '_>,
    node: roxmltree::Node<'_, '_>,
) -> Result<ExitRegion, ContentParseError> {
    let bounds = parse_rect(reader, node)?;
    let tag = reader.optional_attr(node, "tag");
    let target = match (reader.optional_attr(node, "area"), reader.optional_attr(node, "module")) {
        (Some(resref), None) => {
            let Some(tag) = tag else {
                return Err(reader.error_at(
                    ContentErrorCode::MissingField,
                    "area exits require a destination 'tag'".to_string(),
                    node,
                ));
            };
            ExitTarget::Area { resref, tag }
        }
        (None, Some(module)) => ExitTarget::Module { module, tag },
        _ => {
            return Err(reader.error_at(
                ContentErrorCode::InvalidValue,
                "exit must name exactly one of 'area' or 'module'".to_string(),
                node,
            ))
        }
    };
    Ok(ExitRegion { bounds, target })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    const DOCK: &str = r#"
<Area resref="dock">
  <name>Harbour Dock</name>
  <walkmesh>
    <face surface="1" minX="-10" minY="-10" maxX="10" maxY="10" z="0.5"/>
    <face surface="6" minX="10" minY="-10" maxX="12" maxY="10"/>
  </walkmesh>
  <objects>
    <object tag="wp_dock" kind="waypoint" x="0" y="0"/>
    <object tag="crate" kind="placeable" x="3" y="4" model="crate01"/>
  </objects>
  <exits>
    <exit minX="-10" minY="9" maxX="10" maxY="10" area="bay" tag="wp_bay"/>
    <exit minX="-10" minY="-10" maxX="-9" maxY="10" module="inland"/>
  </exits>
</Area>"#;

    fn path() -> PathBuf {
        PathBuf::from("modules/harbour/areas/dock.xml")
    }

    #[test]
    fn parses_walkmesh_objects_and_exits() {
        let area = parse_area_def("dock", &path(), DOCK).expect("parse");

        assert_eq!(area.name, "Harbour Dock");
        assert_eq!(area.walkmesh.len(), 2);
        assert_eq!(area.walkmesh[0].z, 0.5);
        assert_eq!(area.walkmesh[1].surface, 6);
        assert_eq!(area.objects[1].model.as_deref(), Some("crate01"));
        assert_eq!(area.objects[0].kind, ObjectKind::Waypoint);
        assert_eq!(
            area.exits[0].target,
            ExitTarget::Area {
                resref: "bay".to_string(),
                tag: "wp_bay".to_string()
            }
        );
        assert_eq!(
            area.exits[1].target,
            ExitTarget::Module {
                module: "inland".to_string(),
                tag: None
            }
        );
    }

    #[test]
    fn resref_mismatch_is_rejected() {
        let error = parse_area_def("bay", &path(), DOCK).expect_err("mismatch");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn unknown_object_kind_is_rejected() {
        let raw = DOCK.replace("kind=\"placeable\"", "kind=\"dragon\"");
        let error = parse_area_def("dock", &path(), &raw).expect_err("kind");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn exit_with_both_targets_is_rejected() {
        let raw = DOCK.replace("module=\"inland\"", "module=\"inland\" area=\"bay\"");
        let error = parse_area_def("dock", &path(), &raw).expect_err("exit");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }

    #[test]
    fn inverted_rectangle_is_rejected() {
        let raw = DOCK.replace("minX=\"10\" minY=\"-10\" maxX=\"12\"", "minX=\"12\" minY=\"-10\" maxX=\"10\"");
        let error = parse_area_def("dock", &path(), &raw).expect_err("rect");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }
}
