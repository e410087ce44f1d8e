use std::path::Path;

use super::xml::{parse_document, ContentErrorCode, ContentParseError, XmlReader};

/// Surface-type index to walkability. Indices past the end are not walkable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkableSurfaces {
    walkable: Vec<bool>,
}

impl WalkableSurfaces {
    pub fn from_flags(walkable: Vec<bool>) -> Self {
        Self { walkable }
    }

    pub fn is_walkable(&self, surface: u32) -> bool {
        self.walkable
            .get(surface as usize)
            .copied()
            .unwrap_or(false)
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.walkable
    }

    pub fn len(&self) -> usize {
        self.walkable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walkable.is_empty()
    }
}

/// Parses a `<SurfaceTypes>` table; rows may be sparse and in any order.
pub fn parse_surface_table(file_path: &Path, raw: &str) -> Result<WalkableSurfaces, ContentParseError> {
    let doc = parse_document(file_path, raw)?;
    let (reader, root) = XmlReader::root(&doc, file_path, "SurfaceTypes")?;

    let mut walkable = Vec::<bool>::new();
    let mut seen = Vec::<bool>::new();
    for row in root.children().filter(|child| child.is_element()) {
        if row.tag_name().name() != "surface" {
            return Err(reader.unknown_field("SurfaceTypes", row));
        }
        let index = reader.u32_attr(row, "index")? as usize;
        let flag = match reader.required_attr(row, "walk")?.as_str() {
            "1" | "true" => true,
            "0" | "false" => false,
            other => {
                return Err(reader.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("walk '{other}' must be 0 or 1"),
                    row,
                ))
            }
        };
        if index >= walkable.len() {
            walkable.resize(index + 1, false);
            seen.resize(index + 1, false);
        }
        if seen[index] {
            return Err(reader.error_at(
                ContentErrorCode::DuplicateEntry,
                format!("surface index {index} defined twice"),
                row,
            ));
        }
        seen[index] = true;
        walkable[index] = flag;
    }

    Ok(WalkableSurfaces { walkable })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn sparse_rows_default_to_not_walkable() {
        let raw = r#"<SurfaceTypes>
            <surface index="3" label="Grass" walk="1"/>
            <surface index="0" label="Dirt" walk="1"/>
            <surface index="2" label="Water" walk="0"/>
        </SurfaceTypes>"#;
        let table = parse_surface_table(&PathBuf::from("surfacemat.xml"), raw).expect("parse");

        assert_eq!(table.as_slice(), &[true, false, false, true]);
        assert!(table.is_walkable(3));
        assert!(!table.is_walkable(1));
        assert!(!table.is_walkable(99));
    }

    #[test]
    fn duplicate_index_is_rejected() {
        let raw = r#"<SurfaceTypes>
            <surface index="1" walk="1"/>
            <surface index="1" walk="0"/>
        </SurfaceTypes>"#;
        let error = parse_surface_table(&PathBuf::from("surfacemat.xml"), raw).expect_err("dup");
        assert_eq!(error.code, ContentErrorCode::DuplicateEntry);
    }

    #[test]
    fn walk_flag_must_be_boolean() {
        let raw = r#"<SurfaceTypes><surface index="0" walk="maybe"/></SurfaceTypes>"#;
        let error = parse_surface_table(&PathBuf::from("surfacemat.xml"), raw).expect_err("flag");
        assert_eq!(error.code, ContentErrorCode::InvalidValue);
    }
}
