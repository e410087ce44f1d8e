use std::collections::HashSet;
use std::path::Path;

use roxmltree::Node;

use crate::script::{ObjectArg, ScriptArg, ScriptCall, ScriptLibrary, ScriptProgram};
use crate::world::Vec3;

use super::xml::{parse_document, ContentErrorCode, ContentParseError, XmlReader};

/// Parses a `<Scripts>` document of call-list scripts.
///
/// ```xml
/// <Scripts>
///   <script name="mod_load">
///     <call fn="PrintString"><string>hello</string></call>
///     <call fn="DelayCommand"><float>2.0</float><state label="later"/></call>
///     <block label="later">
///       <call fn="JumpToObject"><object>wp_bay</object></call>
///     </block>
///   </script>
/// </Scripts>
/// ```
pub fn parse_script_library(file_path: &Path, raw: &str) -> Result<ScriptLibrary, ContentParseError> {
    let doc = parse_document(file_path, raw)?;
    let (reader, root) = XmlReader::root(&doc, file_path, "Scripts")?;

    let mut library = ScriptLibrary::default();
    for script in root.children().filter(|child| child.is_element()) {
        if script.tag_name().name() != "script" {
            return Err(reader.unknown_field("Scripts", script));
        }
        let name = reader.required_attr(script, "name")?;
        let mut program = ScriptProgram::new(name.clone());
        let mut labels = HashSet::<String>::new();

        for entry in script.children().filter(|child| child.is_element()) {
            match entry.tag_name().name() {
                "call" => program.body.push(parse_call(&reader, entry)?),
                "block" => {
                    let label = reader.required_attr(entry, "label")?;
                    if !labels.insert(label.clone()) {
                        return Err(reader.error_at(
                            ContentErrorCode::DuplicateEntry,
                            format!("block '{label}' defined twice in script '{name}'"),
                            entry,
                        ));
                    }
                    let mut calls = Vec::new();
                    for call in entry.children().filter(|child| child.is_element()) {
                        if call.tag_name().name() != "call" {
                            return Err(reader.unknown_field("block", call));
                        }
                        calls.push(parse_call(&reader, call)?);
                    }
                    program.blocks.insert(label, calls);
                }
                _ => return Err(reader.unknown_field("script", entry)),
            }
        }

        if library.insert(program).is_some() {
            return Err(reader.error_at(
                ContentErrorCode::DuplicateEntry,
                format!("script '{name}' defined twice"),
                script,
            ));
        }
    }

    Ok(library)
}

fn parse_call(reader: &XmlReader<'_, '_>, node: Node<'_, '_>) -> Result<ScriptCall, ContentParseError> {
    let function = reader.required_attr(node, "fn")?;
    let mut args = Vec::new();
    for arg in node.children().filter(|child| child.is_element()) {
        args.push(parse_arg(reader, arg)?);
    }
    Ok(ScriptCall { function, args })
}

fn parse_arg(reader: &XmlReader<'_, '_>, node: Node<'_, '_>) -> Result<ScriptArg, ContentParseError> {
    let text = node.text().map(str::trim).unwrap_or_default();
    match node.tag_name().name() {
        "int" => text.parse::<i32>().map(ScriptArg::Int).map_err(|_| {
            reader.error_at(
                ContentErrorCode::InvalidValue,
                format!("int '{text}' is not a valid integer"),
                node,
            )
        }),
        "float" => reader.parse_f32(node, "float", text).map(ScriptArg::Float),
        "string" => Ok(ScriptArg::String(
            node.text().unwrap_or_default().to_string(),
        )),
        "object" => {
            let target = match text {
                "" | "invalid" => ObjectArg::Invalid,
                "self" => ObjectArg::SelfRef,
                "triggerer" => ObjectArg::Triggerer,
                "pc" => ObjectArg::Pc,
                "module" => ObjectArg::Module,
                tag => ObjectArg::Tag(tag.to_string()),
            };
            Ok(ScriptArg::Object(target))
        }
        "vector" => Ok(ScriptArg::Vector(Vec3::new(
            reader.f32_attr_or(node, "x", 0.0)?,
            reader.f32_attr_or(node, "y", 0.0)?,
            reader.f32_attr_or(node, "z", 0.0)?,
        ))),
        "state" => Ok(ScriptArg::State(reader.required_attr(node, "label")?)),
        _ => Err(reader.unknown_field("call", node)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn parses_body_blocks_and_typed_args() {
        let raw = r#"<Scripts>
          <script name="greet">
            <call fn="PrintString"><string> hi </string></call>
            <call fn="DelayCommand"><float>1.5</float><state label="later"/></call>
            <block label="later">
              <call fn="JumpToObject"><object>wp_bay</object><int>1</int></call>
            </block>
          </script>
        </Scripts>"#;
        let library = parse_script_library(&PathBuf::from("scripts.xml"), raw).expect("parse");
        let program = library.get("greet").expect("greet");

        assert_eq!(program.body.len(), 2);
        assert_eq!(program.body[0].args, vec![ScriptArg::String(" hi ".to_string())]);
        assert_eq!(
            program.body[1].args,
            vec![ScriptArg::Float(1.5), ScriptArg::State("later".to_string())]
        );
        assert_eq!(
            program.blocks["later"][0].args,
            vec![
                ScriptArg::Object(ObjectArg::Tag("wp_bay".to_string())),
                ScriptArg::Int(1)
            ]
        );
    }

    #[test]
    fn duplicate_script_names_are_rejected() {
        let raw = r#"<Scripts><script name="a"/><script name="a"/></Scripts>"#;
        let error = parse_script_library(&PathBuf::from("scripts.xml"), raw).expect_err("dup");
        assert_eq!(error.code, ContentErrorCode::DuplicateEntry);
    }

    #[test]
    fn unknown_argument_type_is_rejected() {
        let raw = r#"<Scripts><script name="a"><call fn="X"><quaternion/></call></script></Scripts>"#;
        let error = parse_script_library(&PathBuf::from("scripts.xml"), raw).expect_err("arg");
        assert_eq!(error.code, ContentErrorCode::UnknownField);
    }
}
