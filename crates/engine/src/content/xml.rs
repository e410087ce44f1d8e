use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    XmlMalformed,
    InvalidRoot,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateEntry,
}

#[derive(Debug, Clone)]
pub struct ContentParseError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentParseError {}

/// Shared state for walking one XML document and reporting positioned errors.
pub(crate) struct XmlReader<'a, 'input> {
    pub(crate) doc: &'a Document<'input>,
    file_path: &'a Path,
}

impl<'a, 'input> XmlReader<'a, 'input> {
    pub(crate) fn root(
        doc: &'a Document<'input>,
        file_path: &'a Path,
        expected_root: &str,
    ) -> Result<(Self, Node<'a, 'input>), ContentParseError> {
        let reader = Self { doc, file_path };
        let root = doc.root_element();
        if root.tag_name().name() != expected_root {
            return Err(reader.error_at(
                ContentErrorCode::InvalidRoot,
                format!("root element must be <{expected_root}>"),
                root,
            ));
        }
        Ok((reader, root))
    }

    pub(crate) fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentParseError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentParseError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }

    pub(crate) fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentParseError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    pub(crate) fn required_attr(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<String, ContentParseError> {
        match node.attribute(attr).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(self.error_at(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute '{attr}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    pub(crate) fn optional_attr(&self, node: Node<'_, '_>, attr: &str) -> Option<String> {
        node.attribute(attr)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToString::to_string)
    }

    pub(crate) fn f32_attr(&self, node: Node<'_, '_>, attr: &str) -> Result<f32, ContentParseError> {
        let raw = self.required_attr(node, attr)?;
        self.parse_f32(node, attr, &raw)
    }

    pub(crate) fn f32_attr_or(
        &self,
        node: Node<'_, '_>,
        attr: &str,
        default: f32,
    ) -> Result<f32, ContentParseError> {
        match self.optional_attr(node, attr) {
            Some(raw) => self.parse_f32(node, attr, &raw),
            None => Ok(default),
        }
    }

    pub(crate) fn u32_attr(&self, node: Node<'_, '_>, attr: &str) -> Result<u32, ContentParseError> {
        let raw = self.required_attr(node, attr)?;
        raw.parse::<u32>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{attr} '{raw}' is not a valid unsigned integer"),
                node,
            )
        })
    }

    pub(crate) fn parse_f32(
        &self,
        node: Node<'_, '_>,
        field: &str,
        raw: &str,
    ) -> Result<f32, ContentParseError> {
        let parsed = raw.parse::<f32>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field} '{raw}' is not a valid number"),
                node,
            )
        })?;
        if !parsed.is_finite() {
            return Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("{field} must be finite"),
                node,
            ));
        }
        Ok(parsed)
    }

    /// Iterates element children, rejecting a field name seen twice.
    pub(crate) fn unique_fields(
        &self,
        node: Node<'a, 'input>,
    ) -> Result<Vec<(String, Node<'a, 'input>)>, ContentParseError> {
        let mut seen = HashSet::<String>::new();
        let mut fields = Vec::new();
        for field in node.children().filter(|child| child.is_element()) {
            let field_name = field.tag_name().name().to_string();
            if !seen.insert(field_name.clone()) {
                return Err(self.error_at(
                    ContentErrorCode::DuplicateField,
                    format!(
                        "duplicate field <{}> in <{}>",
                        field_name,
                        node.tag_name().name()
                    ),
                    field,
                ));
            }
            fields.push((field_name, field));
        }
        Ok(fields)
    }

    pub(crate) fn unknown_field(&self, parent: &str, field: Node<'_, '_>) -> ContentParseError {
        self.error_at(
            ContentErrorCode::UnknownField,
            format!("unknown field <{}> in <{parent}>", field.tag_name().name()),
            field,
        )
    }

    pub(crate) fn missing_field(&self, parent: &str, field: &str, node: Node<'_, '_>) -> ContentParseError {
        self.error_at(
            ContentErrorCode::MissingField,
            format!("missing required field <{field}> in <{parent}>"),
            node,
        )
    }
}

pub(crate) fn parse_document<'input>(
    file_path: &Path,
    raw: &'input str,
) -> Result<Document<'input>, ContentParseError> {
    Document::parse(raw).map_err(|error| ContentParseError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })
}
