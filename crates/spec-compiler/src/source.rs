//! Specification tree as handed over by the input collaborator.
//!
//! The vendor command class document is converted to a generic node tree
//! (`tag`, `attrs`, `children`) before it reaches the compiler. This module
//! deserializes that tree from JSON/JSONC and offers the typed attribute
//! accessors the builders use.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};
use zw_cmdtool_jsonc_strip::strip_jsonc;

use crate::error::CompileError;

/// Tag of the synthetic root that directory loads concatenate into.
pub const ROOT_TAG: &str = "zw_classes";

/// One element of the specification tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecNode {
    /// Element name (`cmd_class`, `param`, …).
    pub tag: String,
    /// Attribute text by name.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    /// Child elements in document order.
    #[serde(default)]
    pub children: Vec<SpecNode>,
}

/// Attribute lookup failure, located by the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttrError {
    /// The attribute (or child element, written `<tag>`) is absent.
    #[error("missing required attribute `{0}`")]
    Missing(String),
    /// The attribute text does not parse.
    #[error("attribute `{attribute}` has invalid value {value:?}: {reason}")]
    Invalid {
        /// Attribute name.
        attribute: String,
        /// Raw text.
        value: String,
        /// What was expected.
        reason: &'static str,
    },
}

impl AttrError {
    /// Attach the node location and promote to a fatal compile error.
    pub fn at(self, location: &str) -> CompileError {
        match self {
            AttrError::Missing(attribute) => CompileError::MissingRequiredAttribute {
                attribute,
                location: location.to_string(),
            },
            AttrError::Invalid {
                attribute,
                value,
                reason,
            } => CompileError::InvalidAttributeValue {
                attribute,
                value,
                reason,
                location: location.to_string(),
            },
        }
    }
}

fn parse_hex(text: &str) -> Option<u32> {
    let t = text.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    u32::from_str_radix(digits, 16).ok()
}

impl SpecNode {
    /// A node with no attributes or children.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Set an attribute (builder pattern).
    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Raw attribute text.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    /// Whether the attribute is present.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    /// Attribute text, empty when absent (help and comment texts).
    pub fn text(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    /// Attribute text that must be present.
    pub fn required_text(&self, name: &str) -> Result<&str, AttrError> {
        self.attr(name)
            .ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    /// Boolean attribute: only the literal `"true"` is true.
    pub fn is_true(&self, name: &str) -> bool {
        self.attr(name) == Some("true")
    }

    /// Optional hexadecimal attribute (`0x1F` or `1F`).
    pub fn hex(&self, name: &str) -> Result<Option<u32>, AttrError> {
        self.attr(name)
            .map(|raw| {
                parse_hex(raw).ok_or_else(|| AttrError::Invalid {
                    attribute: name.to_string(),
                    value: raw.to_string(),
                    reason: "expected hexadecimal",
                })
            })
            .transpose()
    }

    /// Required hexadecimal attribute.
    pub fn required_hex(&self, name: &str) -> Result<u32, AttrError> {
        self.hex(name)?
            .ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    /// Optional decimal attribute (length offsets).
    pub fn decimal(&self, name: &str) -> Result<Option<u32>, AttrError> {
        self.attr(name)
            .map(|raw| {
                raw.trim().parse::<u32>().map_err(|_| AttrError::Invalid {
                    attribute: name.to_string(),
                    value: raw.to_string(),
                    reason: "expected decimal",
                })
            })
            .transpose()
    }

    /// Required decimal attribute.
    pub fn required_decimal(&self, name: &str) -> Result<u32, AttrError> {
        self.decimal(name)?
            .ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    /// Optional hexadecimal attribute that must fit in one byte.
    pub fn hex_byte(&self, name: &str) -> Result<Option<u8>, AttrError> {
        self.hex(name)?
            .map(|v| {
                u8::try_from(v).map_err(|_| AttrError::Invalid {
                    attribute: name.to_string(),
                    value: self.text(name).to_string(),
                    reason: "value does not fit in one byte",
                })
            })
            .transpose()
    }

    /// Required one-byte hexadecimal attribute.
    pub fn required_hex_byte(&self, name: &str) -> Result<u8, AttrError> {
        self.hex_byte(name)?
            .ok_or_else(|| AttrError::Missing(name.to_string()))
    }

    /// Direct children with the given tag.
    pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a SpecNode> {
        self.children.iter().filter(move |c| c.tag == tag)
    }

    /// First direct child with the given tag.
    pub fn first_child(&self, tag: &str) -> Option<&SpecNode> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// First direct child with the given tag, which the node's kind requires.
    pub fn required_child(&self, tag: &str) -> Result<&SpecNode, AttrError> {
        self.first_child(tag)
            .ok_or_else(|| AttrError::Missing(format!("<{tag}>")))
    }
}

/// Location segment for a keyed child, e.g. `param[0x02]`.
pub fn keyed_segment(parent: &str, tag: &str, key: u32) -> String {
    if parent.is_empty() {
        format!("{tag}[0x{key:02X}]")
    } else {
        format!("{parent}/{tag}[0x{key:02X}]")
    }
}

/// Location segment for a child whose key is not known yet, e.g. `param#3`.
pub fn indexed_segment(parent: &str, tag: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("{tag}#{index}")
    } else {
        format!("{parent}/{tag}#{index}")
    }
}

// ─── Load ───────────────────────────────────────────────────────────────────

/// Parse one specification document (JSON or JSONC).
pub fn parse_spec_str(text: &str) -> Result<SpecNode, serde_json::Error> {
    serde_json::from_str(&strip_jsonc(text))
}

fn load_file(path: &Path) -> Result<SpecNode, CompileError> {
    let text = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_spec_str(&text).map_err(|source| CompileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a specification tree from a file, or from every `*.json`/`*.jsonc`
/// file below a directory.
///
/// Directory files are read in sorted path order (`WalkDir` does not
/// guarantee one) and their root children are concatenated under a single
/// [`ROOT_TAG`] node.
pub fn load_spec(path: &Path) -> Result<SpecNode, CompileError> {
    if !path.is_dir() {
        return load_file(path);
    }

    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(path) {
        let entry = entry?;
        let ext = entry.path().extension();
        if entry.file_type().is_file()
            && (ext == Some(OsStr::new("json")) || ext == Some(OsStr::new("jsonc")))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut root = SpecNode::new(ROOT_TAG);
    for file in &files {
        let doc = load_file(file)?;
        tracing::debug!(file = %file.display(), nodes = doc.children.len(), "loaded specification file");
        root.children.extend(doc.children);
    }
    Ok(root)
}
