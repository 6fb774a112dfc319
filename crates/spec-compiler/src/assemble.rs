//! Command-class and device-class assembly, plus the two top-level indices.

use tracing::{debug, info};
use zw_cmdtool_descriptors::{
    CommandClassSpec, CommandSpec, FULL_MASK, GenericDeviceClassSpec, Identifier,
    SpecificDeviceClassSpec,
};
use zw_cmdtool_diagnostics::{Diagnostic, codes};

use crate::error::CompileError;
use crate::names::NodeKind;
use crate::pipeline::Compiler;
use crate::source::{SpecNode, indexed_segment, keyed_segment};

fn command_class_segment(key: u32, version: u32) -> String {
    format!("cmd_class[0x{key:02X} v{version}]")
}

impl Compiler<'_> {
    /// Build one `cmd_class`. Obsoleted classes yield `None` and allocate no
    /// identifiers.
    pub(crate) fn build_command_class(
        &mut self,
        node: &SpecNode,
        index: usize,
    ) -> Result<Option<CommandClassSpec>, CompileError> {
        let comment = node.text("comment");
        if self.options.is_obsolete(comment) {
            let location = indexed_segment("", &node.tag, index);
            let name = node.text("name");
            debug!(location = %location, name, "skipping obsoleted command class");
            self.diagnostics.push(
                Diagnostic::from_code(
                    codes::OBSOLETED_COMMAND_CLASS,
                    format!("command class \"{name}\" is obsoleted and left out"),
                    Some(location),
                )
                .with_context_entry("key", node.text("key"))
                .with_context_entry("version", node.text("version")),
            );
            return Ok(None);
        }

        let at_index = indexed_segment("", &node.tag, index);
        let key = node.required_hex("key").map_err(|e| e.at(&at_index))?;
        let version = node.required_hex("version").map_err(|e| e.at(&at_index))?;
        let location = command_class_segment(key, version);
        let name = node.required_text("name").map_err(|e| e.at(&location))?.to_string();
        let id = self.identify(None, NodeKind::CommandClass, key, version, &location)?;

        let commands = node
            .children_tagged("cmd")
            .enumerate()
            .map(|(i, cmd)| self.build_command(cmd, id, &location, i))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            command_class = %name,
            version,
            commands = commands.len(),
            "compiled command class"
        );
        Ok(Some(CommandClassSpec {
            id,
            key,
            version,
            name,
            help: node.text("help").to_string(),
            comment: comment.to_string(),
            commands,
        }))
    }

    fn build_command(
        &mut self,
        node: &SpecNode,
        class_id: Identifier,
        class_loc: &str,
        index: usize,
    ) -> Result<CommandSpec, CompileError> {
        let key = node
            .required_hex("key")
            .map_err(|e| e.at(&indexed_segment(class_loc, "cmd", index)))?;
        let location = keyed_segment(class_loc, "cmd", key);
        let name = node.required_text("name").map_err(|e| e.at(&location))?.to_string();
        let mask = node
            .hex_byte("cmd_mask")
            .map_err(|e| e.at(&location))?
            .unwrap_or(FULL_MASK);
        let id = self.identify(Some(class_id), NodeKind::Command, key, 0, &location)?;
        let fields = self.build_fields(node, id, &location)?;
        debug!(location = %location, fields = fields.len(), "built command");
        Ok(CommandSpec {
            id,
            key,
            mask,
            name,
            help: node.text("help").to_string(),
            fields,
        })
    }

    /// Build one `gen_dev` and its `spec_dev` children.
    pub(crate) fn build_device_class(
        &mut self,
        node: &SpecNode,
        index: usize,
    ) -> Result<GenericDeviceClassSpec, CompileError> {
        let key = node
            .required_hex("key")
            .map_err(|e| e.at(&indexed_segment("", "gen_dev", index)))?;
        let location = keyed_segment("", "gen_dev", key);
        let name = node.required_text("name").map_err(|e| e.at(&location))?.to_string();
        let id = self.identify(None, NodeKind::GenericDeviceClass, key, 0, &location)?;

        let mut specific = Vec::new();
        for (i, child) in node.children_tagged("spec_dev").enumerate() {
            let spec_key = child
                .required_hex("key")
                .map_err(|e| e.at(&indexed_segment(&location, "spec_dev", i)))?;
            let spec_loc = keyed_segment(&location, "spec_dev", spec_key);
            let spec_name = child.required_text("name").map_err(|e| e.at(&spec_loc))?;
            specific.push(SpecificDeviceClassSpec {
                id: self.identify(
                    Some(id),
                    NodeKind::SpecificDeviceClass,
                    spec_key,
                    0,
                    &spec_loc,
                )?,
                key: spec_key,
                name: spec_name.to_string(),
                help: child.text("help").to_string(),
                comment: child.text("comment").to_string(),
            });
        }

        Ok(GenericDeviceClassSpec {
            id,
            key,
            name,
            help: node.text("help").to_string(),
            comment: node.text("comment").to_string(),
            specific,
        })
    }
}

// ─── Indices ────────────────────────────────────────────────────────────────

/// Command classes sorted ascending by `(key, version)`.
///
/// Duplicates are rejected here as well, for graphs assembled outside
/// [`compile`](crate::compile) where identifiers were not checked.
pub fn command_class_index(classes: &[CommandClassSpec]) -> Result<Vec<Identifier>, CompileError> {
    let mut sorted: Vec<&CommandClassSpec> = classes.iter().collect();
    sorted.sort_by_key(|cc| (cc.key, cc.version));
    if let Some(pair) = sorted
        .windows(2)
        .find(|w| (w[0].key, w[0].version) == (w[1].key, w[1].version))
    {
        return Err(CompileError::DuplicateIdentifier {
            symbol: pair[1].name.clone(),
            location: command_class_segment(pair[1].key, pair[1].version),
        });
    }
    Ok(sorted.into_iter().map(|cc| cc.id).collect())
}

/// Generic device classes sorted ascending by key.
///
/// Like [`command_class_index`], usable on externally assembled classes.
pub fn device_class_index(
    classes: &[GenericDeviceClassSpec],
) -> Result<Vec<Identifier>, CompileError> {
    let mut sorted: Vec<&GenericDeviceClassSpec> = classes.iter().collect();
    sorted.sort_by_key(|d| d.key);
    if let Some(pair) = sorted.windows(2).find(|w| w[0].key == w[1].key) {
        return Err(CompileError::DuplicateIdentifier {
            symbol: pair[1].name.clone(),
            location: keyed_segment("", "gen_dev", pair[1].key),
        });
    }
    Ok(sorted.into_iter().map(|d| d.id).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cc(id: u32, key: u32, version: u32) -> CommandClassSpec {
        CommandClassSpec {
            id: Identifier::new(id),
            key,
            version,
            name: format!("CC_{key:02X}"),
            help: String::new(),
            comment: String::new(),
            commands: Vec::new(),
        }
    }

    fn gen_dev(id: u32, key: u32) -> GenericDeviceClassSpec {
        GenericDeviceClassSpec {
            id: Identifier::new(id),
            key,
            name: format!("GENERIC_{key:02X}"),
            help: String::new(),
            comment: String::new(),
            specific: Vec::new(),
        }
    }

    #[test]
    fn command_classes_sort_by_key_then_version() {
        let classes = [cc(0, 0x25, 2), cc(1, 0x20, 1), cc(2, 0x25, 1), cc(3, 0x86, 1)];
        let index: Vec<_> = command_class_index(&classes)
            .unwrap()
            .into_iter()
            .map(Identifier::index)
            .collect();
        assert_eq!(index, vec![1, 2, 0, 3]);
    }

    #[test]
    fn numeric_sort_is_not_textual() {
        // 0x9 sorts before 0x10 numerically, after it as text.
        let classes = [cc(0, 0x10, 1), cc(1, 0x09, 1)];
        let index = command_class_index(&classes).unwrap();
        assert_eq!(index, vec![Identifier::new(1), Identifier::new(0)]);
    }

    #[test]
    fn duplicate_class_version_is_fatal() {
        let classes = [cc(0, 0x20, 1), cc(1, 0x20, 1)];
        let err = command_class_index(&classes).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateIdentifier { ref location, .. } if location == "cmd_class[0x20 v1]"));
    }

    #[test]
    fn device_classes_sort_and_reject_duplicates() {
        let classes = [gen_dev(0, 0x10), gen_dev(1, 0x01), gen_dev(2, 0x08)];
        let index: Vec<_> = device_class_index(&classes)
            .unwrap()
            .into_iter()
            .map(Identifier::index)
            .collect();
        assert_eq!(index, vec![1, 2, 0]);

        let dup = [gen_dev(0, 0x10), gen_dev(1, 0x10)];
        assert!(matches!(
            device_class_index(&dup),
            Err(CompileError::DuplicateIdentifier { .. })
        ));
    }
}
