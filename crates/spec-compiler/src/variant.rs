//! Variant-group builder and declaration-order pre-pass.

use tracing::debug;
use zw_cmdtool_descriptors::{Field, Identifier, VariantGroupSpec};

use crate::builder::FieldSlot;
use crate::error::CompileError;
use crate::pipeline::Compiler;
use crate::references::Sibling;

impl Compiler<'_> {
    /// Build a variant group and, recursively, its nested groups.
    ///
    /// `siblings` are the parameters next to the group; its `paramOffs`
    /// resolves among them, not among the group's own children.
    pub(crate) fn build_variant_group(
        &mut self,
        slot: &FieldSlot<'_>,
        siblings: &[Sibling],
    ) -> Result<VariantGroupSpec, CompileError> {
        let node = slot.node;
        let loc = slot.location.as_str();
        let name = node.required_text("name").map_err(|e| e.at(loc))?.to_string();
        let children = self.build_fields(node, slot.id, loc)?;
        let declared = node.hex("paramOffs").map_err(|e| e.at(loc))?;
        let mask = node.required_hex_byte("sizemask").map_err(|e| e.at(loc))?;
        let length_location = self.length_location(siblings, declared, mask, &name, loc);

        debug!(
            location = loc,
            children = children.len(),
            "built variant group"
        );
        Ok(VariantGroupSpec {
            id: slot.id,
            key: slot.key,
            name,
            length_location,
            children,
        })
    }
}

/// Variant groups that must be declared ahead of their full bodies.
///
/// Groups are emitted outer first, so every group nested in another group is
/// referenced by its parent before its own body appears. The result lists
/// those nested groups in pre-order.
pub fn forward_declarations(fields: &[Field]) -> Vec<Identifier> {
    fn walk(fields: &[Field], nested: bool, out: &mut Vec<Identifier>) {
        for group in fields.iter().filter_map(Field::as_variant_group) {
            if nested {
                out.push(group.id);
            }
            walk(&group.children, true, out);
        }
    }
    let mut out = Vec::new();
    walk(fields, false, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use zw_cmdtool_descriptors::{LengthLocation, ParameterShape, ParameterSpec};

    fn group(id: u32, children: Vec<Field>) -> Field {
        Field::VariantGroup(VariantGroupSpec {
            id: Identifier::new(id),
            key: id,
            name: format!("g{id}"),
            length_location: LengthLocation::unreferenced(0),
            children,
        })
    }

    fn byte(id: u32) -> Field {
        Field::Parameter(ParameterSpec {
            id: Identifier::new(id),
            key: id,
            name: format!("p{id}"),
            optional: None,
            shape: ParameterShape::FixedByte { flags: None },
        })
    }

    #[test]
    fn top_level_groups_need_no_forward_declaration() {
        let fields = vec![byte(0), group(1, vec![byte(2)]), group(3, vec![])];
        assert!(forward_declarations(&fields).is_empty());
    }

    #[test]
    fn nested_groups_are_listed_in_pre_order() {
        let fields = vec![
            byte(0),
            group(
                1,
                vec![
                    byte(2),
                    group(3, vec![group(4, vec![byte(5)])]),
                    group(6, vec![]),
                ],
            ),
        ];
        let ids: Vec<_> = forward_declarations(&fields)
            .into_iter()
            .map(Identifier::index)
            .collect();
        assert_eq!(ids, vec![3, 4, 6]);
    }
}
