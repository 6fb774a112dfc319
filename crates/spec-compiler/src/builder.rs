//! Descriptor builder: one typed [`ParameterSpec`] per `param` node.

use tracing::debug;
use zw_cmdtool_descriptors::{
    BitFieldKind, BitFieldSpec, DisplayKind, EnumTable, Field, Identifier, LengthLocation,
    OptionalGate, ParameterKind, ParameterShape, ParameterSpec,
};

use crate::error::CompileError;
use crate::names::NodeKind;
use crate::options::MultiArrayPolicy;
use crate::pipeline::Compiler;
use crate::references::{ReferenceRole, Sibling, location_key};
use crate::source::{SpecNode, indexed_segment, keyed_segment};

/// A `param` or `variant_group` child whose identifier is already allocated.
#[derive(Debug)]
pub(crate) struct FieldSlot<'n> {
    pub(crate) node: &'n SpecNode,
    pub(crate) group: bool,
    pub(crate) key: u32,
    pub(crate) id: Identifier,
    pub(crate) location: String,
}

impl Compiler<'_> {
    /// Build the `param` and `variant_group` children of a command or group,
    /// in document order.
    ///
    /// Identifiers for every child are allocated first, so a reference to a
    /// sibling declared later in the document still resolves.
    pub(crate) fn build_fields(
        &mut self,
        parent: &SpecNode,
        parent_id: Identifier,
        path: &str,
    ) -> Result<Vec<Field>, CompileError> {
        let mut slots = Vec::new();
        for (index, node) in parent.children.iter().enumerate() {
            let (group, kind) = match node.tag.as_str() {
                "param" => (false, NodeKind::Parameter),
                "variant_group" => (true, NodeKind::VariantGroup),
                _ => continue,
            };
            let key = node
                .required_hex("key")
                .map_err(|e| e.at(&indexed_segment(path, &node.tag, index)))?;
            let location = keyed_segment(path, &node.tag, key);
            let id = self.identify(Some(parent_id), kind, key, 0, &location)?;
            slots.push(FieldSlot {
                node,
                group,
                key,
                id,
                location,
            });
        }

        let siblings: Vec<Sibling> = slots
            .iter()
            .filter(|s| !s.group)
            .map(|s| Sibling { key: s.key, id: s.id })
            .collect();

        slots
            .iter()
            .map(|slot| {
                if slot.group {
                    self.build_variant_group(slot, &siblings)
                        .map(Field::VariantGroup)
                } else {
                    self.build_parameter(slot, &siblings).map(Field::Parameter)
                }
            })
            .collect()
    }

    /// Dispatch on the declared `type` and build the parameter descriptor.
    pub(crate) fn build_parameter(
        &mut self,
        slot: &FieldSlot<'_>,
        siblings: &[Sibling],
    ) -> Result<ParameterSpec, CompileError> {
        let node = slot.node;
        let loc = slot.location.as_str();
        let name = node.required_text("name").map_err(|e| e.at(loc))?.to_string();
        let type_name = node.required_text("type").map_err(|e| e.at(loc))?;
        let kind = ParameterKind::from_type_name(type_name).ok_or_else(|| {
            CompileError::UnsupportedParameterType {
                name: name.clone(),
                kind: type_name.to_string(),
                location: loc.to_string(),
            }
        })?;

        let optional = self.optional_gate(node, &name, siblings, loc)?;

        let shape = match kind {
            ParameterKind::FixedByte => {
                let flags = flag_table(node, "bitflag", loc)?;
                ParameterShape::FixedByte {
                    flags: (!flags.is_empty()).then_some(flags),
                }
            }
            ParameterKind::FixedWord => ParameterShape::FixedWord,
            ParameterKind::FixedDword => ParameterShape::FixedDword,
            ParameterKind::Fixed24Bit => ParameterShape::Fixed24Bit,
            ParameterKind::Array => {
                let attrib = node.required_child("arrayattrib").map_err(|e| e.at(loc))?;
                let length = attrib.hex_byte("len").map_err(|e| e.at(loc))?.unwrap_or(0);
                let length_location = match node.first_child("arraylen") {
                    Some(len) => {
                        let declared = len.required_decimal("paramoffs").map_err(|e| e.at(loc))?;
                        let mask = len.required_hex_byte("lenmask").map_err(|e| e.at(loc))?;
                        self.length_location(siblings, Some(declared), mask, &name, loc)
                    }
                    None => LengthLocation::unreferenced(0),
                };
                ParameterShape::Array {
                    length,
                    ascii: attrib.is_true("is_ascii"),
                    length_location,
                }
            }
            ParameterKind::Bitmask => {
                let bitmask = node.required_child("bitmask").map_err(|e| e.at(loc))?;
                let length = bitmask.hex_byte("len").map_err(|e| e.at(loc))?.unwrap_or(0);
                let declared = bitmask.required_decimal("paramoffs").map_err(|e| e.at(loc))?;
                let mask = bitmask.required_hex_byte("lenmask").map_err(|e| e.at(loc))?;
                let length_location =
                    self.length_location(siblings, Some(declared), mask, &name, loc);
                let flags = self.bit_fields(node, slot.id, &[BitFieldKind::BitFlag], loc)?;
                ParameterShape::Bitmask {
                    length,
                    length_location,
                    flags,
                }
            }
            ParameterKind::StructByte => {
                let fields = self.bit_fields(
                    node,
                    slot.id,
                    &[
                        BitFieldKind::BitField,
                        BitFieldKind::BitFlag,
                        BitFieldKind::FieldEnum,
                    ],
                    loc,
                )?;
                ParameterShape::StructByte { fields }
            }
            ParameterKind::Enum => ParameterShape::Enum {
                table: enum_table(node, loc)?,
            },
            ParameterKind::EnumArray => ParameterShape::EnumArray {
                table: enum_table(node, loc)?,
            },
            ParameterKind::MultiArray => match self.options.multi_array {
                MultiArrayPolicy::Placeholder => ParameterShape::MultiArray,
                MultiArrayPolicy::Reject => {
                    return Err(CompileError::UnsupportedParameterType {
                        name,
                        kind: type_name.to_string(),
                        location: loc.to_string(),
                    });
                }
            },
            ParameterKind::Const => ParameterShape::Const {
                table: flag_table(node, "const", loc)?,
            },
            ParameterKind::Variant => {
                let variant = node.required_child("variant").map_err(|e| e.at(loc))?;
                let declared = variant.decimal("paramoffs").map_err(|e| e.at(loc))?;
                let mask = variant.required_hex_byte("sizemask").map_err(|e| e.at(loc))?;
                let display = if variant.is_true("is_ascii") {
                    DisplayKind::Ascii
                } else if variant.is_true("showhex") {
                    DisplayKind::Hex
                } else {
                    DisplayKind::Decimal
                };
                ParameterShape::Variant {
                    display,
                    length_location: self.length_location(siblings, declared, mask, &name, loc),
                }
            }
            ParameterKind::Marker => ParameterShape::Marker,
        };

        debug!(location = loc, kind = %kind, "built parameter");
        Ok(ParameterSpec {
            id: slot.id,
            key: slot.key,
            name,
            optional,
            shape,
        })
    }

    fn optional_gate(
        &mut self,
        node: &SpecNode,
        field: &str,
        siblings: &[Sibling],
        loc: &str,
    ) -> Result<Option<OptionalGate>, CompileError> {
        let Some(key) = node.hex("optionaloffs").map_err(|e| e.at(loc))? else {
            return Ok(None);
        };
        let mask = node.hex_byte("optionalmask").map_err(|e| e.at(loc))?.unwrap_or(0);
        let target = self.reference(siblings, Some(key), ReferenceRole::OptionalOffset, field, loc);
        Ok(Some(OptionalGate { key, target, mask }))
    }

    pub(crate) fn length_location(
        &mut self,
        siblings: &[Sibling],
        declared: Option<u32>,
        mask: u8,
        field: &str,
        loc: &str,
    ) -> LengthLocation {
        LengthLocation {
            key: location_key(declared),
            target: self.reference(siblings, declared, ReferenceRole::LengthLocation, field, loc),
            mask,
        }
    }

    /// Sub-parameters of a bitmask or struct byte, grouped by `kinds` in the
    /// given order and in document order within each group.
    fn bit_fields(
        &mut self,
        node: &SpecNode,
        parent_id: Identifier,
        kinds: &[BitFieldKind],
        loc: &str,
    ) -> Result<Vec<BitFieldSpec>, CompileError> {
        let mut fields = Vec::new();
        for &kind in kinds {
            let (tag, node_kind) = match kind {
                BitFieldKind::BitFlag => ("bitflag", NodeKind::BitFlag),
                BitFieldKind::BitField => ("bitfield", NodeKind::BitField),
                BitFieldKind::FieldEnum => ("fieldenum", NodeKind::FieldEnum),
            };
            for child in node.children_tagged(tag) {
                if let Some(field) = self.bit_field(child, kind, node_kind, parent_id, loc)? {
                    fields.push(field);
                }
            }
        }
        Ok(fields)
    }

    /// One bit-field sub-parameter. A `fieldenum` without a mask yields `None`.
    fn bit_field(
        &mut self,
        node: &SpecNode,
        kind: BitFieldKind,
        node_kind: NodeKind,
        parent_id: Identifier,
        parent_loc: &str,
    ) -> Result<Option<BitFieldSpec>, CompileError> {
        let (name_attr, mask_attr) = match kind {
            BitFieldKind::BitFlag => ("flagname", "flagmask"),
            BitFieldKind::BitField | BitFieldKind::FieldEnum => ("fieldname", "fieldmask"),
        };

        if kind == BitFieldKind::FieldEnum && !node.has_attr(mask_attr) {
            debug!(location = parent_loc, "field enum without mask dropped");
            return Ok(None);
        }
        let key = node.required_hex("key").map_err(|e| e.at(parent_loc))?;
        let loc = keyed_segment(parent_loc, &node.tag, key);

        let name = node.required_text(name_attr).map_err(|e| e.at(&loc))?.to_string();
        let mask = node.required_hex_byte(mask_attr).map_err(|e| e.at(&loc))?;
        let enums = match kind {
            BitFieldKind::FieldEnum => {
                let indexing = self.options.fieldenum_indexing;
                let table = node
                    .children_tagged("fieldenum")
                    .enumerate()
                    .map(|(i, value)| {
                        let label = value.required_text("value").map_err(|e| e.at(&loc))?;
                        Ok::<_, CompileError>((label.to_string(), indexing.value_at(i)))
                    })
                    .collect::<Result<EnumTable, CompileError>>()?;
                Some(table)
            }
            BitFieldKind::BitFlag | BitFieldKind::BitField => None,
        };
        let id = self.identify(Some(parent_id), node_kind, key, 0, &loc)?;
        Ok(Some(BitFieldSpec {
            id,
            kind,
            key,
            name,
            mask,
            enums,
        }))
    }
}

/// `(flagname, flagmask)` entries of the `tag` children.
fn flag_table(node: &SpecNode, tag: &str, loc: &str) -> Result<EnumTable, CompileError> {
    node.children_tagged(tag)
        .map(|flag| {
            let label = flag.required_text("flagname").map_err(|e| e.at(loc))?;
            let value = flag.required_hex("flagmask").map_err(|e| e.at(loc))?;
            Ok::<_, CompileError>((label.to_string(), value))
        })
        .collect()
}

/// `(name, key)` entries of the `enum` children.
fn enum_table(node: &SpecNode, loc: &str) -> Result<EnumTable, CompileError> {
    node.children_tagged("enum")
        .map(|entry| {
            let label = entry.required_text("name").map_err(|e| e.at(loc))?;
            let value = entry.required_hex("key").map_err(|e| e.at(loc))?;
            Ok::<_, CompileError>((label.to_string(), value))
        })
        .collect()
}
