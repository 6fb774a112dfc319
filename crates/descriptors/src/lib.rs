//! Z-Wave command descriptor graph.
//!
//! Defines the immutable data structures the descriptor compiler builds from a
//! command class specification: command classes, commands, typed parameters,
//! bit-fields, variant groups, enumeration tables and device classes. Every
//! node that becomes an emitted descriptor carries an [`Identifier`]; the
//! [`SymbolTable`] maps identifiers to the names used in emitted tables.
//!
//! The graph is emitted once and thrown away. It is also `serde`-serializable
//! so the whole graph can be written as JSON for tooling.

use serde::{Deserialize, Serialize};

/// Current format version for the serialized descriptor graph.
pub const GRAPH_FORMAT_VERSION: &str = "0.1.0";

/// Declared length meaning "variable / determined by a referenced field".
pub const VARIABLE_LENGTH: u8 = 255;

/// Location key meaning "no length-location reference".
pub const NO_LOCATION: u32 = 255;

/// Mask every non bit-field parameter is emitted with.
pub const FULL_MASK: u8 = 0xFF;

// ─── Identifiers ────────────────────────────────────────────────────────────

/// Arena index of an emitted descriptor.
///
/// Identifiers are unique across one compiler run and compare in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(u32);

impl Identifier {
    /// Wrap a raw arena index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Position in the [`SymbolTable`].
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A resolved cross-field reference. `None` is the null marker (emitted as `0`).
pub type Reference = Option<Identifier>;

/// Emitted names, indexed by [`Identifier`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolTable {
    symbols: Vec<String>,
}

impl SymbolTable {
    /// Append a symbol and return its identifier.
    pub fn push(&mut self, symbol: String) -> Identifier {
        let id = Identifier::new(self.symbols.len() as u32);
        self.symbols.push(symbol);
        id
    }

    /// Symbol for `id`.
    ///
    /// # Panics
    /// Panics if `id` was not allocated from this table.
    pub fn name(&self, id: Identifier) -> &str {
        &self.symbols[id.index()]
    }

    /// Number of allocated identifiers.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Whether no identifier has been allocated.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

// ─── Display and kinds ──────────────────────────────────────────────────────

/// How the runtime decoder renders a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    /// Unsigned decimal.
    Decimal,
    /// Hexadecimal bytes.
    Hex,
    /// Printable characters.
    Ascii,
    /// Set bits. Part of the runtime's `display` enum; no parameter kind
    /// compiles to it.
    Bitmask,
    /// Label looked up in the enum table; several may apply.
    Enum,
    /// Exactly one label from the enum table.
    EnumExclusive,
    /// Decoded through sub-parameters.
    Struct,
}

impl DisplayKind {
    /// Enumerator name in the runtime's `display` enum.
    pub fn c_name(self) -> &'static str {
        match self {
            DisplayKind::Decimal => "DISPLAY_DECIMAL",
            DisplayKind::Hex => "DISPLAY_HEX",
            DisplayKind::Ascii => "DISPLAY_ASCII",
            DisplayKind::Bitmask => "DISPLAY_BITMASK",
            DisplayKind::Enum => "DISPLAY_ENUM",
            DisplayKind::EnumExclusive => "DISPLAY_ENUM_EXCLUSIVE",
            DisplayKind::Struct => "DISPLAY_STRUCT",
        }
    }
}

impl std::fmt::Display for DisplayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.c_name())
    }
}

/// Declared kind of a `param` node (its `type` attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterKind {
    /// `BYTE`
    #[serde(rename = "BYTE")]
    FixedByte,
    /// `WORD`
    #[serde(rename = "WORD")]
    FixedWord,
    /// `DWORD`
    #[serde(rename = "DWORD")]
    FixedDword,
    /// `BIT_24`
    #[serde(rename = "BIT_24")]
    Fixed24Bit,
    /// `ARRAY`
    Array,
    /// `BITMASK`
    Bitmask,
    /// `STRUCT_BYTE`
    StructByte,
    /// `ENUM`
    Enum,
    /// `ENUM_ARRAY`
    EnumArray,
    /// `MULTI_ARRAY`
    MultiArray,
    /// `CONST`
    Const,
    /// `VARIANT`
    Variant,
    /// `MARKER`
    Marker,
}

impl ParameterKind {
    /// Every kind, in declaration order.
    pub const ALL: [ParameterKind; 13] = [
        ParameterKind::FixedByte,
        ParameterKind::FixedWord,
        ParameterKind::FixedDword,
        ParameterKind::Fixed24Bit,
        ParameterKind::Array,
        ParameterKind::Bitmask,
        ParameterKind::StructByte,
        ParameterKind::Enum,
        ParameterKind::EnumArray,
        ParameterKind::MultiArray,
        ParameterKind::Const,
        ParameterKind::Variant,
        ParameterKind::Marker,
    ];

    /// The `type` attribute text for this kind.
    pub fn type_name(self) -> &'static str {
        match self {
            ParameterKind::FixedByte => "BYTE",
            ParameterKind::FixedWord => "WORD",
            ParameterKind::FixedDword => "DWORD",
            ParameterKind::Fixed24Bit => "BIT_24",
            ParameterKind::Array => "ARRAY",
            ParameterKind::Bitmask => "BITMASK",
            ParameterKind::StructByte => "STRUCT_BYTE",
            ParameterKind::Enum => "ENUM",
            ParameterKind::EnumArray => "ENUM_ARRAY",
            ParameterKind::MultiArray => "MULTI_ARRAY",
            ParameterKind::Const => "CONST",
            ParameterKind::Variant => "VARIANT",
            ParameterKind::Marker => "MARKER",
        }
    }

    /// Parse a `type` attribute. Matching is exact.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.type_name() == name)
    }
}

impl std::fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name())
    }
}

// ─── Enumeration tables ─────────────────────────────────────────────────────

/// One `(label, value)` pair of an enumeration table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumEntry {
    /// Display label.
    pub label: String,
    /// Matched value.
    pub value: u32,
}

/// Ordered enumeration table. Emitters append the `{0,0}` terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnumTable {
    /// Entries in specification order.
    pub entries: Vec<EnumEntry>,
}

impl EnumTable {
    /// Number of entries, not counting the terminator.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, u32)> for EnumTable {
    fn from_iter<T: IntoIterator<Item = (String, u32)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(label, value)| EnumEntry { label, value })
                .collect(),
        }
    }
}

// ─── References ─────────────────────────────────────────────────────────────

/// Where a field's runtime length comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LengthLocation {
    /// Declared sibling key, `None` when absent or [`NO_LOCATION`].
    pub key: Option<u32>,
    /// Resolved sibling, or the null marker.
    pub target: Reference,
    /// Mask applied to the referenced byte.
    pub mask: u8,
}

impl LengthLocation {
    /// A length that is fixed or self-contained, with the given mask.
    pub const fn unreferenced(mask: u8) -> Self {
        Self {
            key: None,
            target: None,
            mask,
        }
    }
}

/// Presence gate of an optional field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionalGate {
    /// Declared key of the gating sibling.
    pub key: u32,
    /// Resolved gating sibling, or the null marker.
    pub target: Reference,
    /// Bits tested in the gating byte.
    pub mask: u8,
}

// ─── Parameters ─────────────────────────────────────────────────────────────

/// Which child element a [`BitFieldSpec`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitFieldKind {
    /// `bitflag`
    BitFlag,
    /// `bitfield`
    BitField,
    /// `fieldenum` (only those declaring a mask)
    FieldEnum,
}

/// Sub-parameter of a bitmask or struct byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitFieldSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Source element.
    pub kind: BitFieldKind,
    /// Declared key.
    pub key: u32,
    /// Display name.
    pub name: String,
    /// Bits of the parent byte this field covers.
    pub mask: u8,
    /// Value labels, field enums only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enums: Option<EnumTable>,
}

impl BitFieldSpec {
    /// Field enums render through their table, the others as hex.
    pub fn display(&self) -> DisplayKind {
        match self.kind {
            BitFieldKind::FieldEnum => DisplayKind::Enum,
            BitFieldKind::BitFlag | BitFieldKind::BitField => DisplayKind::Hex,
        }
    }
}

/// Kind-specific payload of a parameter. One case per [`ParameterKind`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ParameterShape {
    /// One byte, optionally labeled by bit-flag values.
    FixedByte {
        /// `(flagname, flagmask)` table when bit-flags are present.
        flags: Option<EnumTable>,
    },
    /// Two bytes.
    FixedWord,
    /// Four bytes.
    FixedDword,
    /// Three bytes.
    Fixed24Bit,
    /// Byte array.
    Array {
        /// Declared length, 0 when computed.
        length: u8,
        /// Render as text.
        ascii: bool,
        /// Length source.
        length_location: LengthLocation,
    },
    /// Bitmask bytes described by bit-flags.
    Bitmask {
        /// Declared length, 0 when computed.
        length: u8,
        /// Length source.
        length_location: LengthLocation,
        /// One entry per bit-flag child.
        flags: Vec<BitFieldSpec>,
    },
    /// One byte split into bit-fields, bit-flags and field enums.
    StructByte {
        /// Bit-fields, then bit-flags, then field enums.
        fields: Vec<BitFieldSpec>,
    },
    /// One byte labeled by an enumeration.
    Enum {
        /// `(name, key)` table.
        table: EnumTable,
    },
    /// Variable run of enumerated bytes.
    EnumArray {
        /// `(name, key)` table.
        table: EnumTable,
    },
    /// Placeholder: one decimal byte.
    MultiArray,
    /// One byte with exactly one constant value.
    Const {
        /// `(flagname, flagmask)` table.
        table: EnumTable,
    },
    /// Variable-length payload.
    Variant {
        /// Ascii, Hex or Decimal.
        display: DisplayKind,
        /// Length source; the mask always comes from the `variant` element.
        length_location: LengthLocation,
    },
    /// One-byte marker.
    Marker,
}

/// A typed `param` descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Declared key, unique among siblings.
    pub key: u32,
    /// Display name.
    pub name: String,
    /// Presence gate, when the parameter is optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<OptionalGate>,
    /// Kind-specific payload.
    pub shape: ParameterShape,
}

impl ParameterSpec {
    /// The declared kind.
    pub fn kind(&self) -> ParameterKind {
        match &self.shape {
            ParameterShape::FixedByte { .. } => ParameterKind::FixedByte,
            ParameterShape::FixedWord => ParameterKind::FixedWord,
            ParameterShape::FixedDword => ParameterKind::FixedDword,
            ParameterShape::Fixed24Bit => ParameterKind::Fixed24Bit,
            ParameterShape::Array { .. } => ParameterKind::Array,
            ParameterShape::Bitmask { .. } => ParameterKind::Bitmask,
            ParameterShape::StructByte { .. } => ParameterKind::StructByte,
            ParameterShape::Enum { .. } => ParameterKind::Enum,
            ParameterShape::EnumArray { .. } => ParameterKind::EnumArray,
            ParameterShape::MultiArray => ParameterKind::MultiArray,
            ParameterShape::Const { .. } => ParameterKind::Const,
            ParameterShape::Variant { .. } => ParameterKind::Variant,
            ParameterShape::Marker => ParameterKind::Marker,
        }
    }

    /// Length in bytes; 0 = computed, [`VARIABLE_LENGTH`] = variable.
    pub fn length(&self) -> u8 {
        match &self.shape {
            ParameterShape::FixedByte { .. }
            | ParameterShape::StructByte { .. }
            | ParameterShape::Enum { .. }
            | ParameterShape::MultiArray
            | ParameterShape::Const { .. }
            | ParameterShape::Marker => 1,
            ParameterShape::FixedWord => 2,
            ParameterShape::Fixed24Bit => 3,
            ParameterShape::FixedDword => 4,
            ParameterShape::Array { length, .. } | ParameterShape::Bitmask { length, .. } => {
                *length
            }
            ParameterShape::EnumArray { .. } | ParameterShape::Variant { .. } => VARIABLE_LENGTH,
        }
    }

    /// Display hint.
    pub fn display(&self) -> DisplayKind {
        match &self.shape {
            ParameterShape::FixedByte { flags } => match flags {
                Some(_) => DisplayKind::Enum,
                None => DisplayKind::Decimal,
            },
            ParameterShape::FixedWord
            | ParameterShape::FixedDword
            | ParameterShape::Fixed24Bit
            | ParameterShape::MultiArray
            | ParameterShape::Marker => DisplayKind::Decimal,
            ParameterShape::Array { ascii, .. } => {
                if *ascii {
                    DisplayKind::Ascii
                } else {
                    DisplayKind::Decimal
                }
            }
            ParameterShape::Bitmask { .. } | ParameterShape::StructByte { .. } => {
                DisplayKind::Struct
            }
            ParameterShape::Enum { .. } | ParameterShape::EnumArray { .. } => DisplayKind::Enum,
            ParameterShape::Const { .. } => DisplayKind::EnumExclusive,
            ParameterShape::Variant { display, .. } => *display,
        }
    }

    /// Length source; unreferenced with mask 0 for fixed kinds.
    pub fn length_location(&self) -> LengthLocation {
        match &self.shape {
            ParameterShape::Array {
                length_location, ..
            }
            | ParameterShape::Bitmask {
                length_location, ..
            }
            | ParameterShape::Variant {
                length_location, ..
            } => *length_location,
            ParameterShape::FixedByte { .. }
            | ParameterShape::FixedWord
            | ParameterShape::FixedDword
            | ParameterShape::Fixed24Bit
            | ParameterShape::StructByte { .. }
            | ParameterShape::Enum { .. }
            | ParameterShape::EnumArray { .. }
            | ParameterShape::MultiArray
            | ParameterShape::Const { .. }
            | ParameterShape::Marker => LengthLocation::unreferenced(0),
        }
    }

    /// Enumeration table, if the kind carries one.
    pub fn enum_table(&self) -> Option<&EnumTable> {
        match &self.shape {
            ParameterShape::FixedByte { flags } => flags.as_ref(),
            ParameterShape::Enum { table }
            | ParameterShape::EnumArray { table }
            | ParameterShape::Const { table } => Some(table),
            ParameterShape::FixedWord
            | ParameterShape::FixedDword
            | ParameterShape::Fixed24Bit
            | ParameterShape::Array { .. }
            | ParameterShape::Bitmask { .. }
            | ParameterShape::StructByte { .. }
            | ParameterShape::MultiArray
            | ParameterShape::Variant { .. }
            | ParameterShape::Marker => None,
        }
    }

    /// Bit-field sub-parameters, in emission order.
    pub fn sub_fields(&self) -> &[BitFieldSpec] {
        match &self.shape {
            ParameterShape::Bitmask { flags, .. } => flags,
            ParameterShape::StructByte { fields } => fields,
            _ => &[],
        }
    }
}

/// A self-describing sub-structure whose length is held by another field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantGroupSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Declared key.
    pub key: u32,
    /// Display name.
    pub name: String,
    /// Length source (`paramOffs` / `sizemask`).
    pub length_location: LengthLocation,
    /// Parameters and nested groups, in wire order.
    pub children: Vec<Field>,
}

impl VariantGroupSpec {
    /// Always [`VARIABLE_LENGTH`].
    pub const fn length(&self) -> u8 {
        VARIABLE_LENGTH
    }

    /// Nested variant groups among the direct children.
    pub fn nested_groups(&self) -> impl Iterator<Item = &VariantGroupSpec> {
        self.children.iter().filter_map(Field::as_variant_group)
    }
}

/// A top-level or grouped field of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Field {
    /// `param`
    Parameter(ParameterSpec),
    /// `variant_group`
    VariantGroup(VariantGroupSpec),
}

impl Field {
    /// Descriptor identifier.
    pub fn id(&self) -> Identifier {
        match self {
            Field::Parameter(p) => p.id,
            Field::VariantGroup(g) => g.id,
        }
    }

    /// The group, if this field is one.
    pub fn as_variant_group(&self) -> Option<&VariantGroupSpec> {
        match self {
            Field::VariantGroup(g) => Some(g),
            Field::Parameter(_) => None,
        }
    }
}

// ─── Commands and classes ───────────────────────────────────────────────────

/// One message type of a command class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Command number.
    pub key: u32,
    /// Bits of the command byte that hold the command number.
    pub mask: u8,
    /// Display name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Fields in wire order.
    pub fields: Vec<Field>,
}

/// A versioned command class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandClassSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Command class number.
    pub key: u32,
    /// Command class version.
    pub version: u32,
    /// Display name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Free-form comment.
    pub comment: String,
    /// Commands in specification order.
    pub commands: Vec<CommandSpec>,
}

/// A specific device class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecificDeviceClassSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Specific class number.
    pub key: u32,
    /// Display name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Free-form comment.
    pub comment: String,
}

/// A generic device class and its specific classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericDeviceClassSpec {
    /// Descriptor identifier.
    pub id: Identifier,
    /// Generic class number.
    pub key: u32,
    /// Display name.
    pub name: String,
    /// Help text.
    pub help: String,
    /// Free-form comment.
    pub comment: String,
    /// Specific classes in specification order.
    pub specific: Vec<SpecificDeviceClassSpec>,
}

// ─── Graph ──────────────────────────────────────────────────────────────────

/// Fully built, cross-referenced descriptor graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptorGraph {
    /// Serialization format version.
    pub format_version: String,
    /// Emitted names, indexed by identifier.
    pub symbols: SymbolTable,
    /// Command classes in specification order (obsoleted ones excluded).
    pub command_classes: Vec<CommandClassSpec>,
    /// Generic device classes in specification order.
    pub device_classes: Vec<GenericDeviceClassSpec>,
    /// Command classes sorted by `(key, version)`.
    pub command_class_index: Vec<Identifier>,
    /// Generic device classes sorted by key.
    pub device_class_index: Vec<Identifier>,
}

/// Node counts of a graph, for summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    /// Command classes.
    pub command_classes: usize,
    /// Commands.
    pub commands: usize,
    /// Parameters, variant groups and bit-fields.
    pub parameters: usize,
    /// Generic plus specific device classes.
    pub device_classes: usize,
}

impl DescriptorGraph {
    /// Symbol of `id`.
    pub fn symbol(&self, id: Identifier) -> &str {
        self.symbols.name(id)
    }

    /// Count nodes.
    pub fn stats(&self) -> GraphStats {
        fn count_fields(fields: &[Field]) -> usize {
            fields
                .iter()
                .map(|f| match f {
                    Field::Parameter(p) => 1 + p.sub_fields().len(),
                    Field::VariantGroup(g) => 1 + count_fields(&g.children),
                })
                .sum()
        }
        let commands = self.command_classes.iter().flat_map(|cc| &cc.commands);
        GraphStats {
            command_classes: self.command_classes.len(),
            commands: commands.clone().count(),
            parameters: commands.map(|c| count_fields(&c.fields)).sum(),
            device_classes: self
                .device_classes
                .iter()
                .map(|d| 1 + d.specific.len())
                .sum(),
        }
    }
}
