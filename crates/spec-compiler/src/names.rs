//! Name resolution: one identifier and one emitted symbol per descriptor node.
//!
//! Identifiers are allocated from an arena keyed by
//! `(parent scope, node kind, numeric key, version)`. The symbol is derived
//! from the same key so that emitted names are stable between runs.

use std::collections::HashMap;

use zw_cmdtool_descriptors::{Identifier, SymbolTable};

/// Specification node kinds that become descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// `cmd_class`
    CommandClass,
    /// `cmd`
    Command,
    /// `param`
    Parameter,
    /// `variant_group`
    VariantGroup,
    /// `bitflag` under a bitmask or struct byte
    BitFlag,
    /// `bitfield`
    BitField,
    /// `fieldenum` with a mask
    FieldEnum,
    /// `gen_dev`
    GenericDeviceClass,
    /// `spec_dev`
    SpecificDeviceClass,
}

impl NodeKind {
    /// Specification element name.
    pub fn tag(self) -> &'static str {
        match self {
            NodeKind::CommandClass => "cmd_class",
            NodeKind::Command => "cmd",
            NodeKind::Parameter => "param",
            NodeKind::VariantGroup => "variant_group",
            NodeKind::BitFlag => "bitflag",
            NodeKind::BitField => "bitfield",
            NodeKind::FieldEnum => "fieldenum",
            NodeKind::GenericDeviceClass => "gen_dev",
            NodeKind::SpecificDeviceClass => "spec_dev",
        }
    }

    fn segment(self, key: u32, version: u32) -> String {
        match self {
            NodeKind::CommandClass => format!("zw_cc_{key:02x}_v{version}"),
            NodeKind::GenericDeviceClass => format!("zw_gdev_{key:02x}"),
            NodeKind::Command => format!("_cmd_{key:02x}"),
            NodeKind::Parameter => format!("_p{key:02x}"),
            NodeKind::VariantGroup => format!("_vg{key:02x}"),
            NodeKind::BitFlag => format!("_flag{key:02x}"),
            NodeKind::BitField => format!("_field{key:02x}"),
            NodeKind::FieldEnum => format!("_fenum{key:02x}"),
            NodeKind::SpecificDeviceClass => format!("_sdev_{key:02x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ScopeKey {
    parent: Option<Identifier>,
    kind: NodeKind,
    key: u32,
    version: u32,
}

/// A second, distinct node asked for an already allocated identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("identifier `{symbol}` is already taken")]
pub struct DuplicateName {
    /// The colliding symbol.
    pub symbol: String,
}

/// Identifier allocator for one compiler run.
#[derive(Debug, Default)]
pub struct NameResolver {
    symbols: SymbolTable,
    scopes: HashMap<ScopeKey, Identifier>,
}

impl NameResolver {
    /// Empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the identifier of a node.
    ///
    /// `version` only distinguishes command classes; pass 0 otherwise. Every
    /// node is visited once per run, so a repeated scope key always means two
    /// different nodes.
    pub fn identify(
        &mut self,
        parent: Option<Identifier>,
        kind: NodeKind,
        key: u32,
        version: u32,
    ) -> Result<Identifier, DuplicateName> {
        let scope = ScopeKey {
            parent,
            kind,
            key,
            version,
        };
        let symbol = match parent {
            Some(p) => format!("{}{}", self.symbols.name(p), kind.segment(key, version)),
            None => kind.segment(key, version),
        };
        if self.scopes.contains_key(&scope) {
            return Err(DuplicateName { symbol });
        }
        let id = self.symbols.push(symbol);
        self.scopes.insert(scope, id);
        Ok(id)
    }

    /// Symbol of an allocated identifier.
    pub fn symbol(&self, id: Identifier) -> &str {
        self.symbols.name(id)
    }

    /// Hand the symbol table to the finished graph.
    pub fn into_symbols(self) -> SymbolTable {
        self.symbols
    }
}
