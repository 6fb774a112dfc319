//! Emitters: the C descriptor table and the JSON graph.
//!
//! The C table is laid out for the runtime decoder's `zw_parameter`,
//! `zw_command`, `zw_command_class` and device-class structs. Every
//! referenced descriptor is declared before use; nested variant groups, and
//! any other target that would appear later, get a forward declaration.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use zw_cmdtool_descriptors::{
    BitFieldSpec, CommandClassSpec, CommandSpec, DescriptorGraph, DisplayKind, EnumTable,
    FULL_MASK, Field, Identifier, ParameterSpec, Reference, VariantGroupSpec,
};

use crate::variant::forward_declarations;

/// Output representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// C source for the runtime decoder.
    #[default]
    C,
    /// Serialized [`DescriptorGraph`].
    Json,
}

/// Render `graph` in `format`.
pub fn emit(graph: &DescriptorGraph, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::C => Ok(emit_c(graph)),
        OutputFormat::Json => emit_json(graph),
    }
}

/// Render the C descriptor table.
pub fn emit_c(graph: &DescriptorGraph) -> String {
    CTable(graph).to_string()
}

/// Render the graph as pretty-printed JSON.
pub fn emit_json(graph: &DescriptorGraph) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(graph)?;
    out.push('\n');
    Ok(out)
}

// ── Formatting helpers ──────────────────────────────────────────────────

/// C string literal contents.
struct CStr<'a>(&'a str);

impl Display for CStr<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '\\' => f.write_str("\\\\")?,
                '"' => f.write_str("\\\"")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                // Octal escapes have a fixed width, unlike `\x`.
                c if c.is_ascii_control() => write!(f, "\\{:03o}", c as u32)?,
                c => write!(f, "{c}")?,
            }
        }
        Ok(())
    }
}

struct Sym<'g> {
    graph: &'g DescriptorGraph,
    id: Identifier,
}

impl Display for Sym<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.graph.symbol(self.id))
    }
}

/// `&symbol` or the null marker.
struct Ref<'g> {
    graph: &'g DescriptorGraph,
    target: Reference,
}

impl Display for Ref<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(id) => write!(f, "&{}", self.graph.symbol(id)),
            None => f.write_str("0"),
        }
    }
}

/// `{ &a, &b, 0 }`
struct RefList<'g, I> {
    graph: &'g DescriptorGraph,
    ids: I,
}

impl<I> Display for RefList<'_, I>
where
    I: Iterator<Item = Identifier> + Clone,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for id in self.ids.clone() {
            write!(f, "&{}, ", self.graph.symbol(id))?;
        }
        f.write_str("0 }")
    }
}

// ── C table ─────────────────────────────────────────────────────────────

struct CTable<'g>(&'g DescriptorGraph);

impl Display for CTable<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        CWriter {
            graph: self.0,
            out: f,
            declared: HashSet::new(),
        }
        .write_all()
    }
}

/// One field row of a `zw_parameter` initializer.
struct ParamRow<'a> {
    length: u8,
    length_location: Reference,
    length_location_mask: u8,
    mask: u8,
    display: DisplayKind,
    name: &'a str,
    optional: Reference,
    optional_mask: u8,
    enums: Option<Identifier>,
}

struct CWriter<'g, 'f, 'o> {
    graph: &'g DescriptorGraph,
    out: &'f mut Formatter<'o>,
    declared: HashSet<Identifier>,
}

fn sym(graph: &DescriptorGraph, id: Identifier) -> Sym<'_> {
    Sym { graph, id }
}

fn reference(graph: &DescriptorGraph, target: Reference) -> Ref<'_> {
    Ref { graph, target }
}

impl CWriter<'_, '_, '_> {
    fn write_all(&mut self) -> fmt::Result {
        writeln!(self.out, "#include<stdint.h>")?;
        writeln!(self.out, "#include\"zw_cmd_tool.h\"")?;

        let graph = self.graph;
        for cc in &graph.command_classes {
            for cmd in &cc.commands {
                self.command(cmd)?;
            }
            self.command_class(cc)?;
        }

        for gen_dev in &graph.device_classes {
            for spec in &gen_dev.specific {
                writeln!(
                    self.out,
                    "\nstatic struct zw_spec_device_class {} = {{\n  {}, \"{}\", \"{}\", \"{}\"\n}};",
                    sym(self.graph, spec.id),
                    spec.key,
                    CStr(&spec.name),
                    CStr(&spec.help),
                    CStr(&spec.comment),
                )?;
            }
        }
        for gen_dev in &graph.device_classes {
            writeln!(
                self.out,
                "\nstatic struct zw_gen_device_class {} = {{\n  {}, \"{}\", \"{}\", \"{}\",\n  {}\n}};",
                sym(self.graph, gen_dev.id),
                gen_dev.key,
                CStr(&gen_dev.name),
                CStr(&gen_dev.help),
                CStr(&gen_dev.comment),
                RefList {
                    graph,
                    ids: gen_dev.specific.iter().map(|s| s.id),
                },
            )?;
        }

        self.index(
            "struct zw_command_class* zw_cmd_classes[]",
            &graph.command_class_index,
        )?;
        self.index(
            "struct zw_gen_device_class* zw_dev_classes[]",
            &graph.device_class_index,
        )
    }

    fn index(&mut self, declarator: &str, ids: &[Identifier]) -> fmt::Result {
        writeln!(self.out, "\n{declarator} = {{")?;
        for &id in ids {
            writeln!(self.out, "  &{},", sym(self.graph, id))?;
        }
        writeln!(self.out, "  0,\n}};")
    }

    fn command_class(&mut self, cc: &CommandClassSpec) -> fmt::Result {
        writeln!(
            self.out,
            "\nstatic struct zw_command_class {} = {{\n  {}, {}, \"{}\", \"{}\",\n  {}\n}};",
            sym(self.graph, cc.id),
            cc.key,
            cc.version,
            CStr(&cc.name),
            CStr(&cc.help),
            RefList {
                graph: self.graph,
                ids: cc.commands.iter().map(|c| c.id),
            },
        )
    }

    /// Parameters in document order (descending into groups), then groups
    /// outer first, then the command itself.
    fn command(&mut self, cmd: &CommandSpec) -> fmt::Result {
        for id in forward_declarations(&cmd.fields) {
            self.forward(id)?;
        }
        self.parameters(&cmd.fields)?;
        self.groups(&cmd.fields)?;
        writeln!(
            self.out,
            "\nstatic struct zw_command {} = {{\n  {}, {}, \"{}\", \"{}\",\n  {}\n}};",
            sym(self.graph, cmd.id),
            cmd.key,
            cmd.mask,
            CStr(&cmd.name),
            CStr(&cmd.help),
            RefList {
                graph: self.graph,
                ids: cmd.fields.iter().map(Field::id),
            },
        )
    }

    fn forward(&mut self, id: Identifier) -> fmt::Result {
        if self.declared.insert(id) {
            writeln!(self.out, "static struct zw_parameter {};", sym(self.graph, id))?;
        }
        Ok(())
    }

    fn ensure_declared(&mut self, target: Reference) -> fmt::Result {
        match target {
            Some(id) => self.forward(id),
            None => Ok(()),
        }
    }

    fn parameters(&mut self, fields: &[Field]) -> fmt::Result {
        for field in fields {
            match field {
                Field::Parameter(p) => self.parameter(p)?,
                Field::VariantGroup(g) => self.parameters(&g.children)?,
            }
        }
        Ok(())
    }

    fn groups(&mut self, fields: &[Field]) -> fmt::Result {
        for group in fields.iter().filter_map(Field::as_variant_group) {
            self.group(group)?;
            self.groups(&group.children)?;
        }
        Ok(())
    }

    fn parameter(&mut self, p: &ParameterSpec) -> fmt::Result {
        for bit in p.sub_fields() {
            self.bit_field(bit)?;
        }
        if let Some(table) = p.enum_table() {
            self.enum_table(p.id, table)?;
        }
        let length_location = p.length_location();
        let (optional, optional_mask) = match &p.optional {
            Some(gate) => (gate.target, gate.mask),
            None => (None, 0),
        };
        self.ensure_declared(length_location.target)?;
        self.ensure_declared(optional)?;
        self.param_decl(
            p.id,
            ParamRow {
                length: p.length(),
                length_location: length_location.target,
                length_location_mask: length_location.mask,
                mask: FULL_MASK,
                display: p.display(),
                name: &p.name,
                optional,
                optional_mask,
                enums: p.enum_table().map(|_| p.id),
            },
            p.sub_fields().iter().map(|b| b.id),
        )
    }

    fn bit_field(&mut self, bit: &BitFieldSpec) -> fmt::Result {
        if let Some(table) = &bit.enums {
            self.enum_table(bit.id, table)?;
        }
        self.param_decl(
            bit.id,
            ParamRow {
                length: 0,
                length_location: None,
                length_location_mask: 0,
                mask: bit.mask,
                display: bit.display(),
                name: &bit.name,
                optional: None,
                optional_mask: 0,
                enums: bit.enums.as_ref().map(|_| bit.id),
            },
            std::iter::empty(),
        )
    }

    fn group(&mut self, g: &VariantGroupSpec) -> fmt::Result {
        self.ensure_declared(g.length_location.target)?;
        self.param_decl(
            g.id,
            ParamRow {
                length: g.length(),
                length_location: g.length_location.target,
                length_location_mask: g.length_location.mask,
                mask: FULL_MASK,
                display: DisplayKind::Struct,
                name: &g.name,
                optional: None,
                optional_mask: 0,
                enums: None,
            },
            g.children.iter().map(Field::id),
        )
    }

    /// `owner` names the table: `<owner symbol>_enum`.
    fn enum_table(&mut self, owner: Identifier, table: &EnumTable) -> fmt::Result {
        writeln!(self.out, "\nstatic struct zw_enum {}_enum[] = {{", sym(self.graph, owner))?;
        for entry in &table.entries {
            writeln!(
                self.out,
                "  {{ \"{}\", 0x{:02x} }},",
                CStr(&entry.label),
                entry.value
            )?;
        }
        writeln!(self.out, "  {{ 0, 0 }}\n}};")
    }

    fn param_decl(
        &mut self,
        id: Identifier,
        row: ParamRow<'_>,
        subparams: impl Iterator<Item = Identifier> + Clone,
    ) -> fmt::Result {
        self.declared.insert(id);
        let enums = match row.enums {
            Some(owner) => format!("{}_enum", sym(self.graph, owner)),
            None => "0".to_string(),
        };
        writeln!(self.out, "\nstatic struct zw_parameter {} = {{", sym(self.graph, id))?;
        writeln!(self.out, "  {}, //length", row.length)?;
        writeln!(
            self.out,
            "  {}, //length_location",
            reference(self.graph, row.length_location)
        )?;
        writeln!(
            self.out,
            "  0x{:02x}, //length_location_mask",
            row.length_location_mask
        )?;
        writeln!(self.out, "  0x{:02x}, //mask", row.mask)?;
        writeln!(self.out, "  {}, //display", row.display)?;
        writeln!(self.out, "  \"{}\", //name", CStr(row.name))?;
        writeln!(self.out, "  {}, //optionaloffs", reference(self.graph, row.optional))?;
        writeln!(self.out, "  0x{:02x}, //optionalmask", row.optional_mask)?;
        writeln!(self.out, "  {enums}, //enums")?;
        writeln!(
            self.out,
            "  {}, //subparams\n}};",
            RefList {
                graph: self.graph,
                ids: subparams,
            }
        )
    }
}
