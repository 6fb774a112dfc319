//! Descriptor compiler pipeline: load → build → assemble.
//!
//! Building is pure (no I/O): the whole [`DescriptorGraph`] is constructed in
//! memory and handed to an emitter afterwards.

use std::path::Path;

use tracing::{debug, warn};
use zw_cmdtool_descriptors::{DescriptorGraph, GRAPH_FORMAT_VERSION, Identifier, Reference};
use zw_cmdtool_diagnostics::{Diagnostic, Severity, codes};

use crate::assemble::{command_class_index, device_class_index};
use crate::error::CompileError;
use crate::names::{NameResolver, NodeKind};
use crate::options::CompileOptions;
use crate::references::{ReferenceRole, Resolution, Sibling, ambiguous_reference, resolve};
use crate::source::{SpecNode, load_spec};

// ─── Compiler state ─────────────────────────────────────────────────────────

/// State of one compiler run.
pub(crate) struct Compiler<'o> {
    pub(crate) options: &'o CompileOptions,
    pub(crate) names: NameResolver,
    pub(crate) diagnostics: Vec<Diagnostic>,
}

impl<'o> Compiler<'o> {
    fn new(options: &'o CompileOptions) -> Self {
        Self {
            options,
            names: NameResolver::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Allocate an identifier, promoting a collision to a fatal error.
    pub(crate) fn identify(
        &mut self,
        parent: Option<Identifier>,
        kind: NodeKind,
        key: u32,
        version: u32,
        location: &str,
    ) -> Result<Identifier, CompileError> {
        self.names
            .identify(parent, kind, key, version)
            .map_err(|dup| CompileError::DuplicateIdentifier {
                symbol: dup.symbol,
                location: location.to_string(),
            })
    }

    /// Resolve a sibling reference; ambiguous lookups become a null reference
    /// and a recorded warning.
    pub(crate) fn reference(
        &mut self,
        siblings: &[Sibling],
        declared: Option<u32>,
        role: ReferenceRole,
        field: &str,
        location: &str,
    ) -> Reference {
        match resolve(siblings, declared) {
            Resolution::Unreferenced => None,
            Resolution::Resolved(id) => Some(id),
            Resolution::Ambiguous { matches } => {
                let key = declared.unwrap_or_default();
                let diag = ambiguous_reference(role, field, key, matches, location);
                warn!("{diag}");
                self.diagnostics.push(diag);
                None
            }
        }
    }
}

// ─── Compile ────────────────────────────────────────────────────────────────

/// Outcome of a successful run.
#[derive(Debug, Clone)]
pub struct Compilation {
    /// The built descriptor graph.
    pub graph: DescriptorGraph,
    /// Warnings and notes recorded along the way, in discovery order.
    pub diagnostics: Vec<Diagnostic>,
}

impl Compilation {
    /// Diagnostics at `severity`.
    pub fn diagnostics_at(&self, severity: Severity) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(move |d| d.severity == severity)
    }
}

/// Compile a specification tree into a descriptor graph.
///
/// Aborts on the first fatal condition; nothing partial is returned. In strict
/// mode every ambiguous reference is collected first and then reported as
/// one [`CompileError::StrictReferences`].
pub fn compile(root: &SpecNode, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let mut compiler = Compiler::new(options);
    let mut command_classes = Vec::new();
    let mut device_classes = Vec::new();

    let mut class_count = 0usize;
    let mut device_count = 0usize;
    for node in &root.children {
        match node.tag.as_str() {
            "cmd_class" => {
                if let Some(cc) = compiler.build_command_class(node, class_count)? {
                    command_classes.push(cc);
                }
                class_count += 1;
            }
            "gen_dev" => {
                device_classes.push(compiler.build_device_class(node, device_count)?);
                device_count += 1;
            }
            other => debug!(tag = other, "ignoring root element"),
        }
    }

    // Identifier allocation already rejected duplicate keys; the index
    // builders only sort here.
    let command_class_index = command_class_index(&command_classes)?;
    let device_class_index = device_class_index(&device_classes)?;

    let Compiler {
        names, diagnostics, ..
    } = compiler;

    if options.strict {
        let ambiguous: Vec<Diagnostic> = diagnostics
            .iter()
            .filter(|d| d.id == codes::AMBIGUOUS_REFERENCE)
            .cloned()
            .collect();
        if !ambiguous.is_empty() {
            return Err(CompileError::StrictReferences {
                diagnostics: ambiguous,
            });
        }
    }

    Ok(Compilation {
        graph: DescriptorGraph {
            format_version: GRAPH_FORMAT_VERSION.to_string(),
            symbols: names.into_symbols(),
            command_classes,
            device_classes,
            command_class_index,
            device_class_index,
        },
        diagnostics,
    })
}

/// Load a specification file or directory and compile it.
pub fn compile_path(path: &Path, options: &CompileOptions) -> Result<Compilation, CompileError> {
    let root = load_spec(path)?;
    debug!(path = %path.display(), elements = root.children.len(), "specification loaded");
    compile(&root, options)
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{FieldEnumIndexing, MultiArrayPolicy};
    use crate::source::parse_spec_str;
    use zw_cmdtool_descriptors::{
        BitFieldKind, DisplayKind, Field, ParameterKind, ParameterSpec, VARIABLE_LENGTH,
        VariantGroupSpec,
    };

    fn compile_json(json: &str) -> Result<Compilation, CompileError> {
        compile(&parse_spec_str(json).unwrap(), &CompileOptions::default())
    }

    fn compile_ok(json: &str) -> Compilation {
        compile_json(json).unwrap()
    }

    /// Wrap `params` (JSON array items) into one command of one class.
    fn one_command(params: &str) -> String {
        format!(
            r#"{{"tag":"zw_classes","children":[
              {{"tag":"cmd_class","attrs":{{"key":"0x25","version":"0x01","name":"COMMAND_CLASS_SWITCH_BINARY"}},
                "children":[{{"tag":"cmd","attrs":{{"key":"0x01","name":"SWITCH_BINARY_SET"}},
                  "children":[{params}]}}]}}]}}"#
        )
    }

    fn fields(c: &Compilation) -> &[Field] {
        &c.graph.command_classes[0].commands[0].fields
    }

    fn param(c: &Compilation, i: usize) -> &ParameterSpec {
        match &fields(c)[i] {
            Field::Parameter(p) => p,
            Field::VariantGroup(g) => panic!("expected parameter, got group {}", g.name),
        }
    }

    fn group(c: &Compilation, i: usize) -> &VariantGroupSpec {
        fields(c)[i].as_variant_group().unwrap()
    }

    // ── Parameter kinds ─────────────────────────────────────────────────

    #[test]
    fn word_parameter_is_two_decimal_bytes() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x01","name":"Value","type":"WORD"}}"#,
        ));
        let p = param(&c, 0);
        assert_eq!(p.kind(), ParameterKind::FixedWord);
        assert_eq!(p.length(), 2);
        assert_eq!(p.display(), DisplayKind::Decimal);
        assert!(p.enum_table().is_none());
        assert!(p.sub_fields().is_empty());
        assert_eq!(c.graph.symbol(p.id), "zw_cc_25_v1_cmd_01_p01");
    }

    #[test]
    fn ascii_array_with_declared_length() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Name","type":"ARRAY"},
                "children":[{"tag":"arrayattrib","attrs":{"len":"0x05","is_ascii":"true"}}]}"#,
        ));
        let p = param(&c, 0);
        assert_eq!(p.length(), 5);
        assert_eq!(p.display(), DisplayKind::Ascii);
        assert_eq!(p.length_location().target, None);
    }

    #[test]
    fn array_length_location_resolves_decimal_offset() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x0A","name":"Length","type":"BYTE"}},
               {"tag":"param","attrs":{"key":"0x0B","name":"Data","type":"ARRAY"},
                "children":[{"tag":"arrayattrib","attrs":{}},
                            {"tag":"arraylen","attrs":{"paramoffs":"10","lenmask":"0x1F"}}]}"#,
        ));
        let len = param(&c, 0);
        let data = param(&c, 1);
        assert_eq!(data.length(), 0);
        assert_eq!(data.display(), DisplayKind::Decimal);
        let loc = data.length_location();
        assert_eq!(loc.key, Some(10));
        assert_eq!(loc.target, Some(len.id));
        assert_eq!(loc.mask, 0x1F);
    }

    #[test]
    fn byte_with_bit_flags_builds_enum_table_in_order() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Value","type":"BYTE"},
                "children":[
                  {"tag":"bitflag","attrs":{"key":"0x00","flagname":"Off","flagmask":"0x00"}},
                  {"tag":"bitflag","attrs":{"key":"0x01","flagname":"On","flagmask":"0xFF"}},
                  {"tag":"bitflag","attrs":{"key":"0x02","flagname":"Last","flagmask":"0xFE"}}]}"#,
        ));
        let p = param(&c, 0);
        assert_eq!(p.display(), DisplayKind::Enum);
        let table = p.enum_table().unwrap();
        let labels: Vec<_> = table.entries.iter().map(|e| e.label.as_str()).collect();
        let values: Vec<_> = table.entries.iter().map(|e| e.value).collect();
        assert_eq!(labels, vec!["Off", "On", "Last"]);
        assert_eq!(values, vec![0x00, 0xFF, 0xFE]);
    }

    #[test]
    fn struct_byte_orders_fields_flags_then_enums() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Properties","type":"STRUCT_BYTE"},
                "children":[
                  {"tag":"bitflag","attrs":{"key":"0x00","flagname":"Flag","flagmask":"0x80"}},
                  {"tag":"fieldenum","attrs":{"key":"0x00","fieldname":"Mode","fieldmask":"0x60"},
                   "children":[{"tag":"fieldenum","attrs":{"value":"A"}},
                               {"tag":"fieldenum","attrs":{"value":"B"}}]},
                  {"tag":"fieldenum","attrs":{"key":"0x01","fieldname":"Unmasked"}},
                  {"tag":"bitfield","attrs":{"key":"0x00","fieldname":"Size","fieldmask":"0x07"}},
                  {"tag":"bitfield","attrs":{"key":"0x01","fieldname":"Scale","fieldmask":"0x18"}}]}"#,
        ));
        let p = param(&c, 0);
        assert_eq!(p.length(), 1);
        assert_eq!(p.display(), DisplayKind::Struct);
        let subs = p.sub_fields();
        let names: Vec<_> = subs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Size", "Scale", "Flag", "Mode"]);
        assert_eq!(subs[0].display(), DisplayKind::Hex);
        assert_eq!(subs[2].kind, BitFieldKind::BitFlag);
        assert_eq!(subs[3].display(), DisplayKind::Enum);
        assert_eq!(subs[3].mask, 0x60);
        let values: Vec<_> = subs[3]
            .enums
            .as_ref()
            .unwrap()
            .entries
            .iter()
            .map(|e| e.value)
            .collect();
        assert_eq!(values, vec![0, 0]);
        assert_eq!(c.graph.symbol(subs[3].id), "zw_cc_25_v1_cmd_01_p00_fenum00");
    }

    #[test]
    fn unmasked_fieldenum_needs_no_key() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Properties","type":"STRUCT_BYTE"},
                "children":[
                  {"tag":"bitfield","attrs":{"key":"0x00","fieldname":"Size","fieldmask":"0x07"}},
                  {"tag":"fieldenum","attrs":{"fieldname":"Unmasked"}}]}"#,
        ));
        let subs = param(&c, 0).sub_fields();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].name, "Size");
        assert!(c.diagnostics.is_empty());
    }

    #[test]
    fn sequential_fieldenum_indexing_counts_up() {
        let json = one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Properties","type":"STRUCT_BYTE"},
                "children":[
                  {"tag":"fieldenum","attrs":{"key":"0x00","fieldname":"Mode","fieldmask":"0x03"},
                   "children":[{"tag":"fieldenum","attrs":{"value":"A"}},
                               {"tag":"fieldenum","attrs":{"value":"B"}},
                               {"tag":"fieldenum","attrs":{"value":"C"}}]}]}"#,
        );
        let opts = CompileOptions::default().with_fieldenum_indexing(FieldEnumIndexing::Sequential);
        let c = compile(&parse_spec_str(&json).unwrap(), &opts).unwrap();
        let table = param(&c, 0).sub_fields()[0].enums.clone().unwrap();
        let values: Vec<_> = table.entries.iter().map(|e| e.value).collect();
        assert_eq!(values, vec![0, 1, 2]);
    }

    #[test]
    fn bitmask_collects_bit_flags_and_length_location() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Count","type":"BYTE"}},
               {"tag":"param","attrs":{"key":"0x01","name":"Supported","type":"BITMASK"},
                "children":[{"tag":"bitmask","attrs":{"paramoffs":"0","lenmask":"0x1F"}},
                            {"tag":"bitflag","attrs":{"key":"0x00","flagname":"A","flagmask":"0x01"}},
                            {"tag":"bitflag","attrs":{"key":"0x01","flagname":"B","flagmask":"0x02"}}]}"#,
        ));
        let count = param(&c, 0);
        let p = param(&c, 1);
        assert_eq!(p.display(), DisplayKind::Struct);
        assert_eq!(p.length(), 0);
        assert_eq!(p.length_location().target, Some(count.id));
        assert_eq!(p.sub_fields().len(), 2);
        assert!(p.sub_fields().iter().all(|f| f.kind == BitFieldKind::BitFlag));
    }

    #[test]
    fn enum_const_and_enum_array_tables() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Level","type":"ENUM"},
                "children":[{"tag":"enum","attrs":{"name":"Low","key":"0x01"}},
                            {"tag":"enum","attrs":{"name":"High","key":"0x02"}}]},
               {"tag":"param","attrs":{"key":"0x01","name":"Types","type":"ENUM_ARRAY"},
                "children":[{"tag":"enum","attrs":{"name":"T","key":"0x10"}}]},
               {"tag":"param","attrs":{"key":"0x02","name":"Mode","type":"CONST"},
                "children":[{"tag":"const","attrs":{"flagname":"Fixed","flagmask":"0x03"}}]}"#,
        ));
        let level = param(&c, 0);
        assert_eq!(level.length(), 1);
        assert_eq!(level.display(), DisplayKind::Enum);
        assert_eq!(level.enum_table().unwrap().len(), 2);

        let types = param(&c, 1);
        assert_eq!(types.length(), VARIABLE_LENGTH);
        assert_eq!(types.display(), DisplayKind::Enum);

        let mode = param(&c, 2);
        assert_eq!(mode.display(), DisplayKind::EnumExclusive);
        assert_eq!(mode.enum_table().unwrap().entries[0].value, 0x03);
    }

    #[test]
    fn variant_display_and_optional_offset() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Properties","type":"BYTE"}},
               {"tag":"param","attrs":{"key":"0x01","name":"Payload","type":"VARIANT",
                                       "optionaloffs":"0x00","optionalmask":"0x80"},
                "children":[{"tag":"variant","attrs":{"paramoffs":"0","sizemask":"0x07","showhex":"true"}}]},
               {"tag":"param","attrs":{"key":"0x02","name":"Text","type":"VARIANT"},
                "children":[{"tag":"variant","attrs":{"paramoffs":"255","sizemask":"0x00","is_ascii":"true"}}]}"#,
        ));
        let props = param(&c, 0);
        let payload = param(&c, 1);
        assert_eq!(payload.display(), DisplayKind::Hex);
        assert_eq!(payload.length(), VARIABLE_LENGTH);
        assert_eq!(payload.length_location().target, Some(props.id));
        assert_eq!(payload.length_location().mask, 0x07);
        let gate = payload.optional.unwrap();
        assert_eq!(gate.target, Some(props.id));
        assert_eq!(gate.mask, 0x80);

        let text = param(&c, 2);
        assert_eq!(text.display(), DisplayKind::Ascii);
        assert_eq!(text.length_location().key, None);
        assert!(c.diagnostics.is_empty());
    }

    #[test]
    fn unknown_type_is_fatal() {
        let err = compile_json(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Temp","type":"FLOAT"}}"#,
        ))
        .unwrap_err();
        match err {
            CompileError::UnsupportedParameterType {
                name,
                kind,
                location,
            } => {
                assert_eq!(name, "Temp");
                assert_eq!(kind, "FLOAT");
                assert_eq!(location, "cmd_class[0x25 v1]/cmd[0x01]/param[0x00]");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn multi_array_placeholder_or_reject() {
        let json = one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Multi","type":"MULTI_ARRAY"}}"#,
        );
        let c = compile_ok(&json);
        let p = param(&c, 0);
        assert_eq!(p.length(), 1);
        assert_eq!(p.display(), DisplayKind::Decimal);

        let opts = CompileOptions::default().with_multi_array(MultiArrayPolicy::Reject);
        let err = compile(&parse_spec_str(&json).unwrap(), &opts).unwrap_err();
        assert!(matches!(err, CompileError::UnsupportedParameterType { .. }));
    }

    #[test]
    fn missing_array_attributes_are_fatal() {
        let err = compile_json(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Data","type":"ARRAY"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            CompileError::MissingRequiredAttribute { ref attribute, .. } if attribute == "<arrayattrib>"
        ));
        assert_eq!(err.code(), Some(codes::MISSING_REQUIRED_ATTRIBUTE));
    }

    #[test]
    fn malformed_key_is_invalid_attribute() {
        let err = compile_json(&one_command(
            r#"{"tag":"param","attrs":{"key":"zz","name":"Value","type":"BYTE"}}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, CompileError::InvalidAttributeValue { .. }));
        assert_eq!(err.location(), Some("cmd_class[0x25 v1]/cmd[0x01]/param#0"));
    }

    // ── References ──────────────────────────────────────────────────────

    #[test]
    fn references_stay_within_their_command() {
        let json = r#"{"tag":"zw_classes","children":[
          {"tag":"cmd_class","attrs":{"key":"0x70","version":"0x01","name":"COMMAND_CLASS_CONFIGURATION"},
           "children":[
             {"tag":"cmd","attrs":{"key":"0x04","name":"SET"},"children":[
               {"tag":"param","attrs":{"key":"0x02","name":"Size","type":"BYTE"}}]},
             {"tag":"cmd","attrs":{"key":"0x06","name":"REPORT"},"children":[
               {"tag":"param","attrs":{"key":"0x02","name":"Level","type":"BYTE"}},
               {"tag":"param","attrs":{"key":"0x03","name":"Value","type":"VARIANT"},
                "children":[{"tag":"variant","attrs":{"paramoffs":"2","sizemask":"0x07"}}]}]}]}]}"#;
        let c = compile_ok(json);
        let cmds = &c.graph.command_classes[0].commands;
        let Field::Parameter(set_size) = &cmds[0].fields[0] else {
            panic!("expected parameter")
        };
        let Field::Parameter(level) = &cmds[1].fields[0] else {
            panic!("expected parameter")
        };
        let Field::Parameter(value) = &cmds[1].fields[1] else {
            panic!("expected parameter")
        };
        assert_eq!(value.length_location().target, Some(level.id));
        assert_ne!(value.length_location().target, Some(set_size.id));
        assert!(c.diagnostics.is_empty());
    }

    #[test]
    fn forward_reference_to_later_sibling_resolves() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Data","type":"ARRAY"},
                "children":[{"tag":"arrayattrib","attrs":{}},
                            {"tag":"arraylen","attrs":{"paramoffs":"1","lenmask":"0xFF"}}]},
               {"tag":"param","attrs":{"key":"0x01","name":"Length","type":"BYTE"}}"#,
        ));
        assert_eq!(param(&c, 0).length_location().target, Some(param(&c, 1).id));
    }

    #[test]
    fn unresolvable_reference_is_null_with_warning() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Value","type":"VARIANT"},
                "children":[{"tag":"variant","attrs":{"paramoffs":"5","sizemask":"0xFF"}}]}"#,
        ));
        let p = param(&c, 0);
        assert_eq!(p.length_location().key, Some(5));
        assert_eq!(p.length_location().target, None);
        assert_eq!(c.diagnostics.len(), 1);
        let d = &c.diagnostics[0];
        assert_eq!(d.id, codes::AMBIGUOUS_REFERENCE);
        assert_eq!(d.severity, Severity::Warn);
        assert_eq!(
            d.location.as_deref(),
            Some("cmd_class[0x25 v1]/cmd[0x01]/param[0x00]")
        );
        assert_eq!(c.diagnostics_at(Severity::Warn).count(), 1);
    }

    #[test]
    fn strict_mode_rejects_ambiguous_references() {
        let json = one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Value","type":"VARIANT"},
                "children":[{"tag":"variant","attrs":{"paramoffs":"5","sizemask":"0xFF"}}]},
               {"tag":"param","attrs":{"key":"0x01","name":"Other","type":"ARRAY",
                                       "optionaloffs":"0x09"},
                "children":[{"tag":"arrayattrib","attrs":{"len":"0x02"}}]}"#,
        );
        let opts = CompileOptions::default().with_strict(true);
        let err = compile(&parse_spec_str(&json).unwrap(), &opts).unwrap_err();
        match err {
            CompileError::StrictReferences { diagnostics } => assert_eq!(diagnostics.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    // ── Variant groups ──────────────────────────────────────────────────

    #[test]
    fn variant_group_resolves_among_parent_siblings() {
        let c = compile_ok(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"Count","type":"BYTE"}},
               {"tag":"variant_group","attrs":{"key":"0x01","name":"Entries","paramOffs":"0x00","sizemask":"0x3F"},
                "children":[
                  {"tag":"param","attrs":{"key":"0x00","name":"Id","type":"BYTE"}},
                  {"tag":"variant_group","attrs":{"key":"0x01","name":"Inner","paramOffs":"0x00","sizemask":"0x0F"},
                   "children":[{"tag":"param","attrs":{"key":"0x00","name":"Leaf","type":"WORD"}}]}]}"#,
        ));
        let count = param(&c, 0);
        let outer = group(&c, 1);
        assert_eq!(outer.length(), VARIABLE_LENGTH);
        assert_eq!(outer.length_location.target, Some(count.id));
        assert_eq!(outer.length_location.mask, 0x3F);
        assert_eq!(outer.children.len(), 2);

        let Field::Parameter(id_param) = &outer.children[0] else {
            panic!("expected parameter")
        };
        let inner = outer.children[1].as_variant_group().unwrap();
        assert_eq!(inner.length_location.target, Some(id_param.id));
        assert_eq!(outer.nested_groups().count(), 1);
        assert_eq!(c.graph.symbol(inner.id), "zw_cc_25_v1_cmd_01_vg01_vg01");
    }

    // ── Command classes and device classes ──────────────────────────────

    #[test]
    fn obsoleted_command_class_is_left_out() {
        let json = r#"{"tag":"zw_classes","children":[
          {"tag":"cmd_class","attrs":{"key":"0x20","version":"0x01","name":"COMMAND_CLASS_BASIC"},
           "children":[{"tag":"cmd","attrs":{"key":"0x01","name":"BASIC_SET"}}]},
          {"tag":"cmd_class","attrs":{"key":"0x10","version":"0x01","name":"OLD","comment":"[OBSOLETED]"},
           "children":[{"tag":"cmd","attrs":{"key":"0x01","name":"A"}},
                       {"tag":"cmd","attrs":{"key":"0x02","name":"B"}},
                       {"tag":"cmd","attrs":{"key":"0x03","name":"C"}}]}]}"#;
        let c = compile_ok(json);
        assert_eq!(c.graph.command_classes.len(), 1);
        assert_eq!(c.graph.command_class_index.len(), 1);
        assert!(c.graph.symbols.len() == 2, "obsoleted class allocated identifiers");
        assert!(c.graph.command_classes.iter().all(|cc| cc.key != 0x10));
        assert_eq!(c.diagnostics.len(), 1);
        assert_eq!(c.diagnostics[0].id, codes::OBSOLETED_COMMAND_CLASS);
        assert_eq!(c.diagnostics[0].severity, Severity::Info);
    }

    #[test]
    fn command_mask_defaults_to_full_byte() {
        let json = r#"{"tag":"zw_classes","children":[
          {"tag":"cmd_class","attrs":{"key":"0x60","version":"0x03","name":"COMMAND_CLASS_MULTI_CHANNEL"},
           "children":[{"tag":"cmd","attrs":{"key":"0x0D","name":"ENCAP"}},
                       {"tag":"cmd","attrs":{"key":"0x80","name":"SHIFTED","cmd_mask":"0xF0","help":"h"}}]}]}"#;
        let c = compile_ok(json);
        let cmds = &c.graph.command_classes[0].commands;
        assert_eq!(cmds[0].mask, 0xFF);
        assert_eq!(cmds[0].help, "");
        assert_eq!(cmds[1].mask, 0xF0);
        assert_eq!(cmds[1].help, "h");
    }

    #[test]
    fn versions_of_one_class_coexist_and_duplicates_fail() {
        let ok = r#"{"tag":"zw_classes","children":[
          {"tag":"cmd_class","attrs":{"key":"0x26","version":"0x02","name":"ML"}},
          {"tag":"cmd_class","attrs":{"key":"0x26","version":"0x01","name":"ML"}},
          {"tag":"cmd_class","attrs":{"key":"0x20","version":"0x01","name":"BASIC"}}]}"#;
        let c = compile_ok(ok);
        let order: Vec<_> = c
            .graph
            .command_class_index
            .iter()
            .map(|&id| c.graph.symbol(id).to_string())
            .collect();
        assert_eq!(order, vec!["zw_cc_20_v1", "zw_cc_26_v1", "zw_cc_26_v2"]);

        let dup = r#"{"tag":"zw_classes","children":[
          {"tag":"cmd_class","attrs":{"key":"0x26","version":"0x01","name":"A"}},
          {"tag":"cmd_class","attrs":{"key":"0x26","version":"0x01","name":"B"}}]}"#;
        let err = compile_json(dup).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateIdentifier { ref symbol, .. } if symbol == "zw_cc_26_v1"));
    }

    #[test]
    fn duplicate_parameter_keys_are_fatal() {
        let err = compile_json(&one_command(
            r#"{"tag":"param","attrs":{"key":"0x00","name":"A","type":"BYTE"}},
               {"tag":"param","attrs":{"key":"0x00","name":"B","type":"BYTE"}}"#,
        ))
        .unwrap_err();
        assert_eq!(err.code(), Some(codes::DUPLICATE_IDENTIFIER));
    }

    #[test]
    fn device_classes_keep_specific_order_and_sort_generic() {
        let json = r#"{"tag":"zw_classes","children":[
          {"tag":"gen_dev","attrs":{"key":"0x10","name":"GENERIC_TYPE_SWITCH_BINARY"},
           "children":[{"tag":"spec_dev","attrs":{"key":"0x03","name":"SPECIFIC_TYPE_SCENE"}},
                       {"tag":"spec_dev","attrs":{"key":"0x01","name":"SPECIFIC_TYPE_POWER"}}]},
          {"tag":"gen_dev","attrs":{"key":"0x01","name":"GENERIC_TYPE_GENERIC_CONTROLLER","comment":"c"}},
          {"tag":"notes","attrs":{}}]}"#;
        let c = compile_ok(json);
        let g = &c.graph;
        assert_eq!(g.device_classes.len(), 2);
        let specific: Vec<_> = g.device_classes[0].specific.iter().map(|s| s.key).collect();
        assert_eq!(specific, vec![0x03, 0x01]);
        assert_eq!(g.symbol(g.device_class_index[0]), "zw_gdev_01");
        assert_eq!(g.symbol(g.device_classes[0].specific[1].id), "zw_gdev_10_sdev_01");
        assert_eq!(g.device_classes[0].specific[1].name, "SPECIFIC_TYPE_POWER");
        assert_eq!(g.stats().device_classes, 4);
    }

    #[test]
    fn compile_path_reads_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("classes.jsonc"),
            one_command(r#"{"tag":"param","attrs":{"key":"0x00","name":"Value","type":"BYTE"}}"#),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("devices.json"),
            r#"{"tag":"zw_classes","children":[{"tag":"gen_dev","attrs":{"key":"0x02","name":"GENERIC_TYPE_STATIC_CONTROLLER"}}]}"#,
        )
        .unwrap();
        let c = compile_path(dir.path(), &CompileOptions::default()).unwrap();
        let stats = c.graph.stats();
        assert_eq!(stats.command_classes, 1);
        assert_eq!(stats.commands, 1);
        assert_eq!(stats.parameters, 1);
        assert_eq!(stats.device_classes, 1);
    }
}
