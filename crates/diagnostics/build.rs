//! Build script for generating diagnostic code tables at compile time.
//!
//! Reads `spec/diagnostics.jsonc` and writes into `OUT_DIR`:
//! - `generated_codes.rs`: `pub const NAME: &str = "ZWCxxxx";` per entry
//! - `generated_explain.rs`: id → long description
//! - `generated_severity.rs`: id → default severity

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use zw_cmdtool_jsonc_strip::strip_jsonc;

fn main() {
    let spec_path = Path::new("spec/diagnostics.jsonc");
    println!("cargo:rerun-if-changed={}", spec_path.display());

    let raw = fs::read_to_string(spec_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", spec_path.display()));
    let spec: serde_json::Value = serde_json::from_str(&strip_jsonc(&raw))
        .expect("failed to parse diagnostics.jsonc as JSON");
    let diagnostics = spec["diagnostics"]
        .as_array()
        .expect("diagnostics.jsonc: expected `diagnostics` array");

    let out_dir = env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    let mut seen_ids: HashSet<&str> = HashSet::new();
    let mut seen_names: HashSet<&str> = HashSet::new();

    let mut codes =
        String::from("// Auto-generated from spec/diagnostics.jsonc - DO NOT EDIT.\n\n");
    let mut explain = String::from("match id {\n");
    let mut severity = String::from("match id {\n");

    for (i, entry) in diagnostics.iter().enumerate() {
        let field = |name: &str| {
            entry[name]
                .as_str()
                .unwrap_or_else(|| panic!("diagnostics[{i}] missing `{name}`"))
        };
        let id = field("id");
        let const_name = field("constName");
        let summary = field("summary");
        let description = field("description");

        assert!(
            id.starts_with("ZWC") && id.len() == 7,
            "diagnostics[{i}]: id '{id}' must look like ZWCnnnn"
        );
        assert!(
            !const_name.is_empty()
                && const_name
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_'),
            "diagnostics[{i}] (id={id}): constName '{const_name}' is not SCREAMING_SNAKE_CASE"
        );
        assert!(seen_ids.insert(id), "diagnostics[{i}]: duplicate id '{id}'");
        assert!(
            seen_names.insert(const_name),
            "diagnostics[{i}] (id={id}): duplicate constName '{const_name}'"
        );

        let sev_rs = match field("severity") {
            "error" => "Severity::Error",
            "warn" => "Severity::Warn",
            "info" => "Severity::Info",
            other => panic!("diagnostics[{i}] (id={id}): invalid severity '{other}'"),
        };

        codes.push_str(&format!("/// {summary}\n"));
        codes.push_str(&format!("pub const {const_name}: &str = \"{id}\";\n\n"));
        explain.push_str(&format!(
            "    \"{id}\" => Some(\"{}\"),\n",
            escape_rust_string_literal(description)
        ));
        severity.push_str(&format!("    \"{id}\" => Some({sev_rs}),\n"));
    }

    explain.push_str("    _ => None,\n}\n");
    severity.push_str("    _ => None,\n}\n");

    fs::write(out_path.join("generated_codes.rs"), &codes)
        .expect("failed to write generated_codes.rs");
    fs::write(out_path.join("generated_explain.rs"), &explain)
        .expect("failed to write generated_explain.rs");
    fs::write(out_path.join("generated_severity.rs"), &severity)
        .expect("failed to write generated_severity.rs");
}

fn escape_rust_string_literal(value: &str) -> String {
    value.chars().flat_map(char::escape_default).collect()
}
