//! Diagnostic ID constants.
//!
//! Generated from `spec/diagnostics.jsonc` at build time, so a typo in a code
//! name is a compile error rather than a silently unknown id.

include!(concat!(env!("OUT_DIR"), "/generated_codes.rs"));
