//! Cross-field reference resolution among direct siblings.
//!
//! A field may name another field by its declared key: where its length is
//! stored (length-location) or which byte gates its presence
//! (optional-offset). Only `param` siblings under the same parent are
//! candidates; references never cross a command or variant-group boundary.

use zw_cmdtool_descriptors::{Identifier, NO_LOCATION};
use zw_cmdtool_diagnostics::{Diagnostic, codes};

/// A `param` sibling that references may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sibling {
    /// Declared key.
    pub key: u32,
    /// Allocated identifier.
    pub id: Identifier,
}

/// Outcome of one lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// No key, or the [`NO_LOCATION`] sentinel.
    Unreferenced,
    /// Exactly one sibling carries the key.
    Resolved(Identifier),
    /// Zero or several siblings carry the key.
    Ambiguous {
        /// Number of matching siblings.
        matches: usize,
    },
}

/// What a reference is used for; only changes the diagnostic text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceRole {
    /// Field holding this field's length.
    LengthLocation,
    /// Field gating this field's presence.
    OptionalOffset,
}

impl ReferenceRole {
    fn describe(self) -> &'static str {
        match self {
            ReferenceRole::LengthLocation => "length location",
            ReferenceRole::OptionalOffset => "optional offset",
        }
    }
}

/// Normalize a declared location: the sentinel means "no reference".
pub fn location_key(declared: Option<u32>) -> Option<u32> {
    declared.filter(|&k| k != NO_LOCATION)
}

/// Scan `siblings` for the single parameter whose key is `location`.
pub fn resolve(siblings: &[Sibling], location: Option<u32>) -> Resolution {
    let Some(key) = location_key(location) else {
        return Resolution::Unreferenced;
    };
    let mut matches = siblings.iter().filter(|s| s.key == key);
    match (matches.next(), matches.next()) {
        (Some(only), None) => Resolution::Resolved(only.id),
        (None, _) => Resolution::Ambiguous { matches: 0 },
        (Some(_), Some(_)) => Resolution::Ambiguous {
            matches: 2 + matches.count(),
        },
    }
}

/// Diagnostic for an [`Resolution::Ambiguous`] lookup.
pub fn ambiguous_reference(
    role: ReferenceRole,
    field: &str,
    key: u32,
    matches: usize,
    location: &str,
) -> Diagnostic {
    let message = if matches == 0 {
        format!(
            "{} of \"{field}\" refers to key 0x{key:02X}, but no sibling parameter has that key; emitted as no reference",
            role.describe()
        )
    } else {
        format!(
            "{} of \"{field}\" refers to key 0x{key:02X}, which {matches} sibling parameters share; emitted as no reference",
            role.describe()
        )
    };
    Diagnostic::from_code(codes::AMBIGUOUS_REFERENCE, message, Some(location.to_string()))
        .with_context_entry("field", field)
        .with_context_entry("location", format!("0x{key:02X}"))
        .with_context_entry("matches", matches.to_string())
        .with_context_entry("role", role.describe())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sib(key: u32, id: u32) -> Sibling {
        Sibling {
            key,
            id: Identifier::new(id),
        }
    }

    #[test]
    fn absent_and_sentinel_are_unreferenced() {
        let siblings = [sib(0xFF, 1)];
        assert_eq!(resolve(&siblings, None), Resolution::Unreferenced);
        assert_eq!(resolve(&siblings, Some(255)), Resolution::Unreferenced);
    }

    #[test]
    fn single_match_resolves() {
        let siblings = [sib(0, 10), sib(1, 11), sib(2, 12)];
        assert_eq!(
            resolve(&siblings, Some(1)),
            Resolution::Resolved(Identifier::new(11))
        );
    }

    #[test]
    fn key_zero_is_a_real_key() {
        let siblings = [sib(0, 10), sib(1, 11)];
        assert_eq!(
            resolve(&siblings, Some(0)),
            Resolution::Resolved(Identifier::new(10))
        );
    }

    #[test]
    fn missing_and_repeated_keys_are_ambiguous() {
        let siblings = [sib(2, 1), sib(2, 2), sib(2, 3)];
        assert_eq!(
            resolve(&siblings, Some(5)),
            Resolution::Ambiguous { matches: 0 }
        );
        assert_eq!(
            resolve(&siblings, Some(2)),
            Resolution::Ambiguous { matches: 3 }
        );
    }

    #[test]
    fn diagnostic_carries_context() {
        let d = ambiguous_reference(ReferenceRole::OptionalOffset, "Level", 0x05, 0, "x/param[0x01]");
        assert_eq!(d.id, codes::AMBIGUOUS_REFERENCE);
        assert!(d.message.contains("optional offset"));
        let ctx = d.context.unwrap();
        assert_eq!(ctx["location"], "0x05");
        assert_eq!(ctx["matches"], "0");
        assert_eq!(ctx["field"], "Level");
    }
}
