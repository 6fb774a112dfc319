//! Compiler configuration.

/// Marker comment of command classes that are left out of the output.
pub const OBSOLETE_MARKER: &str = "[OBSOLETED]";

/// How value entries of a `fieldenum` table are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldEnumIndexing {
    /// Every entry gets index 0, matching tables generated by earlier tools.
    #[default]
    Legacy,
    /// Entries are numbered 0, 1, 2, … in specification order.
    Sequential,
}

impl FieldEnumIndexing {
    /// Value assigned to the entry at `position`.
    pub fn value_at(self, position: usize) -> u32 {
        match self {
            FieldEnumIndexing::Legacy => 0,
            FieldEnumIndexing::Sequential => position as u32,
        }
    }
}

/// Handling of `MULTI_ARRAY` parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MultiArrayPolicy {
    /// Emit a one-byte decimal placeholder.
    #[default]
    Placeholder,
    /// Fail with `UnsupportedParameterType`.
    Reject,
}

/// Options for one compiler run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CompileOptions {
    /// Field-enum value numbering.
    pub fieldenum_indexing: FieldEnumIndexing,
    /// `MULTI_ARRAY` handling.
    pub multi_array: MultiArrayPolicy,
    /// Fail the run when any reference is ambiguous.
    pub strict: bool,
    /// `comment` value marking an obsoleted command class.
    pub obsolete_marker: String,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            fieldenum_indexing: FieldEnumIndexing::default(),
            multi_array: MultiArrayPolicy::default(),
            strict: false,
            obsolete_marker: OBSOLETE_MARKER.to_string(),
        }
    }
}

impl CompileOptions {
    /// Set field-enum numbering (builder pattern).
    pub fn with_fieldenum_indexing(mut self, indexing: FieldEnumIndexing) -> Self {
        self.fieldenum_indexing = indexing;
        self
    }

    /// Set `MULTI_ARRAY` handling (builder pattern).
    pub fn with_multi_array(mut self, policy: MultiArrayPolicy) -> Self {
        self.multi_array = policy;
        self
    }

    /// Enable or disable strict references (builder pattern).
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Whether a command class `comment` marks it obsoleted.
    pub fn is_obsolete(&self, comment: &str) -> bool {
        comment == self.obsolete_marker
    }
}
