//! Z-Wave command descriptor compiler. Reads a command class specification
//! tree and compiles it into the static, cross-referenced descriptor tables
//! a generic runtime decoder walks to decode and encode frames.
//!
//! The run is a single batch pass: [`source::load_spec`] reads the tree,
//! [`compile`] builds the [`DescriptorGraph`] in memory, and [`emit`] renders
//! it as C or JSON.

pub mod emit;
pub mod error;
pub mod names;
pub mod options;
pub mod references;
pub mod source;
pub mod variant;

mod assemble;
mod builder;
mod pipeline;

pub use assemble::{command_class_index, device_class_index};
pub use emit::{OutputFormat, emit, emit_c, emit_json};
pub use error::CompileError;
pub use options::{CompileOptions, FieldEnumIndexing, MultiArrayPolicy};
pub use pipeline::{Compilation, compile, compile_path};
pub use source::{SpecNode, load_spec, parse_spec_str};
pub use zw_cmdtool_descriptors::DescriptorGraph;
