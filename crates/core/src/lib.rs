//! Shared types for the YASN toolchain: the bytecode model, the container
//! codecs, the structured diagnostic type, and the canonical builtin
//! catalogue. Kept independent of both `yasn-compiler` and `yasn-runtime` so
//! neither has to depend on the other.

pub mod builtins;
pub mod bytecode;
pub mod container;
pub mod diagnostic;
pub mod span;

pub use bytecode::{FunctionBC, Instruction, Literal, Opcode, ProgramBC, ENTRY_NAME};
pub use container::{
    decode_bundle, decode_bytecode, encode_bundle, encode_bytecode, AppBundle, BundleMetadata,
    FunctionSchema, ParamSchema, SchemaTypeNode, BUNDLE_VERSION_CURRENT, BUNDLE_VERSION_LEGACY,
};
pub use diagnostic::{Diagnostic, DiagnosticKind};
pub use span::Position;
