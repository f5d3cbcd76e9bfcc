//! Container codecs: `.ybc` (bytecode) and `.yapp` (application bundle),
//! spec §4.7.
//!
//! Both formats are "magic + length-prefixed JSON/binary blobs", the same
//! framing shape the teacher uses for its own FFI manifests (fixed header,
//! explicit lengths, no implicit termination). Decoders reject anything
//! that doesn't match exactly — no partial decode, per spec §7.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::bytecode::{FunctionBC, ProgramBC};
use crate::diagnostic::{Diagnostic, DiagnosticKind};

pub const YBC_MAGIC: &[u8; 8] = b"YASNYBC1";
pub const YAPP_MAGIC: &[u8; 8] = b"YASNYAP1";

fn format_error(msg: impl Into<String>) -> Diagnostic {
    Diagnostic::new(DiagnosticKind::Format, msg)
}

fn read_u32_le(bytes: &[u8], at: usize, what: &str) -> Result<u32, Diagnostic> {
    let slice = bytes
        .get(at..at + 4)
        .ok_or_else(|| format_error(format!("truncated {what} length at offset {at}")))?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

fn read_block<'a>(bytes: &'a [u8], at: usize, what: &str) -> Result<(&'a [u8], usize), Diagnostic> {
    let len = read_u32_le(bytes, at, what)? as usize;
    let start = at + 4;
    let end = start
        .checked_add(len)
        .ok_or_else(|| format_error(format!("{what} length overflows")))?;
    let block = bytes
        .get(start..end)
        .ok_or_else(|| format_error(format!("truncated {what} block: expected {len} bytes at offset {start}")))?;
    Ok((block, end))
}

// ---------------------------------------------------------------------------
// An order-preserving map, serialized as a JSON object whose key order is
// exactly insertion order (spec §3: "Name ordering is insertion-driven").
// `serde_json`'s object serializer writes entries in the order `collect_map`
// feeds them, and a `MapAccess` visitor reads them back in document order, so
// this round-trips byte-for-byte without depending on `preserve_order`.
// ---------------------------------------------------------------------------

struct FunctionMap<'a>(&'a [(String, FunctionBC)]);

impl Serialize for FunctionMap<'_> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

struct FunctionMapOwned(Vec<(String, FunctionBC)>);

impl<'de> Deserialize<'de> for FunctionMapOwned {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl<'de> serde::de::Visitor<'de> for Visitor {
            type Value = FunctionMapOwned;
            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a map of function name to FunctionBC")
            }
            fn visit_map<A: serde::de::MapAccess<'de>>(
                self,
                mut map: A,
            ) -> Result<Self::Value, A::Error> {
                let mut out = Vec::new();
                while let Some((k, v)) = map.next_entry::<String, FunctionBC>()? {
                    out.push((k, v));
                }
                Ok(FunctionMapOwned(out))
            }
        }
        deserializer.deserialize_map(Visitor)
    }
}

#[derive(Serialize)]
struct BytecodePayloadRef<'a> {
    functions: FunctionMap<'a>,
    entry: &'a FunctionBC,
    global_count: usize,
}

#[derive(Deserialize)]
struct BytecodePayloadOwned {
    functions: FunctionMapOwned,
    entry: FunctionBC,
    global_count: usize,
}

/// Serializes a `ProgramBC` to its `.ybc` JSON payload (no magic/length
/// framing — used both standalone and embedded inside a `.yapp`).
pub fn encode_bytecode_payload(program: &ProgramBC) -> Vec<u8> {
    let payload = BytecodePayloadRef {
        functions: FunctionMap(&program.functions),
        entry: &program.entry,
        global_count: program.global_count,
    };
    serde_json::to_vec(&payload).expect("ProgramBC payload is always serializable")
}

/// Parses a `.ybc` JSON payload back into a `ProgramBC`.
pub fn decode_bytecode_payload(bytes: &[u8]) -> Result<ProgramBC, Diagnostic> {
    let payload: BytecodePayloadOwned = serde_json::from_slice(bytes)
        .map_err(|e| format_error(format!("malformed bytecode JSON payload: {e}")))?;
    Ok(ProgramBC {
        functions: payload.functions.0,
        entry: payload.entry,
        global_count: payload.global_count,
    })
}

/// Encodes a full `.ybc` file: magic, 4-byte LE length, JSON payload.
pub fn encode_bytecode(program: &ProgramBC) -> Vec<u8> {
    let payload = encode_bytecode_payload(program);
    let mut out = Vec::with_capacity(8 + 4 + payload.len());
    out.extend_from_slice(YBC_MAGIC);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&payload);
    out
}

/// Decodes a full `.ybc` file, verifying magic and length exactly.
pub fn decode_bytecode(bytes: &[u8]) -> Result<ProgramBC, Diagnostic> {
    let magic = bytes
        .get(0..8)
        .ok_or_else(|| format_error("file shorter than .ybc magic (8 bytes)"))?;
    if magic != YBC_MAGIC {
        return Err(format_error(format!(
            "bad .ybc magic: expected {:?}, found {:?}",
            YBC_MAGIC, magic
        )));
    }
    let (payload, end) = read_block(bytes, 8, "bytecode payload")?;
    if end != bytes.len() {
        return Err(format_error(format!(
            "trailing {} byte(s) after .ybc payload",
            bytes.len() - end
        )));
    }
    decode_bytecode_payload(payload)
}

// ---------------------------------------------------------------------------
// Application bundle (.yapp)
// ---------------------------------------------------------------------------

/// A projected type, used only for the function-schema manifest consumed by
/// external UIs (spec §6 "Function-schema projection"). Kept independent of
/// the type checker's internal `TypeNode` so `yasn-core` never depends on
/// `yasn-compiler`; the compiler converts its `TypeNode` into this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SchemaTypeNode {
    Primitive { name: String },
    List { element: Box<SchemaTypeNode> },
    Dict {
        key: Box<SchemaTypeNode>,
        value: Box<SchemaTypeNode>,
    },
    Union { variants: Vec<SchemaTypeNode> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub type_rendered: String,
    pub type_node: SchemaTypeNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSchema {
    pub name: String,
    pub params: Vec<ParamSchema>,
    pub return_type: String,
    pub return_type_node: SchemaTypeNode,
    pub is_async: bool,
    pub is_public_api: bool,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleMetadata {
    pub name: String,
    /// 2 = current format (carries a UI-asset block), 1 = legacy (no block).
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schema: Vec<FunctionSchema>,
}

pub const BUNDLE_VERSION_CURRENT: u32 = 2;
pub const BUNDLE_VERSION_LEGACY: u32 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct AppBundle {
    pub metadata: BundleMetadata,
    pub bytecode: ProgramBC,
    /// `None` only ever appears for a version-1 (legacy) bundle, which has
    /// no UI-asset block at all. A version-2 bundle with no assets carries
    /// `Some(vec![])`.
    pub ui_assets: Option<Vec<u8>>,
}

/// Encodes a full `.yapp` file (spec §4.7).
pub fn encode_bundle(bundle: &AppBundle) -> Vec<u8> {
    let meta_json = serde_json::to_vec(&bundle.metadata).expect("BundleMetadata always serializes");
    let bc_payload = encode_bytecode_payload(&bundle.bytecode);

    let mut out = Vec::new();
    out.extend_from_slice(YAPP_MAGIC);
    out.extend_from_slice(&(meta_json.len() as u32).to_le_bytes());
    out.extend_from_slice(&meta_json);
    out.extend_from_slice(&(bc_payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&bc_payload);
    if bundle.metadata.version != BUNDLE_VERSION_LEGACY {
        let assets = bundle.ui_assets.as_deref().unwrap_or(&[]);
        out.extend_from_slice(&(assets.len() as u32).to_le_bytes());
        out.extend_from_slice(assets);
    }
    out
}

/// Decodes a full `.yapp` file, accepting both version 1 (no UI block) and
/// version 2 (spec §4.7).
pub fn decode_bundle(bytes: &[u8]) -> Result<AppBundle, Diagnostic> {
    let magic = bytes
        .get(0..8)
        .ok_or_else(|| format_error("file shorter than .yapp magic (8 bytes)"))?;
    if magic != YAPP_MAGIC {
        return Err(format_error(format!(
            "bad .yapp magic: expected {:?}, found {:?}",
            YAPP_MAGIC, magic
        )));
    }

    let (meta_bytes, after_meta) = read_block(bytes, 8, "bundle metadata")?;
    let metadata: BundleMetadata = serde_json::from_slice(meta_bytes)
        .map_err(|e| format_error(format!("malformed bundle metadata JSON: {e}")))?;
    if metadata.name.is_empty() {
        return Err(format_error("bundle metadata missing required field 'name'"));
    }
    if metadata.version != BUNDLE_VERSION_CURRENT && metadata.version != BUNDLE_VERSION_LEGACY {
        return Err(format_error(format!(
            "unsupported bundle version {} (expected 1 or 2)",
            metadata.version
        )));
    }

    let (bc_bytes, after_bc) = read_block(bytes, after_meta, "bytecode blob")?;
    let bytecode = decode_bytecode_payload(bc_bytes)?;

    let (ui_assets, end) = if metadata.version == BUNDLE_VERSION_LEGACY {
        (None, after_bc)
    } else {
        let (assets, end) = read_block(bytes, after_bc, "UI asset blob")?;
        (Some(assets.to_vec()), end)
    };

    if end != bytes.len() {
        return Err(format_error(format!(
            "trailing {} byte(s) after .yapp payload",
            bytes.len() - end
        )));
    }

    Ok(AppBundle {
        metadata,
        bytecode,
        ui_assets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::{Instruction, Literal, Opcode};

    fn sample_program() -> ProgramBC {
        ProgramBC {
            functions: vec![(
                "double".to_string(),
                FunctionBC {
                    name: "double".to_string(),
                    params: vec!["x".to_string()],
                    local_count: 1,
                    instructions: vec![
                        Instruction::new(Opcode::Load, vec![Literal::Int(0)]),
                        Instruction::new(Opcode::Load, vec![Literal::Int(0)]),
                        Instruction::simple(Opcode::Add),
                        Instruction::simple(Opcode::Ret),
                    ],
                },
            )],
            entry: FunctionBC {
                name: "__entry__".to_string(),
                params: vec![],
                local_count: 0,
                instructions: vec![Instruction::simple(Opcode::Halt)],
            },
            global_count: 0,
        }
    }

    #[test]
    fn bytecode_round_trip() {
        let program = sample_program();
        let bytes = encode_bytecode(&program);
        let decoded = decode_bytecode(&bytes).unwrap();
        assert_eq!(program, decoded);
    }

    #[test]
    fn bytecode_rejects_bad_magic() {
        let mut bytes = encode_bytecode(&sample_program());
        bytes[0] = b'X';
        assert!(decode_bytecode(&bytes).is_err());
    }

    #[test]
    fn bytecode_rejects_trailing_bytes() {
        let mut bytes = encode_bytecode(&sample_program());
        bytes.push(0);
        assert!(decode_bytecode(&bytes).is_err());
    }

    #[test]
    fn bundle_round_trip_with_assets() {
        let bundle = AppBundle {
            metadata: BundleMetadata {
                name: "demo".to_string(),
                version: BUNDLE_VERSION_CURRENT,
                display_name: Some("Demo".to_string()),
                description: None,
                app_version: Some("1.0.0".to_string()),
                publisher: None,
                schema: vec![],
            },
            bytecode: sample_program(),
            ui_assets: Some(vec![1, 2, 3, 4]),
        };
        let bytes = encode_bundle(&bundle);
        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(bundle, decoded);
        // byte-exact re-encode (spec §8 property 2)
        assert_eq!(bytes, encode_bundle(&decoded));
    }

    #[test]
    fn bundle_round_trip_empty_ui_block() {
        let bundle = AppBundle {
            metadata: BundleMetadata {
                name: "demo".to_string(),
                version: BUNDLE_VERSION_CURRENT,
                display_name: None,
                description: None,
                app_version: None,
                publisher: None,
                schema: vec![],
            },
            bytecode: sample_program(),
            ui_assets: Some(vec![]),
        };
        let bytes = encode_bundle(&bundle);
        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(decoded.ui_assets, Some(vec![]));
        assert_eq!(bytes, encode_bundle(&decoded));
    }

    #[test]
    fn bundle_legacy_version_has_no_ui_block() {
        let bundle = AppBundle {
            metadata: BundleMetadata {
                name: "legacy".to_string(),
                version: BUNDLE_VERSION_LEGACY,
                display_name: None,
                description: None,
                app_version: None,
                publisher: None,
                schema: vec![],
            },
            bytecode: sample_program(),
            ui_assets: None,
        };
        let bytes = encode_bundle(&bundle);
        let decoded = decode_bundle(&bytes).unwrap();
        assert_eq!(decoded.ui_assets, None);
        assert_eq!(bytes, encode_bundle(&decoded));
    }

    #[test]
    fn bundle_rejects_missing_name() {
        let bundle = AppBundle {
            metadata: BundleMetadata {
                name: String::new(),
                version: BUNDLE_VERSION_CURRENT,
                display_name: None,
                description: None,
                app_version: None,
                publisher: None,
                schema: vec![],
            },
            bytecode: sample_program(),
            ui_assets: Some(vec![]),
        };
        let bytes = encode_bundle(&bundle);
        assert!(decode_bundle(&bytes).is_err());
    }
}
