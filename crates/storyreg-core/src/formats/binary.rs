//! # Binary Format
//!
//! Precompiled story documents.
//!
//! Format: Header (37 bytes) + obfuscated postcard payload.
//! - 4 bytes: Magic ("STRY")
//! - 1 byte: Version
//! - 32 bytes: BLAKE3 hash of the plain payload
//! - payload: postcard-serialized [`WireDocument`], XOR-ed with a cycling
//!   decode table
//!
//! The payload stores the tree as a flat pre-order item list. Decoding
//! rebuilds it with the same nesting limit the text parser applies, so a
//! crafted payload cannot recurse without bound.
//!
//! Story "code" is the same bytes as standard base64 text, for stories that
//! travel inside other text (config values, network messages).
//!
//! Size, header and hash are validated before the tree is rebuilt.

use crate::dsl::{CallData, DslDocument, DslNode, DslValue, FunctionData};
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_DOCUMENT_SIZE, MAX_NESTING_DEPTH};
use crate::types::StoryError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

const HASH_SIZE: usize = 32;
const HEADER_SIZE: usize = 5 + HASH_SIZE;

/// Key bytes used to obfuscate binary payloads.
///
/// An empty table leaves the payload as plain postcard.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodeTable(Vec<u8>);

impl DecodeTable {
    /// Create a table from raw key bytes.
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self(key.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// XOR `data` in place with the cycling key. Applying it twice restores
    /// the input.
    pub fn apply(&self, data: &mut [u8]) {
        if self.is_empty() {
            return;
        }
        for (byte, key) in data.iter_mut().zip(self.0.iter().cycle()) {
            *byte ^= key;
        }
    }
}

impl From<&str> for DecodeTable {
    fn from(key: &str) -> Self {
        Self::new(key.as_bytes())
    }
}

// =============================================================================
// WIRE LAYOUT
// =============================================================================

/// One tree element in pre-order. Counts say how many children follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
enum WireItem {
    Node { id: String, functions: u32 },
    /// Followed by a `Call` item when `has_call`, then the statements.
    Function { has_call: bool, statements: u32 },
    Call { name: String, params: u32 },
    Ident(String),
    Number(String),
    Str(String),
}

/// Postcard payload of a binary story document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct WireDocument {
    name: String,
    nodes: u32,
    items: Vec<WireItem>,
}

fn too_deep() -> StoryError {
    StoryError::SerializationError(format!(
        "story document nested deeper than {}",
        MAX_NESTING_DEPTH
    ))
}

fn enter(depth: usize) -> Result<usize, StoryError> {
    let depth = depth + 1;
    if depth > MAX_NESTING_DEPTH {
        return Err(too_deep());
    }
    Ok(depth)
}

fn count(len: usize) -> Result<u32, StoryError> {
    u32::try_from(len)
        .map_err(|_| StoryError::SerializationError(format!("{} children do not fit a u32", len)))
}

/// Flattens a document tree into wire items.
#[derive(Default)]
struct Flattener {
    items: Vec<WireItem>,
}

impl Flattener {
    fn node(&mut self, node: &DslNode, depth: usize) -> Result<(), StoryError> {
        self.items.push(WireItem::Node {
            id: node.id.clone(),
            functions: count(node.functions.len())?,
        });
        for function in &node.functions {
            self.items.push(WireItem::Function {
                has_call: function.call.is_some(),
                statements: count(function.statements.len())?,
            });
            if let Some(call) = &function.call {
                self.call(call, depth)?;
            }
            if !function.statements.is_empty() {
                let depth = enter(depth)?;
                for statement in &function.statements {
                    self.node(statement, depth)?;
                }
            }
        }
        Ok(())
    }

    fn call(&mut self, call: &CallData, depth: usize) -> Result<(), StoryError> {
        self.items.push(WireItem::Call {
            name: call.name.clone(),
            params: count(call.params.len())?,
        });
        if call.params.is_empty() {
            return Ok(());
        }
        let depth = enter(depth)?;
        for param in &call.params {
            match param {
                DslValue::Ident(s) => self.items.push(WireItem::Ident(s.clone())),
                DslValue::Number(s) => self.items.push(WireItem::Number(s.clone())),
                DslValue::Str(s) => self.items.push(WireItem::Str(s.clone())),
                DslValue::Call(nested) => self.call(nested, depth)?,
            }
        }
        Ok(())
    }
}

/// Rebuilds a document tree from wire items, bounding the nesting depth.
struct Rebuilder<I> {
    items: I,
}

impl<I: Iterator<Item = WireItem>> Rebuilder<I> {
    fn next(&mut self, what: &str) -> Result<WireItem, StoryError> {
        self.items.next().ok_or_else(|| {
            StoryError::SerializationError(format!("story payload truncated, expected {}", what))
        })
    }

    fn node(&mut self, depth: usize) -> Result<DslNode, StoryError> {
        let (id, functions) = match self.next("a node")? {
            WireItem::Node { id, functions } => (id, functions),
            other => return Err(unexpected("a node", &other)),
        };
        // Children are pushed one by one; a crafted count must not preallocate.
        let mut built = Vec::new();
        for _ in 0..functions {
            built.push(self.function(depth)?);
        }
        Ok(DslNode {
            id,
            functions: built,
        })
    }

    fn function(&mut self, depth: usize) -> Result<FunctionData, StoryError> {
        let (has_call, statements) = match self.next("a function")? {
            WireItem::Function {
                has_call,
                statements,
            } => (has_call, statements),
            other => return Err(unexpected("a function", &other)),
        };
        let call = if has_call {
            match self.next("a call")? {
                WireItem::Call { name, params } => Some(self.call(name, params, depth)?),
                other => return Err(unexpected("a call", &other)),
            }
        } else {
            None
        };

        let mut body = Vec::new();
        if statements > 0 {
            let depth = enter(depth)?;
            for _ in 0..statements {
                body.push(self.node(depth)?);
            }
        }
        Ok(FunctionData {
            call,
            statements: body,
        })
    }

    fn call(&mut self, name: String, params: u32, depth: usize) -> Result<CallData, StoryError> {
        let mut values = Vec::new();
        if params > 0 {
            let depth = enter(depth)?;
            for _ in 0..params {
                let value = match self.next("a value")? {
                    WireItem::Ident(s) => DslValue::Ident(s),
                    WireItem::Number(s) => DslValue::Number(s),
                    WireItem::Str(s) => DslValue::Str(s),
                    WireItem::Call { name, params } => {
                        DslValue::Call(self.call(name, params, depth)?)
                    }
                    other => return Err(unexpected("a value", &other)),
                };
                values.push(value);
            }
        }
        Ok(CallData::new(name, values))
    }
}

fn unexpected(what: &str, found: &WireItem) -> StoryError {
    StoryError::SerializationError(format!(
        "malformed story payload: expected {}, found {:?}",
        what, found
    ))
}

fn to_wire(document: &DslDocument) -> Result<WireDocument, StoryError> {
    let mut flattener = Flattener::default();
    for node in &document.nodes {
        flattener.node(node, 0)?;
    }
    Ok(WireDocument {
        name: document.name.clone(),
        nodes: count(document.nodes.len())?,
        items: flattener.items,
    })
}

fn from_wire(wire: WireDocument) -> Result<DslDocument, StoryError> {
    let mut rebuilder = Rebuilder {
        items: wire.items.into_iter(),
    };
    let mut nodes = Vec::new();
    for _ in 0..wire.nodes {
        nodes.push(rebuilder.node(0)?);
    }
    if rebuilder.items.next().is_some() {
        return Err(StoryError::SerializationError(
            "malformed story payload: trailing items".to_string(),
        ));
    }
    Ok(DslDocument::new(wire.name, nodes))
}

// =============================================================================
// ENCODE / DECODE
// =============================================================================

/// Encode a document as header + obfuscated payload.
pub fn document_to_bytes(
    document: &DslDocument,
    table: &DecodeTable,
) -> Result<Vec<u8>, StoryError> {
    let mut payload = postcard::to_stdvec(&to_wire(document)?)
        .map_err(|e| StoryError::SerializationError(e.to_string()))?;
    let hash = blake3::hash(&payload);
    table.apply(&mut payload);

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(MAGIC_BYTES);
    bytes.push(FORMAT_VERSION);
    bytes.extend_from_slice(hash.as_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Decode a document produced by [`document_to_bytes`].
///
/// A wrong decode table fails the hash check.
pub fn document_from_bytes(bytes: &[u8], table: &DecodeTable) -> Result<DslDocument, StoryError> {
    if bytes.is_empty() {
        return Err(StoryError::EmptyDocument);
    }
    if bytes.len() < HEADER_SIZE {
        return Err(StoryError::SerializationError(format!(
            "Data too short: minimum {} bytes required",
            HEADER_SIZE
        )));
    }
    if bytes.len() > MAX_DOCUMENT_SIZE {
        return Err(StoryError::SerializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    if &bytes[0..4] != MAGIC_BYTES {
        return Err(StoryError::SerializationError(
            "Invalid magic bytes".to_string(),
        ));
    }
    if bytes[4] != FORMAT_VERSION {
        return Err(StoryError::SerializationError(format!(
            "Unsupported version: {} (expected {})",
            bytes[4], FORMAT_VERSION
        )));
    }

    let mut payload = bytes[HEADER_SIZE..].to_vec();
    table.apply(&mut payload);
    if blake3::hash(&payload).as_bytes()[..] != bytes[5..HEADER_SIZE] {
        return Err(StoryError::SerializationError(
            "Payload hash mismatch (wrong decode table or corrupted data)".to_string(),
        ));
    }

    let wire: WireDocument = postcard::from_bytes(&payload).map_err(|e| {
        StoryError::SerializationError(format!("Failed to decode story document: {}", e))
    })?;
    from_wire(wire)
}

/// Encode a document as base64 story code.
pub fn document_to_code(document: &DslDocument, table: &DecodeTable) -> Result<String, StoryError> {
    Ok(STANDARD.encode(document_to_bytes(document, table)?))
}

/// Decode base64 story code.
pub fn document_from_code(code: &str, table: &DecodeTable) -> Result<DslDocument, StoryError> {
    let code = code.trim();
    if code.is_empty() {
        return Err(StoryError::EmptyDocument);
    }
    if code.len() > MAX_DOCUMENT_SIZE {
        return Err(StoryError::SerializationError(format!(
            "Story code length {} exceeds maximum allowed {}",
            code.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    let bytes = STANDARD
        .decode(code)
        .map_err(|e| StoryError::SerializationError(format!("Invalid story code: {}", e)))?;
    document_from_bytes(&bytes, table)
}

// =============================================================================
// TESTS
// =============================================================================
