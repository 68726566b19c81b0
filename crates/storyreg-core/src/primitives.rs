//! # Registry Primitives
//!
//! Hardcoded constants for the story registry.
//!
//! These values are compiled into the binary and are immutable at runtime.

/// Node ids that mark a top-level story definition.
///
/// Any other top-level node is ignored by the registry scan.
pub const STORY_TAGS: [&str; 2] = ["story", "script"];

/// Separator between a namespace and a raw story id (`npc1:intro`).
pub const NAMESPACE_SEPARATOR: char = ':';

/// Document key used for stories loaded from in-memory text.
pub const TEXT_DOCUMENT_KEY: &str = "storytext";

/// Document key used for stories loaded from encoded story code.
pub const CODE_DOCUMENT_KEY: &str = "storycode";

/// Magic bytes for the binary story format header.
///
/// - Header = Magic Bytes ("STRY") + Version (u8) + payload hash.
pub const MAGIC_BYTES: &[u8; 4] = b"STRY";

/// Current binary format version.
///
/// Increment this when making breaking changes to the payload layout.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a story source file or payload (16 MB).
///
/// Checked before reading or decoding so a bad file cannot exhaust memory.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth of blocks and call parameter lists.
///
/// Applies to text parsing and to binary payload decoding alike.
pub const MAX_NESTING_DEPTH: usize = 64;
