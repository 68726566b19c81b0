//! # storyreg-core
//!
//! Parse-once, clone-many registry of story scripts.
//!
//! Story sources (DSL text, binary payloads, base64 story code) are parsed
//! into a [`DslDocument`]. The [`StoryRegistry`] scans each document once,
//! keeps the resulting definitions per document and per scene, and hands out
//! an independent clone whenever a scene wants to run a story.
//!
//! ## Layout
//!
//! ```text
//!   file / text / code
//!          │
//!          ▼
//!   ┌─────────────┐  parse (no lock)  ┌──────────────┐
//!   │ StoryLoader │ ────────────────▶ │   formats    │
//!   └──────┬──────┘                   └──────────────┘
//!          │ DslDocument
//!          ▼
//!   ┌─────────────────────────────────────────────┐
//!   │ StoryRegistry (one mutex)                   │
//!   │   documents: key   → story id → Arc<S>      │
//!   │   scenes:    scene → story id → Arc<S>      │
//!   └──────────────────────┬──────────────────────┘
//!                          │ clone_instance()
//!                          ▼
//!                  caller-owned instance
//! ```
//!
//! ## Architectural Constraints
//!
//! - No async, no network, no global state: the application creates the
//!   registry and passes it around
//! - Registry operations never fail; malformed input only means fewer stories
//! - Deterministic listings (`BTreeMap` everywhere)

// =============================================================================
// MODULES
// =============================================================================

pub mod dsl;
pub mod formats;
pub mod instance;
pub mod loader;
pub mod primitives;
pub mod registry;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use dsl::{CallData, DslDocument, DslNode, DslValue, FunctionData};
pub use formats::{DecodeTable, DocumentFormat, SourceKind, parse_document};
pub use instance::{Story, StoryInstance};
pub use loader::{StoryLoader, read_source};
pub use registry::{LoadOutcome, SharedRegistry, StoryMap, StoryRegistry};
pub use types::{SceneId, StoryError, qualify_story_id};
