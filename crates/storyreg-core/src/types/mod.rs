//! # Core Type Definitions
//!
//! This module contains the shared types of the story registry:
//! - Scene identifiers (`SceneId`)
//! - Story identity helpers (`qualify_story_id`)
//! - Error types (`StoryError`)
//!
//! ## Determinism Guarantees
//!
//! All identifier types implement `Ord` so they can key `BTreeMap`s and
//! listings come out in a stable order.

use crate::primitives::NAMESPACE_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a scene.
/// A scene groups the story definitions that may be instanced together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SceneId(pub i32);

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SceneId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// Compose the final story identifier from a raw id and an optional namespace.
///
/// `Some("npc1")` + `"intro"` gives `"npc1:intro"`. A missing or empty
/// namespace leaves the raw id untouched.
#[must_use]
pub fn qualify_story_id(namespace: Option<&str>, raw_id: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}{}{}", ns, NAMESPACE_SEPARATOR, raw_id),
        _ => raw_id.to_string(),
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised while turning a source into a parsed document.
///
/// The registry itself never fails once it holds a parsed tree; these errors
/// belong to the loading layers (text parser, binary codec, file access).
#[derive(Debug, Error)]
pub enum StoryError {
    /// The text source is not valid story DSL.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// The source contained no content at all.
    #[error("Empty document")]
    EmptyDocument,

    /// A binary payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// File access failed.
    #[error("I/O error: {0}")]
    IoError(String),

    /// A story is not configured for a scene.
    ///
    /// The registry reports this as `None`; callers that require the story
    /// turn it into this error.
    #[error("Story '{0}' is not configured for scene {1}")]
    StoryNotFound(String, SceneId),

    /// Configuration is malformed or inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// =============================================================================
// TESTS
// =============================================================================
