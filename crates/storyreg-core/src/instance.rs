//! # Story Instances
//!
//! The `Story` trait is the seam between the registry and whatever runs a
//! story. The registry only needs to build a definition from a parsed node,
//! rename it into a namespace, and deep-clone it into a working copy.
//!
//! `StoryInstance` is the default implementation: it keeps the story's script
//! as parsed and a small bag of mutable state. Running the script is the
//! host's business.

use crate::dsl::DslNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A story definition that the registry can cache and clone.
pub trait Story: Send + Sync + 'static {
    /// Build a definition from a top-level `story`/`script` node.
    ///
    /// Returns `None` if the node does not describe a usable story.
    fn from_node(node: &DslNode) -> Option<Self>
    where
        Self: Sized;

    /// Current story id (raw or namespace-qualified).
    fn story_id(&self) -> &str;

    /// Replace the story id.
    fn set_story_id(&mut self, story_id: String);

    /// Namespace the story was loaded under; empty when none.
    fn namespace(&self) -> &str;

    /// Set the namespace.
    fn set_namespace(&mut self, namespace: String);

    /// Produce an independent working copy.
    ///
    /// Mutating the copy must never be observable through `self`.
    fn clone_instance(&self) -> Self
    where
        Self: Sized;
}

/// Default story type: parsed script plus per-run state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryInstance {
    story_id: String,
    namespace: String,
    /// Statements of the definition body, in source order.
    script: Vec<DslNode>,
    variables: BTreeMap<String, String>,
    terminated: bool,
}

impl StoryInstance {
    /// Create an instance with an id and script.
    #[must_use]
    pub fn new(story_id: impl Into<String>, script: Vec<DslNode>) -> Self {
        Self {
            story_id: story_id.into(),
            namespace: String::new(),
            script,
            variables: BTreeMap::new(),
            terminated: false,
        }
    }

    /// The story's statements.
    #[must_use]
    pub fn script(&self) -> &[DslNode] {
        &self.script
    }

    /// Ids of the top-level statements (`onmessage`, `say`, ...).
    pub fn statement_ids(&self) -> impl Iterator<Item = &str> {
        self.script.iter().map(|n| n.id.as_str())
    }

    /// Read a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Set a variable, returning the previous value.
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.variables.insert(name.into(), value.into())
    }

    /// All variables in name order.
    #[must_use]
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Mark the instance as finished.
    pub fn terminate(&mut self) {
        self.terminated = true;
    }
}

impl Story for StoryInstance {
    /// The story id is the text of the first parameter of the first call:
    /// `story(greet) { ... }` is story `greet`.
    fn from_node(node: &DslNode) -> Option<Self> {
        let first = node.first()?;
        let raw_id = first.call.as_ref()?.param(0)?.as_text()?;
        if raw_id.is_empty() {
            return None;
        }
        Some(Self::new(raw_id, first.statements.clone()))
    }

    fn story_id(&self) -> &str {
        &self.story_id
    }

    fn set_story_id(&mut self, story_id: String) {
        self.story_id = story_id;
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn set_namespace(&mut self, namespace: String) {
        self.namespace = namespace;
    }

    fn clone_instance(&self) -> Self {
        self.clone()
    }
}
