//! # Document Model
//!
//! The parsed form of a story source, shared by the text and binary formats.
//!
//! ```text
//! DslDocument
//!   └── DslNode            (id = name of the first call, e.g. "story")
//!         └── FunctionData (one per chained segment: if { } else { })
//!               ├── CallData   name + params
//!               └── statements: Vec<DslNode>
//! ```
//!
//! The registry only looks at the top level: the node id and whether the
//! first segment carries a call with parameters. Everything below is the
//! story's own script and is carried along untouched.

use crate::primitives::STORY_TAGS;
use serde::{Deserialize, Serialize};

/// A parameter value of a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DslValue {
    /// A bare identifier (`greet`).
    Ident(String),
    /// A numeric literal, kept as written (`1.5`, `-3`).
    Number(String),
    /// A string literal without its quotes.
    Str(String),
    /// A nested call (`wait(100)`).
    Call(CallData),
}

impl DslValue {
    /// Literal text of the value; `None` for nested calls.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Ident(s) | Self::Number(s) | Self::Str(s) => Some(s),
            Self::Call(_) => None,
        }
    }
}

/// A call expression: `name(param, param, ...)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    pub name: String,
    pub params: Vec<DslValue>,
}

impl CallData {
    /// Create a call with the given name and parameters.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<DslValue>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// True if the call has at least one parameter.
    #[must_use]
    pub fn has_params(&self) -> bool {
        !self.params.is_empty()
    }

    /// Get the parameter at `index`.
    #[must_use]
    pub fn param(&self, index: usize) -> Option<&DslValue> {
        self.params.get(index)
    }
}

/// One segment of a statement: a call head and an optional block body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FunctionData {
    pub call: Option<CallData>,
    pub statements: Vec<DslNode>,
}

impl FunctionData {
    /// Create a segment headed by `call` with the given body.
    #[must_use]
    pub fn new(call: CallData, statements: Vec<DslNode>) -> Self {
        Self {
            call: Some(call),
            statements,
        }
    }
}

/// A statement: one or more chained segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DslNode {
    pub id: String,
    pub functions: Vec<FunctionData>,
}

impl DslNode {
    /// Build a node from its segments; the id is the first call's name.
    #[must_use]
    pub fn from_functions(functions: Vec<FunctionData>) -> Self {
        let id = functions
            .first()
            .and_then(|f| f.call.as_ref())
            .map(|c| c.name.clone())
            .unwrap_or_default();
        Self { id, functions }
    }

    /// The first segment, if any.
    #[must_use]
    pub fn first(&self) -> Option<&FunctionData> {
        self.functions.first()
    }

    /// The call of the first segment, if any.
    #[must_use]
    pub fn first_call(&self) -> Option<&CallData> {
        self.first().and_then(|f| f.call.as_ref())
    }

    /// True if the node id marks a story definition (`story` or `script`).
    #[must_use]
    pub fn is_story(&self) -> bool {
        STORY_TAGS.contains(&self.id.as_str())
    }
}

/// A parsed source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DslDocument {
    /// Source name for diagnostics (file path, `storytext`, ...).
    pub name: String,
    pub nodes: Vec<DslNode>,
}

impl DslDocument {
    /// Create a document from top-level nodes.
    #[must_use]
    pub fn new(name: impl Into<String>, nodes: Vec<DslNode>) -> Self {
        Self {
            name: name.into(),
            nodes,
        }
    }

    /// Top-level nodes tagged as story definitions, in source order.
    pub fn story_nodes(&self) -> impl Iterator<Item = &DslNode> {
        self.nodes.iter().filter(|n| n.is_story())
    }
}
