//! # Source Formats
//!
//! Ways to turn a story source into a [`DslDocument`](crate::dsl::DslDocument):
//! - `text`: DSL source with line-numbered diagnostics
//! - `binary`: precompiled postcard payloads behind a decode table

pub mod binary;
pub mod text;

pub use binary::{
    DecodeTable, document_from_bytes, document_from_code, document_to_bytes, document_to_code,
};
pub use text::parse_document;

use crate::dsl::DslDocument;
use crate::types::StoryError;

/// Encoding of story files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceKind {
    /// Story DSL text.
    #[default]
    Text,
    /// Binary payloads.
    Binary,
}

/// How the loader reads story sources.
///
/// The decode table serves binary files and story code. Story code is always
/// binary, so the table applies to it whatever the file kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocumentFormat {
    pub kind: SourceKind,
    pub decode_table: DecodeTable,
}

impl DocumentFormat {
    /// Text files, story code without a decode table.
    #[must_use]
    pub fn text() -> Self {
        Self::default()
    }

    /// Binary files and story code decoded with `decode_table`.
    #[must_use]
    pub fn binary(decode_table: DecodeTable) -> Self {
        Self {
            kind: SourceKind::Binary,
            decode_table,
        }
    }

    #[must_use]
    pub fn with_decode_table(mut self, decode_table: DecodeTable) -> Self {
        self.decode_table = decode_table;
        self
    }

    /// Parse the raw bytes of a story file.
    pub fn parse_file(&self, bytes: &[u8], name: &str) -> Result<DslDocument, StoryError> {
        match self.kind {
            SourceKind::Text => {
                let source = std::str::from_utf8(bytes).map_err(|e| {
                    StoryError::SerializationError(format!("{} is not UTF-8: {}", name, e))
                })?;
                parse_document(source, name)
            }
            SourceKind::Binary => {
                let mut document = document_from_bytes(bytes, &self.decode_table)?;
                document.name = name.to_string();
                Ok(document)
            }
        }
    }

    /// Decode base64 story code with this format's decode table.
    pub fn parse_code(&self, code: &str, name: &str) -> Result<DslDocument, StoryError> {
        let mut document = document_from_code(code, &self.decode_table)?;
        document.name = name.to_string();
        Ok(document)
    }
}
