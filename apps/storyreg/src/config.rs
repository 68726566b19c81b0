//! # Configuration
//!
//! `storyreg.toml` describes which story files belong to which scene and how
//! the files are encoded.
//!
//! ```toml
//! format = "binary"
//! decode_table = "s3cret"
//! default_namespace = "main"
//!
//! [[scene]]
//! id = 1
//! files = ["stories/intro.dsl", "stories/town.dsl"]
//!
//! [[scene]]
//! id = 2
//! namespace = "npc1"
//! files = ["stories/npc.dsl"]
//! ```
//!
//! Relative file paths are resolved against the directory of the config file.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use storyreg_core::primitives::NAMESPACE_SEPARATOR;
use storyreg_core::{DecodeTable, DocumentFormat, SceneId, SourceKind, StoryError, StoryLoader};

/// Default config file name looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "storyreg.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// Source encoding of story files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FormatKind {
    #[default]
    Text,
    Binary,
}

impl From<FormatKind> for SourceKind {
    fn from(kind: FormatKind) -> Self {
        match kind {
            FormatKind::Text => SourceKind::Text,
            FormatKind::Binary => SourceKind::Binary,
        }
    }
}

/// One `[[scene]]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    pub id: i32,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoryregConfig {
    pub format: FormatKind,
    pub decode_table: Option<String>,
    pub default_namespace: Option<String>,
    #[serde(rename = "scene")]
    pub scenes: Vec<SceneConfig>,
}

impl StoryregConfig {
    /// Parse and validate configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, StoryError> {
        let config: Self =
            toml::from_str(text).map_err(|e| StoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file, resolving scene files relative to it.
    pub fn load(path: &Path) -> Result<Self, StoryError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            StoryError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(StoryError::InvalidConfig(format!(
                "config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoryError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Load the config at `path`, or the default file if it exists, or an
    /// empty config.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, StoryError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn validate(&self) -> Result<(), StoryError> {
        let namespaces = self
            .scenes
            .iter()
            .filter_map(|s| s.namespace.as_deref())
            .chain(self.default_namespace.as_deref());
        for ns in namespaces {
            if ns.contains(NAMESPACE_SEPARATOR) {
                return Err(StoryError::InvalidConfig(format!(
                    "namespace '{}' must not contain '{}'",
                    ns, NAMESPACE_SEPARATOR
                )));
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        for scene in &mut self.scenes {
            for file in &mut scene.files {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
    }

    /// Decode table for binary files and story code; empty when unset.
    #[must_use]
    pub fn decode_table(&self) -> DecodeTable {
        self.decode_table
            .as_deref()
            .map(DecodeTable::from)
            .unwrap_or_default()
    }

    /// Source format described by this config.
    ///
    /// The decode table is kept in text mode too: story code is binary.
    #[must_use]
    pub fn document_format(&self) -> DocumentFormat {
        DocumentFormat {
            kind: self.format.into(),
            decode_table: self.decode_table(),
        }
    }

    /// Namespace for a scene entry, falling back to `default_namespace`.
    #[must_use]
    pub fn namespace_for<'a>(&'a self, scene: &'a SceneConfig) -> Option<&'a str> {
        scene
            .namespace
            .as_deref()
            .or(self.default_namespace.as_deref())
    }
}

/// Load every configured scene. Returns the number of files loaded.
pub fn load_configured_scenes(config: &StoryregConfig, loader: &StoryLoader) -> usize {
    config
        .scenes
        .iter()
        .map(|scene| {
            let loaded =
                loader.load_stories(SceneId(scene.id), config.namespace_for(scene), &scene.files);
            tracing::info!(
                scene_id = scene.id,
                loaded,
                configured = scene.files.len(),
                "scene loaded"
            );
            loaded
        })
        .sum()
}
