//! # Story Loader
//!
//! Caller-facing entry points that turn files, text and story code into
//! registry loads.
//!
//! - Reads and parses sources outside the registry lock
//! - Skips reading a file whose document key is already cached
//! - Logs every failure with the file and scene it concerned

use crate::formats::{DocumentFormat, SourceKind, parse_document};
use crate::instance::{Story, StoryInstance};
use crate::primitives::{CODE_DOCUMENT_KEY, MAX_DOCUMENT_SIZE, TEXT_DOCUMENT_KEY};
use crate::registry::{LoadOutcome, SharedRegistry};
use crate::types::{SceneId, StoryError};
use std::path::Path;
use std::sync::Arc;

/// Loads story sources into a shared registry using one source format.
#[derive(Debug)]
pub struct StoryLoader<S: Story = StoryInstance> {
    registry: SharedRegistry<S>,
    format: DocumentFormat,
}

impl<S: Story> Clone for StoryLoader<S> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            format: self.format.clone(),
        }
    }
}

impl<S: Story> StoryLoader<S> {
    /// Create a loader feeding `registry`.
    #[must_use]
    pub fn new(registry: SharedRegistry<S>, format: DocumentFormat) -> Self {
        Self { registry, format }
    }

    #[must_use]
    pub fn registry(&self) -> &SharedRegistry<S> {
        &self.registry
    }

    #[must_use]
    pub fn format(&self) -> &DocumentFormat {
        &self.format
    }

    /// Load several files into one scene.
    ///
    /// Failures are logged and skipped. Returns the number of files loaded.
    pub fn load_stories<P: AsRef<Path>>(
        &self,
        scene_id: SceneId,
        namespace: Option<&str>,
        files: &[P],
    ) -> usize {
        files
            .iter()
            .filter(|file| self.load_story(file, scene_id, namespace).is_ok())
            .count()
    }

    /// Load one story file into a scene. The document key is the path.
    ///
    /// An empty path is ignored.
    pub fn load_story(
        &self,
        file: impl AsRef<Path>,
        scene_id: SceneId,
        namespace: Option<&str>,
    ) -> Result<LoadOutcome, StoryError> {
        let path = file.as_ref();
        if path.as_os_str().is_empty() {
            return Ok(LoadOutcome {
                parsed: false,
                merged: 0,
            });
        }

        let key = path.to_string_lossy();
        if let Some(outcome) = self.registry.reload_document(&key, scene_id) {
            return Ok(outcome);
        }

        let result = read_source(path)
            .and_then(|bytes| self.format.parse_file(&bytes, &key))
            .map(|document| {
                self.registry
                    .load_document(&key, scene_id, namespace, &document)
            });

        if let Err(e) = &result {
            tracing::error!(file = %key, scene_id = %scene_id, error = %e, "load story failed");
        }
        result
    }

    /// Load stories from an in-memory string.
    ///
    /// In text mode the string is DSL source cached under the `storytext`
    /// document key. In binary mode it is story code and the load is the
    /// same as [`StoryLoader::load_story_code`]. Either way only the first
    /// load under a key is parsed until the registry is cleared.
    pub fn load_story_text(
        &self,
        text: &str,
        scene_id: SceneId,
        namespace: Option<&str>,
    ) -> Result<LoadOutcome, StoryError> {
        if self.format.kind == SourceKind::Binary {
            return self.load_story_code(text, scene_id, namespace);
        }

        let result = parse_document(text, TEXT_DOCUMENT_KEY).map(|document| {
            self.registry
                .load_document(TEXT_DOCUMENT_KEY, scene_id, namespace, &document)
        });

        if let Err(e) = &result {
            tracing::error!(scene_id = %scene_id, error = %e, "load story text failed");
        }
        result
    }

    /// Load stories from base64 story code with the format's decode table,
    /// whatever the file kind.
    pub fn load_story_code(
        &self,
        code: &str,
        scene_id: SceneId,
        namespace: Option<&str>,
    ) -> Result<LoadOutcome, StoryError> {
        let result = self
            .format
            .parse_code(code, CODE_DOCUMENT_KEY)
            .map(|document| {
                self.registry
                    .load_document(CODE_DOCUMENT_KEY, scene_id, namespace, &document)
            });

        if let Err(e) = &result {
            tracing::error!(scene_id = %scene_id, error = %e, "load story code failed");
        }
        result
    }

    /// True if `story_id` is configured for `scene_id`.
    #[must_use]
    pub fn exist_story(&self, story_id: &str, scene_id: SceneId) -> bool {
        self.registry.instance_exists(story_id, scene_id)
    }

    /// Clone a working copy of `story_id` for `scene_id`.
    #[must_use]
    pub fn new_story_instance(&self, story_id: &str, scene_id: SceneId) -> Option<S> {
        self.registry.new_instance(story_id, scene_id)
    }
}

/// Read a story source file after checking it is a regular file within
/// [`MAX_DOCUMENT_SIZE`].
pub fn read_source(path: &Path) -> Result<Vec<u8>, StoryError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        StoryError::IoError(format!("Cannot read '{}': {}", path.display(), e))
    })?;
    if !metadata.is_file() {
        return Err(StoryError::IoError(format!(
            "'{}' is not a regular file",
            path.display()
        )));
    }
    if metadata.len() > MAX_DOCUMENT_SIZE as u64 {
        return Err(StoryError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_DOCUMENT_SIZE
        )));
    }
    std::fs::read(path)
        .map_err(|e| StoryError::IoError(format!("Cannot read '{}': {}", path.display(), e)))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{DecodeTable, document_to_bytes, document_to_code};
    use crate::registry::StoryRegistry;
    use std::path::PathBuf;

    const GREETINGS: &str = "story(greet) { say(\"hi\"); }; story(farewell) { say(\"bye\"); };";

    fn text_loader() -> StoryLoader {
        StoryLoader::new(StoryRegistry::shared(), DocumentFormat::text())
    }

    fn write(dir: &tempfile::TempDir, name: &str, contents: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("write");
        path
    }

    #[test]
    fn load_story_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "greet.dsl", GREETINGS.as_bytes());
        let loader = text_loader();

        let outcome = loader.load_story(&path, SceneId(1), None).expect("load");

        assert!(outcome.parsed);
        assert_eq!(outcome.merged, 2);
        assert!(loader.exist_story("greet", SceneId(1)));
        let key = path.to_string_lossy().into_owned();
        assert!(loader.registry().list_instances_by_document(&key).is_some());
    }

    #[test]
    fn reloading_file_skips_reading() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "greet.dsl", GREETINGS.as_bytes());
        let loader = text_loader();
        loader.load_story(&path, SceneId(1), None).expect("load");

        // The cached definitions are used even though the file is gone.
        std::fs::remove_file(&path).expect("remove");
        let outcome = loader.load_story(&path, SceneId(2), None).expect("reload");

        assert!(!outcome.parsed);
        assert!(loader.exist_story("farewell", SceneId(2)));
        assert_eq!(loader.registry().scan_count(), 1);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = text_loader().load_story(dir.path().join("nope.dsl"), SceneId(1), None);
        assert!(matches!(result, Err(StoryError::IoError(_))));
    }

    #[test]
    fn directory_is_not_a_story_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = text_loader().load_story(dir.path(), SceneId(1), None);
        assert!(matches!(result, Err(StoryError::IoError(_))));
    }

    #[test]
    fn empty_path_is_ignored() {
        let loader = text_loader();
        let outcome = loader.load_story("", SceneId(1), None).expect("noop");
        assert_eq!(outcome.merged, 0);
        assert!(loader.registry().is_empty());
    }

    #[test]
    fn load_stories_skips_failures() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write(&dir, "good.dsl", b"story(a) { };");
        let bad = write(&dir, "bad.dsl", b"story(a {");
        let missing = dir.path().join("missing.dsl");
        let loader = text_loader();

        let loaded = loader.load_stories(SceneId(5), Some("npc"), &[good, bad, missing]);

        assert_eq!(loaded, 1);
        assert!(loader.exist_story("npc:a", SceneId(5)));
    }

    #[test]
    fn failed_parse_is_not_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "late.dsl", b"story(");
        let loader = text_loader();
        assert!(loader.load_story(&path, SceneId(1), None).is_err());

        std::fs::write(&path, b"story(late) { };").expect("rewrite");
        let outcome = loader.load_story(&path, SceneId(1), None).expect("load");
        assert!(outcome.parsed);
    }

    #[test]
    fn load_text_uses_text_key() {
        let loader = text_loader();
        loader
            .load_story_text(GREETINGS, SceneId(1), None)
            .expect("load");

        let by_doc = loader
            .registry()
            .list_instances_by_document(TEXT_DOCUMENT_KEY)
            .expect("doc");
        assert_eq!(by_doc.len(), 2);
    }

    #[test]
    fn load_text_reports_parse_error() {
        let result = text_loader().load_story_text("story(", SceneId(1), None);
        assert!(matches!(result, Err(StoryError::Parse { .. })));
    }

    #[test]
    fn binary_loader_reads_files_and_code() {
        let table = DecodeTable::from("table");
        let document = parse_document(GREETINGS, "src").expect("parse");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            &dir,
            "greet.bin",
            &document_to_bytes(&document, &table).expect("encode"),
        );
        let code = document_to_code(&document, &table).expect("code");

        let loader: StoryLoader =
            StoryLoader::new(StoryRegistry::shared(), DocumentFormat::binary(table));

        loader.load_story(&path, SceneId(1), None).expect("file");
        loader.load_story_text(&code, SceneId(2), None).expect("text as code");
        loader.load_story_code(&code, SceneId(3), Some("ns")).expect("code");

        assert!(loader.exist_story("greet", SceneId(1)));
        assert!(loader.exist_story("farewell", SceneId(2)));
        // The code load hits the document the text load cached, namespace and all.
        assert!(loader.exist_story("greet", SceneId(3)));
        assert!(!loader.exist_story("ns:greet", SceneId(3)));
    }

    #[test]
    fn binary_text_load_shares_code_document_key() {
        let table = DecodeTable::from("table");
        let first = parse_document("story(first) { };", "a").expect("parse");
        let second = parse_document("story(second) { };", "b").expect("parse");
        let loader: StoryLoader =
            StoryLoader::new(StoryRegistry::shared(), DocumentFormat::binary(table.clone()));

        let text = loader
            .load_story_text(&document_to_code(&first, &table).expect("code"), SceneId(1), None)
            .expect("text");
        let code = loader
            .load_story_code(&document_to_code(&second, &table).expect("code"), SceneId(1), None)
            .expect("code");

        assert!(text.parsed);
        assert!(!code.parsed);
        assert_eq!(loader.registry().document_keys(), vec![CODE_DOCUMENT_KEY.to_string()]);
        assert!(loader.exist_story("first", SceneId(1)));
        assert!(!loader.exist_story("second", SceneId(1)));
        assert_eq!(loader.registry().scan_count(), 1);
    }

    #[test]
    fn text_loader_decodes_code_with_configured_table() {
        let table = DecodeTable::from("k");
        let document = parse_document(GREETINGS, "src").expect("parse");
        let code = document_to_code(&document, &table).expect("code");
        let loader: StoryLoader = StoryLoader::new(
            StoryRegistry::shared(),
            DocumentFormat::text().with_decode_table(table),
        );

        loader.load_story_code(&code, SceneId(4), None).expect("code");
        loader.load_story_text(GREETINGS, SceneId(5), None).expect("text");

        assert!(loader.exist_story("greet", SceneId(4)));
        assert!(loader.exist_story("farewell", SceneId(5)));
        assert_eq!(
            loader.registry().document_keys(),
            vec![CODE_DOCUMENT_KEY.to_string(), TEXT_DOCUMENT_KEY.to_string()]
        );
    }

    #[test]
    fn read_source_checks_regular_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(&dir, "a.dsl", b"story(a) { };");
        assert_eq!(read_source(&path).expect("read"), b"story(a) { };");
        assert!(matches!(read_source(dir.path()), Err(StoryError::IoError(_))));
    }

    #[test]
    fn new_story_instance_clones() {
        let loader = text_loader();
        loader
            .load_story_text(GREETINGS, SceneId(1), None)
            .expect("load");

        let mut a = loader.new_story_instance("greet", SceneId(1)).expect("a");
        let b = loader.new_story_instance("greet", SceneId(1)).expect("b");
        a.set_variable("seen", "yes");

        assert!(b.variable("seen").is_none());
        assert!(loader.new_story_instance("greet", SceneId(2)).is_none());
    }
}
