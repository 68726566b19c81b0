//! # Story Registry
//!
//! Two-level cache of story definitions.
//!
//! - The **document cache** maps a document key (file path, `storytext`,
//!   `storycode`) to the definitions parsed from it. A key is scanned once;
//!   later loads of the same key reuse the cached definitions.
//! - The **scene cache** maps a scene to the union of the definitions of
//!   every document loaded into it, last loader wins per story id.
//!
//! Definitions are stored as `Arc<S>` and shared between both caches. They
//! are never handed out for mutation: `new_instance` returns a fresh clone.
//!
//! ## Locking
//!
//! One mutex guards both maps. Every operation holds it for its whole
//! critical section and does no I/O while holding it; parsing source text
//! happens in the loader before the registry is called.

use crate::dsl::DslDocument;
use crate::instance::{Story, StoryInstance};
use crate::types::{SceneId, qualify_story_id};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Definitions keyed by final (namespace-qualified) story id.
pub type StoryMap<S = StoryInstance> = BTreeMap<String, Arc<S>>;

/// The registry as shared by the composition root and its collaborators.
pub type SharedRegistry<S = StoryInstance> = Arc<StoryRegistry<S>>;

/// Result of a `load_document` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOutcome {
    /// True if the document was scanned by this call, false on a cache hit.
    pub parsed: bool,
    /// Number of definitions merged into the target scene.
    pub merged: usize,
}

struct RegistryState<S> {
    scenes: BTreeMap<SceneId, StoryMap<S>>,
    documents: BTreeMap<String, StoryMap<S>>,
    scan_count: u64,
}

impl<S> RegistryState<S> {
    /// Copy a cached document's definitions into a scene, last write wins.
    fn merge_into_scene(&mut self, document_key: &str, scene_id: SceneId) -> Option<usize> {
        let stories = self.documents.get(document_key)?;
        let scene = self.scenes.entry(scene_id).or_default();
        for (story_id, story) in stories {
            scene.insert(story_id.clone(), Arc::clone(story));
        }
        Some(stories.len())
    }
}

impl<S> Default for RegistryState<S> {
    fn default() -> Self {
        Self {
            scenes: BTreeMap::new(),
            documents: BTreeMap::new(),
            scan_count: 0,
        }
    }
}

/// Parse-once, clone-many cache of story definitions per document and scene.
///
/// Create one with [`StoryRegistry::new`] for an independent registry, or
/// [`StoryRegistry::shared`] for the one the application passes around.
pub struct StoryRegistry<S: Story = StoryInstance> {
    state: Mutex<RegistryState<S>>,
}

impl<S: Story> Default for StoryRegistry<S> {
    fn default() -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
        }
    }
}

impl<S: Story> fmt::Debug for StoryRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StoryRegistry")
            .field("scenes", &state.scenes.len())
            .field("documents", &state.documents.len())
            .field("scan_count", &state.scan_count)
            .finish()
    }
}

impl<S: Story> StoryRegistry<S> {
    /// Create a new, empty, independent registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new, empty registry behind an `Arc` for sharing.
    #[must_use]
    pub fn shared() -> SharedRegistry<S> {
        Arc::new(Self::new())
    }

    // The maps are only ever mutated by whole-statement map operations, so a
    // panic in another thread cannot leave them half-written.
    fn lock(&self) -> MutexGuard<'_, RegistryState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register the stories of a parsed document and merge them into a scene.
    ///
    /// The first call for a `document_key` scans `document`: every top-level
    /// `story`/`script` node whose first call has at least one parameter
    /// becomes a definition, renamed to `namespace:id` when a non-empty
    /// namespace is given. Other nodes are skipped. Later calls with the same
    /// key ignore `document` and reuse the cached definitions.
    ///
    /// Either way the document's definitions are then merged into
    /// `scene_id`, overwriting definitions with the same id.
    pub fn load_document(
        &self,
        document_key: &str,
        scene_id: SceneId,
        namespace: Option<&str>,
        document: &DslDocument,
    ) -> LoadOutcome {
        let namespace = namespace.filter(|ns| !ns.is_empty());
        let mut state = self.lock();

        let parsed = !state.documents.contains_key(document_key);
        if parsed {
            let stories = scan_document::<S>(document, namespace, scene_id);
            state.scan_count = state.scan_count.saturating_add(1);
            state.documents.insert(document_key.to_string(), stories);
        } else {
            tracing::debug!(document = document_key, scene_id = %scene_id, "document already parsed");
        }

        let merged = state.merge_into_scene(document_key, scene_id).unwrap_or(0);
        LoadOutcome { parsed, merged }
    }

    /// Merge an already parsed document into a scene without a source tree.
    ///
    /// Returns `None` if `document_key` has not been parsed, in which case
    /// the caller must parse the source and use `load_document`. Lets
    /// loaders skip reading a file whose definitions are already cached.
    pub fn reload_document(&self, document_key: &str, scene_id: SceneId) -> Option<LoadOutcome> {
        let merged = self.lock().merge_into_scene(document_key, scene_id)?;
        tracing::debug!(document = document_key, scene_id = %scene_id, "merged cached document");
        Some(LoadOutcome {
            parsed: false,
            merged,
        })
    }

    /// True if `story_id` is configured for `scene_id`.
    #[must_use]
    pub fn instance_exists(&self, story_id: &str, scene_id: SceneId) -> bool {
        self.lock()
            .scenes
            .get(&scene_id)
            .is_some_and(|scene| scene.contains_key(story_id))
    }

    /// Clone a working copy of `story_id` for `scene_id`.
    ///
    /// Returns `None` if the story is not configured for that scene.
    #[must_use]
    pub fn new_instance(&self, story_id: &str, scene_id: SceneId) -> Option<S> {
        let definition = self
            .lock()
            .scenes
            .get(&scene_id)
            .and_then(|scene| scene.get(story_id))
            .map(Arc::clone)?;
        Some(definition.clone_instance())
    }

    /// Snapshot of the definitions configured for a scene.
    ///
    /// The map is a copy: later loads do not show up in it. `None` means the
    /// scene was never loaded.
    #[must_use]
    pub fn list_instances(&self, scene_id: SceneId) -> Option<StoryMap<S>> {
        self.lock().scenes.get(&scene_id).cloned()
    }

    /// Snapshot of the definitions parsed from a document.
    #[must_use]
    pub fn list_instances_by_document(&self, document_key: &str) -> Option<StoryMap<S>> {
        self.lock().documents.get(document_key).cloned()
    }

    /// Loaded scenes, in ascending order.
    #[must_use]
    pub fn scene_ids(&self) -> Vec<SceneId> {
        self.lock().scenes.keys().copied().collect()
    }

    /// Parsed document keys, in ascending order.
    #[must_use]
    pub fn document_keys(&self) -> Vec<String> {
        self.lock().documents.keys().cloned().collect()
    }

    /// Number of document scans since creation or the last `clear_all`.
    #[must_use]
    pub fn scan_count(&self) -> u64 {
        self.lock().scan_count
    }

    /// True if nothing is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let state = self.lock();
        state.scenes.is_empty() && state.documents.is_empty()
    }

    /// Drop every scene and document.
    ///
    /// Instances already handed out are unaffected. Documents loaded after
    /// this are scanned again.
    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.scenes.clear();
        state.documents.clear();
        state.scan_count = 0;
    }
}

fn scan_document<S: Story>(
    document: &DslDocument,
    namespace: Option<&str>,
    scene_id: SceneId,
) -> StoryMap<S> {
    let mut stories = StoryMap::new();

    for node in document.story_nodes() {
        if !node.first_call().is_some_and(|call| call.has_params()) {
            continue;
        }
        let Some(mut story) = S::from_node(node) else {
            continue;
        };
        if let Some(ns) = namespace {
            story.set_namespace(ns.to_string());
            let qualified = qualify_story_id(Some(ns), story.story_id());
            story.set_story_id(qualified);
        }

        let story_id = story.story_id().to_string();
        tracing::info!(story_id = %story_id, scene_id = %scene_id, "parsed story");
        stories.insert(story_id, Arc::new(story));
    }

    stories
}

// =============================================================================
// TESTS
// =============================================================================
