//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::config::StoryregConfig;
use std::path::{Path, PathBuf};
use storyreg_core::formats::{document_to_bytes, document_to_code};
use storyreg_core::{SceneId, Story, StoryError, StoryLoader, StoryMap, parse_document, read_source};

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

fn story_ids(stories: &StoryMap) -> Vec<&str> {
    stories.keys().map(String::as_str).collect()
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Load story files into a scene and show the scene.
///
/// Fails only if no file could be loaded.
pub fn cmd_load(
    loader: &StoryLoader,
    scene: i32,
    namespace: Option<&str>,
    files: &[PathBuf],
    json_mode: bool,
) -> Result<(), StoryError> {
    let scene_id = SceneId(scene);
    let mut loaded = Vec::new();
    let mut failed = Vec::new();

    for file in files {
        match loader.load_story(file, scene_id, namespace) {
            Ok(outcome) => loaded.push((file, outcome)),
            Err(e) => failed.push((file, e)),
        }
    }

    if json_mode {
        let stories = loader.registry().list_instances(scene_id).unwrap_or_default();
        print_json(&serde_json::json!({
            "scene": scene,
            "loaded": loaded.iter().map(|(file, outcome)| serde_json::json!({
                "file": file.to_string_lossy(),
                "parsed": outcome.parsed,
                "merged": outcome.merged,
            })).collect::<Vec<_>>(),
            "failed": failed.iter().map(|(file, e)| serde_json::json!({
                "file": file.to_string_lossy(),
                "error": e.to_string(),
            })).collect::<Vec<_>>(),
            "stories": story_ids(&stories),
        }));
    } else {
        for (file, outcome) in &loaded {
            println!(
                "Loaded {:?}: {} stories{}",
                file,
                outcome.merged,
                if outcome.parsed { "" } else { " (cached)" }
            );
        }
        for (file, e) in &failed {
            println!("Failed {:?}: {}", file, e);
        }
        println!();
        print_scene(loader, scene_id);
    }

    if loaded.is_empty() {
        if let Some((_, e)) = failed.into_iter().next() {
            return Err(e);
        }
    }
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

fn print_scene(loader: &StoryLoader, scene_id: SceneId) {
    match loader.registry().list_instances(scene_id) {
        Some(stories) => {
            println!("Scene {} ({} stories)", scene_id, stories.len());
            for (story_id, story) in &stories {
                println!("  {:<24} {} statements", story_id, story.script().len());
            }
        }
        None => println!("Scene {} is not loaded", scene_id),
    }
}

/// List the stories of a scene, a document, or every scene.
pub fn cmd_list(
    loader: &StoryLoader,
    scene: Option<i32>,
    document: Option<&str>,
    json_mode: bool,
) -> Result<(), StoryError> {
    let registry = loader.registry();

    if let Some(key) = document {
        let stories = registry.list_instances_by_document(key);
        if json_mode {
            print_json(&serde_json::json!({
                "document": key,
                "stories": stories.as_ref().map(story_ids),
            }));
        } else {
            match stories {
                Some(stories) => {
                    println!("Document {} ({} stories)", key, stories.len());
                    for story_id in stories.keys() {
                        println!("  {}", story_id);
                    }
                }
                None => println!("Document {} is not loaded", key),
            }
        }
        return Ok(());
    }

    let scene_ids = match scene {
        Some(scene) => vec![SceneId(scene)],
        None => registry.scene_ids(),
    };

    if json_mode {
        let scenes: Vec<_> = scene_ids
            .iter()
            .map(|scene_id| {
                let stories = registry.list_instances(*scene_id);
                serde_json::json!({
                    "scene": scene_id.0,
                    "stories": stories.as_ref().map(story_ids),
                })
            })
            .collect();
        print_json(&serde_json::json!({
            "documents": registry.document_keys(),
            "scenes": scenes,
        }));
        return Ok(());
    }

    if scene_ids.is_empty() {
        println!("No scenes loaded");
    }
    for scene_id in scene_ids {
        print_scene(loader, scene_id);
    }
    Ok(())
}

// =============================================================================
// INSTANCE COMMAND
// =============================================================================

/// Create an instance of a story and print it.
pub fn cmd_instance(
    loader: &StoryLoader,
    scene: i32,
    story_id: &str,
    json_mode: bool,
) -> Result<(), StoryError> {
    let scene_id = SceneId(scene);
    let instance = loader
        .new_story_instance(story_id, scene_id)
        .ok_or_else(|| StoryError::StoryNotFound(story_id.to_string(), scene_id))?;

    if json_mode {
        let value = serde_json::to_value(&instance)
            .map_err(|e| StoryError::SerializationError(e.to_string()))?;
        print_json(&value);
        return Ok(());
    }

    println!("Story:      {}", instance.story_id());
    println!(
        "Namespace:  {}",
        if instance.namespace().is_empty() {
            "-"
        } else {
            instance.namespace()
        }
    );
    println!("Scene:      {}", scene_id);
    println!("Statements:");
    for statement in instance.statement_ids() {
        println!("  {}", statement);
    }
    Ok(())
}

// =============================================================================
// ENCODE COMMAND
// =============================================================================

/// Compile a text story file with the configured decode table, whatever the
/// configured file format.
pub fn cmd_encode(
    config: &StoryregConfig,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), StoryError> {
    let bytes = read_source(input)?;
    let source = String::from_utf8(bytes)
        .map_err(|e| StoryError::SerializationError(format!("Input is not UTF-8: {}", e)))?;
    let name = input.to_string_lossy();
    let document = parse_document(&source, &name)?;
    let table = config.decode_table();
    if table.is_empty() {
        tracing::warn!(input = %name, "encoding without a decode table");
    }

    match output {
        Some(path) => {
            let encoded = document_to_bytes(&document, &table)?;
            std::fs::write(path, &encoded).map_err(|e| {
                StoryError::IoError(format!("Write file '{}': {}", path.display(), e))
            })?;
            tracing::info!(input = %name, output = %path.display(), bytes = encoded.len(), "encoded story file");
        }
        None => println!("{}", document_to_code(&document, &table)?),
    }
    Ok(())
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Parse story files with the configured format and report what they define.
///
/// Returns the first error if any file fails.
pub fn cmd_check(
    config: &StoryregConfig,
    files: &[PathBuf],
    json_mode: bool,
) -> Result<(), StoryError> {
    let format = config.document_format();
    let mut first_error = None;
    let mut reports = Vec::new();

    for file in files {
        let name = file.to_string_lossy();
        let result = read_source(file).and_then(|bytes| format.parse_file(&bytes, &name));
        match result {
            Ok(document) => {
                let stories: Vec<String> = document
                    .story_nodes()
                    .filter_map(|node| node.first_call())
                    .filter_map(|call| call.param(0))
                    .filter_map(|id| id.as_text())
                    .map(str::to_string)
                    .collect();
                reports.push(serde_json::json!({
                    "file": name,
                    "ok": true,
                    "nodes": document.nodes.len(),
                    "stories": stories,
                }));
            }
            Err(e) => {
                reports.push(serde_json::json!({
                    "file": name,
                    "ok": false,
                    "error": e.to_string(),
                }));
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
    }

    if json_mode {
        print_json(&serde_json::Value::Array(reports));
    } else {
        for report in &reports {
            let file = report["file"].as_str().unwrap_or_default();
            match report["error"].as_str() {
                Some(error) => println!("FAIL {}: {}", file, error),
                None => println!(
                    "ok   {}: {} stories",
                    file,
                    report["stories"].as_array().map(Vec::len).unwrap_or(0)
                ),
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
