//! # storyreg CLI Module
//!
//! ## Available Commands
//!
//! - `load` - Load story files into a scene and show what it contains
//! - `list` - List the stories of a scene or a document
//! - `instance` - Create a story instance and print it
//! - `encode` - Compile a text story file into binary or story code
//! - `check` - Parse story files and report diagnostics

mod commands;

use crate::config::{FormatKind, StoryregConfig, load_configured_scenes};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use storyreg_core::{SharedRegistry, StoryError, StoryLoader, StoryRegistry};

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// storyreg - scene-scoped story script registry
///
/// Loads story scripts once and hands out independent instances per scene.
#[derive(Parser, Debug)]
#[command(name = "storyreg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the configuration file (default: ./storyreg.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Story source format, overrides the config file ("text" or "binary")
    #[arg(short = 'F', long, global = true)]
    pub format: Option<FormatKind>,

    /// Decode table for binary files and story code, overrides the config file
    #[arg(long, global = true)]
    pub decode_table: Option<String>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load story files into a scene
    Load {
        /// Target scene
        #[arg(short, long)]
        scene: i32,

        /// Namespace for the loaded stories
        #[arg(short, long)]
        namespace: Option<String>,

        /// Story files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List stories of a scene or a document
    List {
        /// Scene to list
        #[arg(short, long, conflicts_with = "document")]
        scene: Option<i32>,

        /// Document key (file path) to list
        #[arg(short, long)]
        document: Option<String>,
    },

    /// Create an instance of a story and print it
    Instance {
        /// Scene the story is configured for
        #[arg(short, long)]
        scene: i32,

        /// Final story id (namespace:id when namespaced)
        story: String,
    },

    /// Compile a text story file into the binary format
    Encode {
        /// Text story file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file; prints base64 story code when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse story files and report diagnostics
    Check {
        /// Story files
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Build the configuration from the config file and CLI overrides.
pub fn resolve_config(cli: &Cli) -> Result<StoryregConfig, StoryError> {
    let mut config = StoryregConfig::load_or_default(cli.config.as_deref())?;
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(table) = &cli.decode_table {
        config.decode_table = Some(table.clone());
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
///
/// This is the composition root: the registry and loader live here and are
/// passed to the commands.
pub fn execute(cli: Cli) -> Result<(), StoryError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    let registry: SharedRegistry = StoryRegistry::shared();
    let loader = StoryLoader::new(registry, config.document_format());

    match cli.command {
        Some(Commands::Check { files }) => cmd_check(&config, &files, json_mode),
        Some(Commands::Encode { input, output }) => {
            cmd_encode(&config, &input, output.as_deref())
        }
        Some(Commands::Load {
            scene,
            namespace,
            files,
        }) => {
            load_configured_scenes(&config, &loader);
            cmd_load(&loader, scene, namespace.as_deref(), &files, json_mode)
        }
        Some(Commands::List { scene, document }) => {
            load_configured_scenes(&config, &loader);
            cmd_list(&loader, scene, document.as_deref(), json_mode)
        }
        Some(Commands::Instance { scene, story }) => {
            load_configured_scenes(&config, &loader);
            cmd_instance(&loader, scene, &story, json_mode)
        }
        None => {
            // No subcommand - list configured scenes by default
            load_configured_scenes(&config, &loader);
            cmd_list(&loader, None, None, json_mode)
        }
    }
}
