//! # storyreg - story script registry tool
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/storyreg (THE BINARY)            │
//! │                                                      │
//! │   ┌──────────────┐        ┌──────────────────────┐   │
//! │   │ CLI (clap)   │        │ storyreg.toml (toml) │   │
//! │   └──────┬───────┘        └──────────┬───────────┘   │
//! │          └──────────────┬────────────┘               │
//! │                         ▼                            │
//! │                 ┌───────────────┐                    │
//! │                 │ storyreg-core │                    │
//! │                 └───────────────┘                    │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! storyreg load -s 1 stories/intro.dsl stories/town.dsl
//! storyreg list -s 1
//! storyreg instance -s 2 npc1:intro
//! storyreg encode -i stories/intro.dsl -o intro.bin --decode-table s3cret
//! storyreg check stories/*.dsl
//! ```

use clap::Parser;
use storyreg::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // STORYREG_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STORYREG_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "storyreg=info,storyreg_core=info".into());

    // Logs go to stderr; stdout carries command output.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┬─┐┬ ┬┬─┐┌─┐┌─┐
  └─┐ │ │ │├┬┘└┬┘├┬┘├┤ │ ┬
  └─┘ ┴ └─┘┴└─ ┴ ┴└─└─┘└─┘  v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
