//! permtree command line
//!
//! Drives one editing session against JSON files in a data directory:
//! - `show <scope>` prints the tree with grant marks and counts
//! - `toggle <scope> <id>...` toggles nodes in order and submits the result

#![warn(missing_docs)]

pub mod config;
pub mod render;
pub mod store;

use anyhow::Context;
use clap::{Parser, Subcommand};
use permtree_core::{GrantChange, GrantStore, SyncCoordinator, TreeSource};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use store::FileStore;

/// Command line arguments
#[derive(Debug, Parser)]
#[command(name = "permtree", version, about = "Edit hierarchical grant sets")]
pub struct Cli {
    /// Directory holding `trees/` and `grants/`
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// TOML session config
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `permtree_core=debug`
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Operation
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the tree with grant marks
    Show {
        /// Scope to load
        scope: String,
        /// Start with every node collapsed
        #[arg(long)]
        collapsed: bool,
    },
    /// Toggle nodes in order, then submit
    Toggle {
        /// Scope to edit
        scope: String,
        /// Node ids to toggle
        #[arg(required = true)]
        ids: Vec<String>,
        /// Print the encoded grants without saving
        #[arg(long)]
        dry_run: bool,
    },
}

/// Run a parsed command and return its output
///
/// # Errors
/// Fails on config, load, toggle or submit errors.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let mut config = config::load_config(cli.config.as_deref()).await?;
    let store = Arc::new(FileStore::new(&cli.data_dir));

    match cli.command {
        Command::Show { scope, collapsed } => {
            if collapsed {
                config.expand_on_load = false;
            }
            let mut session = open(&scope, &store, config);
            let loaded = session
                .load()
                .await
                .with_context(|| format!("loading scope {scope}"))?;
            Ok(render::render(loaded))
        }
        Command::Toggle {
            scope,
            ids,
            dry_run,
        } => {
            let mut session = open(&scope, &store, config);
            session
                .load()
                .await
                .with_context(|| format!("loading scope {scope}"))?;

            let mut out = String::new();
            for id in &ids {
                let change = session
                    .toggle(id)
                    .with_context(|| format!("toggling {id}"))?;
                match change {
                    GrantChange::Granted { affected } => writeln!(out, "granted {id} (+{affected})")?,
                    GrantChange::Revoked { affected } => writeln!(out, "revoked {id} (-{affected})")?,
                }
            }

            let granted = if dry_run {
                let encoded = session
                    .session()
                    .map(|s| s.selection().encode())
                    .unwrap_or_default();
                out.push_str("dry run, not saved\n");
                encoded
            } else {
                let receipt = session
                    .submit()
                    .await
                    .with_context(|| format!("submitting scope {scope}"))?;
                writeln!(out, "saved {} grants", receipt.granted.len())?;
                receipt.granted
            };

            for id in granted {
                writeln!(out, "  {id}")?;
            }
            Ok(out)
        }
    }
}

fn open(
    scope: &str,
    store: &Arc<FileStore>,
    config: permtree_core::SessionConfig,
) -> SyncCoordinator {
    let source: Arc<dyn TreeSource> = Arc::clone(store) as Arc<dyn TreeSource>;
    let grants: Arc<dyn GrantStore> = Arc::clone(store) as Arc<dyn GrantStore>;
    SyncCoordinator::new(scope, source, grants, config)
}
