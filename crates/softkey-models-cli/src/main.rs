//! Softkey Models CLI - provision and inspect a prediction-model store.
//!
//! Thin wrapper over the `softkey-models` library for desktop hosts and
//! smoke tests: list, activate, install, remove and select models.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use softkey_models::{EngineType, ModelStoreError};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "softkey-models")]
#[command(about = "Manage on-device prediction models")]
struct Args {
    /// Models root directory (defaults to <data dir>/softkey-models/models)
    #[arg(long, global = true)]
    models_root: Option<PathBuf>,

    /// Directory holding bundled model assets
    #[arg(long, global = true)]
    assets_dir: Option<PathBuf>,

    /// SQLite database for digests and selections
    /// (defaults to <data dir>/softkey-models/state.sqlite)
    #[arg(long, global = true)]
    state_db: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every discovered model
    List,

    /// Resolve and verify the active model for an engine type
    Activate {
        /// ngram or neural
        engine: EngineType,
    },

    /// Download and install a model bundle
    Install {
        /// Catalog URL to look the model up in
        #[arg(long, requires = "id", conflicts_with_all = ["bundle_url", "manifest"])]
        catalog: Option<String>,

        /// Model id inside the catalog
        #[arg(long, requires = "catalog")]
        id: Option<String>,

        /// Direct bundle URL (http, https, file or a local path)
        #[arg(long, requires = "manifest")]
        bundle_url: Option<String>,

        /// Manifest describing the bundle
        #[arg(long, requires = "bundle_url")]
        manifest: Option<PathBuf>,

        /// Expected bundle SHA-256
        #[arg(long, requires = "bundle_url")]
        sha256: Option<String>,
    },

    /// Remove an installed model
    Remove {
        id: String,
    },

    /// Show, set or clear the selected model for an engine type
    Select {
        /// ngram or neural
        engine: EngineType,

        /// Model id to select
        #[arg(conflicts_with = "clear")]
        id: Option<String>,

        /// Clear the selection
        #[arg(long)]
        clear: bool,
    },
}

/// Resolved filesystem locations for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paths {
    models_root: PathBuf,
    assets_dir: Option<PathBuf>,
    state_db: PathBuf,
}

fn resolve_paths(args: &Args) -> Result<Paths> {
    let base = || -> Result<PathBuf> {
        dirs::data_dir()
            .map(|dir| dir.join("softkey-models"))
            .ok_or_else(|| anyhow::anyhow!("No data directory; pass --models-root and --state-db"))
    };

    let models_root = match &args.models_root {
        Some(path) => path.clone(),
        None => base()?.join("models"),
    };
    let state_db = match &args.state_db {
        Some(path) => path.clone(),
        None => base()?.join("state.sqlite"),
    };

    Ok(Paths {
        models_root,
        assets_dir: args.assets_dir.clone(),
        state_db,
    })
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let result = resolve_paths(&args).and_then(|paths| commands::run(&paths, args.command));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ModelStoreError>() {
                Some(store_error) => error!("{} error: {}", store_error.kind(), store_error),
                None => error!("{:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_install_from_catalog() {
        let args = Args::try_parse_from([
            "softkey-models",
            "--models-root",
            "/tmp/models",
            "install",
            "--catalog",
            "https://example.com/catalog.json",
            "--id",
            "en-3gram",
        ])
        .unwrap();

        match args.command {
            Command::Install { catalog, id, bundle_url, .. } => {
                assert_eq!(catalog.as_deref(), Some("https://example.com/catalog.json"));
                assert_eq!(id.as_deref(), Some("en-3gram"));
                assert_eq!(bundle_url, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_rejects_mixed_install_sources() {
        assert!(Args::try_parse_from([
            "softkey-models",
            "install",
            "--catalog",
            "https://example.com/catalog.json",
            "--id",
            "en",
            "--bundle-url",
            "https://example.com/en.zip",
        ])
        .is_err());
        assert!(Args::try_parse_from(["softkey-models", "install", "--id", "en"]).is_err());
    }

    #[test]
    fn test_parse_engine_aliases() {
        let args = Args::try_parse_from(["softkey-models", "activate", "presage_ngram"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Activate { engine: EngineType::Ngram }
        ));
        assert!(Args::try_parse_from(["softkey-models", "activate", "markov"]).is_err());
    }

    #[test]
    fn test_explicit_paths_win() {
        let args = Args::try_parse_from([
            "softkey-models",
            "list",
            "--models-root",
            "/m",
            "--state-db",
            "/s.sqlite",
        ])
        .unwrap();
        let paths = resolve_paths(&args).unwrap();
        assert_eq!(paths.models_root, PathBuf::from("/m"));
        assert_eq!(paths.state_db, PathBuf::from("/s.sqlite"));
        assert_eq!(paths.assets_dir, None);
    }
}
