//! Command implementations.

use crate::{Command, Paths};
use anyhow::{bail, Context, Result};
use softkey_models::model_store::manifest;
use softkey_models::{CatalogEntry, EngineType, ModelLock, ModelStore, SqliteKeyValueStore};
use std::sync::Arc;
use tracing::{debug, info};

fn open_store(paths: &Paths) -> Result<ModelStore> {
    let kv = SqliteKeyValueStore::open(&paths.state_db)
        .with_context(|| format!("opening state database {}", paths.state_db.display()))?;
    let mut builder = ModelStore::builder(&paths.models_root).key_value_store(Arc::new(kv));
    if let Some(assets_dir) = &paths.assets_dir {
        builder = builder.asset_dir(assets_dir);
    }
    debug!("Models root: {}", paths.models_root.display());
    Ok(builder.build()?)
}

pub fn run(paths: &Paths, command: Command) -> Result<()> {
    let store = open_store(paths)?;
    match command {
        Command::List => list(&store),
        Command::Activate { engine } => activate(&store, engine),
        Command::Install {
            catalog,
            id,
            bundle_url,
            manifest: manifest_file,
            sha256,
        } => {
            let entry = match (catalog, id, bundle_url, manifest_file) {
                (Some(catalog), Some(id), None, None) => from_catalog(&store, &catalog, &id)?,
                (None, None, Some(bundle_url), Some(manifest_path)) => {
                    let definition = manifest::read_manifest(&manifest_path)?;
                    CatalogEntry::new(definition, bundle_url, sha256.unwrap_or_default())
                }
                _ => bail!("install needs either --catalog and --id, or --bundle-url and --manifest"),
            };
            install(&store, &entry)
        }
        Command::Remove { id } => {
            let _lock = ModelLock::acquire(store.models_root(), &id)?;
            store.remove_model(&id)?;
            println!("removed {}", id);
            Ok(())
        }
        Command::Select { engine, id, clear } => select(&store, engine, id, clear),
    }
}

fn list(store: &ModelStore) -> Result<()> {
    let definitions = store.list_available_models();
    if definitions.is_empty() {
        println!("no models installed");
        return Ok(());
    }

    for definition in definitions {
        let selected = store.get_selected_model_id(definition.engine_type())?;
        let marker = if selected.as_deref() == Some(definition.id()) {
            "*"
        } else {
            " "
        };
        println!(
            "{} {:<40} {:<7} {}",
            marker,
            definition.id(),
            definition.engine_type(),
            definition.label()
        );
    }
    Ok(())
}

fn activate(store: &ModelStore, engine: EngineType) -> Result<()> {
    let active = match store.ensure_active_model(engine) {
        Some(active) => active,
        None => bail!("no usable {} model", engine),
    };

    println!("{} {}", active.definition().id(), active.directory().display());
    for (file_type, path) in active.files() {
        println!("  {:<18} {}", file_type, path.display());
    }
    Ok(())
}

fn from_catalog(store: &ModelStore, catalog_url: &str, id: &str) -> Result<CatalogEntry> {
    let entries = store
        .fetch_catalog(catalog_url)
        .with_context(|| format!("fetching catalog {}", catalog_url))?;
    match entries.into_iter().find(|entry| entry.definition.id() == id) {
        Some(entry) => Ok(entry),
        None => bail!("model {} is not in catalog {}", id, catalog_url),
    }
}

fn install(store: &ModelStore, entry: &CatalogEntry) -> Result<()> {
    let _lock = ModelLock::acquire(store.models_root(), entry.definition.id())?;
    info!("Downloading {}", entry.bundle_url);
    let definition = store.download_and_install(entry)?;
    println!("installed {} ({})", definition.id(), definition.engine_type());
    Ok(())
}

fn select(store: &ModelStore, engine: EngineType, id: Option<String>, clear: bool) -> Result<()> {
    if clear {
        store.clear_selected_model_id(engine)?;
        println!("cleared {} selection", engine);
        return Ok(());
    }

    match id {
        Some(id) => {
            let known = store
                .list_available_models()
                .iter()
                .any(|d| d.id() == id && d.engine_type() == engine);
            if !known {
                bail!("no installed {} model named {}", engine, id);
            }
            store.persist_selected_model_id(engine, &id)?;
            println!("selected {} for {}", id, engine);
        }
        None => match store.get_selected_model_id(engine)? {
            Some(id) => println!("{}", id),
            None => println!("no {} model selected", engine),
        },
    }
    Ok(())
}
