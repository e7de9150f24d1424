//! Small binary harness around the [`tas_table`] library.
//!
//! Boots a table, loads persisted state (if configured), runs schema
//! migration, resets to the deterministic test scene, and logs a short
//! summary — enough to exercise the whole pipeline from a terminal
//! without any GUI, matching spec.md's framing of the core as a headless
//! engine (spec §1).

use std::path::PathBuf;
use tas_table::config::EngineConfig;
use tas_table::{actions, Table};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tas_table::logger::init();

    let config = load_config();
    let table = Table::new(config.clone());

    if let Some(path) = &config.persistence_path {
        if let Err(err) = load_persisted(&table, path).await {
            tas_table::logger::error(&format!("failed to load persisted state from {path:?}: {err}"));
        }
    }

    let migrated = table.run_migrations();
    tas_table::logger::info(&format!("migration backfilled {migrated} object(s)"));

    let created = actions::reset_to_test_scene(table.store());
    tas_table::logger::info(&format!("reset-to-test-scene created {} objects", created.len()));

    tas_table::logger::info(&format!("actor id: {}", table.store().get_actor_id()));
    Ok(())
}

fn load_config() -> EngineConfig {
    let path = std::env::var("TAS_TABLE_CONFIG").ok().map(PathBuf::from);
    let Some(path) = path else { return EngineConfig::default() };

    match std::fs::read_to_string(&path) {
        Ok(raw) => EngineConfig::from_toml_str(&raw).unwrap_or_else(|err| {
            tas_table::logger::warn(&format!("invalid config at {path:?}: {err}; using defaults"));
            EngineConfig::default()
        }),
        Err(_) => EngineConfig::default(),
    }
}

async fn load_persisted(table: &Table, path: &std::path::Path) -> anyhow::Result<()> {
    use tas_table::persistence::{PersistenceAdapter, SqlitePersistence};

    let adapter = SqlitePersistence::connect(path.to_path_buf(), table.store().get_actor_id()).await?;
    adapter.on_ready().await?;
    for update in adapter.load().await? {
        table.store().apply_update(&update)?;
    }
    // Selection claims don't survive a reload (spec §8 P3): this session
    // wasn't the one holding them.
    table.evict_stale_selections();
    Ok(())
}
