//! Thin logging facade over `tracing`.
//!
//! Call sites use short free functions (`info`/`warn`/`error`) so the rest
//! of the engine never has to pick a target or level by hand — mirrors the
//! shape of a plain `crate::logger::warn(...)` call without pulling the
//! `tracing` macros into every module.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs the global `tracing` subscriber once. Safe to call repeatedly
/// (e.g. once per test).
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
            .ok();
    });
}

pub fn info(msg: &str) {
    tracing::info!("{msg}");
}

pub fn warn(msg: &str) {
    tracing::warn!("{msg}");
}

pub fn error(msg: &str) {
    tracing::error!("{msg}");
}

pub fn debug(msg: &str) {
    tracing::debug!("{msg}");
}
