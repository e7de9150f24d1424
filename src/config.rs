//! Engine-wide tunables, loaded once at startup.
//!
//! Mirrors the teacher's habit of reading a handful of environment-derived
//! settings (DB path via `directories`) rather than a sprawling config
//! object — this crate's settings are the few numbers spec.md actually
//! calls out (§4.4 awareness rate, §4.7/§4.10 flush poll cap).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Awareness broadcast rate in Hz (spec §4.4 default 20 Hz).
    pub awareness_hz: f64,
    /// Upper bound on `flush`/`waitForRenderer` polling, in frames (spec §4.10).
    pub flush_poll_cap: u32,
    /// Pointer-move distance (world units) before a tentative select-tap
    /// promotes to a drag (spec §4.7).
    pub drag_activation_threshold: f64,
    /// Rotation-equality epsilon in degrees (spec §4.3, §9).
    pub rotation_epsilon: f64,
    /// Quiet interval (ms) before a disconnected actor's ghost visuals are
    /// garbage-collected (spec §4.4).
    pub awareness_gc_quiet_ms: u64,
    /// Where the sqlite-backed persistence adapter stores its file.
    pub persistence_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            awareness_hz: 20.0,
            flush_poll_cap: 100,
            drag_activation_threshold: 4.0,
            rotation_epsilon: 0.1,
            awareness_gc_quiet_ms: 3_000,
            persistence_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Default on-disk location for a given table id, under the OS data dir,
    /// matching the teacher's `directories`-based DB path resolution.
    pub fn default_table_path(table_id: &str) -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "tas-table", "tas-table")
            .map(|dirs| dirs.data_dir().join(format!("{table_id}.sqlite")))
    }
}
