//! Process-lifetime key-value store and JSON export of recorded samples.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default export file name.
pub const SAMPLES_FILE: &str = "heart-rate-data.json";

/// One recorded heart-rate reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HrSample {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    pub bpm: u16,
}

impl HrSample {
    pub fn now(bpm: u16) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self { timestamp, bpm }
    }
}

/// Small in-memory store for app state like the last connected device.
/// Values are arbitrary JSON; nothing is persisted across runs.
#[derive(Debug, Default)]
pub struct DataStore {
    entries: HashMap<String, Value>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    /// Returns whether the key existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}

/// Write the recorded samples as pretty-printed JSON.
pub fn save_samples(path: &Path, samples: &[HrSample]) -> Result<()> {
    let json = serde_json::to_string_pretty(samples)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
