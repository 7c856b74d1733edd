use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::matching::ScoringWeights;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    pub scoring: ScoringWeights,
    /// Default slot length when a caller asks for candidate slots without one.
    pub candidate_slot_minutes: u32,
    /// How long a writer waits on another connection's lock before failing.
    pub busy_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            scoring: ScoringWeights::default(),
            candidate_slot_minutes: 60,
            busy_timeout_ms: 5_000,
        }
    }
}

/// JSON-backed settings. A missing or unreadable file yields defaults.
pub struct SettingsStore {
    path: Option<PathBuf>,
    data: RwLock<EngineSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings at {}: {err}", path.display());
                EngineSettings::default()
            })
        } else {
            EngineSettings::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
        })
    }

    /// Settings that live only in memory; updates are never written anywhere.
    pub fn ephemeral(settings: EngineSettings) -> Self {
        Self {
            path: None,
            data: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> EngineSettings {
        self.read().clone()
    }

    pub fn scoring_weights(&self) -> ScoringWeights {
        self.read().scoring.clone()
    }

    pub fn candidate_slot_minutes(&self) -> u32 {
        self.read().candidate_slot_minutes
    }

    pub fn update_scoring_weights(&self, weights: ScoringWeights) -> Result<()> {
        let mut guard = self.write();
        guard.scoring = weights;
        self.persist(&guard)
    }

    pub fn update(&self, settings: EngineSettings) -> Result<()> {
        let mut guard = self.write();
        *guard = settings;
        self.persist(&guard)
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineSettings> {
        self.data.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, EngineSettings> {
        self.data.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn persist(&self, data: &EngineSettings) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }
}
