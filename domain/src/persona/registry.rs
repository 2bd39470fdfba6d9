//! Persona Registry
//!
//! Holds every version of every persona. Reads take a shared lock and clone
//! the requested config; `put` takes the exclusive lock, so version numbers
//! per persona are assigned one writer at a time and stay monotonic and
//! gap-free. History is append-only: a step record that names
//! `(persona_id, persona_version)` can always be resolved later.

use super::entities::PersonaConfig;
use crate::core::error::DomainError;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Versioned persona store (read-mostly, single-writer)
#[derive(Debug, Default)]
pub struct PersonaRegistry {
    histories: RwLock<HashMap<String, Vec<PersonaConfig>>>,
}

impl PersonaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry and register each persona under its own id.
    pub fn with_personas(
        personas: impl IntoIterator<Item = PersonaConfig>,
    ) -> Result<Self, DomainError> {
        let registry = Self::new();
        for persona in personas {
            let id = persona.id.clone();
            registry.put(&id, persona)?;
        }
        Ok(registry)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<PersonaConfig>>> {
        // A panic while holding the lock cannot leave a half-written history:
        // `put` only pushes a fully built config.
        self.histories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<PersonaConfig>>> {
        self.histories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Latest version of a persona.
    pub fn get(&self, id: &str) -> Result<PersonaConfig, DomainError> {
        self.read()
            .get(id)
            .and_then(|history| history.last())
            .cloned()
            .ok_or_else(|| DomainError::PersonaNotFound(id.to_string()))
    }

    /// A specific historical version of a persona.
    pub fn get_version(&self, id: &str, version: u32) -> Result<PersonaConfig, DomainError> {
        let histories = self.read();
        let history = histories
            .get(id)
            .ok_or_else(|| DomainError::PersonaNotFound(id.to_string()))?;
        history
            .iter()
            .find(|p| p.version == version)
            .cloned()
            .ok_or_else(|| DomainError::PersonaVersionNotFound {
                id: id.to_string(),
                version,
            })
    }

    /// Register a new version of a persona and return its version number.
    ///
    /// Never overwrites: the previous versions stay retrievable through
    /// [`get_version`](Self::get_version) and [`history`](Self::history).
    pub fn put(&self, id: &str, mut config: PersonaConfig) -> Result<u32, DomainError> {
        config.id = id.to_string();
        config.validate()?;

        let mut histories = self.write();
        let history = histories.entry(id.to_string()).or_default();
        let version = history.last().map_or(1, |latest| latest.version + 1);
        config.version = version;
        history.push(config);
        Ok(version)
    }

    /// All versions of a persona, oldest first.
    pub fn history(&self, id: &str) -> Vec<PersonaConfig> {
        self.read().get(id).cloned().unwrap_or_default()
    }

    /// Latest version number of every registered persona.
    pub fn latest_versions(&self) -> BTreeMap<String, u32> {
        self.read()
            .iter()
            .filter_map(|(id, history)| history.last().map(|p| (id.clone(), p.version)))
            .collect()
    }

    /// Snapshot registry where each listed persona resolves to the pinned
    /// version. Used to replay a past run against the exact configs it used.
    pub fn pinned(&self, pins: &[(String, u32)]) -> Result<PersonaRegistry, DomainError> {
        let mut snapshot = HashMap::new();
        for (id, version) in pins {
            let config = self.get_version(id, *version)?;
            snapshot.insert(id.clone(), vec![config]);
        }
        Ok(PersonaRegistry {
            histories: RwLock::new(snapshot),
        })
    }

    /// Fail with [`DomainError::PersonaNotFound`] for the first missing id.
    pub fn ensure_registered<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), DomainError> {
        let histories = self.read();
        for id in ids {
            if !histories.contains_key(id) {
                return Err(DomainError::PersonaNotFound(id.to_string()));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
