//! Command table: trigger → reply template, hot-reloadable
//!
//! The active table is an immutable [`CommandTable`] behind an `Arc`. A reload
//! builds and validates a complete new table first and only then swaps the
//! pointer, so a reader holding a snapshot always sees one whole table.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::storage::{PersistenceBackend, StorageError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read command source: {0}")]
    Storage(#[from] StorageError),

    #[error("invalid command JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("command #{index} has an empty action")]
    EmptyAction { index: usize },

    #[error("trigger '{trigger}' is defined by both '{first}' and '{second}'")]
    DuplicateTrigger {
        trigger: String,
        first: String,
        second: String,
    },
}

/// One entry of `commands.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub action: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub reply: String,
}

pub(crate) fn normalize_trigger(trigger: &str) -> String {
    trigger.trim().to_lowercase()
}

/// Validated, immutable set of commands
#[derive(Debug, Default)]
pub struct CommandTable {
    definitions: Vec<CommandDefinition>,
    /// normalized trigger → index into `definitions`
    lookup: HashMap<String, usize>,
}

impl CommandTable {
    /// Build a table, rejecting empty actions and any shared trigger
    pub fn from_definitions(definitions: Vec<CommandDefinition>) -> Result<Self, LoadError> {
        let mut lookup: HashMap<String, usize> = HashMap::new();

        for (index, def) in definitions.iter().enumerate() {
            let action = normalize_trigger(&def.action);
            if action.is_empty() {
                return Err(LoadError::EmptyAction { index });
            }

            let triggers = std::iter::once(action)
                .chain(def.aliases.iter().map(|a| normalize_trigger(a)))
                .filter(|t| !t.is_empty());

            for trigger in triggers {
                if let Some(&existing) = lookup.get(&trigger) {
                    return Err(LoadError::DuplicateTrigger {
                        trigger,
                        first: definitions[existing].action.clone(),
                        second: def.action.clone(),
                    });
                }
                lookup.insert(trigger, index);
            }
        }

        Ok(Self {
            definitions,
            lookup,
        })
    }

    /// Parse and validate the JSON array format of `commands.json`
    pub fn from_json(bytes: &[u8]) -> Result<Self, LoadError> {
        let definitions: Vec<CommandDefinition> = serde_json::from_slice(bytes)?;
        Self::from_definitions(definitions)
    }

    /// Case-insensitive exact match against every action and alias
    pub fn lookup(&self, trigger: &str) -> Option<&CommandDefinition> {
        self.lookup
            .get(&normalize_trigger(trigger))
            .map(|&index| &self.definitions[index])
    }

    /// Total triggers (actions + aliases)
    pub fn trigger_count(&self) -> usize {
        self.lookup.len()
    }

    pub fn command_count(&self) -> usize {
        self.definitions.len()
    }

    pub fn definitions(&self) -> &[CommandDefinition] {
        &self.definitions
    }
}

/// Where command definitions are (re)loaded from
pub struct CommandSource {
    backend: Arc<dyn PersistenceBackend>,
    key: String,
}

impl CommandSource {
    pub fn new(backend: Arc<dyn PersistenceBackend>, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
        }
    }

    /// A missing source yields an empty table; malformed content is an error
    pub async fn load(&self) -> Result<CommandTable, LoadError> {
        match self.backend.read(&self.key).await? {
            Some(bytes) => CommandTable::from_json(&bytes),
            None => {
                log::warn!(
                    "⚠️  Commands source '{}' not found. No commands loaded.",
                    self.key
                );
                Ok(CommandTable::default())
            }
        }
    }

    async fn store(&self, bytes: &[u8]) -> Result<(), LoadError> {
        self.backend.write(&self.key, bytes).await?;
        Ok(())
    }
}

/// Holder of the active table, shared between the event loop and the dashboard
pub struct CommandRegistry {
    active: RwLock<Arc<CommandTable>>,
    source: CommandSource,
}

impl CommandRegistry {
    /// Load the initial table; startup fails if the source is malformed
    pub async fn load(source: CommandSource) -> Result<Self, LoadError> {
        let table = source.load().await?;
        log::info!(
            "📋 Loaded {} commands ({} triggers)",
            table.command_count(),
            table.trigger_count()
        );
        Ok(Self {
            active: RwLock::new(Arc::new(table)),
            source,
        })
    }

    /// The table as of now; stays valid and unchanged across later reloads
    pub fn snapshot(&self) -> Arc<CommandTable> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the active table with a freshly loaded one
    ///
    /// On error the previous table stays active. Returns the new trigger count.
    pub async fn reload(&self) -> Result<usize, LoadError> {
        let table = Arc::new(self.source.load().await?);
        let trigger_count = table.trigger_count();
        self.swap(table);
        log::info!("📋 Reloaded commands ({} triggers)", trigger_count);
        Ok(trigger_count)
    }

    /// Validate `json` as a command table, write it to the source, then reload
    ///
    /// Nothing is written when validation fails. Returns the new trigger count.
    pub async fn save(&self, json: &[u8]) -> Result<usize, LoadError> {
        let table = CommandTable::from_json(json)?;
        let bytes = serde_json::to_vec_pretty(table.definitions())?;
        self.source.store(&bytes).await?;
        self.reload().await
    }

    fn swap(&self, table: Arc<CommandTable>) {
        match self.active.write() {
            Ok(mut guard) => *guard = table,
            Err(poisoned) => *poisoned.into_inner() = table,
        }
    }
}
