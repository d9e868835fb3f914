//! Persistence collaborators: the PP ledger store and the roster source.
//! The engine only ever sees materialised rosters and per-slot PP arrays.
use crate::errors::PersistenceError;
use crate::roster::{Roster, RosterTemplate};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Stored PP for one roster slot: an ordered move list with parallel arrays.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SlotPp {
    pub moves: Vec<String>,
    pub current: Vec<u8>,
    pub min: Vec<u8>,
    pub max: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct RosterPp {
    pub slots: Vec<SlotPp>,
}

#[async_trait]
pub trait PpStore: Send + Sync {
    /// Stored PP for a roster, `None` when nothing has been saved yet.
    async fn load_pp(&self, roster_id: &str) -> Result<Option<RosterPp>, PersistenceError>;
    async fn save_pp(&self, roster_id: &str, pp: &RosterPp) -> Result<(), PersistenceError>;
}

#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn load_roster(&self, account: &str) -> Result<Roster, PersistenceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryPpStore {
    records: RwLock<HashMap<String, RosterPp>>,
}

impl InMemoryPpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PpStore for InMemoryPpStore {
    async fn load_pp(&self, roster_id: &str) -> Result<Option<RosterPp>, PersistenceError> {
        Ok(self.records.read().await.get(roster_id).cloned())
    }

    async fn save_pp(&self, roster_id: &str, pp: &RosterPp) -> Result<(), PersistenceError> {
        self.records
            .write()
            .await
            .insert(roster_id.to_string(), pp.clone());
        debug!(roster_id, "saved PP in memory");
        Ok(())
    }
}

/// One JSON document per roster under a directory.
#[derive(Debug, Clone)]
pub struct JsonFilePpStore {
    dir: PathBuf,
}

impl JsonFilePpStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, roster_id: &str) -> PathBuf {
        let file: String = roster_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", file))
    }
}

#[async_trait]
impl PpStore for JsonFilePpStore {
    async fn load_pp(&self, roster_id: &str) -> Result<Option<RosterPp>, PersistenceError> {
        let path = self.path_for(roster_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_pp(&self, roster_id: &str, pp: &RosterPp) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(pp)?;
        tokio::fs::write(self.path_for(roster_id), bytes).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRosterSource {
    rosters: RwLock<HashMap<String, RosterTemplate>>,
}

impl InMemoryRosterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account: &str, template: RosterTemplate) {
        self.rosters
            .write()
            .await
            .insert(account.to_string(), template);
    }
}

#[async_trait]
impl RosterSource for InMemoryRosterSource {
    async fn load_roster(&self, account: &str) -> Result<Roster, PersistenceError> {
        self.rosters
            .read()
            .await
            .get(account)
            .map(Roster::from_template)
            .ok_or_else(|| PersistenceError::NotFound(account.to_string()))
    }
}
