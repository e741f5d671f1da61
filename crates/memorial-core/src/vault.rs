//! Client-side store of owner credentials, keyed by post id. The board keeps
//! no sessions, so losing this file means losing the ability to delete
//! one's own posts. That is accepted.
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use crate::{
    constant::{CONFIG_DIR, VAULT_FILE},
    ResourceType,
};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialVault {
    #[serde(default)]
    clips: BTreeMap<String, String>,
    #[serde(default)]
    messages: BTreeMap<String, String>,
    #[serde(skip)]
    path: PathBuf,
}

impl CredentialVault {
    /// Default location, `~/.memorial/vault.json`.
    pub fn default_path() -> PathBuf {
        let home_dir = home::home_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        home_dir.join(CONFIG_DIR).join(VAULT_FILE)
    }

    /// Load the vault at `path`. A missing or unreadable file gives an empty
    /// vault rather than an error.
    pub fn load(path: &Path) -> Self {
        let mut vault = match std::fs::read_to_string(path) {
            Ok(buf) => serde_json::from_str::<CredentialVault>(&buf).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable credential vault {:?}: {e}", path);
                CredentialVault::default()
            }),
            Err(_) => CredentialVault::default(),
        };
        vault.path = path.to_path_buf();
        vault
    }

    /// Write the vault back to where it was loaded from.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    pub fn insert(&mut self, kind: ResourceType, id: &str, credential: &str) {
        self.entries_mut(kind)
            .insert(id.to_string(), credential.to_string());
    }

    pub fn get(&self, kind: ResourceType, id: &str) -> Option<&str> {
        self.entries(kind).get(id).map(String::as_str)
    }

    pub fn remove(&mut self, kind: ResourceType, id: &str) -> Option<String> {
        self.entries_mut(kind).remove(id)
    }

    /// True if this client created the post.
    pub fn owns(&self, kind: ResourceType, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    fn entries(&self, kind: ResourceType) -> &BTreeMap<String, String> {
        match kind {
            ResourceType::Clip => &self.clips,
            ResourceType::Message => &self.messages,
        }
    }

    fn entries_mut(&mut self, kind: ResourceType) -> &mut BTreeMap<String, String> {
        match kind {
            ResourceType::Clip => &mut self.clips,
            ResourceType::Message => &mut self.messages,
        }
    }
}
