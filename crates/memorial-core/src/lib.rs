//! Core of the memorial board. Posts come in two flavours, clips and
//! messages, and every post carries an owner credential that is handed out
//! exactly once, to whoever created it. Everything the server and the cli
//! share lives here.
mod error;
pub mod auth;
pub mod config;
pub mod credential;
pub mod db;
pub mod feed;
pub mod post;
pub mod service;
pub mod store;
pub mod vault;
pub mod video;

use std::{fmt::Display, str::FromStr};

pub use error::{MemorialError, MemorialResult};

pub mod constant {
    pub const MAX_TITLE_LEN: usize = 100;
    pub const MAX_BODY_LEN: usize = 1000;
    pub const MAX_AUTHOR_LEN: usize = 60;
    pub const MAX_VIDEO_REF_LEN: usize = 300;
    /// Largest picture that may be attached to a message, in bytes.
    pub const MAX_IMAGE_BYTES: usize = 1024 * 1024;
    /// Multipart field carrying an attached picture.
    pub const IMAGE_FIELD: &str = "file";
    pub const DEFAULT_AUTHOR: &str = "Anonymous";
    pub const CREDENTIAL_BYTES: usize = 16;
    pub const CONFIG_DIR: &str = ".memorial";
    pub const CONFIG_FILE: &str = "memorial.toml";
    pub const CONFIG_ENV: &str = "MEMORIALCONF";
    pub const ADMIN_ENV: &str = "MEMORIAL_ADMIN_PASSWORD";
    pub const VAULT_FILE: &str = "vault.json";
    pub const PREVIEW_TIMEOUT_SECS: u64 = 3;
    /// Header carrying the owner credential on delete.
    pub const OWNER_HEADER: &str = "x-delete-token";
    /// Header carrying the administrative credential on delete.
    pub const ADMIN_HEADER: &str = "x-admin-password";
}

/// The two collections kept by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Clip,
    Message,
}

impl ResourceType {
    pub const ALL: [ResourceType; 2] = [ResourceType::Clip, ResourceType::Message];

    /// Name of the collection, as used in urls and on disk.
    pub fn collection(&self) -> &'static str {
        match self {
            ResourceType::Clip => "clips",
            ResourceType::Message => "messages",
        }
    }
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.collection())
    }
}

impl FromStr for ResourceType {
    type Err = MemorialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "clips" | "clip" => Ok(ResourceType::Clip),
            "messages" | "message" => Ok(ResourceType::Message),
            other => Err(MemorialError::UnknownResource {
                name: other.to_string(),
            }),
        }
    }
}
