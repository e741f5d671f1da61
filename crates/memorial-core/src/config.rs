use anyhow::Context;
use home::home_dir;
use serde::{Deserialize, Serialize};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    constant::{ADMIN_ENV, CONFIG_DIR, CONFIG_ENV, CONFIG_FILE, PREVIEW_TIMEOUT_SECS},
    credential::AdminCredential,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorialConfig {
    /// Socket address used to serve. Should be <ip>:<port>
    /// Example: 127.0.0.1:8080
    pub socket: SocketAddr,
    /// Path to sqlite Db. Posts are kept in memory when unset.
    pub db: Option<PathBuf>,
    /// Keep at most this many posts per collection. Zero is refused.
    pub retention: Option<NonZeroUsize>,
    /// Upper bound on a single preview lookup.
    pub preview_timeout_secs: u64,
    /// Host the clip player is embedded in; the player refuses other hosts.
    pub public_host: String,
    pub log_level: String,
    /// Secret that may delete any post. Prefer setting it through the
    /// environment; see `constant::ADMIN_ENV`.
    pub admin_credential: Option<String>,
}

impl Default for MemorialConfig {
    fn default() -> Self {
        Self {
            socket: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8080),
            db: None,
            retention: None,
            preview_timeout_secs: PREVIEW_TIMEOUT_SECS,
            public_host: "localhost".into(),
            log_level: "info".into(),
            admin_credential: None,
        }
    }
}

impl MemorialConfig {
    /// Where the config file is looked for when no path is given: the
    /// `MEMORIALCONF` env var, else `~/.memorial/memorial.toml`.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let home_dir = home_dir()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        home_dir.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Read the config at `path` (or the default path). A missing file
    /// yields the defaults; a malformed one is an error. The admin secret
    /// from the environment wins over the file.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(Self::default_path);
        let mut config = if path.exists() {
            let buf = std::fs::read_to_string(&path)
                .with_context(|| format!("Unable to read config file {:?}", path))?;
            Self::from_toml(&buf).with_context(|| format!("Malformed config file {:?}", path))?
        } else {
            Self::default()
        };
        if let Ok(secret) = std::env::var(ADMIN_ENV) {
            config.admin_credential = Some(secret);
        }
        Ok(config)
    }

    pub fn from_toml(buf: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(buf)?)
    }

    /// Write the config to path
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// The configured admin secret, if it is set and not blank.
    pub fn admin(&self) -> Option<AdminCredential> {
        self.admin_credential.clone().and_then(AdminCredential::new)
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_secs(self.preview_timeout_secs)
    }
}
