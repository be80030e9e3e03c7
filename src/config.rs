//! Configuration loading and management.

use crate::collab::Identity;
use crate::model::Role;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Project configuration (ptw/config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_project_name")]
    pub name: String,
}

fn default_project_name() -> String {
    "site-safety".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root directory for sessions and reports (ptw/)
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("ptw")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
        }
    }
}

impl PathsConfig {
    /// In-progress wizard sessions (ptw/sessions/)
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_root.join("sessions")
    }

    /// Submitted reports (ptw/reports/)
    pub fn reports_dir(&self) -> PathBuf {
        self.data_root.join("reports")
    }
}

/// Acting user; `--as` overrides the role for one invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_name")]
    pub name: String,
    #[serde(default)]
    pub role: Role,
}

fn default_identity_name() -> String {
    "Field Worker".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: default_identity_name(),
            role: Role::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default)]
    pub id_strategy: IdStrategy,
}

/// Report id suffix strategy
///
/// - `Random`: `{PREFIX}-{timestamp}-{rand8}` (default)
/// - `AuthorHash`: `{PREFIX}-{timestamp}-{hash4}{rand4}` (groups a reporter's reports)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdStrategy {
    #[default]
    Random,
    AuthorHash,
}

impl IdStrategy {
    /// Suffix for a new report id
    pub fn suffix(&self, author: &str) -> String {
        match self {
            Self::Random => format!(
                "{}{}",
                Self::generate_random_suffix(),
                Self::generate_random_suffix()
            ),
            Self::AuthorHash => format!(
                "{}{}",
                Self::author_hash(author),
                Self::generate_random_suffix()
            ),
        }
    }

    /// First 4 hex chars of sha256(author name)
    pub fn author_hash(author: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(author.trim().as_bytes());
        let result = hasher.finalize();
        format!("{:02x}{:02x}", result[0], result[1])
    }

    /// Generate a random 4-char hex suffix
    pub fn generate_random_suffix() -> String {
        use rand::RngExt;
        let mut rng = rand::rng();
        let bytes: [u8; 2] = rng.random();
        format!("{:02x}{:02x}", bytes[0], bytes[1])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    /// Seconds to wait for the data root lock
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,
}

fn default_lock_timeout() -> u64 {
    10
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout(),
        }
    }
}

impl Config {
    /// Load config from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(PathBuf::from)
            .or_else(Self::find_config)
            .unwrap_or_else(|| PathBuf::from("ptw/config.toml"));

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config: {}", config_path.display()))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", config_path.display()))?;
            config.anchor_to(&config_path);
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Find config file by walking up directory tree
    fn find_config() -> Option<PathBuf> {
        let mut current = std::env::current_dir().ok()?;
        loop {
            let config_path = current.join("ptw/config.toml");
            if config_path.exists() {
                return Some(config_path);
            }
            if !current.pop() {
                return None;
            }
        }
    }

    /// Resolve a relative data root against the project directory, i.e. the
    /// parent of the directory holding `config.toml`.
    fn anchor_to(&mut self, config_path: &Path) {
        if self.paths.data_root.is_absolute() {
            return;
        }
        let project_dir = config_path
            .parent()
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty());
        if let Some(dir) = project_dir {
            self.paths.data_root = dir.join(&self.paths.data_root);
        }
    }

    pub fn sessions_dir(&self) -> PathBuf {
        self.paths.sessions_dir()
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.paths.reports_dir()
    }

    /// Identity for this invocation, with an optional role override
    pub fn identity(&self, role_override: Option<Role>) -> Identity {
        Identity {
            name: self.identity.name.clone(),
            role: role_override.unwrap_or(self.identity.role),
        }
    }

    /// Generate default config TOML
    pub fn default_toml() -> &'static str {
        r#"[project]
name = "site-safety"

[paths]
data_root = "ptw"

[identity]
name = "Field Worker"
# worker | receiver | issuer | safety-officer
role = "worker"

[reports]
# - random: INC-YYYYMMDDHHMMSS-{rand8}
# - author-hash: INC-YYYYMMDDHHMMSS-{hash4}{rand4}
id_strategy = "random"

[concurrency]
lock_timeout_secs = 10
"#
    }
}
