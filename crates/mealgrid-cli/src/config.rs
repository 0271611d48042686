//! Configuration file management for mealgrid.
//!
//! Provides a TOML config file at `~/.config/mealgrid/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mealgrid_core::config::PlannerConfig;
use mealgrid_core::intent::IntentPolicy;
use mealgrid_db::config::DbConfig;

/// Profile to plan for; unset means a guest session.
pub const PROFILE_ENV: &str = "MEALGRID_PROFILE";
/// Program run as the recipe generator.
pub const GENERATOR_ENV: &str = "MEALGRID_GENERATOR";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(skip_serializing_if = "ProfileSection::is_empty")]
    pub profile: ProfileSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<GeneratorSection>,
    pub intent: IntentPolicy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_string(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProfileSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProfileSection {
    fn is_empty(&self) -> bool {
        self.name.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSection {
    pub command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the mealgrid config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/mealgrid` or
/// `~/.config/mealgrid`, never the platform-specific `dirs::config_dir()`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("mealgrid");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("mealgrid")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    load_config_from(&config_path())
}

pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write the config file, creating parent dirs as needed.
pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

/// Serialize `config` to `path`. Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Values given on the command line.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub database_url: Option<String>,
    pub profile: Option<String>,
    pub generator: Option<String>,
}

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct MealgridConfig {
    pub db_config: DbConfig,
    /// `None` plans as a guest: nothing is read from or written to the
    /// database.
    pub profile: Option<String>,
    pub generator: Option<GeneratorSection>,
    pub planner: PlannerConfig,
}

impl MealgridConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config
    /// file > default.
    ///
    /// A missing config file is not an error; an unreadable one is.
    pub fn resolve(cli: &CliOverrides) -> Result<Self> {
        let path = config_path();
        let file = if path.exists() {
            Some(load_config_from(&path)?)
        } else {
            None
        };
        Ok(Self::resolve_with(cli, file))
    }

    fn resolve_with(cli: &CliOverrides, file: Option<ConfigFile>) -> Self {
        let file = file.unwrap_or_default();

        let db_url = cli
            .database_url
            .clone()
            .or_else(|| std::env::var(DbConfig::URL_ENV).ok())
            .unwrap_or(file.database.url);

        let profile = cli
            .profile
            .clone()
            .or_else(|| std::env::var(PROFILE_ENV).ok())
            .or(file.profile.name)
            .filter(|name| !name.trim().is_empty());

        // A command given on the command line or in the environment takes
        // no arguments from the file.
        let generator = match cli
            .generator
            .clone()
            .or_else(|| std::env::var(GENERATOR_ENV).ok())
        {
            Some(command) => Some(GeneratorSection {
                command,
                args: Vec::new(),
            }),
            None => file.generator,
        };

        Self {
            db_config: DbConfig::new(db_url),
            profile,
            generator,
            planner: PlannerConfig {
                intent: file.intent,
            },
        }
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
