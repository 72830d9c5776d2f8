//! Engine configuration.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SLOTFLOW_CONFIDENCE_THRESHOLD, SLOTFLOW_MAX_CHECKPOINTS,
//!    SLOTFLOW_FAILURE_POLICY)
//! 2. Config file (.slotflow/config.yaml, searched from the current directory
//!    upwards, then in the user config directory)
//! 3. Defaults
//!
//! The resolved [`EngineConfig`] is passed explicitly to
//! [`OrchestrationContext::with_config`](crate::core::OrchestrationContext::with_config).

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_DIR: &str = ".slotflow";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    pub confidence_threshold: Option<f64>,
    pub max_checkpoints: Option<usize>,
    pub max_history_entries: Option<usize>,
    pub track_confidence: Option<bool>,
    pub failure_policy: Option<FailurePolicy>,
}

/// What the scheduler does after a task fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop at the first failure; independent tasks stay pending
    Halt,

    /// Keep running every task that is not blocked
    Continue,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::Halt
    }
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(Self::Halt),
            "continue" => Ok(Self::Continue),
            other => anyhow::bail!(
                "Unknown failure policy '{}' (expected halt or continue)",
                other
            ),
        }
    }
}

/// Resolved engine settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Steps strictly below this are low-confidence
    pub confidence_threshold: f64,

    /// Retained checkpoints (0 = unbounded)
    pub max_checkpoints: usize,

    /// Retained history entries (0 = unbounded)
    pub max_history_entries: usize,

    /// Record a thought step per completed task
    pub track_confidence: bool,

    pub failure_policy: FailurePolicy,

    /// Path to config file (if found)
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            max_checkpoints: 32,
            max_history_entries: 10_000,
            track_confidence: true,
            failure_policy: FailurePolicy::Halt,
            config_file: None,
        }
    }
}

impl EngineConfig {
    /// Load from the discovered config file and the process environment
    pub fn load() -> Result<Self> {
        let file = find_config_file();
        let raw = match file {
            Some(ref path) => load_config_file(path)?,
            None => ConfigFile::default(),
        };

        let mut config = Self::resolve(raw, |key| std::env::var(key).ok())?;
        config.config_file = file;
        Ok(config)
    }

    /// Load from an explicit file, still honoring environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = load_config_file(path)?;
        let mut config = Self::resolve(raw, |key| std::env::var(key).ok())?;
        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Merge a raw file with an environment lookup and defaults
    pub fn resolve<F>(raw: ConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let engine = raw.engine;

        let mut config = Self {
            confidence_threshold: engine
                .confidence_threshold
                .unwrap_or(defaults.confidence_threshold),
            max_checkpoints: engine.max_checkpoints.unwrap_or(defaults.max_checkpoints),
            max_history_entries: engine
                .max_history_entries
                .unwrap_or(defaults.max_history_entries),
            track_confidence: engine.track_confidence.unwrap_or(defaults.track_confidence),
            failure_policy: engine.failure_policy.unwrap_or(defaults.failure_policy),
            config_file: None,
        };

        if let Some(value) = env("SLOTFLOW_CONFIDENCE_THRESHOLD") {
            config.confidence_threshold = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid SLOTFLOW_CONFIDENCE_THRESHOLD: {}", value))?;
        }
        if let Some(value) = env("SLOTFLOW_MAX_CHECKPOINTS") {
            config.max_checkpoints = value
                .trim()
                .parse()
                .with_context(|| format!("Invalid SLOTFLOW_MAX_CHECKPOINTS: {}", value))?;
        }
        if let Some(value) = env("SLOTFLOW_FAILURE_POLICY") {
            config.failure_policy = value.parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            anyhow::bail!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            );
        }
        Ok(())
    }
}

/// Find config file by searching current directory and parents, then the user config dir
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    let user_config = dirs::config_dir()?.join("slotflow").join(CONFIG_FILE);
    user_config.exists().then_some(user_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
