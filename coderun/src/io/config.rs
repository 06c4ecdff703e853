//! Runner configuration loaded from an optional TOML file.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::dialect::{Dialect, ExtensionTable, FileKind};

/// What to do with the rest of a file after one of its units fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Keep submitting the file's remaining units.
    Continue,
    /// Skip the file's remaining units and move to the next file.
    SkipFile,
}

/// Coderun configuration (TOML).
///
/// Every field has a default so a partial file is valid. Command-line flags
/// override file values via [`CliOverrides`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoderunConfig {
    /// Retries after the first failed connection attempt.
    pub max_retries: u32,

    /// Pause between connection attempts.
    pub retry_delay_ms: u64,

    /// TCP connect timeout for each connection attempt.
    pub connect_timeout_secs: u64,

    /// Reset the runtime after this many executed units. `None` never resets.
    pub reset_every: Option<u32>,

    pub on_failure: FailurePolicy,

    pub resolve: ResolveConfig,
    pub extract: ExtractConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolveConfig {
    /// Maximum manifest nesting depth.
    pub max_depth: usize,
    /// Extensions of files that a manifest line expands as nested manifests.
    pub manifest_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractConfig {
    pub doc_extensions: Vec<String>,
    pub python_extensions: Vec<String>,
    pub groovy_extensions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Base shell command (e.g. `docker compose`). `None` disables lifecycle control.
    pub command: Option<String>,
    pub stop_args: String,
    pub start_args: String,
    /// Run the start command once before the first connection.
    pub start_on_launch: bool,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

impl Default for CoderunConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1_000,
            connect_timeout_secs: 10,
            reset_every: None,
            on_failure: FailurePolicy::Continue,
            resolve: ResolveConfig::default(),
            extract: ExtractConfig::default(),
            lifecycle: LifecycleConfig::default(),
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            manifest_extensions: vec!["list".to_string()],
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            doc_extensions: vec!["md".to_string()],
            python_extensions: vec!["py".to_string()],
            groovy_extensions: vec!["groovy".to_string()],
        }
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            command: None,
            stop_args: "stop".to_string(),
            start_args: "up -d".to_string(),
            start_on_launch: true,
            timeout_secs: 10 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl ExtractConfig {
    /// Extension table for the resolver and extractor.
    ///
    /// Source extensions take precedence over documentation extensions.
    pub fn extension_table(&self) -> ExtensionTable {
        let python = self
            .python_extensions
            .iter()
            .map(|ext| (ext.as_str(), FileKind::Source(Dialect::Python)));
        let groovy = self
            .groovy_extensions
            .iter()
            .map(|ext| (ext.as_str(), FileKind::Source(Dialect::Groovy)));
        let docs = self
            .doc_extensions
            .iter()
            .map(|ext| (ext.as_str(), FileKind::Documentation));
        ExtensionTable::new(python.chain(groovy).chain(docs))
    }
}

/// Values supplied on the command line. `None` leaves the config value alone.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub reset_every: Option<u32>,
    pub lifecycle_command: Option<String>,
    pub on_failure: Option<FailurePolicy>,
}

impl CoderunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.resolve.max_depth == 0 {
            return Err(anyhow!("resolve.max_depth must be > 0"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(anyhow!("connect_timeout_secs must be > 0"));
        }
        if self.lifecycle.timeout_secs == 0 {
            return Err(anyhow!("lifecycle.timeout_secs must be > 0"));
        }
        if self.lifecycle.output_limit_bytes == 0 {
            return Err(anyhow!("lifecycle.output_limit_bytes must be > 0"));
        }
        if let Some(command) = &self.lifecycle.command
            && command.trim().is_empty()
        {
            return Err(anyhow!("lifecycle.command must not be blank"));
        }
        if self.reset_every.is_some_and(|every| every > 0) && self.lifecycle.command.is_none() {
            return Err(anyhow!(
                "reset_every requires a lifecycle command (-dc/--lifecycle-command)"
            ));
        }
        Ok(())
    }

    /// Apply command-line overrides and validate the merged result.
    pub fn with_overrides(mut self, overrides: &CliOverrides) -> Result<Self> {
        if let Some(max_retries) = overrides.max_retries {
            self.max_retries = max_retries;
        }
        if let Some(retry_delay_ms) = overrides.retry_delay_ms {
            self.retry_delay_ms = retry_delay_ms;
        }
        if let Some(reset_every) = overrides.reset_every {
            self.reset_every = Some(reset_every);
        }
        if let Some(command) = &overrides.lifecycle_command {
            self.lifecycle.command = Some(command.clone());
        }
        if let Some(on_failure) = overrides.on_failure {
            self.on_failure = on_failure;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CoderunConfig::default()`.
pub fn load_config(path: &Path) -> Result<CoderunConfig> {
    if !path.exists() {
        let cfg = CoderunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: CoderunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
