//! Configuration types for the skill core
//!
//! Every field has a serde default so partial documents (a `config.yaml`
//! shipped with the content, a TOML override, environment variables) merge
//! cleanly on top of the built-in values.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Top-level core configuration
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SkillsConfig {
    /// Keyword matching thresholds
    pub matching: MatchingConfig,
    /// Script sandbox limits
    pub scripts: ScriptsConfig,
    /// Asset read limits
    pub assets: AssetsConfig,
    /// Periodic index refresh
    pub refresh: RefreshConfig,
    /// Usage telemetry
    pub telemetry: TelemetryConfig,
}

/// Keyword matching thresholds
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum score for a skill to be a candidate
    pub min_score: f64,
    /// Number of candidates presented on ambiguity
    pub max_results: usize,
    /// Minimum gap between the top two scores to auto-select
    pub ambiguity_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_score: 0.2,
            max_results: 3,
            ambiguity_threshold: 0.1,
        }
    }
}

/// Script sandbox limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Global kill switch
    pub enabled: bool,
    /// Wall-clock budget per run
    pub timeout_seconds: u64,
    /// Delay between the graceful and the forced termination signal
    pub kill_grace_seconds: u64,
    /// Ceiling applied to stdout and stderr independently
    pub max_output_bytes: usize,
    /// Extensions (with leading dot) that may be executed
    pub allowed_extensions: Vec<String>,
    /// Interpreter command per extension, split on whitespace
    pub runners: HashMap<String, String>,
    /// Prefix of the environment variables carrying script arguments
    pub env_prefix: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        let runners = [
            (".sh", "bash"),
            (".ts", "npx tsx"),
            (".js", "node"),
            (".py", "python3"),
        ]
        .into_iter()
        .map(|(ext, cmd)| (ext.to_string(), cmd.to_string()))
        .collect();

        Self {
            enabled: true,
            timeout_seconds: 60,
            kill_grace_seconds: 5,
            max_output_bytes: 1_048_576,
            allowed_extensions: vec![".sh".into(), ".ts".into(), ".js".into(), ".py".into()],
            runners,
            env_prefix: "SKILL_ARG_".to_string(),
        }
    }
}

impl ScriptsConfig {
    /// Wall-clock budget as a duration
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Grace period before a forced kill
    #[must_use]
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_seconds)
    }
}

/// Asset read limits
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AssetsConfig {
    /// Files larger than this are refused
    pub max_size_bytes: u64,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: 1_048_576,
        }
    }
}

/// Periodic index refresh
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RefreshConfig {
    /// Whether the timer runs at all (change notifications still apply)
    pub enabled: bool,
    /// Minutes between scheduled rebuilds
    pub interval_minutes: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 15,
        }
    }
}

impl RefreshConfig {
    /// Interval as a duration, never zero
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.max(1) * 60)
    }
}

/// Usage telemetry
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Whether events are recorded
    pub enabled: bool,
    /// JSON-lines file receiving flushed events
    pub buffer_file: Option<PathBuf>,
    /// Seconds between flushes
    pub flush_interval_seconds: u64,
    /// Identifier stamped on every event
    pub server_id: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            buffer_file: None,
            flush_interval_seconds: 30,
            server_id: default_server_id(),
        }
    }
}

impl TelemetryConfig {
    /// Buffer file, falling back to `~/.skillhub/analytics-buffer.jsonl`
    #[must_use]
    pub fn resolved_buffer_file(&self) -> Option<PathBuf> {
        self.buffer_file.clone().or_else(|| {
            dirs::home_dir().map(|home| home.join(".skillhub").join("analytics-buffer.jsonl"))
        })
    }

    /// Flush interval as a duration, never zero
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds.max(1))
    }
}

fn default_server_id() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("dev-{user}")
}
