use serde::Deserialize;
use skillhub_skills::config::{
    AssetsConfig, MatchingConfig, RefreshConfig, ScriptsConfig, SkillsConfig, TelemetryConfig,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default config template created when no config exists
const DEFAULT_CONFIG: &str = r#"
skills_dir = "skills"  # Set via SKILLS_DIR env var

[logging]
level = "info"  # trace, debug, info, warn, error
format = "pretty"  # or "json"

[matching]
min_score = 0.2
max_results = 3
ambiguity_threshold = 0.1

[scripts]
enabled = true
timeout_seconds = 60
kill_grace_seconds = 5
max_output_bytes = 1048576
allowed_extensions = [".sh", ".ts", ".js", ".py"]

[scripts.runners]
".sh" = "bash"
".ts" = "npx tsx"
".js" = "node"
".py" = "python3"

[assets]
max_size_bytes = 1048576

[refresh]
enabled = true
interval_minutes = 15  # Set via REFRESH_INTERVAL_MINUTES env var

[telemetry]
enabled = false
flush_interval_seconds = 30
"#;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub skills_dir: String,
    pub logging: LoggingConfig,
    pub matching: MatchingConfig,
    pub scripts: ScriptsConfig,
    pub assets: AssetsConfig,
    pub refresh: RefreshConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            skills_dir: "skills".to_string(),
            logging: LoggingConfig::default(),
            matching: MatchingConfig::default(),
            scripts: ScriptsConfig::default(),
            assets: AssetsConfig::default(),
            refresh: RefreshConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Get the global config path: ~/.skillhub/skillhub.toml
    fn global_config_path() -> anyhow::Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".skillhub").join("skillhub.toml"))
    }

    /// Ensure global config directory and file exist, creating defaults if needed
    fn ensure_global_config() -> anyhow::Result<PathBuf> {
        let config_path = Self::global_config_path()?;

        if let Some(config_dir) = config_path.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir)?;
                eprintln!("Created config directory: {}", config_dir.display());
            }
        }

        if !config_path.exists() {
            fs::write(&config_path, DEFAULT_CONFIG.trim())?;
            eprintln!("Created default config: {}", config_path.display());
            eprintln!("Please edit this file or set environment variables.");
        }

        Ok(config_path)
    }

    /// Find the content repository's `config.yaml`: next to the skills
    /// directory first, then inside it
    fn content_config_path(skills_dir: &Path) -> Option<PathBuf> {
        let candidates = [
            skills_dir.join("..").join("config.yaml"),
            skills_dir.join("config.yaml"),
        ];
        candidates.into_iter().find(|p| p.is_file())
    }

    fn layered(global_config: &Path, content_config: Option<&Path>) -> anyhow::Result<Self> {
        let mut config_builder = config::Config::builder();

        // Layer 1: Content repository config (lowest file priority)
        if let Some(path) = content_config {
            config_builder = config_builder.add_source(config::File::from(path).required(false));
        }

        config_builder = config_builder
            // Layer 2: Global config (required - we just created it if missing)
            .add_source(config::File::from(global_config))
            // Layer 3: Local workspace config (optional override)
            .add_source(config::File::with_name("skillhub").required(false))
            // Layer 4: Environment variables with SKILLHUB__ prefix
            .add_source(
                config::Environment::with_prefix("SKILLHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        // Layer 5: Apply convenience env var overrides (highest priority)
        if let Ok(dir) = env::var("SKILLS_DIR") {
            config_builder = config_builder.set_override("skills_dir", dir)?;
        }

        if let Ok(minutes) = env::var("REFRESH_INTERVAL_MINUTES") {
            let minutes: u64 = minutes.trim().parse()?;
            config_builder = config_builder
                .set_override("refresh.enabled", true)?
                .set_override("refresh.interval_minutes", minutes)?;
        }

        if let Ok(level) = env::var("SKILLHUB_LOG_LEVEL") {
            config_builder = config_builder.set_override("logging.level", level)?;
        }

        let config: Self = config_builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Load configuration with layered approach:
    /// 1. Content config: `config.yaml` beside or inside the skills directory
    /// 2. Global config: ~/.skillhub/skillhub.toml (auto-created if missing)
    /// 3. Local override: ./skillhub.toml (workspace, optional)
    /// 4. Environment variables (highest priority)
    pub fn load() -> anyhow::Result<Self> {
        // Load .env file from current directory
        dotenvy::dotenv().ok();

        // Ensure global config exists
        let global_config_path = Self::ensure_global_config()?;

        // The skills directory decides where the content config lives, so
        // resolve it from the other layers first
        let first_pass = Self::layered(&global_config_path, None)?;
        let content_config = Self::content_config_path(&first_pass.resolved_skills_dir());
        if let Some(path) = &content_config {
            eprintln!("Loaded content config: {}", path.display());
        }

        Self::layered(&global_config_path, content_config.as_deref())
    }

    /// Skills directory with a leading `~` expanded
    pub fn resolved_skills_dir(&self) -> PathBuf {
        expand_tilde(&self.skills_dir)
    }

    /// Core configuration handed to the skills crate
    pub fn skills_config(&self) -> SkillsConfig {
        SkillsConfig {
            matching: self.matching.clone(),
            scripts: self.scripts.clone(),
            assets: self.assets.clone(),
            refresh: self.refresh.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}
