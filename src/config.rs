use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub stepper: StepperConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub rest_api: RestApiConfig,
}

/// Remote ticket API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the ticket API (e.g., "https://helpdesk.example.com/api")
    #[serde(default)]
    pub base_url: Option<String>,
    /// Per-request timeout in seconds (default: 15)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_token_env() -> String {
    "HELPDESK_API_TOKEN".to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: default_timeout_secs(),
            token_env: default_token_env(),
        }
    }
}

/// Placeholders used by the stepper when a ticket lacks a name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Department assumed for legacy tickets without processing or assignment data
    #[serde(default = "default_legacy_queue")]
    pub legacy_queue: String,
    #[serde(default = "default_specialist_placeholder")]
    pub specialist_placeholder: String,
    #[serde(default = "default_approver_placeholder")]
    pub approver_placeholder: String,
}

fn default_legacy_queue() -> String {
    "IT/Hardware".to_string()
}

fn default_specialist_placeholder() -> String {
    "IT Specialist".to_string()
}

fn default_approver_placeholder() -> String {
    "Manager".to_string()
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            legacy_queue: default_legacy_queue(),
            specialist_placeholder: default_specialist_placeholder(),
            approver_placeholder: default_approver_placeholder(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether `serve` logs to a file under the state directory (false = stderr)
    #[serde(default = "default_log_to_file")]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: default_log_to_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub state: String,
}

/// REST API server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestApiConfig {
    #[serde(default = "default_rest_port")]
    pub port: u16,
}

fn default_rest_port() -> u16 {
    7010
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            port: default_rest_port(),
        }
    }
}

impl Config {
    /// Path to the project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".helpdesk/config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Embedded defaults so the CLI works without any config file
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/helpdesk/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("helpdesk").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // HELPDESK__SERVICE__BASE_URL and friends
        builder = builder.add_source(
            config::Environment::with_prefix("HELPDESK")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Save config to .helpdesk/config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create helpdesk config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    /// Get absolute path to state directory
    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    /// Get absolute path to logs directory
    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            stepper: StepperConfig::default(),
            logging: LoggingConfig::default(),
            paths: PathsConfig {
                state: ".helpdesk".to_string(),
            },
            rest_api: RestApiConfig::default(),
        }
    }
}
