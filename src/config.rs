//! Configuration system for the persona engine
//!
//! Supports multiple configuration sources with the following precedence
//! (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PERSONA_ENGINE_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assembler::ConfidenceSettings;
use crate::error::{Error, Result};
use crate::persona::{PersonaKind, RouterSettings};
use crate::retry::{BreakerSettings, RetryPolicy};

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Persona catalog settings
    pub personas: PersonaSettings,

    /// Message routing settings
    pub router: RouterSettings,

    /// Worker pool and admission settings
    pub orchestrator: OrchestratorSettings,

    /// Retry schedule settings
    pub retry: RetrySettings,

    /// Circuit breaker settings
    pub breaker: CircuitSettings,

    /// Confidence blending settings
    pub confidence: ConfidenceSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Persona catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaSettings {
    /// Fallback persona when no rule clears the routing threshold
    pub default_persona: String,

    /// Directory of TOML override definitions (empty = bundled only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_dir: Option<String>,
}

/// Worker pool and admission settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorSettings {
    /// Worker count (0 = number of CPUs)
    pub workers: usize,

    /// Pending task ceiling across all lanes; submissions beyond it are
    /// rejected
    pub max_pending: usize,

    /// Backend calls per second across all workers (0 = unlimited)
    pub rate_limit_per_sec: u32,

    /// Token bucket burst capacity
    pub rate_burst: u32,

    /// Per-attempt backend deadline in milliseconds
    pub default_deadline_ms: u64,

    /// Maximum message content length in characters
    pub max_message_len: usize,

    /// Conversation turns included as context per task
    pub context_window: usize,

    /// Terminal tasks retained for status queries
    pub task_retention: usize,
}

/// Retry schedule settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum attempts per task, first try included
    pub max_attempts: u32,

    /// First backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Ceiling for individual delays in milliseconds
    pub max_backoff_ms: u64,

    /// Delay growth factor
    pub multiplier: f64,

    /// Total retry budget per task in milliseconds
    pub max_elapsed_ms: u64,
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitSettings {
    /// Consecutive transient failures that open the circuit
    pub failure_threshold: u32,

    /// Open-circuit cooldown in milliseconds
    pub cooldown_ms: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            personas: PersonaSettings::default(),
            router: RouterSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            retry: RetrySettings::default(),
            breaker: CircuitSettings::default(),
            confidence: ConfidenceSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for PersonaSettings {
    fn default() -> Self {
        Self {
            default_persona: "mentor".to_string(),
            definition_dir: None,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            workers: 0, // Auto-detect
            max_pending: 256,
            rate_limit_per_sec: 0, // Unlimited
            rate_burst: 10,
            default_deadline_ms: 30000,
            max_message_len: 8192,
            context_window: 20,
            task_retention: 1024,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 5000,
            multiplier: 2.0,
            max_elapsed_ms: 120_000,
        }
    }
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json_format: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            config = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::ConfigNotFound { path });
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("persona-engine.toml"),
            PathBuf::from("config.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("persona-engine").join("config.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".persona-engine").join("config.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/persona-engine/config.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Persona settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_DEFAULT_PERSONA") {
            self.personas.default_persona = val;
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_PERSONA_DIR") {
            self.personas.definition_dir = Some(val);
        }

        // Router settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_MIN_SCORE") {
            if let Ok(n) = val.parse() {
                self.router.min_score = n;
            }
        }

        // Orchestrator settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_WORKERS") {
            if let Ok(n) = val.parse() {
                self.orchestrator.workers = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_MAX_PENDING") {
            if let Ok(n) = val.parse() {
                self.orchestrator.max_pending = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_RATE_LIMIT") {
            if let Ok(n) = val.parse() {
                self.orchestrator.rate_limit_per_sec = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_DEADLINE_MS") {
            if let Ok(n) = val.parse() {
                self.orchestrator.default_deadline_ms = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_MAX_MESSAGE_LEN") {
            if let Ok(n) = val.parse() {
                self.orchestrator.max_message_len = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_CONTEXT_WINDOW") {
            if let Ok(n) = val.parse() {
                self.orchestrator.context_window = n;
            }
        }

        // Retry settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_MAX_ATTEMPTS") {
            if let Ok(n) = val.parse() {
                self.retry.max_attempts = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_INITIAL_BACKOFF_MS") {
            if let Ok(n) = val.parse() {
                self.retry.initial_backoff_ms = n;
            }
        }

        // Breaker settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_BREAKER_THRESHOLD") {
            if let Ok(n) = val.parse() {
                self.breaker.failure_threshold = n;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_BREAKER_COOLDOWN_MS") {
            if let Ok(n) = val.parse() {
                self.breaker.cooldown_ms = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("PERSONA_ENGINE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_ENGINE_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref dir) = self.personas.definition_dir {
            self.personas.definition_dir = Some(expand_path(dir));
        }
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Validate default persona
        if self.personas.default_persona.parse::<PersonaKind>().is_err() {
            return Err(Error::Config(format!(
                "Invalid default persona '{}'",
                self.personas.default_persona
            )));
        }

        // Validate routing threshold
        if !(0.0..=1.0).contains(&self.router.min_score) {
            return Err(Error::Config(
                "router.min_score must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Validate admission and retry bounds
        if self.orchestrator.max_pending == 0 {
            return Err(Error::Config(
                "orchestrator.max_pending must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.max_message_len == 0 {
            return Err(Error::Config(
                "orchestrator.max_message_len must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(Error::Config(
                "retry.multiplier must be at least 1.0".to_string(),
            ));
        }

        // Validate confidence weights
        if self.confidence.model_weight < 0.0 || self.confidence.router_weight < 0.0 {
            return Err(Error::Config(
                "confidence weights must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence.heuristic_default) {
            return Err(Error::Config(
                "confidence.heuristic_default must be between 0.0 and 1.0".to_string(),
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Resolved fallback persona kind.
    pub fn default_persona(&self) -> PersonaKind {
        self.personas
            .default_persona
            .parse()
            .unwrap_or(PersonaKind::Mentor)
    }

    /// Resolved worker count.
    pub fn worker_count(&self) -> usize {
        if self.orchestrator.workers == 0 {
            num_cpus::get()
        } else {
            self.orchestrator.workers
        }
    }

    /// Persona override directory, if configured.
    pub fn persona_dir(&self) -> Option<&Path> {
        self.personas.definition_dir.as_deref().map(Path::new)
    }

    /// Per-attempt backend deadline.
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.orchestrator.default_deadline_ms)
    }

    /// Runtime retry policy built from the millisecond fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            initial_backoff: Duration::from_millis(self.retry.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry.max_backoff_ms),
            multiplier: self.retry.multiplier,
            max_elapsed: Duration::from_millis(self.retry.max_elapsed_ms),
        }
    }

    /// Runtime circuit breaker settings.
    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            failure_threshold: self.breaker.failure_threshold,
            cooldown: Duration::from_millis(self.breaker.cooldown_ms),
        }
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".persona-engine")
                .join("config.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    // Generate default config with comments
    let config_content = generate_default_config();

    // Write the file
    fs::write(&config_path, config_content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Persona Engine Configuration

[personas]
# Fallback persona when no rule clears the routing threshold
default_persona = "mentor"

# Directory of TOML persona overrides (comment out to use bundled definitions)
# definition_dir = "~/.persona-engine/personas"

[router]
# Minimum normalized match score; below it the default persona handles the
# message
min_score = 0.05

[orchestrator]
# Worker count (0 = number of CPUs)
workers = 0

# Pending task ceiling; submissions beyond it are rejected
max_pending = 256

# Backend calls per second across all workers (0 = unlimited)
rate_limit_per_sec = 0

# Token bucket burst capacity
rate_burst = 10

# Per-attempt backend deadline in milliseconds
default_deadline_ms = 30000

# Maximum message content length in characters
max_message_len = 8192

# Conversation turns included as context per task
context_window = 20

# Terminal tasks retained for status queries
task_retention = 1024

[retry]
# Maximum attempts per task, first try included
max_attempts = 3

# First backoff delay in milliseconds
initial_backoff_ms = 200

# Ceiling for individual delays in milliseconds
max_backoff_ms = 5000

# Delay growth factor
multiplier = 2.0

# Total retry budget per task in milliseconds
max_elapsed_ms = 120000

[breaker]
# Consecutive transient failures that open the circuit
failure_threshold = 5

# Open-circuit cooldown in milliseconds
cooldown_ms = 30000

[confidence]
# Weight of the model's self-reported confidence
model_weight = 0.7

# Weight of the router's match score
router_weight = 0.3

# Stand-in when the backend reports no confidence
heuristic_default = 0.5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.persona-engine/logs/engine.log"

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.personas.default_persona, "mentor");
        assert_eq!(config.orchestrator.max_pending, 256);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        std::env::set_var("PERSONA_ENGINE_DEFAULT_PERSONA", "analyst");
        std::env::set_var("PERSONA_ENGINE_MAX_PENDING", "16");
        std::env::set_var("PERSONA_ENGINE_LOG_LEVEL", "debug");

        let mut config = EngineConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.personas.default_persona, "analyst");
        assert_eq!(config.orchestrator.max_pending, 16);
        assert_eq!(config.logging.level, "debug");

        std::env::remove_var("PERSONA_ENGINE_DEFAULT_PERSONA");
        std::env::remove_var("PERSONA_ENGINE_MAX_PENDING");
        std::env::remove_var("PERSONA_ENGINE_LOG_LEVEL");
    }

    #[test]
    fn test_validation_invalid_persona() {
        let mut config = EngineConfig::default();
        config.personas.default_persona = "oracle".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_min_score() {
        let mut config = EngineConfig::default();
        config.router.min_score = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_max_pending() {
        let mut config = EngineConfig::default();
        config.orchestrator.max_pending = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = EngineConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_conversion() {
        let mut config = EngineConfig::default();
        config.retry.initial_backoff_ms = 50;
        config.retry.max_attempts = 5;
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_backoff, Duration::from_millis(50));
    }

    #[test]
    fn test_worker_count_auto_detect() {
        let config = EngineConfig::default();
        assert!(config.worker_count() >= 1);

        let mut fixed = EngineConfig::default();
        fixed.orchestrator.workers = 3;
        assert_eq!(fixed.worker_count(), 3);
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: EngineConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.personas.default_persona, parsed.personas.default_persona);
        assert_eq!(config.orchestrator.max_pending, parsed.orchestrator.max_pending);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[personas]
default_persona = "advisor"

[router]
min_score = 0.1

[orchestrator]
workers = 4
max_pending = 32

[retry]
max_attempts = 5

[logging]
level = "debug"
"#;

        let config: EngineConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.personas.default_persona, "advisor");
        assert!((config.router.min_score - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.orchestrator.workers, 4);
        assert_eq!(config.orchestrator.max_pending, 32);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_generated_default_parses() {
        let config: EngineConfig = toml::from_str(&generate_default_config()).unwrap();
        assert!(config.validate().is_ok());
    }
}
