//! Server configuration using Figment
//!
//! Configuration is layered, later sources winning:
//! 1. built-in defaults
//! 2. `config/tool_server.toml` (or an explicit path)
//! 3. environment variables prefixed with `TOOL_SERVER_`, using `__` between nested
//!    keys (e.g. `TOOL_SERVER_SERVER__PORT=50061`)
//!
//! The binary applies its CLI flags on top and re-validates.
//!
//! # Example
//! ```no_run
//! use tool_server::config::ServerConfig;
//!
//! let config = ServerConfig::load()?;
//! println!("Listening on {}", config.socket_addr()?);
//! # Ok::<(), tool_server::error::ToolServerError>(())
//! ```

use crate::configuration::ConfigPayload;
use crate::dispatcher::{DispatchSettings, DriverErrorStatus};
use crate::error::{AppResult, ToolServerError};
use crate::logging::{parse_log_level, OutputFormat};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::Path;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/tool_server.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "TOOL_SERVER_";

/// Top-level server configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Listener settings
    #[serde(default)]
    pub server: ListenConfig,
    /// Command dispatch settings
    #[serde(default)]
    pub dispatch: DispatchConfig,
    /// Configuration payload applied once at boot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup: Option<ConfigPayload>,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default)]
    pub log_format: OutputFormat,
}

/// gRPC listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum in-flight requests per connection
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
}

/// Command dispatch configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Status after a handler raises a driver error
    #[serde(default)]
    pub driver_error_status: DriverErrorStatus,
    /// Simulated execution settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// Simulated execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Multiplier on estimates when sleeping (0 disables the wait)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,
}

// Default value functions
fn default_name() -> String {
    "tool-server".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_concurrency_limit() -> usize {
    16
}

fn default_time_scale() -> f64 {
    1.0
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            log_format: OutputFormat::default(),
        }
    }
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            concurrency_limit: default_concurrency_limit(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
        }
    }
}

impl DispatchConfig {
    /// Settings handed to the command dispatcher.
    pub fn settings(&self) -> DispatchSettings {
        DispatchSettings {
            driver_error_status: self.driver_error_status,
            simulation_time_scale: self.simulation.time_scale,
        }
    }
}

impl ServerConfig {
    /// Load configuration from `config/tool_server.toml` and environment variables
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Self::figment(path.as_ref()).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Layered configuration sources, for callers that merge their own overrides.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> AppResult<()> {
        parse_log_level(&self.application.log_level)?;

        if self.server.port == 0 {
            return Err(ToolServerError::Configuration(
                "server.port must be non-zero".to_string(),
            ));
        }

        if self.server.concurrency_limit == 0 {
            return Err(ToolServerError::Configuration(
                "server.concurrency_limit must be at least 1".to_string(),
            ));
        }

        self.server
            .host
            .parse::<IpAddr>()
            .map_err(|e| ToolServerError::Configuration(format!(
                "Invalid server.host '{}': {e}",
                self.server.host
            )))?;

        let scale = self.dispatch.simulation.time_scale;
        if !scale.is_finite() || scale < 0.0 {
            return Err(ToolServerError::Configuration(format!(
                "Invalid dispatch.simulation.time_scale {scale}. Must be a finite number >= 0"
            )));
        }

        if let Some(startup) = &self.startup {
            if startup.tool_type.is_empty() {
                return Err(ToolServerError::Configuration(
                    "startup.tool_type must be set".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Listener address from `server.host` and `server.port`.
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip: IpAddr = self.server.host.parse()?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> AppResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_missing_file_yields_defaults() {
        let config = ServerConfig::load_from("does/not/exist.toml").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.server.port, 50051);
        assert_eq!(config.socket_addr().unwrap().to_string(), "0.0.0.0:50051");
    }

    #[test]
    #[serial]
    fn test_load_from_file() {
        let file = write_config(
            r#"
            [application]
            name = "stage-bench"
            log_level = "debug"
            log_format = "json"

            [server]
            port = 50070

            [dispatch]
            driver_error_status = "failed"

            [dispatch.simulation]
            time_scale = 0.0

            [startup]
            tool_type = "mock_stage"
            tool_id = "stage-A"

            [startup.params]
            port = "/dev/ttyUSB1"
            "#,
        );

        let config = ServerConfig::load_from(file.path()).unwrap();
        assert_eq!(config.application.name, "stage-bench");
        assert_eq!(config.application.log_format, OutputFormat::Json);
        assert_eq!(config.server.port, 50070);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.dispatch.driver_error_status, DriverErrorStatus::Failed);
        assert_eq!(config.dispatch.settings().simulation_time_scale, 0.0);

        let startup = config.startup.unwrap();
        assert_eq!(startup.tool_id, "stage-A");
        assert!(!startup.simulated);
        assert_eq!(startup.params, json!({ "port": "/dev/ttyUSB1" }));
    }

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        let file = write_config("[server]\nport = 50070\n");
        std::env::set_var("TOOL_SERVER_SERVER__PORT", "50099");
        let result = ServerConfig::load_from(file.path());
        std::env::remove_var("TOOL_SERVER_SERVER__PORT");

        assert_eq!(result.unwrap().server.port, 50099);
    }

    #[test]
    #[serial]
    fn test_invalid_file_is_a_config_error() {
        let file = write_config("[server]\nport = \"not a number\"\n");
        let err = ServerConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ToolServerError::Config(_)));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.application.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.concurrency_limit = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.host = "localhost:80".to_string();
        assert!(config.validate().is_err());

        for scale in [-1.0, f64::NAN, f64::INFINITY] {
            let mut config = ServerConfig::default();
            config.dispatch.simulation.time_scale = scale;
            assert!(config.validate().is_err(), "{scale}");
        }

        let mut config = ServerConfig::default();
        config.startup = Some(ConfigPayload::simulated(""));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_rendering_round_trips() {
        let mut config = ServerConfig::default();
        config.startup = Some(
            ConfigPayload::hardware("mock_stage", json!({ "port": "COM3" })).with_tool_id("s1"),
        );

        let text = config.to_toml().unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
