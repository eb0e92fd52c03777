//! Configuration loading and validation for the announcer daemon.

use herald_agent::{Check, Service, DEFAULT_ENDPOINT};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

// Re-export Validate trait for derive macro
#[allow(unused_imports)]
use validator::Validate as _;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentSettings,

    /// Services announced at startup. May be empty; services can also be
    /// registered at runtime through the announcer.
    #[serde(default)]
    pub services: Vec<ServiceSettings>,
}

impl Validate for Config {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        self.agent.validate()?;
        for service in &self.services {
            service.validate()?;
        }
        Ok(())
    }
}

/// Connection settings for the local agent
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AgentSettings {
    /// Base URL of the agent's HTTP API.
    #[serde(default = "default_endpoint")]
    #[validate(custom = "validate_endpoint")]
    pub endpoint: String,

    /// ACL token injected into every request unless a caller passes one.
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_request_timeout")]
    pub request_timeout: Duration,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    #[validate(custom = "validate_connect_timeout")]
    pub connect_timeout: Duration,
}

/// One service definition from configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_service_identity"))]
pub struct ServiceSettings {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub check: Option<CheckSettings>,
}

/// TTL check settings for a configured service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSettings {
    #[serde(default)]
    pub ttl: Option<String>,

    #[serde(default)]
    pub deregister_critical_service_after: Option<String>,
}

impl ServiceSettings {
    /// Convert to the wire-level service definition.
    pub fn to_service(&self) -> Service {
        Service {
            id: self.id.clone(),
            name: self.name.clone(),
            address: self.address.clone(),
            port: self.port,
            tags: self.tags.clone(),
            check: self.check.as_ref().map(CheckSettings::to_check),
        }
    }
}

impl CheckSettings {
    fn to_check(&self) -> Check {
        let defaults = Check::default();
        Check {
            ttl: self.ttl.clone().or(defaults.ttl),
            deregister_critical_service_after: self
                .deregister_critical_service_after
                .clone()
                .or(defaults.deregister_critical_service_after),
        }
    }
}

// Default implementations

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            token: None,
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout() -> Duration {
    herald_agent::transport::DEFAULT_TIMEOUT
}

fn default_connect_timeout() -> Duration {
    herald_agent::transport::DEFAULT_CONNECT_TIMEOUT
}

// Custom validators

fn validate_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::new("endpoint_empty"));
    }

    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(ValidationError::new("endpoint_not_http"));
    }

    Ok(())
}

fn validate_request_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if !(1_000..=300_000).contains(&millis) {
        return Err(ValidationError::new("request_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_connect_timeout(timeout: &Duration) -> Result<(), ValidationError> {
    let millis = timeout.as_millis();
    if !(100..=60_000).contains(&millis) {
        return Err(ValidationError::new("connect_timeout_out_of_range"));
    }
    Ok(())
}

fn validate_service_identity(service: &ServiceSettings) -> Result<(), ValidationError> {
    // A service without an id and a name has no check id and no usable
    // deregistration identity.
    if service.id.is_none() && service.name.is_none() {
        return Err(ValidationError::new("service_identity_missing"));
    }
    Ok(())
}

// Configuration loading implementation

impl Config {
    /// Load configuration from default search paths
    pub fn load() -> Result<Self, ConfigError> {
        match Self::find_config_file() {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                tracing::info!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Find configuration file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/herald/announcer.yaml")];

        if let Some(home_path) = Self::home_config_path() {
            paths.push(home_path);
        }

        paths.push(PathBuf::from("./announcer.yaml"));

        paths
            .into_iter()
            .find(|p: &PathBuf| p.exists() && p.is_file())
    }

    /// Get home directory config path
    fn home_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config/herald/announcer.yaml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.endpoint, "http://localhost:8500");
        assert!(config.services.is_empty());
    }

    #[test]
    fn test_valid_yaml_parsing() {
        let yaml = r#"
agent:
  endpoint: "http://consul.internal:8500"
  token: "secret"
  request_timeout: 10s
  connect_timeout: 2s

services:
  - id: "web-1"
    name: "web"
    address: "10.0.0.5"
    port: 8080
    tags: ["v1", "edge"]
    check:
      ttl: "15s"
      deregister_critical_service_after: "1m"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.endpoint, "http://consul.internal:8500");
        assert_eq!(config.agent.token.as_deref(), Some("secret"));
        assert_eq!(config.agent.request_timeout, Duration::from_secs(10));
        assert_eq!(config.services.len(), 1);

        let service = config.services[0].to_service();
        assert_eq!(service.id.as_deref(), Some("web-1"));
        assert_eq!(service.port, Some(8080));
        assert_eq!(service.tags, vec!["v1".to_string(), "edge".to_string()]);
        let check = service.check.unwrap();
        assert_eq!(check.ttl.as_deref(), Some("15s"));
        assert_eq!(check.deregister_critical_service_after.as_deref(), Some("1m"));
    }

    #[test]
    fn test_minimal_yaml_uses_defaults() {
        let yaml = r#"
services:
  - name: "web"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.endpoint, "http://localhost:8500");
        assert_eq!(config.agent.request_timeout, Duration::from_secs(30));
        assert_eq!(config.agent.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_partial_check_fills_in_defaults() {
        let yaml = r#"
services:
  - name: "web"
    check:
      ttl: "30s"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let check = config.services[0].to_service().check.unwrap();
        assert_eq!(check.ttl.as_deref(), Some("30s"));
        assert_eq!(check.deregister_critical_service_after.as_deref(), Some("10m"));
    }

    #[test]
    fn test_service_without_check_has_none() {
        let yaml = r#"
services:
  - name: "web"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.services[0].to_service().check, None);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let yaml = r#"
agent:
  endpoint: "consul.internal:8500"
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        let yaml = r#"
agent:
  endpoint: ""
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_service_without_identity_rejected() {
        let yaml = r#"
services:
  - port: 8080
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_timeout_ranges_enforced() {
        let yaml = r#"
agent:
  request_timeout: 100ms
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());

        let yaml = r#"
agent:
  connect_timeout: 5m
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_parsing() {
        let yaml = r#"
agent:
  request_timeout: 45s
  connect_timeout: 250ms
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.agent.request_timeout, Duration::from_secs(45));
        assert_eq!(config.agent.connect_timeout, Duration::from_millis(250));
    }
}
