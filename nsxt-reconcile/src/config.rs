use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for one NSX manager.
#[derive(Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
    pub validate_certs: bool,
    pub timeout: Duration,
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("validate_certs", &self.validate_certs)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ManagerConfig {
    /// Base URL requests are joined onto; a hostname that carries a scheme is used verbatim.
    pub fn base_url(&self) -> String {
        let host = self.hostname.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        }
    }
}

/// Values taken from flags or the environment; each wins over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub hostname: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub insecure: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    manager: ManagerSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManagerSection {
    hostname: Option<String>,
    username: Option<String>,
    password: Option<String>,
    validate_certs: Option<bool>,
    timeout_secs: Option<u64>,
}

/// Errors returned when building the manager configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("manager {field} is not set; use the config file, --{field} or NSXT_{env}")]
    Missing { field: &'static str, env: &'static str },
}

/// Merge the optional config file with overrides into a complete configuration.
///
/// A missing file is only an error when `required` is set, which is the case
/// when the caller named the file explicitly.
pub fn resolve_config(
    path: &Path,
    required: bool,
    overrides: &ConfigOverrides,
) -> Result<ManagerConfig, ConfigError> {
    let file = if required || path.exists() {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_config(&raw, path.display().to_string())?
    } else {
        ConfigFile::default()
    };
    merge(file.manager, overrides)
}

fn parse_config(raw: &str, path: String) -> Result<ConfigFile, ConfigError> {
    toml::from_str(raw).map_err(|source| ConfigError::Parse { path, source })
}

fn merge(file: ManagerSection, overrides: &ConfigOverrides) -> Result<ManagerConfig, ConfigError> {
    let hostname = overrides
        .hostname
        .clone()
        .or(file.hostname)
        .ok_or(ConfigError::Missing {
            field: "hostname",
            env: "HOSTNAME",
        })?;
    let username = overrides
        .username
        .clone()
        .or(file.username)
        .ok_or(ConfigError::Missing {
            field: "username",
            env: "USERNAME",
        })?;
    let password = overrides
        .password
        .clone()
        .or(file.password)
        .ok_or(ConfigError::Missing {
            field: "password",
            env: "PASSWORD",
        })?;

    Ok(ManagerConfig {
        hostname,
        username,
        password,
        validate_certs: !overrides.insecure && file.validate_certs.unwrap_or(true),
        timeout: Duration::from_secs(file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
    })
}
