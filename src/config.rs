use serde::Deserialize;
use std::env;
use tracing::warn;

use crate::models::{ConversionOptions, TargetDialect, UnsupportedPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub converter: ConverterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub style: String,
}

/// Defaults applied to requests that carry no options
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    pub policy: String,
    pub preserve_comments: bool,
    pub target_version: String,
    pub pretty: bool,
    pub validate_output: bool,
    /// Upper bound on a single script accepted over HTTP
    pub max_script_bytes: usize,
}

pub const DEFAULT_MAX_SCRIPT_BYTES: usize = 1024 * 1024;

/// Environment variable to config key
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HOST", "server.host"),
    ("RUST_LOG", "logging.level"),
    ("RUST_LOG_STYLE", "logging.style"),
    ("CONVERTER_POLICY", "converter.policy"),
    ("CONVERTER_PRESERVE_COMMENTS", "converter.preserve_comments"),
    ("CONVERTER_TARGET_VERSION", "converter.target_version"),
    ("CONVERTER_PRETTY", "converter.pretty"),
    ("CONVERTER_VALIDATE_OUTPUT", "converter.validate_output"),
];

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        Self::load(|key| env::var(key).ok())
    }

    /// Build from defaults plus whatever `lookup` returns for each variable
    pub fn load<F>(lookup: F) -> Result<Self, config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("logging.level", "info")?
            .set_default("logging.style", "auto")?
            .set_default("converter.policy", UnsupportedPolicy::default().as_str())?
            .set_default("converter.preserve_comments", false)?
            .set_default("converter.target_version", TargetDialect::default().as_str())?
            .set_default("converter.pretty", true)?
            .set_default("converter.validate_output", false)?
            .set_default("converter.max_script_bytes", DEFAULT_MAX_SCRIPT_BYTES as u64)?;

        for (var, key) in ENV_OVERRIDES {
            if let Some(value) = lookup(var) {
                builder = builder.set_override(*key, value)?;
            }
        }

        if let Some(port) = lookup("PORT") {
            builder = builder.set_override("server.port", parse_or("PORT", &port, 3000u16))?;
        }

        if let Some(limit) = lookup("CONVERTER_MAX_SCRIPT_BYTES") {
            let limit = parse_or("CONVERTER_MAX_SCRIPT_BYTES", &limit, DEFAULT_MAX_SCRIPT_BYTES as u64);
            builder = builder.set_override("converter.max_script_bytes", limit)?;
        }

        builder.build()?.try_deserialize()
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Request defaults for the conversion service
    pub fn conversion_options(&self) -> anyhow::Result<ConversionOptions> {
        let converter = &self.converter;
        let policy = UnsupportedPolicy::from_str(&converter.policy).map_err(anyhow::Error::msg)?;
        let target = TargetDialect::from_str(&converter.target_version).map_err(anyhow::Error::msg)?;

        Ok(ConversionOptions {
            policy,
            preserve_comments: converter.preserve_comments,
            target,
            pretty: converter.pretty,
            validate_output: converter.validate_output,
        })
    }
}

/// Parse a numeric variable, falling back to `default` with a warning
fn parse_or<T>(var: &str, value: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match value.trim().parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("Invalid {}={:?}; using default {}", var, value, default);
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::load(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.converter.max_script_bytes, DEFAULT_MAX_SCRIPT_BYTES);
        assert_eq!(config.conversion_options().unwrap(), ConversionOptions::default());
    }

    #[test]
    fn test_converter_overrides() {
        let config = load(&[
            ("PORT", "8088"),
            ("CONVERTER_POLICY", "ignore"),
            ("CONVERTER_PRESERVE_COMMENTS", "true"),
            ("CONVERTER_PRETTY", "false"),
            ("CONVERTER_MAX_SCRIPT_BYTES", "4096"),
        ]);
        assert_eq!(config.server_address(), "0.0.0.0:8088");
        assert_eq!(config.converter.max_script_bytes, 4096);

        let options = config.conversion_options().unwrap();
        assert_eq!(options.policy, UnsupportedPolicy::Ignore);
        assert!(options.preserve_comments);
        assert!(!options.pretty);
    }

    #[test]
    fn test_invalid_numbers_fall_back_to_defaults() {
        let config = load(&[("PORT", "eighty"), ("CONVERTER_MAX_SCRIPT_BYTES", "-1")]);
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.converter.max_script_bytes, DEFAULT_MAX_SCRIPT_BYTES);
        assert_eq!(parse_or("PORT", " 8080 ", 3000u16), 8080);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let config = load(&[("CONVERTER_POLICY", "explode")]);
        assert!(config.conversion_options().is_err());
    }
}
