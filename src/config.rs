//! Configuration for the demo server.
//!
//! Config is loaded once at startup from a TOML file and validated before
//! the server opens any ports. Invalid configs are rejected with a clear
//! error rather than silently falling back to defaults. Every setting has a
//! default, so an empty file (or a missing one handled by the caller) is a
//! valid configuration.
//!
//! # Example
//! ```toml
//! [server]
//! app_port   = 8080
//! admin_port = 8081
//! log_level  = "exchange_trace=debug"
//!
//! [timeline]
//! capacity = 512
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub timeline: TimelineConfig,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("parsing config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.app_port != self.server.admin_port,
            "app_port and admin_port must differ (both are {})",
            self.server.app_port
        );
        anyhow::ensure!(
            self.timeline.capacity > 0,
            "timeline capacity must be at least 1"
        );
        Ok(())
    }
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Port for the traced demo application (default: 8080).
    #[serde(default = "defaults::app_port")]
    pub app_port: u16,

    /// Port for the admin API (default: 8081).
    #[serde(default = "defaults::admin_port")]
    pub admin_port: u16,

    /// Log filter used when `RUST_LOG` is not set.
    #[serde(default)]
    pub log_level: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            app_port: defaults::app_port(),
            admin_port: defaults::admin_port(),
            log_level: None,
        }
    }
}

/// In-memory timeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimelineConfig {
    /// Number of committed events to keep (default: 512). Oldest entries
    /// are evicted once the buffer is full.
    #[serde(default = "defaults::timeline_capacity")]
    pub capacity: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            capacity: defaults::timeline_capacity(),
        }
    }
}

mod defaults {
    pub fn app_port() -> u16 { 8080 }
    pub fn admin_port() -> u16 { 8081 }
    pub fn timeline_capacity() -> usize { 512 }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Parsing & defaults
    // -----------------------------------------------------------------------

    #[test]
    fn parse_example_config() {
        let content = include_str!("../config.example.toml");
        let config: Config = toml::from_str(content).expect("example config should parse");
        config.validate().expect("example config should be valid");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.server.app_port, 8080);
        assert_eq!(config.server.admin_port, 8081);
        assert_eq!(config.timeline.capacity, 512);
        assert!(config.server.log_level.is_none());
    }

    #[test]
    fn partial_section_keeps_remaining_defaults() {
        let config: Config = toml::from_str(
            r#"
            [server]
            app_port = 9000
            "#,
        )
        .expect("should parse");
        assert_eq!(config.server.app_port, 9000);
        assert_eq!(config.server.admin_port, 8081);
    }

    #[test]
    fn log_level_is_read_when_present() {
        let config: Config = toml::from_str(
            r#"
            [server]
            log_level = "exchange_trace=trace"
            "#,
        )
        .expect("should parse");
        assert_eq!(config.server.log_level.as_deref(), Some("exchange_trace=trace"));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn validation_rejects_colliding_ports() {
        let config: Config = toml::from_str(
            r#"
            [server]
            app_port   = 8080
            admin_port = 8080
            "#,
        )
        .expect("should parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_rejects_zero_capacity() {
        let config: Config = toml::from_str(
            r#"
            [timeline]
            capacity = 0
            "#,
        )
        .expect("should parse");
        assert!(config.validate().is_err());
    }
}
