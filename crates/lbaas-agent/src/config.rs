//! # Agent Configuration
//!
//! Configuration management for the LBaaS agent.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LBAAS_AGENT_HOST=lb-agent-01                                       │
//! │     LBAAS_RESYNC_INTERVAL_SECS=40                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/lbaas-agent/agent.toml (Linux)                           │
//! │     ~/Library/Application Support/org.lbaas.lbaas-agent/agent.toml     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # agent.toml
//! [agent]
//! host = "lb-agent-01"
//!
//! [reconcile]
//! resync_interval_secs = 40
//! stats_interval_secs = 6
//! backup_interval_secs = 600
//!
//! [device]
//! driver = "icontrol"
//! device_type = "external"
//! ha_type = "pair"      # standalone | pair | scalen
//! use_namespaces = true
//! snat_mode = true
//! snat_addresses_per_subnet = 1
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};

// =============================================================================
// HA Type
// =============================================================================

/// High-availability topology of the managed devices.
///
/// The engine does not interpret this; it is handed to the device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HaType {
    /// A single device.
    Standalone,

    /// Active/standby pair.
    #[default]
    Pair,

    /// Scale-N cluster of active devices.
    Scalen,
}

impl std::fmt::Display for HaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HaType::Standalone => write!(f, "standalone"),
            HaType::Pair => write!(f, "pair"),
            HaType::Scalen => write!(f, "scalen"),
        }
    }
}

impl std::str::FromStr for HaType {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standalone" | "single" => Ok(HaType::Standalone),
            "pair" | "active_standby" => Ok(HaType::Pair),
            "scalen" | "scale_n" => Ok(HaType::Scalen),
            other => Err(AgentError::InvalidConfig(format!(
                "Unknown HA type: '{}'. Valid options: standalone, pair, scalen",
                other
            ))),
        }
    }
}

// =============================================================================
// Agent Settings
// =============================================================================

/// Identity of this agent towards the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Host name this agent registers under. Inbound requests addressed to
    /// another host are ignored.
    #[serde(default = "default_host")]
    pub host: String,
}

fn default_host() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

impl Default for AgentSettings {
    fn default() -> Self {
        AgentSettings {
            host: default_host(),
        }
    }
}

// =============================================================================
// Reconcile Settings
// =============================================================================

/// Timing of the periodic triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Interval between resync checks (seconds). A full pass only runs when
    /// a resync is pending.
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Interval between statistics collection rounds (seconds).
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,

    /// Interval between device configuration backups (seconds).
    #[serde(default = "default_backup_interval")]
    pub backup_interval_secs: u64,

    /// Capacity of the inbound event queue.
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
}

fn default_resync_interval() -> u64 {
    40
}
fn default_stats_interval() -> u64 {
    6
}
fn default_backup_interval() -> u64 {
    600
}
fn default_event_capacity() -> usize {
    100
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        ReconcileSettings {
            resync_interval_secs: default_resync_interval(),
            stats_interval_secs: default_stats_interval(),
            backup_interval_secs: default_backup_interval(),
            event_channel_capacity: default_event_capacity(),
        }
    }
}

// =============================================================================
// Device Settings
// =============================================================================

/// Device driver selection and connection behavior.
///
/// The engine reads only the reconnect fields. `driver`, `device_type`,
/// `ha_type`, `use_namespaces`, `snat_mode` and `snat_addresses_per_subnet`
/// are passed through to the driver, which is built from this section by
/// the embedding process; the engine logs them at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Name of the device driver to load.
    #[serde(default = "default_driver")]
    pub driver: String,

    /// How devices are onboarded.
    #[serde(default = "default_device_type")]
    pub device_type: String,

    /// HA topology of the devices.
    #[serde(default)]
    pub ha_type: HaType,

    /// Isolate tenants in separate routing domains (overlapping IPs).
    #[serde(default = "default_true")]
    pub use_namespaces: bool,

    /// Use SNAT addresses rather than routed mode.
    #[serde(default = "default_true")]
    pub snat_mode: bool,

    /// SNAT addresses to allocate per member subnet.
    #[serde(default = "default_snat_addresses")]
    pub snat_addresses_per_subnet: u32,

    /// Initial backoff (milliseconds) when re-establishing the device session.
    #[serde(default = "default_initial_backoff")]
    pub reconnect_initial_backoff_ms: u64,

    /// Maximum backoff (seconds) between reconnection attempts.
    #[serde(default = "default_max_backoff")]
    pub reconnect_max_backoff_secs: u64,

    /// Give up reconnecting after this long (seconds) and fail the call.
    #[serde(default = "default_max_elapsed")]
    pub reconnect_max_elapsed_secs: u64,

    /// Maximum reconnection attempts per device call.
    #[serde(default = "default_max_retries")]
    pub reconnect_max_retries: u32,
}

fn default_true() -> bool {
    true
}
fn default_driver() -> String {
    "icontrol".to_string()
}
fn default_device_type() -> String {
    "external".to_string()
}
fn default_snat_addresses() -> u32 {
    1
}
fn default_initial_backoff() -> u64 {
    500
}
fn default_max_backoff() -> u64 {
    10
}
fn default_max_elapsed() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            driver: default_driver(),
            device_type: default_device_type(),
            ha_type: HaType::default(),
            use_namespaces: true,
            snat_mode: true,
            snat_addresses_per_subnet: default_snat_addresses(),
            reconnect_initial_backoff_ms: default_initial_backoff(),
            reconnect_max_backoff_secs: default_max_backoff(),
            reconnect_max_elapsed_secs: default_max_elapsed(),
            reconnect_max_retries: default_max_retries(),
        }
    }
}

// =============================================================================
// Main Agent Configuration
// =============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub agent: AgentSettings,

    #[serde(default)]
    pub reconcile: ReconcileSettings,

    #[serde(default)]
    pub device: DeviceSettings,
}

impl AgentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (agent.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> AgentResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading agent config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load agent config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> AgentResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| AgentError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Agent config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> AgentResult<()> {
        if self.agent.host.trim().is_empty() {
            return Err(AgentError::InvalidConfig("agent.host must not be empty".into()));
        }

        if self.device.driver.trim().is_empty() {
            return Err(AgentError::InvalidConfig(
                "device.driver must name a device driver".into(),
            ));
        }

        let intervals = [
            ("resync_interval_secs", self.reconcile.resync_interval_secs),
            ("stats_interval_secs", self.reconcile.stats_interval_secs),
            ("backup_interval_secs", self.reconcile.backup_interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(AgentError::InvalidConfig(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        if self.reconcile.event_channel_capacity == 0 {
            return Err(AgentError::InvalidConfig(
                "event_channel_capacity must be greater than 0".into(),
            ));
        }

        if self.device.reconnect_max_retries == 0 {
            return Err(AgentError::InvalidConfig(
                "reconnect_max_retries must be at least 1".into(),
            ));
        }

        if self.device.snat_mode && self.device.snat_addresses_per_subnet == 0 {
            return Err(AgentError::InvalidConfig(
                "snat_addresses_per_subnet must be at least 1 in SNAT mode".into(),
            ));
        }

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = std::env::var("LBAAS_AGENT_HOST") {
            debug!(host = %host, "Overriding agent host from environment");
            self.agent.host = host;
        }

        if let Ok(driver) = std::env::var("LBAAS_DEVICE_DRIVER") {
            debug!(driver = %driver, "Overriding device driver from environment");
            self.device.driver = driver;
        }

        if let Ok(ha_type) = std::env::var("LBAAS_HA_TYPE") {
            match ha_type.parse() {
                Ok(parsed) => self.device.ha_type = parsed,
                Err(_) => warn!(ha_type = %ha_type, "Unknown HA type in environment"),
            }
        }

        if let Ok(secs) = std::env::var("LBAAS_RESYNC_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                debug!(secs = s, "Overriding resync interval from environment");
                self.reconcile.resync_interval_secs = s;
            }
        }

        if let Ok(secs) = std::env::var("LBAAS_STATS_INTERVAL_SECS") {
            if let Ok(s) = secs.parse::<u64>() {
                self.reconcile.stats_interval_secs = s;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "lbaas", "lbaas-agent")
            .map(|dirs| dirs.config_dir().join("agent.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn host(&self) -> &str {
        &self.agent.host
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.resync_interval_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.stats_interval_secs)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile.backup_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ha_type_parsing() {
        assert_eq!("pair".parse::<HaType>().unwrap(), HaType::Pair);
        assert_eq!("Standalone".parse::<HaType>().unwrap(), HaType::Standalone);
        assert_eq!("scale_n".parse::<HaType>().unwrap(), HaType::Scalen);
        assert!("cluster".parse::<HaType>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = AgentConfig::default();
        assert!(!config.agent.host.is_empty());
        assert_eq!(config.reconcile.resync_interval_secs, 40);
        assert_eq!(config.reconcile.stats_interval_secs, 6);
        assert_eq!(config.backup_interval(), Duration::from_secs(600));
        assert_eq!(config.device.ha_type, HaType::Pair);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AgentConfig::default();

        config.agent.host = "  ".to_string();
        assert!(config.validate().is_err());

        config.agent.host = "lb-agent-01".to_string();
        config.reconcile.stats_interval_secs = 0;
        assert!(config.validate().is_err());

        config.reconcile.stats_interval_secs = 6;
        config.device.snat_addresses_per_subnet = 0;
        assert!(config.validate().is_err());

        config.device.snat_mode = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AgentConfig = toml::from_str(
            r#"
            [agent]
            host = "lb-agent-07"

            [device]
            ha_type = "scalen"
            "#,
        )
        .unwrap();

        assert_eq!(config.host(), "lb-agent-07");
        assert_eq!(config.device.ha_type, HaType::Scalen);
        assert_eq!(config.device.driver, "icontrol");
        assert_eq!(config.reconcile.backup_interval_secs, 600);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AgentConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("[reconcile]"));
        assert!(toml_str.contains("[device]"));
    }
}
