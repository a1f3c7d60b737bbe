//! Configuration for paygate-node.

use crate::identity::Identity;
use crate::market::{ProposalId, ServiceProposal};
use crate::pingpong::BalanceTrackerConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How sessions are metered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerMode {
    /// Poll the hermes channel and stop sessions when it runs dry.
    #[default]
    Hermes,
    /// Never stop sessions for payment reasons.
    Noop,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Advertised proposal.
    #[serde(default)]
    pub proposal: ProposalConfig,

    /// Payment settings.
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Session settings.
    #[serde(default)]
    pub session: SessionConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// The proposal sessions are admitted against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Proposal ID consumers must reference.
    #[serde(default)]
    pub id: ProposalId,

    /// Provider identity address.
    #[serde(default)]
    pub provider_id: String,

    /// Service type offered.
    #[serde(default = "default_service_type")]
    pub service_type: String,
}

/// Hermes payment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Hermes identity address.
    #[serde(default)]
    pub hermes_id: String,

    /// Seconds between balance checks of a live session.
    #[serde(default = "default_balance_check_interval")]
    pub balance_check_interval_secs: u64,

    /// Net balance at or below which sessions are stopped.
    #[serde(default)]
    pub min_balance: u64,

    /// Consecutive failed checks tolerated before a session is stopped.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// Seconds between refreshes of the provider's own earnings (0 disables).
    #[serde(default = "default_earnings_refresh_interval")]
    pub earnings_refresh_interval_secs: u64,
}

/// Session lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Balance tracker used for new sessions.
    #[serde(default)]
    pub tracker: TrackerMode,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            proposal: ProposalConfig::default(),
            payment: PaymentConfig::default(),
            session: SessionConfig::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            id: 0,
            provider_id: String::new(),
            service_type: default_service_type(),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            hermes_id: String::new(),
            balance_check_interval_secs: default_balance_check_interval(),
            min_balance: 0,
            max_consecutive_failures: default_max_consecutive_failures(),
            earnings_refresh_interval_secs: default_earnings_refresh_interval(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tracker: TrackerMode::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_type() -> String {
    "wireguard".to_string()
}

const fn default_balance_check_interval() -> u64 {
    60
}

const fn default_max_consecutive_failures() -> u32 {
    3
}

const fn default_earnings_refresh_interval() -> u64 {
    300
}

impl ProposalConfig {
    /// Build the advertised proposal.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider address is invalid.
    pub fn to_proposal(&self) -> crate::Result<ServiceProposal> {
        let provider_id = Identity::parse(&self.provider_id)
            .map_err(|e| crate::Error::Config(format!("proposal.provider_id: {e}")))?;
        Ok(ServiceProposal::new(
            self.id,
            provider_id,
            self.service_type.clone(),
        ))
    }
}

impl PaymentConfig {
    /// Parse the configured hermes identity, `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the hermes address is set but invalid.
    pub fn hermes_identity(&self) -> crate::Result<Option<Identity>> {
        if self.hermes_id.is_empty() {
            return Ok(None);
        }
        Identity::parse(&self.hermes_id)
            .map(Some)
            .map_err(|e| crate::Error::Config(format!("payment.hermes_id: {e}")))
    }

    /// Interval of the provider's own earnings refresh, `None` when disabled.
    #[must_use]
    pub fn earnings_refresh_interval(&self) -> Option<Duration> {
        (self.earnings_refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.earnings_refresh_interval_secs))
    }

    /// Polling policy for live balance trackers.
    #[must_use]
    pub fn tracker_config(&self) -> BalanceTrackerConfig {
        BalanceTrackerConfig {
            check_interval: Duration::from_secs(self.balance_check_interval_secs.max(1)),
            min_balance: u128::from(self.min_balance),
            max_consecutive_failures: self.max_consecutive_failures.max(1),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
