//! Agent configuration

use anyhow::{bail, Result};
use sentinel_lib::Thresholds;
use serde::Deserialize;

/// Agent configuration, loaded from `SENTINEL_`-prefixed environment
/// variables.
#[derive(Debug, Clone, Deserialize)]
pub struct SentinelConfig {
    /// Graph API access token with ads_management scope
    #[serde(default)]
    pub access_token: String,

    /// Ad account identifier, with or without the `act_` prefix
    #[serde(default)]
    pub ad_account_id: String,

    /// Graph API origin
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,

    /// Graph API version segment
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,

    /// Seconds between monitoring cycles
    #[serde(default = "default_monitor_interval")]
    pub monitor_interval_secs: u64,

    /// Port for the health/metrics HTTP server
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Slack incoming-webhook URL; notifications are disabled when unset
    #[serde(default)]
    pub slack_webhook_url: Option<String>,

    // Decision threshold overrides. Unset fields fall back to the policy
    // defaults.
    #[serde(default)]
    pub min_impressions_for_check: Option<u64>,
    #[serde(default)]
    pub ctr_check_impressions: Option<u64>,
    #[serde(default)]
    pub min_ctr_percent: Option<f64>,
    #[serde(default)]
    pub cpc_check_spend: Option<f64>,
    #[serde(default)]
    pub max_cpc: Option<f64>,
    #[serde(default)]
    pub roas_check_spend: Option<f64>,
    #[serde(default)]
    pub min_roas: Option<f64>,
    #[serde(default)]
    pub winner_min_ctr: Option<f64>,
    #[serde(default)]
    pub winner_min_roas: Option<f64>,
    #[serde(default)]
    pub scale_rate: Option<f64>,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v21.0".to_string()
}

fn default_monitor_interval() -> u64 {
    sentinel_lib::DEFAULT_MONITOR_INTERVAL_SECS
}

fn default_api_port() -> u16 {
    8080
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            ad_account_id: String::new(),
            graph_api_base: default_graph_api_base(),
            graph_api_version: default_graph_api_version(),
            monitor_interval_secs: default_monitor_interval(),
            api_port: default_api_port(),
            slack_webhook_url: None,
            min_impressions_for_check: None,
            ctr_check_impressions: None,
            min_ctr_percent: None,
            cpc_check_spend: None,
            max_cpc: None,
            roas_check_spend: None,
            min_roas: None,
            winner_min_ctr: None,
            winner_min_roas: None,
            scale_rate: None,
        }
    }
}

impl SentinelConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("SENTINEL").try_parsing(true))
            .build()?;

        let config: SentinelConfig = config
            .try_deserialize()
            .unwrap_or_else(|_| SentinelConfig::default());

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.access_token.is_empty() {
            bail!("SENTINEL_ACCESS_TOKEN is required");
        }
        if self.ad_account_id.is_empty() {
            bail!("SENTINEL_AD_ACCOUNT_ID is required");
        }
        if self.monitor_interval_secs == 0 {
            bail!("SENTINEL_MONITOR_INTERVAL_SECS must be positive");
        }
        Ok(())
    }

    /// Decision thresholds with any configured overrides applied.
    pub fn thresholds(&self) -> Thresholds {
        let defaults = Thresholds::default();
        Thresholds {
            min_impressions_for_check: self
                .min_impressions_for_check
                .unwrap_or(defaults.min_impressions_for_check),
            ctr_check_impressions: self
                .ctr_check_impressions
                .unwrap_or(defaults.ctr_check_impressions),
            min_ctr_percent: self.min_ctr_percent.unwrap_or(defaults.min_ctr_percent),
            cpc_check_spend: self.cpc_check_spend.unwrap_or(defaults.cpc_check_spend),
            max_cpc: self.max_cpc.unwrap_or(defaults.max_cpc),
            roas_check_spend: self.roas_check_spend.unwrap_or(defaults.roas_check_spend),
            min_roas: self.min_roas.unwrap_or(defaults.min_roas),
            winner_min_ctr: self.winner_min_ctr.unwrap_or(defaults.winner_min_ctr),
            winner_min_roas: self.winner_min_roas.unwrap_or(defaults.winner_min_roas),
            scale_rate: self.scale_rate.unwrap_or(defaults.scale_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_credentials() {
        let config = SentinelConfig::default();
        assert!(config.validate().is_err());

        let config = SentinelConfig {
            access_token: "token".to_string(),
            ad_account_id: "act_123".to_string(),
            ..SentinelConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_thresholds_default_when_no_overrides() {
        let config = SentinelConfig::default();
        let thresholds = config.thresholds();
        assert_eq!(thresholds.min_impressions_for_check, 500);
        assert_eq!(thresholds.scale_rate, 1.5);
    }

    #[test]
    fn test_thresholds_overrides_apply() {
        let config = SentinelConfig {
            min_ctr_percent: Some(1.0),
            scale_rate: Some(2.0),
            ..SentinelConfig::default()
        };
        let thresholds = config.thresholds();
        assert_eq!(thresholds.min_ctr_percent, 1.0);
        assert_eq!(thresholds.scale_rate, 2.0);
        // Untouched fields keep their defaults.
        assert_eq!(thresholds.winner_min_roas, 4.0);
    }
}
