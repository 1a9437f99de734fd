use crate::error::Result;
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Process-wide settings, read once from `.rdk/config.yaml` and passed by
/// reference to every component that needs a bucket prefix or a timing knob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_code_bucket_prefix")]
    pub code_bucket_prefix: String,
    #[serde(default = "default_config_bucket_prefix")]
    pub config_bucket_prefix: String,
    #[serde(default = "default_config_role_name")]
    pub config_role_name: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_role_propagation_secs")]
    pub role_propagation_secs: u64,
    #[serde(default = "default_function_output_key")]
    pub function_output_key: String,
    #[serde(default = "default_region")]
    pub default_region: String,
    /// Explicit path to the `aws` binary. `RDK_AWS_CLI` wins over this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws_cli: Option<PathBuf>,
}

fn default_code_bucket_prefix() -> String {
    "config-rule-code-bucket-".to_string()
}

fn default_config_bucket_prefix() -> String {
    "config-bucket-".to_string()
}

fn default_config_role_name() -> String {
    "config-role".to_string()
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_role_propagation_secs() -> u64 {
    16
}

fn default_function_output_key() -> String {
    "RuleCodeLambda".to_string()
}

fn default_region() -> String {
    "ap-southeast-1".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            code_bucket_prefix: default_code_bucket_prefix(),
            config_bucket_prefix: default_config_bucket_prefix(),
            config_role_name: default_config_role_name(),
            poll_interval_secs: default_poll_interval_secs(),
            role_propagation_secs: default_role_propagation_secs(),
            function_output_key: default_function_output_key(),
            default_region: default_region(),
            aws_cli: None,
        }
    }
}

impl Config {
    /// Load `.rdk/config.yaml`; a missing file yields the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn code_bucket(&self, account_id: &str) -> String {
        format!("{}{}", self.code_bucket_prefix, account_id)
    }

    pub fn config_bucket(&self, account_id: &str) -> String {
        format!("{}{}", self.config_bucket_prefix, account_id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn role_propagation(&self) -> Duration {
        Duration::from_secs(self.role_propagation_secs)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.poll_interval_secs == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "poll_interval_secs is 0; stack polling will spin without pausing"
                    .to_string(),
            });
        }

        for (field, value) in [
            ("code_bucket_prefix", &self.code_bucket_prefix),
            ("config_bucket_prefix", &self.config_bucket_prefix),
        ] {
            if value.is_empty() {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Error,
                    message: format!("{field} is empty; bucket names would be the bare account id"),
                });
            }
        }

        if self.function_output_key.trim().is_empty() {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "function_output_key is empty; code publishing cannot find the function"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Credentials and region for the one authenticated session a run uses.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub profile: Option<String>,
    pub access_key: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: String,
}

impl Session {
    /// Static keys are only used when both halves are present and no
    /// profile was named.
    pub fn static_keys(&self) -> Option<(&str, &str)> {
        if self.profile.is_some() {
            return None;
        }
        match (&self.access_key, &self.secret_access_key) {
            (Some(k), Some(s)) => Some((k.as_str(), s.as_str())),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
