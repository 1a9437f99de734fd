//! Account-level setup run by `rdk init`: delivery bucket, service role,
//! configuration recorder and the rule code bucket.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::paths;
use crate::provider::CloudProvider;
use crate::scaffold;
use crate::types::Frequency;

pub const CONFIG_ROLE_POLICY_ARN: &str = "arn:aws:iam::aws:policy/service-role/AWSConfigRole";
pub const DELIVERY_POLICY_NAME: &str = "ConfigDeliveryPermissions";
pub const RECORDER_NAME: &str = "default";
pub const DELIVERY_CHANNEL_NAME: &str = "default";
pub const DELIVERY_FREQUENCY: Frequency = Frequency::SixHours;

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub account_id: String,
    pub config_bucket: String,
    pub code_bucket: String,
    pub role_arn: String,
    /// Resources that did not exist before this run.
    pub created: Vec<String>,
}

pub fn role_arn(account_id: &str, role: &str) -> String {
    format!("arn:aws:iam::{account_id}:role/{role}")
}

/// Fill the delivery policy placeholders for this account.
pub fn delivery_policy(template: &str, account_id: &str, config_bucket: &str) -> String {
    template
        .replace("CONFIGBUCKET", config_bucket)
        .replace("ACCOUNTID", account_id)
}

fn ensure_bucket(
    provider: &dyn CloudProvider,
    bucket: &str,
    created: &mut Vec<String>,
) -> Result<()> {
    if provider.bucket_exists(bucket)? {
        tracing::debug!(bucket, "bucket exists");
        return Ok(());
    }
    tracing::info!(bucket, "creating bucket");
    provider.create_bucket(bucket)?;
    created.push(format!("bucket:{bucket}"));
    Ok(())
}

/// Provision everything rules depend on. Safe to rerun: existing buckets
/// and roles are kept, policies and the recorder are re-put.
pub fn bootstrap(
    provider: &dyn CloudProvider,
    config: &Config,
    root: &Path,
    sleep: &dyn Fn(Duration),
) -> Result<BootstrapReport> {
    let account_id = provider.account_id()?;
    tracing::info!(account = %account_id, "bootstrapping account");
    let mut created = Vec::new();

    let config_bucket = config.config_bucket(&account_id);
    ensure_bucket(provider, &config_bucket, &mut created)?;

    let role = config.config_role_name.as_str();
    let role_created = if provider.role_exists(role)? {
        false
    } else {
        let assume = scaffold::read_document(root, paths::ASSUME_ROLE_POLICY_FILE)?;
        tracing::info!(role, "creating role");
        provider.create_role(role, &assume)?;
        created.push(format!("role:{role}"));
        true
    };
    provider.attach_role_policy(role, CONFIG_ROLE_POLICY_ARN)?;
    let delivery = delivery_policy(
        &scaffold::read_document(root, paths::DELIVERY_POLICY_FILE)?,
        &account_id,
        &config_bucket,
    );
    provider.put_role_policy(role, DELIVERY_POLICY_NAME, &delivery)?;

    if role_created {
        let wait = config.role_propagation();
        tracing::info!(seconds = wait.as_secs(), "waiting for role to propagate");
        sleep(wait);
    }

    let arn = role_arn(&account_id, role);
    provider.put_configuration_recorder(RECORDER_NAME, &arn)?;
    provider.put_delivery_channel(DELIVERY_CHANNEL_NAME, &config_bucket, DELIVERY_FREQUENCY)?;
    provider.start_configuration_recorder(RECORDER_NAME)?;

    let code_bucket = config.code_bucket(&account_id);
    ensure_bucket(provider, &code_bucket, &mut created)?;

    Ok(BootstrapReport {
        account_id,
        config_bucket,
        code_bucket,
        role_arn: arn,
        created,
    })
}
