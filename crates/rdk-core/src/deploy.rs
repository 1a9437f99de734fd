//! Deploy path for one rule: registry → packager → stack lifecycle → publisher.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::package;
use crate::provider::CloudProvider;
use crate::publish;
use crate::rule::RuleProject;
use crate::stack::{self, StackAction, StackManager};

#[derive(Debug, Clone, Serialize)]
pub struct DeployReport {
    pub rule: String,
    pub action: StackAction,
    pub status: String,
    pub bucket: String,
    pub key: String,
    /// Set when new code was pushed to an existing function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_to: Option<String>,
}

pub struct Deployer<'a> {
    provider: &'a dyn CloudProvider,
    config: &'a Config,
    root: &'a Path,
    account_id: String,
    sleep: &'a dyn Fn(Duration),
}

impl<'a> Deployer<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        config: &'a Config,
        root: &'a Path,
        sleep: &'a dyn Fn(Duration),
    ) -> Result<Self> {
        let account_id = provider.account_id()?;
        Ok(Self {
            provider,
            config,
            root,
            account_id,
            sleep,
        })
    }

    pub fn deploy(&self, rule: &str) -> Result<DeployReport> {
        let project = RuleProject::load(self.root, rule)?;
        let artifact = package::package_rule(
            self.provider,
            self.config,
            self.root,
            &project,
            &self.account_id,
        )?;

        let manager = StackManager::new(self.provider, self.config, self.sleep);
        let request = stack::build_request(self.root, &project, &artifact)?;
        let outcome = manager.reconcile(&request)?;

        let published_to = if outcome.action.needs_code_publish() {
            Some(publish::publish_code(
                self.provider,
                &manager,
                self.config,
                rule,
                &artifact,
            )?)
        } else {
            None
        };

        tracing::info!(
            rule,
            action = outcome.action.as_str(),
            status = %outcome.stack.status,
            "rule deployed"
        );
        Ok(DeployReport {
            rule: rule.to_string(),
            action: outcome.action,
            status: outcome.stack.status.to_string(),
            bucket: artifact.bucket,
            key: artifact.key,
            published_to,
        })
    }

    /// Deploy each rule in order. A failing rule is recorded and the batch
    /// moves on to the next one.
    pub fn deploy_all(&self, rules: &[String]) -> Vec<(String, Result<DeployReport>)> {
        rules
            .iter()
            .map(|rule| {
                let result = self.deploy(rule);
                if let Err(e) = &result {
                    tracing::error!(rule = %rule, error = %e, "deploy failed");
                }
                (rule.clone(), result)
            })
            .collect()
    }
}
