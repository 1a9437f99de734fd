//! Code publisher: point the rule's function at the freshly uploaded artifact.

use crate::config::Config;
use crate::error::{RdkError, Result};
use crate::package::ArtifactLocation;
use crate::provider::CloudProvider;
use crate::stack::StackManager;

/// Function identifier from the settled stack's outputs. Blocks on the same
/// poll loop the lifecycle manager uses.
pub fn resolve_function(
    manager: &StackManager<'_>,
    config: &Config,
    rule: &str,
) -> Result<String> {
    let stack = manager.wait_for_settle(rule)?;
    stack
        .output(&config.function_output_key)
        .map(str::to_string)
        .ok_or_else(|| RdkError::StackOutputMissing {
            stack: rule.to_string(),
            key: config.function_output_key.clone(),
        })
}

/// Replace the function code with `artifact` and publish a new version.
pub fn publish_code(
    provider: &dyn CloudProvider,
    manager: &StackManager<'_>,
    config: &Config,
    rule: &str,
    artifact: &ArtifactLocation,
) -> Result<String> {
    let function = resolve_function(manager, config, rule)?;
    tracing::info!(rule, function = %function, "publishing new function code");
    provider.update_function_code(&function, &artifact.bucket, &artifact.key, true)?;
    Ok(function)
}
