//! Stack lifecycle: probe the rule's stack, create or update it, then poll
//! until CloudFormation reports a status without `IN_PROGRESS`.
//!
//! ```text
//! ABSENT  --create--> CREATE_IN_PROGRESS --poll--> COMPLETE | FAILED
//! PRESENT --update--> UPDATE_IN_PROGRESS --poll--> COMPLETE | FAILED | NO_OP
//! ```
//!
//! The poll loop has no timeout and no retry budget. It returns only when the
//! provider reports a settled status; an operator interrupt is the only other
//! way out.

use std::path::Path;
use std::time::Duration;

use serde::Serialize;

use crate::config::Config;
use crate::error::{RdkError, Result};
use crate::package::ArtifactLocation;
use crate::paths;
use crate::provider::{
    CloudProvider, StackDescription, StackParameter, StackProbe, StackRequest, StackStatus,
    UpdateOutcome,
};
use crate::rule::RuleProject;
use crate::scaffold;

/// What the reconcile step did to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StackAction {
    Created,
    Updated,
    NoOp,
}

impl StackAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StackAction::Created => "created",
            StackAction::Updated => "updated",
            StackAction::NoOp => "no_op",
        }
    }

    /// Only the update path needs an explicit code push: the template keeps
    /// pointing at the same bucket and key even when the object changed.
    pub fn needs_code_publish(self) -> bool {
        matches!(self, StackAction::Updated | StackAction::NoOp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutcome {
    pub action: StackAction,
    pub stack: StackDescription,
}

/// Template parameters for a rule's stack. Absent optional values are sent
/// as the empty string; the template's conditions key off it.
pub fn stack_parameters(project: &RuleProject, artifact: &ArtifactLocation) -> Vec<StackParameter> {
    vec![
        StackParameter::new("SourceBucket", &artifact.bucket),
        StackParameter::new("SourcePath", &artifact.key),
        StackParameter::new("SourceRuntime", project.source_runtime.as_str()),
        StackParameter::new("SourceHandler", project.source_runtime.handler(project.name())),
        StackParameter::new("SourceEvents", project.resource_types().join(",")),
        StackParameter::new(
            "SourcePeriodic",
            project
                .source_periodic
                .map(|f| f.as_str().to_string())
                .unwrap_or_default(),
        ),
        StackParameter::new(
            "SourceInputParameters",
            project.input_parameters.clone().unwrap_or_default(),
        ),
    ]
}

pub fn build_request(
    root: &Path,
    project: &RuleProject,
    artifact: &ArtifactLocation,
) -> Result<StackRequest> {
    Ok(StackRequest {
        name: project.name().to_string(),
        template_body: scaffold::read_document(root, paths::STACK_TEMPLATE_FILE)?,
        parameters: stack_parameters(project, artifact),
    })
}

pub struct StackManager<'a> {
    provider: &'a dyn CloudProvider,
    poll_interval: Duration,
    sleep: &'a dyn Fn(Duration),
}

impl<'a> StackManager<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        config: &Config,
        sleep: &'a dyn Fn(Duration),
    ) -> Self {
        Self {
            provider,
            poll_interval: config.poll_interval(),
            sleep,
        }
    }

    /// Make the stack named `request.name` reflect `request`, then wait for
    /// it to settle. A settled failure status is returned as an error.
    pub fn reconcile(&self, request: &StackRequest) -> Result<StackOutcome> {
        let name = request.name.as_str();
        let action = match self.provider.describe_stack(name)? {
            StackProbe::Absent => {
                tracing::info!(stack = name, "creating stack");
                self.provider.create_stack(request)?;
                StackAction::Created
            }
            StackProbe::Present(existing) => {
                tracing::info!(stack = name, status = %existing.status, "updating stack");
                match self.provider.update_stack(request)? {
                    UpdateOutcome::Updated => StackAction::Updated,
                    UpdateOutcome::NoUpdates => {
                        tracing::info!(stack = name, "no changes to stack definition");
                        StackAction::NoOp
                    }
                }
            }
        };

        let stack = self.wait_for_settle(name)?;
        if stack.status.is_failure() {
            return Err(RdkError::StackFailed {
                stack: name.to_string(),
                status: stack.status.to_string(),
            });
        }
        Ok(StackOutcome { action, stack })
    }

    /// Re-describe the stack every poll interval until its status no longer
    /// contains `IN_PROGRESS`.
    pub fn wait_for_settle(&self, name: &str) -> Result<StackDescription> {
        loop {
            let stack = match self.provider.describe_stack(name)? {
                StackProbe::Present(stack) => stack,
                StackProbe::Absent => return Err(RdkError::StackNotFound(name.to_string())),
            };
            if !stack.status.is_in_progress() {
                tracing::debug!(stack = name, status = %stack.status, "stack settled");
                return Ok(stack);
            }
            tracing::info!(
                stack = name,
                status = %stack.status,
                "waiting for stack operation to complete"
            );
            (self.sleep)(self.poll_interval);
        }
    }

    /// Current status, or `None` when the stack does not exist. Never waits.
    pub fn status(&self, name: &str) -> Result<Option<StackStatus>> {
        Ok(match self.provider.describe_stack(name)? {
            StackProbe::Absent => None,
            StackProbe::Present(stack) => Some(stack.status),
        })
    }
}
