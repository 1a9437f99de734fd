//! The remote side of rdk: object storage, IAM, CloudFormation, AWS Config
//! and Lambda, behind one trait so the lifecycle logic can be driven by a
//! fake in tests.

use crate::error::Result;
use crate::types::Frequency;
use base64::Engine as _;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ProviderError
// ---------------------------------------------------------------------------

/// A classified error returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{operation} failed ({code}): {message}")]
pub struct ProviderError {
    pub code: String,
    pub operation: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        code: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// `describe-stacks` on a name that has no stack.
    pub fn is_stack_missing(&self) -> bool {
        self.code == "ValidationError" && self.message.contains("does not exist")
    }

    /// `update-stack` whose template and parameters match the live stack.
    pub fn is_no_updates(&self) -> bool {
        self.code == "ValidationError" && self.message.contains("No updates are to be performed")
    }
}

// ---------------------------------------------------------------------------
// Stack vocabulary
// ---------------------------------------------------------------------------

/// Raw CloudFormation stack status, e.g. `UPDATE_ROLLBACK_COMPLETE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct StackStatus(pub String);

impl StackStatus {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_in_progress(&self) -> bool {
        self.0.contains("IN_PROGRESS")
    }

    /// Terminal statuses that mean the last operation did not stick.
    pub fn is_failure(&self) -> bool {
        self.0.contains("FAILED") || self.0.contains("ROLLBACK")
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackOutput {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub name: String,
    pub status: StackStatus,
    pub outputs: Vec<StackOutput>,
}

impl StackDescription {
    pub fn output(&self, key: &str) -> Option<&str> {
        self.outputs
            .iter()
            .find(|o| o.key == key)
            .map(|o| o.value.as_str())
    }
}

/// Result of the existence probe. Transport and permission failures are the
/// `Err` arm of the surrounding `Result`, never `Absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackProbe {
    Absent,
    Present(StackDescription),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackParameter {
    #[serde(rename = "ParameterKey")]
    pub key: String,
    #[serde(rename = "ParameterValue")]
    pub value: String,
}

impl StackParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Everything `create-stack` and `update-stack` need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub name: String,
    pub template_body: String,
    pub parameters: Vec<StackParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NoUpdates,
}

// ---------------------------------------------------------------------------
// Function invocation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    /// Set when the function itself raised (`Handled` / `Unhandled`).
    pub function_error: Option<String>,
    pub payload: String,
    /// Base64 tail of the execution log.
    pub log_result: Option<String>,
}

impl Invocation {
    pub fn decoded_log(&self) -> Option<String> {
        let raw = self.log_result.as_deref()?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(raw.trim())
            .ok()?;
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}

// ---------------------------------------------------------------------------
// CloudProvider
// ---------------------------------------------------------------------------

pub trait CloudProvider {
    fn account_id(&self) -> Result<String>;

    // storage
    fn put_object(&self, bucket: &str, key: &str, body: &Path) -> Result<()>;
    fn bucket_exists(&self, bucket: &str) -> Result<bool>;
    fn create_bucket(&self, bucket: &str) -> Result<()>;

    // identity
    fn role_exists(&self, role: &str) -> Result<bool>;
    fn create_role(&self, role: &str, assume_role_policy: &str) -> Result<()>;
    fn attach_role_policy(&self, role: &str, policy_arn: &str) -> Result<()>;
    fn put_role_policy(&self, role: &str, policy_name: &str, document: &str) -> Result<()>;

    // recording
    fn put_configuration_recorder(&self, name: &str, role_arn: &str) -> Result<()>;
    fn put_delivery_channel(&self, name: &str, bucket: &str, frequency: Frequency) -> Result<()>;
    fn start_configuration_recorder(&self, name: &str) -> Result<()>;

    // stacks
    fn describe_stack(&self, name: &str) -> Result<StackProbe>;
    fn create_stack(&self, request: &StackRequest) -> Result<()>;
    fn update_stack(&self, request: &StackRequest) -> Result<UpdateOutcome>;

    // functions
    fn update_function_code(
        &self,
        function: &str,
        bucket: &str,
        key: &str,
        publish: bool,
    ) -> Result<()>;
    fn invoke(&self, function: &str, payload: &str) -> Result<Invocation>;
}

// ---------------------------------------------------------------------------
// In-memory provider for unit tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_missing_stack_and_no_updates() {
        let missing = ProviderError::new(
            "ValidationError",
            "DescribeStacks",
            "Stack with id r1 does not exist",
        );
        assert!(missing.is_stack_missing());
        assert!(!missing.is_no_updates());

        let noop = ProviderError::new(
            "ValidationError",
            "UpdateStack",
            "No updates are to be performed.",
        );
        assert!(noop.is_no_updates());
        assert!(!noop.is_stack_missing());

        let denied = ProviderError::new("AccessDenied", "DescribeStacks", "does not exist");
        assert!(!denied.is_stack_missing());
    }

    #[test]
    fn status_classification() {
        assert!(StackStatus::new("CREATE_IN_PROGRESS").is_in_progress());
        assert!(StackStatus::new("UPDATE_COMPLETE_CLEANUP_IN_PROGRESS").is_in_progress());
        assert!(!StackStatus::new("UPDATE_COMPLETE").is_in_progress());
        assert!(StackStatus::new("CREATE_FAILED").is_failure());
        assert!(StackStatus::new("UPDATE_ROLLBACK_COMPLETE").is_failure());
        assert!(!StackStatus::new("CREATE_COMPLETE").is_failure());
    }

    #[test]
    fn decodes_log_tail() {
        let inv = Invocation {
            log_result: Some("U1RBUlQgUmVxdWVzdElk".to_string()),
            ..Invocation::default()
        };
        assert_eq!(inv.decoded_log().as_deref(), Some("START RequestId"));
        assert_eq!(Invocation::default().decoded_log(), None);
    }
}
