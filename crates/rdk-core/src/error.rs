use thiserror::Error;

use crate::provider::ProviderError;

#[derive(Debug, Error)]
pub enum RdkError {
    #[error("not initialized: run 'rdk init'")]
    NotInitialized,

    // --- usage ---------------------------------------------------------------
    #[error("you may specify either specific rules or --all, but not both")]
    ConflictingSelection,

    #[error("no rules selected: pass rule names or --all")]
    NoRulesSelected,

    #[error("runtime is required for '{0}'")]
    MissingRuntime(&'static str),

    #[error("rule '{0}' needs an event trigger (--events) or a periodic trigger (--periodic)")]
    MissingTrigger(String),

    #[error("invalid rule name '{0}': use letters, digits, '-' or '_' (max 46)")]
    InvalidRuleName(String),

    #[error("invalid runtime '{0}'")]
    InvalidRuntime(String),

    #[error("invalid frequency '{0}'")]
    InvalidFrequency(String),

    #[error("invalid test parameters JSON: {0}")]
    InvalidTestParameters(String),

    #[error("rule '{0}' has no event trigger; pass --test-ci-types to choose resource types")]
    NoResourceTypes(String),

    #[error("{0} is not supported yet")]
    Unsupported(&'static str),

    // --- not found -----------------------------------------------------------
    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("rule already exists: {0}")]
    RuleExists(String),

    #[error("parameters file not found for rule '{0}'")]
    ParametersNotFound(String),

    #[error("no test fixture for resource type '{resource_type}' (expected {file})")]
    FixtureNotFound { resource_type: String, file: String },

    #[error("event template not found: {0}")]
    EventTemplateNotFound(String),

    #[error("stack '{stack}' has no output '{key}'; the stack template does not match this rule")]
    StackOutputMissing { stack: String, key: String },

    #[error("stack '{0}' does not exist; deploy the rule first")]
    StackNotFound(String),

    // --- deployment / evaluation ---------------------------------------------
    #[error("deployment failed for '{rule}': {reason}")]
    Deployment { rule: String, reason: String },

    #[error("stack '{stack}' settled in failure status {status}")]
    StackFailed { stack: String, status: String },

    #[error("local testing is not available for runtime '{0}'")]
    UnsupportedRuntime(String),

    #[error("no interpreter found for runtime '{0}'")]
    NoInterpreter(String),

    #[error("rule evaluation failed: {0}")]
    Evaluation(String),

    #[error("packaging failed: {0}")]
    Archive(String),

    #[error("aws command-line client not found: install it or set RDK_AWS_CLI")]
    AwsCliNotFound,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RdkError>;
