use crate::error::{RdkError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const RDK_DIR: &str = ".rdk";
pub const EXAMPLE_CI_DIR: &str = ".rdk/example_ci";

pub const CONFIG_FILE: &str = ".rdk/config.yaml";
pub const STACK_TEMPLATE_FILE: &str = ".rdk/rdk-rule.template.json";
pub const EVENT_TEMPLATE_FILE: &str = ".rdk/test_event_template.json";
pub const ASSUME_ROLE_POLICY_FILE: &str = ".rdk/configRoleAssumeRolePolicyDoc.json";
pub const DELIVERY_POLICY_FILE: &str = ".rdk/deliveryPermissionsPolicy.json";

pub const PYTHON_CODE_TEMPLATE: &str = "rule_code.py";
pub const NODE_CODE_TEMPLATE: &str = "rule_code.js";
pub const UTIL_FILE: &str = "rule_util.py";

pub const PARAMETERS_FILE: &str = "parameters.json";
pub const RULE_TEST_CI_FILE: &str = "test_ci.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn rdk_dir(root: &Path) -> PathBuf {
    root.join(RDK_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn rule_dir(root: &Path, rule: &str) -> PathBuf {
    root.join(rule)
}

pub fn parameters_path(root: &Path, rule: &str) -> PathBuf {
    rule_dir(root, rule).join(PARAMETERS_FILE)
}

pub fn rule_source(root: &Path, rule: &str, ext: &str) -> PathBuf {
    rule_dir(root, rule).join(format!("{rule}.{ext}"))
}

pub fn rule_test_ci_path(root: &Path, rule: &str) -> PathBuf {
    rule_dir(root, rule).join(RULE_TEST_CI_FILE)
}

pub fn example_ci_dir(root: &Path) -> PathBuf {
    root.join(EXAMPLE_CI_DIR)
}

/// `AWS::S3::Bucket` → `AWS_S3_Bucket.json`
pub fn fixture_file_name(resource_type: &str) -> String {
    format!("{}.json", resource_type.replace("::", "_"))
}

pub fn fixture_path(root: &Path, resource_type: &str) -> PathBuf {
    example_ci_dir(root).join(fixture_file_name(resource_type))
}

pub fn event_template_path(root: &Path) -> PathBuf {
    root.join(EVENT_TEMPLATE_FILE)
}

/// Artifact object key for a rule.
pub fn artifact_key(rule: &str) -> String {
    format!("{rule}.zip")
}

// ---------------------------------------------------------------------------
// Rule name validation
// ---------------------------------------------------------------------------

/// Prefix the stack template puts in front of the stack (rule) name to form
/// the function name.
pub const FUNCTION_NAME_PREFIX: &str = "RDK-Rule-Function-";

/// The function service rejects longer function names.
pub const FUNCTION_NAME_MAX: usize = 64;

/// Longest rule name whose derived function name is still accepted.
pub const RULE_NAME_MAX: usize = FUNCTION_NAME_MAX - FUNCTION_NAME_PREFIX.len();

static RULE_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn rule_name_re() -> &'static Regex {
    RULE_NAME_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_\-]*$").unwrap())
}

pub fn validate_rule_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > RULE_NAME_MAX || !rule_name_re().is_match(name) {
        return Err(RdkError::InvalidRuleName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
