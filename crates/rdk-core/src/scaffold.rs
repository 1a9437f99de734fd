//! Managed contents of the `.rdk/` directory written by `rdk init`.

use crate::config::Config;
use crate::error::Result;
use crate::io;
use crate::paths;
use std::path::Path;

const STACK_TEMPLATE: &str = include_str!("../templates/rdk-rule.template.json");
const PYTHON_CODE_TEMPLATE: &str = include_str!("../templates/rule_code.py");
const NODE_CODE_TEMPLATE: &str = include_str!("../templates/rule_code.js");
const UTIL_MODULE: &str = include_str!("../templates/rule_util.py");
const ASSUME_ROLE_POLICY: &str = include_str!("../templates/configRoleAssumeRolePolicyDoc.json");
const DELIVERY_POLICY: &str = include_str!("../templates/deliveryPermissionsPolicy.json");
const EVENT_TEMPLATE: &str = include_str!("../templates/test_event_template.json");

/// Built-in configuration item fixtures, keyed by file name.
pub const FIXTURES: &[(&str, &str)] = &[
    (
        "AWS_S3_Bucket.json",
        include_str!("../templates/example_ci/AWS_S3_Bucket.json"),
    ),
    (
        "AWS_IAM_Role.json",
        include_str!("../templates/example_ci/AWS_IAM_Role.json"),
    ),
    (
        "AWS_EC2_Instance.json",
        include_str!("../templates/example_ci/AWS_EC2_Instance.json"),
    ),
    (
        "AWS_EC2_SecurityGroup.json",
        include_str!("../templates/example_ci/AWS_EC2_SecurityGroup.json"),
    ),
];

/// Outcome of writing one scaffold file, for `init` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileAction {
    Written,
    Kept,
}

/// Write (or refresh) the scaffold. Managed files are always overwritten;
/// `config.yaml` is only written when missing so local tuning survives.
pub fn write_scaffold(root: &Path) -> Result<Vec<(String, FileAction)>> {
    let mut report = Vec::new();
    io::ensure_dir(&paths::example_ci_dir(root))?;

    let rdk = paths::rdk_dir(root);
    let managed: [(&str, &str); 7] = [
        (paths::STACK_TEMPLATE_FILE, STACK_TEMPLATE),
        (paths::EVENT_TEMPLATE_FILE, EVENT_TEMPLATE),
        (paths::ASSUME_ROLE_POLICY_FILE, ASSUME_ROLE_POLICY),
        (paths::DELIVERY_POLICY_FILE, DELIVERY_POLICY),
        (".rdk/rule_code.py", PYTHON_CODE_TEMPLATE),
        (".rdk/rule_code.js", NODE_CODE_TEMPLATE),
        (".rdk/rule_util.py", UTIL_MODULE),
    ];
    for (rel, content) in managed {
        io::atomic_write(&root.join(rel), content.as_bytes())?;
        report.push((rel.to_string(), FileAction::Written));
    }

    for (name, content) in FIXTURES {
        io::atomic_write(&rdk.join("example_ci").join(name), content.as_bytes())?;
        report.push((format!("{}/{name}", paths::EXAMPLE_CI_DIR), FileAction::Written));
    }

    let config_yaml = serde_yaml::to_string(&Config::default())?;
    let action = if io::write_if_missing(&paths::config_path(root), config_yaml.as_bytes())? {
        FileAction::Written
    } else {
        FileAction::Kept
    };
    report.push((paths::CONFIG_FILE.to_string(), action));

    Ok(report)
}

/// Read a scaffold document, failing with `NotInitialized` when absent.
pub fn read_document(root: &Path, rel: &str) -> Result<String> {
    let path = root.join(rel);
    if !path.exists() {
        return Err(crate::error::RdkError::NotInitialized);
    }
    Ok(std::fs::read_to_string(path)?)
}
