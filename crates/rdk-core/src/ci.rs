//! Configuration item inputs for rule tests.

use std::path::Path;

use serde_json::Value;

use crate::error::{RdkError, Result};
use crate::paths;
use crate::rule::{split_resource_types, RuleProject};

/// Caller-supplied overrides, straight from the command line.
#[derive(Debug, Clone, Default)]
pub struct CiRequest {
    pub ci_json: Option<String>,
    pub ci_types: Option<String>,
}

/// Where a rule's test inputs come from, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CiSource {
    ExplicitJson,
    ExplicitTypes(Vec<String>),
    RuleFixture,
    TriggerTypes(Vec<String>),
}

/// One configuration item to feed a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct TestCi {
    pub resource_type: String,
    pub item: Value,
}

pub fn resolve_source(root: &Path, project: &RuleProject, request: &CiRequest) -> Result<CiSource> {
    if request.ci_json.is_some() {
        return Ok(CiSource::ExplicitJson);
    }
    if let Some(raw) = request.ci_types.as_deref() {
        let types = split_resource_types(raw);
        if !types.is_empty() {
            return Ok(CiSource::ExplicitTypes(types));
        }
    }
    if paths::rule_test_ci_path(root, project.name()).is_file() {
        return Ok(CiSource::RuleFixture);
    }
    let types = project.resource_types();
    if types.is_empty() {
        return Err(RdkError::NoResourceTypes(project.name().to_string()));
    }
    Ok(CiSource::TriggerTypes(types))
}

/// Ordered test inputs for one rule.
pub fn load_test_cis(
    root: &Path,
    project: &RuleProject,
    request: &CiRequest,
) -> Result<Vec<TestCi>> {
    match resolve_source(root, project, request)? {
        CiSource::ExplicitJson => Err(RdkError::Unsupported("--test-ci-json")),
        CiSource::RuleFixture => Err(RdkError::Unsupported("rule-local test_ci.json")),
        CiSource::ExplicitTypes(types) | CiSource::TriggerTypes(types) => types
            .iter()
            .map(|t| load_fixture(root, t))
            .collect(),
    }
}

/// Built-in fixture for `resource_type` from `.rdk/example_ci/`.
pub fn load_fixture(root: &Path, resource_type: &str) -> Result<TestCi> {
    let path = paths::fixture_path(root, resource_type);
    if !path.is_file() {
        return Err(RdkError::FixtureNotFound {
            resource_type: resource_type.to_string(),
            file: paths::fixture_file_name(resource_type),
        });
    }
    let item: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    tracing::debug!(resource_type, path = %path.display(), "loaded fixture");
    Ok(TestCi {
        resource_type: resource_type.to_string(),
        item,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rule::NewRule;
    use crate::types::{Frequency, Runtime};
    use tempfile::TempDir;

    fn setup(events: Option<&str>) -> (TempDir, RuleProject) {
        let dir = TempDir::new().unwrap();
        crate::scaffold::write_scaffold(dir.path()).unwrap();
        let project = RuleProject::create(
            dir.path(),
            NewRule {
                name: "r1".into(),
                runtime: Some(Runtime::Python36),
                events: events.map(str::to_string),
                periodic: Some(Frequency::OneHour),
                ..NewRule::default()
            },
            Config::default().code_bucket("1"),
        )
        .unwrap();
        (dir, project)
    }

    #[test]
    fn trigger_types_load_one_fixture_each_in_order() {
        let (dir, project) = setup(Some("AWS::S3::Bucket,AWS::IAM::Role"));
        let cis = load_test_cis(dir.path(), &project, &CiRequest::default()).unwrap();
        let types: Vec<&str> = cis.iter().map(|c| c.resource_type.as_str()).collect();
        assert_eq!(types, vec!["AWS::S3::Bucket", "AWS::IAM::Role"]);
        assert_eq!(cis[0].item["resourceType"], "AWS::S3::Bucket");
        assert_eq!(cis[1].item["resourceType"], "AWS::IAM::Role");
    }

    #[test]
    fn explicit_types_override_trigger() {
        let (dir, project) = setup(Some("AWS::S3::Bucket"));
        let request = CiRequest {
            ci_types: Some(" AWS::EC2::Instance , ".into()),
            ..CiRequest::default()
        };
        assert_eq!(
            resolve_source(dir.path(), &project, &request).unwrap(),
            CiSource::ExplicitTypes(vec!["AWS::EC2::Instance".into()])
        );
        let cis = load_test_cis(dir.path(), &project, &request).unwrap();
        assert_eq!(cis.len(), 1);
    }

    #[test]
    fn reserved_sources_are_rejected() {
        let (dir, project) = setup(Some("AWS::S3::Bucket"));
        let request = CiRequest {
            ci_json: Some("{}".into()),
            ci_types: Some("AWS::S3::Bucket".into()),
        };
        assert!(matches!(
            load_test_cis(dir.path(), &project, &request),
            Err(RdkError::Unsupported(_))
        ));

        std::fs::write(paths::rule_test_ci_path(dir.path(), "r1"), "{}").unwrap();
        assert_eq!(
            resolve_source(dir.path(), &project, &CiRequest::default()).unwrap(),
            CiSource::RuleFixture
        );
        assert!(matches!(
            load_test_cis(dir.path(), &project, &CiRequest::default()),
            Err(RdkError::Unsupported(_))
        ));
    }

    #[test]
    fn periodic_only_rule_needs_explicit_types() {
        let (dir, project) = setup(None);
        let err = load_test_cis(dir.path(), &project, &CiRequest::default()).unwrap_err();
        assert!(matches!(err, RdkError::NoResourceTypes(_)));
    }

    #[test]
    fn unknown_type_names_the_missing_fixture() {
        let (dir, project) = setup(Some("AWS::RDS::DBInstance"));
        let err = load_test_cis(dir.path(), &project, &CiRequest::default()).unwrap_err();
        match err {
            RdkError::FixtureNotFound { file, .. } => assert_eq!(file, "AWS_RDS_DBInstance.json"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
