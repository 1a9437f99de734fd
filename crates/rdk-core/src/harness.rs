//! Local test harness: run a rule's code against its configuration items.

use std::path::Path;

use serde::Serialize;
use serde_json::Value;

use crate::ci::{self, CiRequest, TestCi};
use crate::error::{RdkError, Result};
use crate::plugin::{RuleEvaluator, RulePlugin};
use crate::rule::RuleProject;
use crate::types::Verdict;

/// Parse `--test-parameters`. Absent means an empty object.
pub fn parse_test_parameters(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Object(Default::default())),
        Some(raw) => {
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| RdkError::InvalidTestParameters(e.to_string()))?;
            if !value.is_object() {
                return Err(RdkError::InvalidTestParameters(
                    "expected a JSON object".to_string(),
                ));
            }
            Ok(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum CiResult {
    Verdict(Verdict),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CiOutcome {
    pub resource_type: String,
    #[serde(flatten)]
    pub result: CiResult,
}

impl CiOutcome {
    pub fn is_error(&self) -> bool {
        matches!(self.result, CiResult::Error(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleTestReport {
    pub rule: String,
    pub outcomes: Vec<CiOutcome>,
}

impl RuleTestReport {
    pub fn errors(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_error()).count()
    }
}

/// One outcome per item, in input order. A failure inside rule code is
/// recorded against that item and evaluation moves on.
pub fn evaluate_cis(
    evaluator: &dyn RuleEvaluator,
    cis: &[TestCi],
    parameters: &Value,
) -> Vec<CiOutcome> {
    cis.iter()
        .map(|ci| {
            let result = match evaluator.evaluate(&ci.item, parameters) {
                Ok(verdict) => CiResult::Verdict(verdict),
                Err(e) => {
                    tracing::warn!(
                        resource_type = %ci.resource_type,
                        error = %e,
                        "rule code failed"
                    );
                    CiResult::Error(e.to_string())
                }
            };
            CiOutcome {
                resource_type: ci.resource_type.clone(),
                result,
            }
        })
        .collect()
}

/// Load `rule`, build its inputs and evaluate them with its local code.
/// Nothing under the working directory is modified.
pub fn test_rule_local(
    root: &Path,
    rule: &str,
    request: &CiRequest,
    parameters: &Value,
) -> Result<RuleTestReport> {
    let project = RuleProject::load(root, rule)?;
    let cis = ci::load_test_cis(root, &project, request)?;
    let plugin = RulePlugin::load(&project.source_path(root), project.source_runtime)?;
    Ok(RuleTestReport {
        rule: rule.to_string(),
        outcomes: evaluate_cis(&plugin, &cis, parameters),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;

    /// Answers from a script and records what it was asked.
    struct ScriptedEvaluator {
        answers: RefCell<Vec<Result<Verdict>>>,
        seen: RefCell<Vec<(Value, Value)>>,
    }

    impl ScriptedEvaluator {
        fn new(answers: Vec<Result<Verdict>>) -> Self {
            Self {
                answers: RefCell::new(answers.into_iter().rev().collect()),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl RuleEvaluator for ScriptedEvaluator {
        fn evaluate(&self, ci: &Value, parameters: &Value) -> Result<Verdict> {
            self.seen.borrow_mut().push((ci.clone(), parameters.clone()));
            self.answers
                .borrow_mut()
                .pop()
                .unwrap_or(Ok(Verdict::NotApplicable))
        }
    }

    fn cis(types: &[&str]) -> Vec<TestCi> {
        types
            .iter()
            .map(|t| TestCi {
                resource_type: t.to_string(),
                item: json!({ "resourceType": t }),
            })
            .collect()
    }

    #[test]
    fn one_outcome_per_ci_in_order() {
        let eval = ScriptedEvaluator::new(vec![Ok(Verdict::Compliant), Ok(Verdict::NonCompliant)]);
        let params = json!({"k": "v"});
        let out = evaluate_cis(&eval, &cis(&["AWS::S3::Bucket", "AWS::IAM::Role"]), &params);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].resource_type, "AWS::S3::Bucket");
        assert_eq!(out[0].result, CiResult::Verdict(Verdict::Compliant));
        assert_eq!(out[1].result, CiResult::Verdict(Verdict::NonCompliant));

        let seen = eval.seen.borrow();
        assert_eq!(seen[1].0["resourceType"], "AWS::IAM::Role");
        assert_eq!(seen[0].1, params);
    }

    #[test]
    fn failing_ci_does_not_stop_the_rest() {
        let eval = ScriptedEvaluator::new(vec![
            Err(RdkError::Evaluation("KeyError: 'x'".into())),
            Ok(Verdict::Compliant),
        ]);
        let out = evaluate_cis(&eval, &cis(&["A", "B"]), &json!({}));
        assert!(out[0].is_error());
        assert_eq!(out[1].result, CiResult::Verdict(Verdict::Compliant));
    }

    #[test]
    fn test_parameters_default_to_empty_object() {
        assert_eq!(parse_test_parameters(None).unwrap(), json!({}));
        assert_eq!(
            parse_test_parameters(Some(r#"{"maxAge":"90"}"#)).unwrap(),
            json!({"maxAge": "90"})
        );
        assert!(matches!(
            parse_test_parameters(Some("{oops")),
            Err(RdkError::InvalidTestParameters(_))
        ));
        assert!(matches!(
            parse_test_parameters(Some("[1]")),
            Err(RdkError::InvalidTestParameters(_))
        ));
    }

    #[test]
    fn outcome_serializes_flat() {
        let o = CiOutcome {
            resource_type: "AWS::S3::Bucket".into(),
            result: CiResult::Verdict(Verdict::Compliant),
        };
        assert_eq!(
            serde_json::to_value(&o).unwrap(),
            json!({"resource_type": "AWS::S3::Bucket", "outcome": "verdict", "detail": "COMPLIANT"})
        );
    }

    #[test]
    fn local_test_leaves_rule_directory_untouched() {
        if which::which("python3").is_err() {
            return;
        }
        let dir = tempfile::TempDir::new().unwrap();
        crate::scaffold::write_scaffold(dir.path()).unwrap();
        RuleProject::create(
            dir.path(),
            crate::rule::NewRule {
                name: "encryption-check".into(),
                runtime: Some(crate::types::Runtime::Python36),
                events: Some("AWS::S3::Bucket,AWS::IAM::Role".into()),
                ..Default::default()
            },
            "bucket".into(),
        )
        .unwrap();
        let rule_dir = dir.path().join("encryption-check");
        let listing = || -> Vec<_> {
            std::fs::read_dir(&rule_dir)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect()
        };
        let before = listing();

        let report = test_rule_local(
            dir.path(),
            "encryption-check",
            &CiRequest::default(),
            &json!({}),
        )
        .unwrap();
        assert_eq!(report.errors(), 0);
        let verdicts: Vec<_> = report.outcomes.iter().map(|o| o.result.clone()).collect();
        assert_eq!(verdicts, vec![CiResult::Verdict(Verdict::NotApplicable); 2]);

        assert_eq!(before.len(), listing().len());
    }
}
