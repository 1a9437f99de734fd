//! Loading and running user rule code for local tests.
//!
//! Rule files are plain python or javascript modules exporting
//! `evaluate_compliance(configuration_item, rule_parameters)`. They run in a
//! child interpreter through a small bootstrap script that imports the file by
//! path, so a crash in rule code never takes the CLI down with it.
//!
//! # Protocol
//! - argv[1]: absolute path of the rule source file.
//! - stdin:   `{"configurationItem": {...}, "ruleParameters": {...}}`
//! - stdout:  `{"verdict": "COMPLIANT"}`
//! - stderr:  anything the rule printed, plus tracebacks.
//!
//! A non-zero exit or unparsable stdout is an evaluation error for that one
//! configuration item.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{RdkError, Result};
use crate::types::{Runtime, RuntimeFamily, Verdict};

const PYTHON_SHIM: &str = include_str!("../templates/shim/evaluate.py");
const NODE_SHIM: &str = include_str!("../templates/shim/evaluate.js");

/// Evaluates one configuration item against a rule.
pub trait RuleEvaluator {
    fn evaluate(&self, ci: &Value, parameters: &Value) -> Result<Verdict>;
}

/// Local interpreter able to run a rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpreter {
    Python(PathBuf),
    Node(PathBuf),
}

impl Interpreter {
    /// Find an interpreter for `runtime` on `PATH`. Python runtimes prefer
    /// `python3` and fall back to `python`.
    pub fn detect(runtime: Runtime) -> Result<Self> {
        match runtime.family() {
            RuntimeFamily::Python => which::which("python3")
                .or_else(|_| which::which("python"))
                .map(Interpreter::Python)
                .map_err(|_| RdkError::NoInterpreter(runtime.to_string())),
            RuntimeFamily::Node => which::which("node")
                .map(Interpreter::Node)
                .map_err(|_| RdkError::NoInterpreter(runtime.to_string())),
            RuntimeFamily::Java | RuntimeFamily::DotNet => {
                Err(RdkError::UnsupportedRuntime(runtime.to_string()))
            }
        }
    }

    fn command(&self, source: &Path) -> Command {
        match self {
            Interpreter::Python(bin) => {
                let mut cmd = Command::new(bin);
                cmd.arg("-c").arg(PYTHON_SHIM).arg(source);
                cmd.env("PYTHONDONTWRITEBYTECODE", "1");
                cmd
            }
            Interpreter::Node(bin) => {
                let mut cmd = Command::new(bin);
                cmd.arg("-e").arg(NODE_SHIM).arg(source);
                cmd
            }
        }
    }
}

/// A rule source file bound to the interpreter that runs it.
#[derive(Debug, Clone)]
pub struct RulePlugin {
    source: PathBuf,
    interpreter: Interpreter,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateRequest<'a> {
    configuration_item: &'a Value,
    rule_parameters: &'a Value,
}

#[derive(Deserialize)]
struct EvaluateResponse {
    #[serde(default)]
    verdict: Value,
}

impl RulePlugin {
    pub fn load(source: &Path, runtime: Runtime) -> Result<Self> {
        let interpreter = Interpreter::detect(runtime)?;
        Self::with_interpreter(source, interpreter)
    }

    pub fn with_interpreter(source: &Path, interpreter: Interpreter) -> Result<Self> {
        if !source.is_file() {
            return Err(RdkError::Evaluation(format!(
                "rule source not found: {}",
                source.display()
            )));
        }
        let source = source.canonicalize()?;
        tracing::debug!(source = %source.display(), ?interpreter, "loaded rule plugin");
        Ok(Self {
            source,
            interpreter,
        })
    }
}

impl RuleEvaluator for RulePlugin {
    fn evaluate(&self, ci: &Value, parameters: &Value) -> Result<Verdict> {
        let request = serde_json::to_vec(&EvaluateRequest {
            configuration_item: ci,
            rule_parameters: parameters,
        })?;

        let mut cmd = self.interpreter.command(&self.source);
        if let Some(dir) = self.source.parent() {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| RdkError::Evaluation(format!("failed to start interpreter: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .map_err(|e| RdkError::Evaluation(format!("failed to write stdin: {e}")))?;
        }
        let output = child.wait_with_output()?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(source = %self.source.display(), "rule output:\n{}", stderr.trim_end());
        }
        if !output.status.success() {
            return Err(RdkError::Evaluation(last_lines(&stderr, 20)));
        }

        let response: EvaluateResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            RdkError::Evaluation(format!("rule produced unreadable output: {e}"))
        })?;
        match response.verdict {
            Value::String(s) => Ok(Verdict::parse(&s)),
            other => Err(RdkError::Evaluation(format!(
                "evaluate_compliance returned {other} instead of a compliance string"
            ))),
        }
    }
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let start = lines.len().saturating_sub(n);
    let tail = lines[start..].join("\n");
    if tail.is_empty() {
        "rule process exited with an error".to_string()
    } else {
        tail
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn python() -> Option<Interpreter> {
        Interpreter::detect(Runtime::Python36).ok()
    }

    fn write_rule(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("r1.py");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn compiled_runtimes_are_not_locally_testable() {
        assert!(matches!(
            Interpreter::detect(Runtime::Java8),
            Err(RdkError::UnsupportedRuntime(_))
        ));
        assert!(matches!(
            Interpreter::detect(Runtime::Dotnetcore10),
            Err(RdkError::UnsupportedRuntime(_))
        ));
    }

    #[test]
    fn missing_source_fails_to_load() {
        let dir = TempDir::new().unwrap();
        let err = RulePlugin::with_interpreter(
            &dir.path().join("nope.py"),
            Interpreter::Python(PathBuf::from("python3")),
        )
        .unwrap_err();
        assert!(matches!(err, RdkError::Evaluation(_)));
    }

    #[test]
    fn python_rule_sees_ci_and_parameters() {
        let Some(interp) = python() else { return };
        let dir = TempDir::new().unwrap();
        let source = write_rule(
            &dir,
            "def evaluate_compliance(ci, params):\n    print('noise')\n    \
             return 'COMPLIANT' if ci['resourceType'] == params['want'] else 'NON_COMPLIANT'\n",
        );
        let plugin = RulePlugin::with_interpreter(&source, interp).unwrap();
        let ci = json!({"resourceType": "AWS::S3::Bucket"});

        let v = plugin
            .evaluate(&ci, &json!({"want": "AWS::S3::Bucket"}))
            .unwrap();
        assert_eq!(v, Verdict::Compliant);
        let v = plugin.evaluate(&ci, &json!({"want": "x"})).unwrap();
        assert_eq!(v, Verdict::NonCompliant);
    }

    #[test]
    fn python_rule_can_import_sibling_modules() {
        let Some(interp) = python() else { return };
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("helper.py"), "VERDICT = 'NOT_APPLICABLE'\n").unwrap();
        let source = write_rule(
            &dir,
            "from helper import VERDICT\n\ndef evaluate_compliance(ci, params):\n    return VERDICT\n",
        );
        let plugin = RulePlugin::with_interpreter(&source, interp).unwrap();
        assert_eq!(
            plugin.evaluate(&json!({}), &json!({})).unwrap(),
            Verdict::NotApplicable
        );
        assert!(!dir.path().join("__pycache__").exists());
    }

    #[test]
    fn python_exception_is_an_evaluation_error() {
        let Some(interp) = python() else { return };
        let dir = TempDir::new().unwrap();
        let source = write_rule(
            &dir,
            "def evaluate_compliance(ci, params):\n    raise ValueError('boom')\n",
        );
        let plugin = RulePlugin::with_interpreter(&source, interp).unwrap();
        match plugin.evaluate(&json!({}), &json!({})).unwrap_err() {
            RdkError::Evaluation(msg) => assert!(msg.contains("ValueError: boom"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn non_string_verdict_is_rejected() {
        let Some(interp) = python() else { return };
        let dir = TempDir::new().unwrap();
        let source = write_rule(&dir, "def evaluate_compliance(ci, params):\n    return None\n");
        let plugin = RulePlugin::with_interpreter(&source, interp).unwrap();
        assert!(matches!(
            plugin.evaluate(&json!({}), &json!({})),
            Err(RdkError::Evaluation(_))
        ));
    }

    #[test]
    fn node_rule_is_evaluated() {
        let Ok(interp) = Interpreter::detect(Runtime::Nodejs610) else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("r1.js");
        std::fs::write(
            &source,
            "exports.evaluate_compliance = (ci, p) => ci.ok ? 'COMPLIANT' : 'NON_COMPLIANT';\n",
        )
        .unwrap();
        let plugin = RulePlugin::with_interpreter(&source, interp).unwrap();
        assert_eq!(
            plugin.evaluate(&json!({"ok": true}), &json!({})).unwrap(),
            Verdict::Compliant
        );
    }

    #[test]
    fn bundled_node_template_evaluates_and_handles_test_events() {
        let Ok(Interpreter::Node(node)) = Interpreter::detect(Runtime::Nodejs610) else {
            return;
        };
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("r1.js");
        std::fs::write(&source, include_str!("../templates/rule_code.js")).unwrap();

        let plugin =
            RulePlugin::with_interpreter(&source, Interpreter::Node(node.clone())).unwrap();
        let ci = json!({"resourceType": "AWS::S3::Bucket"});
        assert_eq!(plugin.evaluate(&ci, &json!({})).unwrap(), Verdict::NotApplicable);

        let event = json!({
            "invokingEvent": json!({
                "configurationItem": {
                    "resourceType": "AWS::S3::Bucket",
                    "resourceId": "b1",
                    "configurationItemStatus": "OK"
                },
                "notificationCreationTime": "2017-01-01T00:00:00.000Z"
            })
            .to_string(),
            "ruleParameters": "{}",
            "resultToken": "TESTMODE"
        });
        let script = format!(
            "require({}).handler({}, {{}}, function (err, v) {{ \
             if (err) {{ throw err; }} process.stdout.write(v); }});",
            serde_json::to_string(&source.to_string_lossy()).unwrap(),
            event
        );
        let out = Command::new(node).arg("-e").arg(script).output().unwrap();
        assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
        assert_eq!(String::from_utf8_lossy(&out.stdout), "NOT_APPLICABLE");
    }

    #[test]
    fn last_lines_keeps_the_tail() {
        assert_eq!(last_lines("a\nb\nc\n", 2), "b\nc");
        assert_eq!(last_lines("", 2), "rule process exited with an error");
    }
}
