//! Remote invoker: send the test configuration items to the deployed
//! function instead of running the rule locally.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::ci::{self, CiRequest};
use crate::config::Config;
use crate::error::{RdkError, Result};
use crate::paths;
use crate::provider::CloudProvider;
use crate::publish;
use crate::rule::RuleProject;
use crate::stack::StackManager;

const NOTIFICATION_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";

pub fn load_event_template(root: &Path) -> Result<Value> {
    let path = paths::event_template_path(root);
    if !path.is_file() {
        return Err(RdkError::EventTemplateNotFound(path.display().to_string()));
    }
    Ok(serde_json::from_str(&std::fs::read_to_string(&path)?)?)
}

/// Fill the event template for one configuration item. `invokingEvent` and
/// `ruleParameters` go out as JSON-encoded strings, the way the recording
/// service delivers them.
pub fn build_event(
    template: &Value,
    ci: &Value,
    parameters: &Value,
    now: DateTime<Utc>,
) -> Result<Value> {
    let mut event = template.clone();
    let obj = event
        .as_object_mut()
        .ok_or_else(|| RdkError::EventTemplateNotFound("template is not a JSON object".into()))?;

    let mut invoking: Value = match obj.get("invokingEvent") {
        Some(Value::String(raw)) => serde_json::from_str(raw)?,
        Some(other) => other.clone(),
        None => Value::Object(Default::default()),
    };
    if let Some(inv) = invoking.as_object_mut() {
        inv.insert("configurationItem".into(), ci.clone());
        inv.insert(
            "notificationCreationTime".into(),
            Value::String(now.format(NOTIFICATION_TIME_FORMAT).to_string()),
        );
    }

    obj.insert(
        "invokingEvent".into(),
        Value::String(serde_json::to_string(&invoking)?),
    );
    obj.insert(
        "ruleParameters".into(),
        Value::String(serde_json::to_string(parameters)?),
    );
    Ok(event)
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteOutcome {
    pub resource_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_error: Option<String>,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<String>,
}

impl RemoteOutcome {
    pub fn is_error(&self) -> bool {
        self.function_error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteReport {
    pub rule: String,
    pub function: String,
    pub outcomes: Vec<RemoteOutcome>,
}

impl RemoteReport {
    pub fn errors(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_error()).count()
    }
}

pub struct RemoteInvoker<'a> {
    provider: &'a dyn CloudProvider,
    config: &'a Config,
    root: &'a Path,
    sleep: &'a dyn Fn(Duration),
}

impl<'a> RemoteInvoker<'a> {
    pub fn new(
        provider: &'a dyn CloudProvider,
        config: &'a Config,
        root: &'a Path,
        sleep: &'a dyn Fn(Duration),
    ) -> Self {
        Self {
            provider,
            config,
            root,
            sleep,
        }
    }

    /// Invoke the deployed function once per configuration item, in order.
    pub fn test_rule(
        &self,
        rule: &str,
        request: &CiRequest,
        parameters: &Value,
    ) -> Result<RemoteReport> {
        let project = RuleProject::load(self.root, rule)?;
        let cis = ci::load_test_cis(self.root, &project, request)?;
        let template = load_event_template(self.root)?;

        let manager = StackManager::new(self.provider, self.config, self.sleep);
        let function = publish::resolve_function(&manager, self.config, rule)?;

        let mut outcomes = Vec::with_capacity(cis.len());
        for ci in &cis {
            let event = build_event(&template, &ci.item, parameters, Utc::now())?;
            tracing::info!(rule, resource_type = %ci.resource_type, "invoking function");
            let invocation = self
                .provider
                .invoke(&function, &serde_json::to_string(&event)?)?;
            if let Some(kind) = &invocation.function_error {
                tracing::warn!(
                    rule,
                    resource_type = %ci.resource_type,
                    error = %kind,
                    "function returned an error"
                );
            }
            outcomes.push(RemoteOutcome {
                resource_type: ci.resource_type.clone(),
                log: invocation.decoded_log(),
                function_error: invocation.function_error,
                payload: invocation.payload,
            });
        }

        Ok(RemoteReport {
            rule: rule.to_string(),
            function,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::fake::FakeProvider;
    use crate::provider::Invocation;
    use crate::rule::NewRule;
    use crate::types::Runtime;
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    fn no_sleep(_: Duration) {}

    fn template() -> Value {
        serde_json::from_str(include_str!("../templates/test_event_template.json")).unwrap()
    }

    #[test]
    fn event_fields_are_double_encoded() {
        let now = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let ci = json!({"resourceType": "AWS::S3::Bucket", "resourceId": "b"});
        let event = build_event(&template(), &ci, &json!({"k": "v"}), now).unwrap();

        let invoking: Value =
            serde_json::from_str(event["invokingEvent"].as_str().unwrap()).unwrap();
        assert_eq!(invoking["configurationItem"], ci);
        assert_eq!(invoking["notificationCreationTime"], "2024-03-05T07:08:09.000Z");
        assert_eq!(invoking["messageType"], "ConfigurationItemChangeNotification");

        let params: Value =
            serde_json::from_str(event["ruleParameters"].as_str().unwrap()).unwrap();
        assert_eq!(params, json!({"k": "v"}));
        assert_eq!(event["resultToken"], "TESTMODE");
    }

    #[test]
    fn missing_template_is_reported() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_event_template(dir.path()),
            Err(RdkError::EventTemplateNotFound(_))
        ));
    }

    fn deployed_rule() -> (TempDir, FakeProvider) {
        let dir = TempDir::new().unwrap();
        crate::scaffold::write_scaffold(dir.path()).unwrap();
        RuleProject::create(
            dir.path(),
            NewRule {
                name: "r1".into(),
                runtime: Some(Runtime::Python36),
                events: Some("AWS::S3::Bucket,AWS::IAM::Role".into()),
                ..NewRule::default()
            },
            "bucket".into(),
        )
        .unwrap();
        let provider = FakeProvider::default();
        provider.add_stack("r1", "CREATE_COMPLETE");
        (dir, provider)
    }

    #[test]
    fn invokes_function_once_per_ci() {
        let (dir, provider) = deployed_rule();
        let config = Config::default();
        let invoker = RemoteInvoker::new(&provider, &config, dir.path(), &no_sleep);

        let report = invoker
            .test_rule("r1", &CiRequest::default(), &json!({}))
            .unwrap();
        assert_eq!(report.function, "arn:aws:lambda:fn");
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.errors(), 0);
        assert_eq!(report.outcomes[0].payload, "\"COMPLIANT\"");

        let sent = provider.invocations();
        let first: Value = serde_json::from_str(&sent[0]).unwrap();
        let invoking: Value =
            serde_json::from_str(first["invokingEvent"].as_str().unwrap()).unwrap();
        assert_eq!(invoking["configurationItem"]["resourceType"], "AWS::S3::Bucket");
    }

    #[test]
    fn function_error_carries_decoded_log() {
        let (dir, mut provider) = deployed_rule();
        provider.invocation = Invocation {
            function_error: Some("Unhandled".into()),
            payload: "{\"errorMessage\":\"boom\"}".into(),
            log_result: Some("U1RBUlQgUmVxdWVzdElk".into()),
        };
        let config = Config::default();
        let invoker = RemoteInvoker::new(&provider, &config, dir.path(), &no_sleep);

        let report = invoker
            .test_rule("r1", &CiRequest::default(), &json!({}))
            .unwrap();
        assert_eq!(report.errors(), 2);
        assert_eq!(report.outcomes[0].log.as_deref(), Some("START RequestId"));
    }

    #[test]
    fn undeployed_rule_fails_before_invoking() {
        let (dir, _) = deployed_rule();
        let provider = FakeProvider::default();
        let config = Config::default();
        let invoker = RemoteInvoker::new(&provider, &config, dir.path(), &no_sleep);
        assert!(matches!(
            invoker.test_rule("r1", &CiRequest::default(), &json!({})),
            Err(RdkError::StackNotFound(_))
        ));
        assert_eq!(provider.count("invoke"), 0);
    }
}
