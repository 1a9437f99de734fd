use rdk_core::ci::CiRequest;
use rdk_core::harness::{self, CiResult, RuleTestReport};
use rdk_core::rule::select_rules;
use rdk_core::RdkError;
use serde::Serialize;

use crate::context::Context;
use crate::output::{print_json, Batch};
use crate::{RuleSelection, TestArgs};

#[derive(Serialize)]
struct RuleResult {
    rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RuleTestReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Usage checks shared with `test-remote`: fail before any rule runs.
pub fn prepare(test: &TestArgs) -> anyhow::Result<(CiRequest, serde_json::Value)> {
    if test.test_ci_json.is_some() {
        return Err(RdkError::Unsupported("--test-ci-json").into());
    }
    let parameters = harness::parse_test_parameters(test.test_parameters.as_deref())?;
    let request = CiRequest {
        ci_json: None,
        ci_types: test.test_ci_types.clone(),
    };
    Ok((request, parameters))
}

pub fn run(ctx: &Context, select: &RuleSelection, test: &TestArgs) -> anyhow::Result<()> {
    let rules = select_rules(&ctx.root, &select.rules, select.all)?;
    let (request, parameters) = prepare(test)?;

    let mut batch = Batch::default();
    let mut results = Vec::with_capacity(rules.len());
    for rule in rules {
        match harness::test_rule_local(&ctx.root, &rule, &request, &parameters) {
            Ok(report) => {
                batch.record(&rule, report.errors() == 0);
                if !ctx.json {
                    print_report(&report);
                }
                results.push(RuleResult {
                    rule,
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                tracing::error!(rule = %rule, error = %e, "local test failed");
                batch.record(&rule, false);
                if !ctx.json {
                    println!("{rule}\n  FAILED: {e}");
                }
                results.push(RuleResult {
                    rule,
                    report: None,
                    error: Some(e.to_string()),
                });
            }
        }
    }

    if ctx.json {
        print_json(&results)?;
    }
    batch.finish("test")
}

fn print_report(report: &RuleTestReport) {
    println!("{}", report.rule);
    let width = report
        .outcomes
        .iter()
        .map(|o| o.resource_type.len())
        .max()
        .unwrap_or(0);
    for outcome in &report.outcomes {
        match &outcome.result {
            CiResult::Verdict(v) => {
                println!("  {:width$}  {v}", outcome.resource_type);
            }
            CiResult::Error(msg) => {
                println!("  {:width$}  ERROR", outcome.resource_type);
                for line in msg.lines() {
                    println!("      {line}");
                }
            }
        }
    }
}
