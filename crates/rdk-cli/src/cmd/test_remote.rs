use rdk_core::remote::{RemoteInvoker, RemoteReport};
use rdk_core::rule::select_rules;
use serde::Serialize;

use crate::cmd::test_local::prepare;
use crate::context::{self, Context};
use crate::output::{print_json, Batch};
use crate::{RuleSelection, TestArgs};

#[derive(Serialize)]
struct RuleResult {
    rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<RemoteReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(ctx: &Context, select: &RuleSelection, test: &TestArgs) -> anyhow::Result<()> {
    let rules = select_rules(&ctx.root, &select.rules, select.all)?;
    let (request, parameters) = prepare(test)?;
    let provider = ctx.provider()?;
    let invoker = RemoteInvoker::new(&provider, &ctx.config, &ctx.root, &context::sleep);

    let mut batch = Batch::default();
    let mut results = Vec::with_capacity(rules.len());
    for rule in rules {
        match invoker.test_rule(&rule, &request, &parameters) {
            Ok(report) => {
                batch.record(&rule, report.errors() == 0);
                if !ctx.json {
                    print_report(&report, ctx.verbose > 0);
                }
                results.push(RuleResult {
                    rule,
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                tracing::error!(rule = %rule, error = %e, "remote test failed");
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

fn print_report(report: &RemoteReport, verbose: bool) {
    println!("{} ({})", report.rule, report.function);
    for outcome in &report.outcomes {
        match &outcome.function_error {
            Some(kind) => {
                println!("  {}  FUNCTION ERROR ({kind})", outcome.resource_type);
                println!("      {}", outcome.payload.trim());
                print_log(outcome.log.as_deref());
            }
            None => {
                println!("  {}  {}", outcome.resource_type, outcome.payload.trim());
                if verbose {
                    print_log(outcome.log.as_deref());
                }
            }
        }
    }
}

fn print_log(log: Option<&str>) {
    if let Some(log) = log {
        for line in log.lines() {
            println!("      | {line}");
        }
    }
}
