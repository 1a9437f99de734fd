use rdk_core::deploy::Deployer;
use rdk_core::rule::select_rules;
use serde::Serialize;

use crate::context::{self, Context};
use crate::output::{print_json, Batch};
use crate::RuleSelection;

#[derive(Serialize)]
struct RuleResult {
    rule: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<rdk_core::deploy::DeployReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

pub fn run(ctx: &Context, select: &RuleSelection) -> anyhow::Result<()> {
    let rules = select_rules(&ctx.root, &select.rules, select.all)?;
    let provider = ctx.provider()?;
    let deployer = Deployer::new(&provider, &ctx.config, &ctx.root, &context::sleep)?;

    let mut batch = Batch::default();
    let mut results = Vec::with_capacity(rules.len());
    for (rule, result) in deployer.deploy_all(&rules) {
        batch.record(&rule, result.is_ok());
        match result {
            Ok(report) => {
                if !ctx.json {
                    println!(
                        "{}: {} ({})",
                        report.rule,
                        report.action.as_str(),
                        report.status
                    );
                    if let Some(function) = &report.published_to {
                        println!("  published new code to {function}");
                    }
                }
                results.push(RuleResult {
                    rule,
                    report: Some(report),
                    error: None,
                });
            }
            Err(e) => {
                if !ctx.json {
                    println!("{rule}: FAILED: {e}");
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
    batch.finish("deploy")
}
