use rdk_core::rule::{list_rules, select_rules, RuleProject};
use rdk_core::stack::StackManager;
use serde::Serialize;

use crate::context::{self, Context};
use crate::output::{print_json, print_table};
use crate::RuleSelection;

const ABSENT: &str = "ABSENT";

#[derive(Serialize)]
struct RuleStatus {
    rule: String,
    runtime: String,
    events: Option<String>,
    periodic: Option<String>,
    stack_status: String,
}

pub fn run(ctx: &Context, select: &RuleSelection) -> anyhow::Result<()> {
    let rules = if select.rules.is_empty() && !select.all {
        list_rules(&ctx.root)?
    } else {
        select_rules(&ctx.root, &select.rules, select.all)?
    };
    if rules.is_empty() {
        if ctx.json {
            return print_json(&Vec::<RuleStatus>::new());
        }
        println!("No rules found in {}", ctx.root.display());
        return Ok(());
    }
    let provider = ctx.provider()?;
    let manager = StackManager::new(&provider, &ctx.config, &context::sleep);

    let mut statuses = Vec::with_capacity(rules.len());
    for rule in rules {
        let project = RuleProject::load(&ctx.root, &rule)?;
        let stack_status = manager
            .status(&rule)?
            .map(|s| s.to_string())
            .unwrap_or_else(|| ABSENT.to_string());
        statuses.push(RuleStatus {
            runtime: project.source_runtime.to_string(),
            events: project.source_events.clone(),
            periodic: project.source_periodic.map(|f| f.to_string()),
            rule,
            stack_status,
        });
    }

    if ctx.json {
        return print_json(&statuses);
    }
    let rows = statuses
        .into_iter()
        .map(|s| {
            let trigger = match (s.events, s.periodic) {
                (Some(e), Some(p)) => format!("{e}; {p}"),
                (Some(e), None) => e,
                (None, Some(p)) => p,
                (None, None) => "-".to_string(),
            };
            vec![s.rule, s.runtime, trigger, s.stack_status]
        })
        .collect();
    print_table(&["RULE", "RUNTIME", "TRIGGER", "STACK"], rows);
    Ok(())
}
