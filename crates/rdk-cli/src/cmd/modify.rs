use rdk_core::rule::{RuleChanges, RuleProject};

use crate::context::Context;
use crate::output::print_json;
use crate::RuleArgs;

pub fn run(ctx: &Context, name: &str, attrs: RuleArgs) -> anyhow::Result<()> {
    let changes = RuleChanges {
        runtime: attrs.runtime,
        events: attrs.events,
        periodic: attrs.periodic,
        input_parameters: attrs.input_parameters,
    };
    if changes.is_empty() {
        anyhow::bail!(
            "nothing to modify: pass --runtime, --events, --periodic or --input-parameters"
        );
    }

    let project = RuleProject::modify(&ctx.root, name, changes)?;
    if ctx.json {
        print_json(&project)?;
    } else {
        println!("Modified rule {}", project.name());
    }
    Ok(())
}
