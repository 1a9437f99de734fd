use anyhow::Context as _;
use rdk_core::provider::CloudProvider;
use rdk_core::rule::{NewRule, RuleProject};
use rdk_core::{paths, RdkError};

use crate::context::Context;
use crate::output::print_json;
use crate::RuleArgs;

pub fn run(ctx: &Context, name: &str, attrs: RuleArgs) -> anyhow::Result<()> {
    let new = NewRule {
        name: name.to_string(),
        runtime: attrs.runtime,
        events: attrs.events,
        periodic: attrs.periodic,
        input_parameters: attrs.input_parameters,
    };
    new.validate()?;
    if !paths::rdk_dir(&ctx.root).is_dir() {
        return Err(RdkError::NotInitialized.into());
    }
    if paths::rule_dir(&ctx.root, name).exists() {
        return Err(RdkError::RuleExists(name.to_string()).into());
    }

    let provider = ctx.provider()?;
    let account = provider
        .account_id()
        .context("failed to resolve the account id for the code bucket")?;
    let project = RuleProject::create(&ctx.root, new, ctx.config.code_bucket(&account))?;

    if ctx.json {
        print_json(&project)?;
    } else {
        println!("Created rule {} ({})", project.name(), project.source_runtime);
        println!("  source:     {}", project.source_path(&ctx.root).display());
        println!("  code:       s3://{}/{}", project.code_bucket, project.code_key);
    }
    Ok(())
}
