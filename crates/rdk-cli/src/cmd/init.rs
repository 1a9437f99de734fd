use anyhow::Context as _;
use rdk_core::bootstrap;
use rdk_core::scaffold::{self, FileAction};
use serde::Serialize;

use crate::context::{self, Context};
use crate::output::print_json;

#[derive(Serialize)]
struct InitReport {
    files: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account: Option<bootstrap::BootstrapReport>,
}

#[derive(Serialize)]
struct FileEntry {
    path: String,
    action: &'static str,
}

pub fn run(ctx: &Context, local_only: bool) -> anyhow::Result<()> {
    if !ctx.json {
        println!("Initializing rdk in: {}", ctx.root.display());
    }

    let written = scaffold::write_scaffold(&ctx.root).context("failed to write .rdk scaffold")?;
    let files: Vec<FileEntry> = written
        .into_iter()
        .map(|(path, action)| FileEntry {
            path,
            action: match action {
                FileAction::Written => "written",
                FileAction::Kept => "exists",
            },
        })
        .collect();
    if !ctx.json {
        for f in &files {
            println!("  {:8} {}", format!("{}:", f.action), f.path);
        }
    }

    let account = if local_only {
        None
    } else {
        let provider = ctx.provider()?;
        let report = bootstrap::bootstrap(&provider, &ctx.config, &ctx.root, &context::sleep)
            .context("account bootstrap failed")?;
        if !ctx.json {
            println!("\nAccount {}:", report.account_id);
            println!("  config bucket: {}", report.config_bucket);
            println!("  code bucket:   {}", report.code_bucket);
            println!("  config role:   {}", report.role_arn);
            for r in &report.created {
                println!("  created:       {r}");
            }
        }
        Some(report)
    };

    if ctx.json {
        print_json(&InitReport { files, account })?;
    } else {
        println!("\nrdk initialized.");
    }
    Ok(())
}
