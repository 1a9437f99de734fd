mod cmd;
mod context;
mod output;
mod root;

use clap::{ArgAction, Args, Parser, Subcommand};
use rdk_core::types::{Frequency, Runtime};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "rdk",
    about = "Rule Development Kit: author, deploy and test AWS Config rules",
    version,
    propagate_version = true
)]
struct Cli {
    /// Working directory holding `.rdk/` and the rule directories
    #[arg(long, global = true, env = "RDK_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Named AWS profile to use
    #[arg(short = 'p', long, global = true)]
    profile: Option<String>,

    /// Access key id for static credentials
    #[arg(short = 'k', long, global = true)]
    access_key: Option<String>,

    /// Secret access key for static credentials
    #[arg(short = 's', long, global = true)]
    secret_access_key: Option<String>,

    /// Region to operate in (default: `default_region` from config)
    #[arg(short = 'r', long, global = true)]
    region: Option<String>,

    /// More logging: -v for progress, -vv for debug
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Rule attributes shared by `create` and `modify`.
#[derive(Args, Debug, Default)]
pub struct RuleArgs {
    /// Function runtime, e.g. python3.6 or nodejs6.10
    #[arg(short = 'R', long)]
    pub runtime: Option<Runtime>,

    /// Comma separated resource types that trigger the rule
    #[arg(short = 'E', long)]
    pub events: Option<String>,

    /// Maximum execution frequency for a periodic rule, e.g. Six_Hours
    #[arg(short = 'P', long)]
    pub periodic: Option<Frequency>,

    /// JSON blob passed to the rule as its parameters
    #[arg(short = 'i', long)]
    pub input_parameters: Option<String>,
}

/// Which rules a command acts on.
#[derive(Args, Debug, Default)]
pub struct RuleSelection {
    /// Rule names
    pub rules: Vec<String>,

    /// Every rule in the working directory
    #[arg(short = 'a', long)]
    pub all: bool,
}

/// Test input overrides shared by `test-local` and `test-remote`.
#[derive(Args, Debug, Default)]
pub struct TestArgs {
    /// Configuration item JSON to test with
    #[arg(short = 'j', long)]
    pub test_ci_json: Option<String>,

    /// Comma separated resource types whose built-in fixtures to test with
    #[arg(short = 't', long)]
    pub test_ci_types: Option<String>,

    /// JSON object passed to the rule as its parameters
    #[arg(short = 'T', long)]
    pub test_parameters: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the `.rdk/` scaffold and provision the account
    Init {
        /// Only write local files; make no AWS calls
        #[arg(long)]
        local_only: bool,
    },

    /// Create a new rule directory from the runtime's template
    Create {
        /// Rule name (also the stack and directory name)
        name: String,

        #[command(flatten)]
        attrs: RuleArgs,
    },

    /// Change the stored attributes of a rule
    Modify {
        name: String,

        #[command(flatten)]
        attrs: RuleArgs,
    },

    /// Package, upload and deploy rules
    Deploy {
        #[command(flatten)]
        select: RuleSelection,
    },

    /// Run rules locally against test configuration items
    TestLocal {
        #[command(flatten)]
        select: RuleSelection,

        #[command(flatten)]
        test: TestArgs,
    },

    /// Invoke deployed rules with test configuration items
    TestRemote {
        #[command(flatten)]
        select: RuleSelection,

        #[command(flatten)]
        test: TestArgs,
    },

    /// Show each rule's stack status (all rules when none are named)
    Status {
        #[command(flatten)]
        select: RuleSelection,
    },
}

fn log_level(command: &Commands, verbose: u8) -> tracing::Level {
    let default = match command {
        Commands::Init { .. } | Commands::Deploy { .. } | Commands::TestRemote { .. } => {
            tracing::Level::INFO
        }
        _ => tracing::Level::WARN,
    };
    let requested = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    // Level ordering: more verbose compares greater.
    default.max(requested)
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(log_level(&cli.command, cli.verbose).into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let ctx = match context::Context::new(
        root,
        context::SessionArgs {
            profile: cli.profile,
            access_key: cli.access_key,
            secret_access_key: cli.secret_access_key,
            region: cli.region,
        },
        cli.json,
        cli.verbose,
    ) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("error: {e:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init { local_only } => cmd::init::run(&ctx, local_only),
        Commands::Create { name, attrs } => cmd::create::run(&ctx, &name, attrs),
        Commands::Modify { name, attrs } => cmd::modify::run(&ctx, &name, attrs),
        Commands::Deploy { select } => cmd::deploy::run(&ctx, &select),
        Commands::TestLocal { select, test } => cmd::test_local::run(&ctx, &select, &test),
        Commands::TestRemote { select, test } => cmd::test_remote::run(&ctx, &select, &test),
        Commands::Status { select } => cmd::status::run(&ctx, &select),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
