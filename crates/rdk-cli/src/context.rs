use anyhow::Context as _;
use rdk_core::aws::AwsCli;
use rdk_core::config::{Config, Session, WarnLevel};
use std::path::PathBuf;
use std::time::Duration;

/// Session flags as given on the command line.
pub struct SessionArgs {
    pub profile: Option<String>,
    pub access_key: Option<String>,
    pub secret_access_key: Option<String>,
    pub region: Option<String>,
}

/// Everything a command handler needs, resolved once per run.
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub session: Session,
    pub json: bool,
    pub verbose: u8,
}

impl Context {
    pub fn new(root: PathBuf, args: SessionArgs, json: bool, verbose: u8) -> anyhow::Result<Self> {
        let config = Config::load(&root)
            .with_context(|| format!("failed to load config under {}", root.display()))?;
        for w in config.validate() {
            match w.level {
                WarnLevel::Warning => tracing::warn!("config: {}", w.message),
                WarnLevel::Error => tracing::error!("config: {}", w.message),
            }
        }
        let session = Session {
            profile: args.profile,
            access_key: args.access_key,
            secret_access_key: args.secret_access_key,
            region: args
                .region
                .unwrap_or_else(|| config.default_region.clone()),
        };
        Ok(Self {
            root,
            config,
            session,
            json,
            verbose,
        })
    }

    pub fn provider(&self) -> anyhow::Result<AwsCli> {
        AwsCli::new(self.session.clone(), &self.config).context("cannot run the aws client")
    }
}

/// Wall-clock sleep used by every poll loop outside tests.
pub fn sleep(d: Duration) {
    std::thread::sleep(d)
}
