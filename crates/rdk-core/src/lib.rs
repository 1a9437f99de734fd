pub mod aws;
pub mod bootstrap;
pub mod ci;
pub mod config;
pub mod deploy;
pub mod error;
pub mod harness;
pub mod io;
pub mod package;
pub mod paths;
pub mod plugin;
pub mod provider;
pub mod publish;
pub mod remote;
pub mod rule;
pub mod scaffold;
pub mod stack;
pub mod types;

pub use error::{RdkError, Result};
