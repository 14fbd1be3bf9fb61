//! cli
//!
//! Command-line interface layer for beanledger.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load configuration and install logging
//! - Build an explicit [`Context`] and delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and calls the
//! [`crate::ledger::LedgerService`]. The acting user comes from `--user` or
//! the configured `default_user`; it is never read from anywhere else.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;
use crate::core::types::UserId;
use crate::ui::output::Verbosity;

/// Everything a command needs, resolved once from flags and config.
#[derive(Debug, Clone)]
pub struct Context {
    /// Acting user, if one was given or configured.
    pub user: Option<UserId>,
    pub data_dir: PathBuf,
    pub verbosity: Verbosity,
    pub json: bool,
    pub config: Config,
}

impl Context {
    /// Resolve the context from parsed flags and loaded config.
    ///
    /// Flags override config.
    pub fn new(cli: &Cli, config: Config) -> Result<Self> {
        let user = match cli.user.as_deref().or(config.default_user()) {
            Some(id) => Some(UserId::new(id).context("Invalid --user")?),
            None => None,
        };
        let data_dir = cli.data_dir.clone().unwrap_or_else(|| config.data_dir());
        Ok(Self {
            user,
            data_dir,
            verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
            json: cli.json,
            config,
        })
    }

    /// The acting user, or an error telling how to set one.
    pub fn user(&self) -> Result<&UserId> {
        self.user.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No user given. Pass --user or run 'bean config set default_user <id>'.")
        })
    }
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let config = Config::load().context("Failed to load config")?;
    let ctx = Context::new(&cli, config)?;

    commands::dispatch(cli.command, &ctx)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins unless `--debug` is given.
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("beanledger=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("beanledger=warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
