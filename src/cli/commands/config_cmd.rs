//! config command - Get, set, or list configuration values

use anyhow::{bail, Context as _, Result};
use std::path::PathBuf;

use crate::cli::Context;
use crate::core::config::{Config, GlobalConfig, LedgerSettings, RetrySettings};
use crate::ui::output;

/// Keys understood by `bean config`.
const KEYS: [&str; 7] = [
    "default_user",
    "data_dir",
    "ledger.schedule_match_tolerance_grams",
    "ledger.upcoming_horizon_days",
    "retry.max_attempts",
    "retry.min_delay_ms",
    "retry.max_delay_ms",
];

/// Effective value of a key, with defaults applied.
fn effective_value(config: &Config, key: &str) -> Result<String> {
    let retry = config.retry_policy();
    Ok(match key {
        "default_user" => config.default_user().unwrap_or_default().to_string(),
        "data_dir" => config.data_dir().display().to_string(),
        "ledger.schedule_match_tolerance_grams" => {
            config.schedule_match_tolerance_grams().to_string()
        }
        "ledger.upcoming_horizon_days" => config.upcoming_horizon_days().to_string(),
        "retry.max_attempts" => retry.max_attempts.to_string(),
        "retry.min_delay_ms" => retry.min_delay.as_millis().to_string(),
        "retry.max_delay_ms" => retry.max_delay.as_millis().to_string(),
        _ => bail!("Unknown configuration key: {}", key),
    })
}

/// Whether the key is set explicitly in the file.
fn is_explicit(global: &GlobalConfig, key: &str) -> bool {
    let ledger = global.ledger.as_ref();
    let retry = global.retry.as_ref();
    match key {
        "default_user" => global.default_user.is_some(),
        "data_dir" => global.data_dir.is_some(),
        "ledger.schedule_match_tolerance_grams" => {
            ledger.is_some_and(|l| l.schedule_match_tolerance_grams.is_some())
        }
        "ledger.upcoming_horizon_days" => ledger.is_some_and(|l| l.upcoming_horizon_days.is_some()),
        "retry.max_attempts" => retry.is_some_and(|r| r.max_attempts.is_some()),
        "retry.min_delay_ms" => retry.is_some_and(|r| r.min_delay_ms.is_some()),
        "retry.max_delay_ms" => retry.is_some_and(|r| r.max_delay_ms.is_some()),
        _ => false,
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", key, value))
}

/// Apply one `key = value` to a config. Validation happens on write.
fn apply_value(global: &mut GlobalConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "default_user" => global.default_user = Some(value.to_string()),
        "data_dir" => global.data_dir = Some(PathBuf::from(value)),
        "ledger.schedule_match_tolerance_grams" => {
            global
                .ledger
                .get_or_insert_with(LedgerSettings::default)
                .schedule_match_tolerance_grams = Some(parse(key, value)?)
        }
        "ledger.upcoming_horizon_days" => {
            global
                .ledger
                .get_or_insert_with(LedgerSettings::default)
                .upcoming_horizon_days = Some(parse(key, value)?)
        }
        "retry.max_attempts" => {
            global
                .retry
                .get_or_insert_with(RetrySettings::default)
                .max_attempts = Some(parse(key, value)?)
        }
        "retry.min_delay_ms" => {
            global
                .retry
                .get_or_insert_with(RetrySettings::default)
                .min_delay_ms = Some(parse(key, value)?)
        }
        "retry.max_delay_ms" => {
            global
                .retry
                .get_or_insert_with(RetrySettings::default)
                .max_delay_ms = Some(parse(key, value)?)
        }
        _ => bail!("Unknown configuration key: {}", key),
    }
    Ok(())
}

/// Get a configuration value.
pub fn get(ctx: &Context, key: &str) -> Result<()> {
    let value = effective_value(&ctx.config, key)?;
    if value.is_empty() {
        // Key exists but has no value - exit silently
        return Ok(());
    }
    println!("{}", value);
    Ok(())
}

/// Set a configuration value.
///
/// Writes to the file the config was loaded from, or the default location.
pub fn set(ctx: &Context, key: &str, value: &str) -> Result<()> {
    let path = match ctx.config.global_config_loaded_from() {
        Some(path) => path.to_path_buf(),
        None => Config::global_config_path().context("Failed to locate config file")?,
    };

    let mut global = ctx.config.global.clone();
    apply_value(&mut global, key, value)?;
    Config::write_global_to(&path, &global).context("Failed to write config")?;

    output::print(format!("Set {} = {}", key, value), ctx.verbosity);
    Ok(())
}

/// List all configuration values.
pub fn list(ctx: &Context) -> Result<()> {
    match ctx.config.global_config_loaded_from() {
        Some(path) => println!("# Loaded from {}", path.display()),
        None => println!("# No config file; showing defaults"),
    }
    for key in KEYS {
        let value = effective_value(&ctx.config, key)?;
        let value = if value.is_empty() { "(not set)".to_string() } else { value };
        if is_explicit(&ctx.config.global, key) {
            println!("{} = {}", key, value);
        } else {
            println!("{} = {}  (default)", key, value);
        }
    }
    Ok(())
}
