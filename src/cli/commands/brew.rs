//! brew command - Log a brew

use anyhow::Result;

use super::open_service;
use crate::cli::Context;
use crate::core::entry::schema::EntryPayload;
use crate::ledger::factory::NewBrew;
use crate::ui::output::{self, format_grams};

/// Log a brew, optionally drawing the dose from roasted inventory.
pub fn brew(ctx: &Context, input: NewBrew) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(brew_async(ctx, input))
}

async fn brew_async(ctx: &Context, input: NewBrew) -> Result<()> {
    let user = ctx.user()?;
    let recorded = open_service(ctx).record_brew(user, &input).await?;

    if ctx.json {
        output::json(&recorded)?;
        return Ok(());
    }

    let ratio = match &recorded.brew_entry.payload {
        EntryPayload::BrewLogged(log) => log.ratio,
        _ => input.water_grams / input.dose_grams,
    };
    let mut line = format!(
        "Brewed {} of {} at 1:{:.1}",
        format_grams(input.dose_grams),
        input.coffee_name.trim(),
        ratio
    );
    if recorded.consumption_entry.is_some() {
        line.push_str(" (drawn from inventory)");
    }
    output::print(line, ctx.verbosity);
    Ok(())
}
