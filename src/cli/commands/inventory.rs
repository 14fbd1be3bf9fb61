//! inventory command - Show current inventory

use anyhow::Result;

use super::open_service;
use crate::cli::Context;
use crate::ui::output;

/// Show current inventory with any consistency warnings.
pub fn inventory(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(inventory_async(ctx))
}

async fn inventory_async(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let snapshot = open_service(ctx).get_inventory(user).await?;

    if ctx.json {
        output::json(&snapshot)?;
        return Ok(());
    }
    output::print(output::format_inventory(&snapshot), ctx.verbosity);
    for warning in &snapshot.warnings {
        output::warn(warning, ctx.verbosity);
    }
    Ok(())
}
