//! audit command - Recompute inventory and report problems

use anyhow::Result;

use super::open_service;
use crate::cli::Context;
use crate::ui::output;

/// Recompute every inventory group and print the report.
///
/// Problems are reported, not treated as failures.
pub fn audit(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(audit_async(ctx))
}

async fn audit_async(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let report = open_service(ctx).audit(user).await?;

    if ctx.json {
        output::json(&report)?;
    } else {
        output::print(output::format_audit(&report), ctx.verbosity);
    }
    Ok(())
}
