//! entries and history commands - Browse raw ledger entries

use anyhow::{Context as _, Result};

use super::open_service;
use crate::cli::Context;
use crate::core::types::EntityId;
use crate::ui::output;

/// List a page of entries, newest first.
pub fn entries(ctx: &Context, limit: usize, offset: usize) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(entries_async(ctx, limit, offset))
}

async fn entries_async(ctx: &Context, limit: usize, offset: usize) -> Result<()> {
    let user = ctx.user()?;
    let entries = open_service(ctx)
        .get_entries(user, Some(limit), offset)
        .await?;

    if ctx.json {
        output::json(&entries)?;
        return Ok(());
    }
    if entries.is_empty() {
        output::print("No entries.", ctx.verbosity);
    }
    for entry in &entries {
        output::print(output::format_entry(entry), ctx.verbosity);
    }
    Ok(())
}

/// Show every entry of one entity, oldest first.
pub fn history(ctx: &Context, entity_id: &str) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(history_async(ctx, entity_id))
}

async fn history_async(ctx: &Context, entity_id: &str) -> Result<()> {
    let user = ctx.user()?;
    let id = EntityId::new(entity_id).context("Invalid entity id")?;
    let entries = open_service(ctx).get_entity_history(user, &id).await?;

    if ctx.json {
        output::json(&entries)?;
        return Ok(());
    }
    if entries.is_empty() {
        output::print(format!("No entries for {}.", id), ctx.verbosity);
    }
    for entry in &entries {
        output::print(output::format_entry(entry), ctx.verbosity);
    }
    Ok(())
}
