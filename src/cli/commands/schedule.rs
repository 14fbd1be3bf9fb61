//! schedule commands - Plan, change, and review roast schedules

use anyhow::{Context as _, Result};
use chrono::NaiveDate;

use super::open_service;
use crate::cli::Context;
use crate::core::entry::schema::ScheduleRecord;
use crate::core::types::EntityId;
use crate::ledger::service::today;
use crate::schedule::{SchedulePatch, ScheduledRoast};
use crate::ui::output;

fn parse_id(id: &str) -> Result<EntityId> {
    EntityId::new(id).context("Invalid schedule id")
}

fn show_one(ctx: &Context, verb: &str, roast: &ScheduledRoast) -> Result<()> {
    if ctx.json {
        output::json(roast)?;
    } else {
        output::print(format!("{} {}", verb, output::format_schedule(roast)), ctx.verbosity);
    }
    Ok(())
}

fn show_many(ctx: &Context, roasts: &[ScheduledRoast], empty: &str) -> Result<()> {
    if ctx.json {
        output::json(roasts)?;
        return Ok(());
    }
    if roasts.is_empty() {
        output::print(empty, ctx.verbosity);
    }
    for roast in roasts {
        output::print(output::format_schedule(roast), ctx.verbosity);
    }
    Ok(())
}

/// Plan a roast.
pub fn add(ctx: &Context, record: ScheduleRecord) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roast = open_service(ctx).schedule().create(user, record).await?;
        show_one(ctx, "Scheduled", &roast)
    })
}

/// Change a planned roast.
pub fn edit(ctx: &Context, id: &str, patch: SchedulePatch) -> Result<()> {
    let id = parse_id(id)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roast = open_service(ctx).schedule().edit(user, &id, &patch).await?;
        if !roast.is_open() {
            output::warn(
                format!("schedule {} is {}; nothing changed", id, roast.state),
                ctx.verbosity,
            );
        }
        show_one(ctx, "Updated", &roast)
    })
}

/// Mark a planned roast as done.
pub fn complete(ctx: &Context, id: &str, date: NaiveDate) -> Result<()> {
    let id = parse_id(id)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roast = open_service(ctx)
            .schedule()
            .complete(user, &id, date, None)
            .await?;
        show_one(ctx, "Completed", &roast)
    })
}

/// Cancel a planned roast.
pub fn delete(ctx: &Context, id: &str) -> Result<()> {
    let id = parse_id(id)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roast = open_service(ctx).schedule().delete(user, &id).await?;
        let verb = if roast.deleted { "Deleted" } else { "Kept" };
        show_one(ctx, verb, &roast)
    })
}

/// List all schedules that are not deleted.
pub fn list(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roasts = open_service(ctx).schedule().list(user).await?;
        show_many(ctx, &roasts, "No scheduled roasts.")
    })
}

/// Open schedules due within the horizon.
pub fn upcoming(ctx: &Context, days: Option<u32>) -> Result<()> {
    let horizon = days.unwrap_or_else(|| ctx.config.upcoming_horizon_days());
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roasts = open_service(ctx)
            .schedule()
            .list_upcoming(user, horizon, today())
            .await?;
        show_many(
            ctx,
            &roasts,
            &format!("Nothing scheduled in the next {} days.", horizon),
        )
    })
}

/// Open schedules whose date has passed.
pub fn overdue(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let roasts = open_service(ctx)
            .schedule()
            .list_overdue(user, today())
            .await?;
        show_many(ctx, &roasts, "Nothing overdue.")
    })
}
