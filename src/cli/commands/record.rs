//! record commands - purchase, roast, consume, adjust

use anyhow::Result;

use super::open_service;
use crate::cli::Context;
use crate::core::entry::schema::GreenPurchase;
use crate::core::types::EntityType;
use crate::ledger::factory::{weight_loss_percentage, NewConsumption, NewRoast};
use crate::ledger::service::AdjustmentRequest;
use crate::ui::output::{self, format_grams};

/// Record a green coffee purchase.
pub fn purchase(ctx: &Context, input: GreenPurchase) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(purchase_async(ctx, input))
}

async fn purchase_async(ctx: &Context, input: GreenPurchase) -> Result<()> {
    let user = ctx.user()?;
    let stored = open_service(ctx)
        .record_green_purchase(user, &input)
        .await?;

    if ctx.json {
        output::json(&stored)?;
        return Ok(());
    }
    output::print(
        format!(
            "Recorded {} of {} ({})",
            format_grams(stored.amount_change),
            input.name.trim(),
            stored.entity_id
        ),
        ctx.verbosity,
    );
    Ok(())
}

/// Record a completed roast.
pub fn roast(ctx: &Context, input: NewRoast) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(roast_async(ctx, input))
}

async fn roast_async(ctx: &Context, input: NewRoast) -> Result<()> {
    let user = ctx.user()?;
    let recorded = open_service(ctx)
        .record_roast_completed(user, &input)
        .await?;

    if ctx.json {
        output::json(&recorded)?;
        return Ok(());
    }
    output::print(
        format!(
            "Roasted batch #{} of {}: {} green -> {} roasted ({:.2}% loss)",
            recorded.batch_number,
            input.coffee_name.trim(),
            format_grams(input.green_weight),
            format_grams(input.roasted_weight),
            weight_loss_percentage(input.green_weight, input.roasted_weight)
        ),
        ctx.verbosity,
    );
    if let Some(schedule) = &recorded.matched_schedule {
        output::print(
            format!("Completed scheduled roast {} ({})", schedule.id, schedule.scheduled_date),
            ctx.verbosity,
        );
    }
    Ok(())
}

/// Record coffee leaving inventory.
pub fn consume(ctx: &Context, input: NewConsumption) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(consume_async(ctx, input))
}

async fn consume_async(ctx: &Context, input: NewConsumption) -> Result<()> {
    let user = ctx.user()?;
    let stored = open_service(ctx).record_consumption(user, &input).await?;

    if ctx.json {
        output::json(&stored)?;
        return Ok(());
    }
    output::print(
        format!(
            "Used {} of {} {}",
            format_grams(input.amount),
            input.entity_type.as_str().replace('_', " "),
            input.coffee_name.trim()
        ),
        ctx.verbosity,
    );
    Ok(())
}

/// Set inventory to a counted amount.
pub fn adjust(ctx: &Context, entity_type: EntityType, request: AdjustmentRequest) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(adjust_async(ctx, entity_type, request))
}

async fn adjust_async(
    ctx: &Context,
    entity_type: EntityType,
    request: AdjustmentRequest,
) -> Result<()> {
    let user = ctx.user()?;
    let stored = open_service(ctx)
        .record_adjustment(user, entity_type, &request)
        .await?;

    if ctx.json {
        output::json(&stored)?;
        return Ok(());
    }
    let change = stored.amount_change;
    output::print(
        format!(
            "Adjusted {} to {} ({}{})",
            request.coffee_name.trim(),
            format_grams(request.new_amount),
            if change > 0.0 { "+" } else { "" },
            format_grams(change)
        ),
        ctx.verbosity,
    );
    Ok(())
}
