//! equipment commands - Register and list equipment

use anyhow::Result;

use super::open_service;
use crate::cli::Context;
use crate::core::entry::schema::EquipmentRecord;
use crate::ledger::{Equipment, EquipmentPatch};
use crate::ui::output;

fn show_one(ctx: &Context, verb: &str, item: &Equipment) -> Result<()> {
    if ctx.json {
        output::json(item)?;
    } else {
        output::print(format!("{} {}", verb, output::format_equipment(item)), ctx.verbosity);
    }
    Ok(())
}

/// Register a new piece of equipment.
pub fn equipment_add(ctx: &Context, record: EquipmentRecord) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let item = open_service(ctx).add_equipment(user, &record).await?;
        show_one(ctx, "Added", &item)
    })
}

/// Change fields of registered equipment.
pub fn equipment_update(ctx: &Context, name: &str, patch: EquipmentPatch) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let user = ctx.user()?;
        let item = open_service(ctx)
            .update_equipment(user, name, &patch)
            .await?;
        show_one(ctx, "Updated", &item)
    })
}

/// List registered equipment by name.
pub fn equipment_list(ctx: &Context) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(equipment_list_async(ctx))
}

async fn equipment_list_async(ctx: &Context) -> Result<()> {
    let user = ctx.user()?;
    let items = open_service(ctx).list_equipment(user).await?;
    if ctx.json {
        output::json(&items)?;
        return Ok(());
    }
    if items.is_empty() {
        output::print("No equipment.", ctx.verbosity);
    }
    for item in &items {
        output::print(output::format_equipment(item), ctx.verbosity);
    }
    Ok(())
}
