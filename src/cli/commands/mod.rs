//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Turns parsed arguments into a typed ledger request
//! 2. Calls the [`LedgerService`] over a [`FileStore`] in the data dir
//! 3. Formats and displays output (text, or JSON with `--json`)
//!
//! Handlers never write ledger files directly.
//!
//! # Async Commands
//!
//! The service is async. Each handler builds a tokio runtime and blocks on
//! its async body.

mod audit;
mod brew;
mod completion;
mod config_cmd;
mod equipment;
mod history;
mod inventory;
mod record;
mod schedule;

pub use audit::audit;
pub use brew::brew;
pub use completion::completion;
pub use config_cmd::{get as config_get, list as config_list, set as config_set};
pub use equipment::{equipment_add, equipment_list, equipment_update};
pub use history::{entries, history};
pub use inventory::inventory;
pub use record::{adjust, consume, purchase, roast};

use anyhow::Result;

use crate::cli::args::{Command, ConfigAction, EquipmentCommand, ScheduleCommand};
use crate::cli::Context;
use crate::core::entry::schema::{EquipmentRecord, GreenPurchase, RoastProfile, ScheduleRecord};
use crate::core::types::EntityType;
use crate::ledger::factory::{NewBrew, NewConsumption, NewRoast};
use crate::ledger::service::{today, AdjustmentRequest};
use crate::ledger::{EquipmentPatch, LedgerService, ServiceOptions};
use crate::schedule::SchedulePatch;
use crate::store::file::FileStore;

/// Open the service over the file store in the context's data dir.
pub(crate) fn open_service(ctx: &Context) -> LedgerService<FileStore> {
    LedgerService::with_options(
        FileStore::open(ctx.data_dir.clone()),
        ServiceOptions {
            retry: ctx.config.retry_policy(),
            match_tolerance_grams: ctx.config.schedule_match_tolerance_grams(),
        },
    )
}

fn inventory_type(green: bool) -> EntityType {
    if green {
        EntityType::GreenCoffee
    } else {
        EntityType::RoastedCoffee
    }
}

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        // Recording
        Command::Purchase {
            name,
            origin,
            weight,
            farm,
            variety,
            process,
            cost,
            supplier,
            date,
            notes,
        } => record::purchase(
            ctx,
            GreenPurchase {
                name,
                origin,
                farm,
                variety,
                process,
                weight,
                cost,
                purchase_date: date,
                supplier,
                notes,
            },
        ),
        Command::Roast {
            coffee,
            green,
            roasted,
            level,
            batch,
            date,
            charge_temp,
            drop_temp,
            first_crack,
            development,
            total_time,
            notes,
        } => record::roast(
            ctx,
            NewRoast {
                coffee_name: coffee,
                green_weight: green,
                roasted_weight: roasted,
                roast_level: level,
                roast_date: date.unwrap_or_else(today),
                batch_number: batch,
                profile: RoastProfile {
                    charge_temp,
                    drop_temp,
                    first_crack_secs: first_crack,
                    development_secs: development,
                    total_secs: total_time,
                },
                notes,
            },
        ),
        Command::Consume {
            coffee,
            amount,
            green,
            notes,
        } => record::consume(
            ctx,
            NewConsumption {
                coffee_name: coffee,
                entity_type: inventory_type(green),
                amount,
                notes,
            },
        ),
        Command::Adjust {
            coffee,
            new_amount,
            reason,
            green,
            expect,
            notes,
        } => record::adjust(
            ctx,
            inventory_type(green),
            AdjustmentRequest {
                coffee_name: coffee,
                new_amount,
                reason,
                notes,
                expected_current: expect,
            },
        ),
        Command::Brew {
            coffee,
            dose,
            water,
            method,
            grind,
            time,
            temp,
            rating,
            consume,
            notes,
        } => brew::brew(
            ctx,
            NewBrew {
                coffee_name: coffee,
                method,
                dose_grams: dose,
                water_grams: water,
                grind_size: grind,
                brew_time_secs: time,
                water_temp_c: temp,
                rating,
                notes,
                consume,
            },
        ),

        // Reading
        Command::Inventory => inventory::inventory(ctx),
        Command::Entries { limit, offset } => history::entries(ctx, limit, offset),
        Command::History { entity_id } => history::history(ctx, &entity_id),
        Command::Audit => audit::audit(ctx),

        // Schedules
        Command::Schedule { action } => match action {
            ScheduleCommand::Add {
                coffee,
                date,
                green,
                level,
                notes,
            } => schedule::add(
                ctx,
                ScheduleRecord {
                    coffee_name: coffee,
                    scheduled_date: date,
                    roast_level: level,
                    green_weight: green,
                    notes,
                },
            ),
            ScheduleCommand::Edit {
                id,
                coffee,
                date,
                green,
                level,
                notes,
            } => schedule::edit(
                ctx,
                &id,
                SchedulePatch {
                    coffee_name: coffee,
                    scheduled_date: date,
                    roast_level: level,
                    green_weight: green,
                    notes,
                },
            ),
            ScheduleCommand::Complete { id, date } => {
                schedule::complete(ctx, &id, date.unwrap_or_else(today))
            }
            ScheduleCommand::Delete { id } => schedule::delete(ctx, &id),
            ScheduleCommand::List => schedule::list(ctx),
            ScheduleCommand::Upcoming { days } => schedule::upcoming(ctx, days),
            ScheduleCommand::Overdue => schedule::overdue(ctx),
        },

        // Equipment
        Command::Equipment { action } => match action {
            EquipmentCommand::Add {
                name,
                kind,
                brand,
                model,
                notes,
            } => equipment::equipment_add(
                ctx,
                EquipmentRecord {
                    name,
                    kind,
                    brand,
                    model,
                    notes,
                },
            ),
            EquipmentCommand::Update {
                name,
                kind,
                brand,
                model,
                notes,
            } => equipment::equipment_update(
                ctx,
                &name,
                EquipmentPatch {
                    kind,
                    brand,
                    model,
                    notes,
                },
            ),
            EquipmentCommand::List => equipment::equipment_list(ctx),
        },

        // Setup
        Command::Config { action } => match action {
            ConfigAction::Get { key } => config_cmd::get(ctx, &key),
            ConfigAction::Set { key, value } => config_cmd::set(ctx, &key, &value),
            ConfigAction::List => config_cmd::list(ctx),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}
