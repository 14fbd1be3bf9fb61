//! End-to-end ledger scenarios against the in-memory store.
//!
//! These tests drive the public service API the way the CLI does and check
//! the derived inventory, schedules, and audit results.

use chrono::{NaiveDate, TimeZone, Utc};

use beanledger::core::entry::schema::{
    AdjustmentReason, EntryPayload, GreenPurchase, RoastProfile, ScheduleRecord,
};
use beanledger::core::types::{CoffeeKey, EntityId, EntityType, UserId, UtcTimestamp};
use beanledger::ledger::{
    AdjustmentRequest, ConsistencyWarning, LedgerError, LedgerService, NewBrew, NewConsumption,
    NewRoast, ServiceOptions,
};
use beanledger::schedule::{ScheduleState, SchedulePatch};
use beanledger::store::memory::{FailOn, MemoryStore, StoreOperation};
use beanledger::store::{EntryStore, RetryPolicy, StoreError};

// =============================================================================
// Fixtures
// =============================================================================

fn alice() -> UserId {
    UserId::new("alice").unwrap()
}

fn bob() -> UserId {
    UserId::new("bob").unwrap()
}

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn service_with(store: MemoryStore) -> LedgerService<MemoryStore> {
    LedgerService::with_options(
        store,
        ServiceOptions {
            retry: RetryPolicy::immediate(3),
            ..Default::default()
        },
    )
}

fn service() -> LedgerService<MemoryStore> {
    service_with(MemoryStore::new())
}

fn purchase(name: &str, weight: f64) -> GreenPurchase {
    GreenPurchase {
        name: name.into(),
        origin: "Ethiopia".into(),
        farm: None,
        variety: None,
        process: Some("washed".into()),
        weight,
        cost: Some(24.0),
        purchase_date: Some(date(6, 1)),
        supplier: None,
        notes: None,
    }
}

fn roast(name: &str, green: f64, roasted: f64, roast_date: NaiveDate) -> NewRoast {
    NewRoast {
        coffee_name: name.into(),
        green_weight: green,
        roasted_weight: roasted,
        roast_level: Some("City+".into()),
        roast_date,
        batch_number: None,
        profile: RoastProfile::default(),
        notes: None,
    }
}

fn consumption(name: &str, entity_type: EntityType, amount: f64) -> NewConsumption {
    NewConsumption {
        coffee_name: name.into(),
        entity_type,
        amount,
        notes: None,
    }
}

fn schedule_record(name: &str, day: u32, green: f64) -> ScheduleRecord {
    ScheduleRecord {
        coffee_name: name.into(),
        scheduled_date: date(6, day),
        roast_level: None,
        green_weight: green,
        notes: None,
    }
}

// =============================================================================
// Purchase and roast
// =============================================================================

mod purchase_and_roast {
    use super::*;

    #[tokio::test]
    async fn roast_moves_weight_from_green_to_roasted() {
        let service = service();
        let user = alice();

        service
            .record_green_purchase(&user, &purchase("Ethiopia Sidamo", 1000.0))
            .await
            .unwrap();
        let recorded = service
            .record_roast_completed(&user, &roast("Ethiopia Sidamo", 220.0, 185.0, date(6, 3)))
            .await
            .unwrap();

        assert_eq!(recorded.batch_number, 1);
        assert_eq!(recorded.roasted_entry.amount_change, 185.0);
        assert_eq!(recorded.green_consumption_entry.amount_change, -220.0);
        assert!(recorded.matched_schedule.is_none());

        let now = UtcTimestamp::from_datetime(Utc.with_ymd_and_hms(2024, 6, 12, 8, 0, 0).unwrap());
        let inventory = service.snapshot_at(&user, now).await.unwrap();

        assert_eq!(inventory.green.len(), 1);
        assert_eq!(inventory.green[0].amount, 780.0);
        assert_eq!(inventory.green[0].origin.as_deref(), Some("Ethiopia"));

        assert_eq!(inventory.roasted.len(), 1);
        let row = &inventory.roasted[0];
        assert_eq!(row.amount, 185.0);
        let loss = row.weight_loss_percentage.unwrap();
        assert!((loss - 15.91).abs() < 0.01, "loss was {}", loss);
        assert_eq!(row.days_since_roast, Some(9));
        assert_eq!(row.batch_number, Some(1));
        assert!(inventory.warnings.is_empty());
    }

    #[tokio::test]
    async fn batch_numbers_increase_per_user() {
        let service = service();

        for expected in 1..=3 {
            let recorded = service
                .record_roast_completed(&alice(), &roast("Kenya AA", 250.0, 212.0, date(6, 3)))
                .await
                .unwrap();
            assert_eq!(recorded.batch_number, expected);
        }
        let other = service
            .record_roast_completed(&bob(), &roast("Kenya AA", 250.0, 212.0, date(6, 3)))
            .await
            .unwrap();
        assert_eq!(other.batch_number, 1);
    }

    #[tokio::test]
    async fn automatic_batch_follows_explicit_one() {
        let service = service();
        let user = alice();

        let explicit = service
            .record_roast_completed(
                &user,
                &NewRoast {
                    batch_number: Some(1),
                    ..roast("Kenya AA", 250.0, 212.0, date(6, 3))
                },
            )
            .await
            .unwrap();
        let automatic = service
            .record_roast_completed(&user, &roast("Kenya AA", 250.0, 212.0, date(6, 4)))
            .await
            .unwrap();

        assert_eq!(explicit.batch_number, 1);
        assert_eq!(automatic.batch_number, 2);
        assert_ne!(
            explicit.roasted_entry.entity_id,
            automatic.roasted_entry.entity_id
        );
    }

    #[tokio::test]
    async fn explicit_batch_number_must_be_unused() {
        let service = service();
        let user = alice();
        let numbered = NewRoast {
            batch_number: Some(2),
            ..roast("Kenya AA", 250.0, 212.0, date(6, 3))
        };

        service.record_roast_completed(&user, &numbered).await.unwrap();
        let entries_before = service.store().len();

        let result = service.record_roast_completed(&user, &numbered).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ref e)) if e.field == "batch_number"
        ));
        assert_eq!(service.store().len(), entries_before);

        let inventory = service.get_inventory(&user).await.unwrap();
        assert_eq!(inventory.roasted.len(), 1);
        assert_eq!(inventory.roasted[0].amount, 212.0);
    }

    #[tokio::test]
    async fn roasted_weight_above_green_rejected() {
        let service = service();
        let result = service
            .record_roast_completed(&alice(), &roast("Kenya AA", 200.0, 210.0, date(6, 3)))
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn purchases_of_same_coffee_accumulate() {
        let service = service();
        let user = alice();

        service
            .record_green_purchase(&user, &purchase("Kenya AA", 500.0))
            .await
            .unwrap();
        service
            .record_green_purchase(&user, &purchase("  kenya   aa ", 250.0))
            .await
            .unwrap();

        let inventory = service.get_inventory(&user).await.unwrap();
        assert_eq!(inventory.green.len(), 1);
        assert_eq!(inventory.green[0].amount, 750.0);
    }

    #[tokio::test]
    async fn users_are_isolated() {
        let service = service();
        service
            .record_green_purchase(&alice(), &purchase("Kenya AA", 500.0))
            .await
            .unwrap();

        let inventory = service.get_inventory(&bob()).await.unwrap();
        assert!(inventory.green.is_empty());
        assert!(service.get_entries(&bob(), None, 0).await.unwrap().is_empty());
    }
}

// =============================================================================
// Adjustments
// =============================================================================

mod adjustments {
    use super::*;

    fn set_to(name: &str, amount: f64, expected: Option<f64>) -> AdjustmentRequest {
        AdjustmentRequest {
            coffee_name: name.into(),
            new_amount: amount,
            reason: AdjustmentReason::PhysicalCount,
            notes: None,
            expected_current: expected,
        }
    }

    #[tokio::test]
    async fn adjustment_records_difference() {
        let service = service();
        let user = alice();

        service
            .record_roast_completed(&user, &roast("Kenya AA", 60.0, 50.0, date(6, 3)))
            .await
            .unwrap();
        let stored = service
            .record_adjustment(&user, EntityType::RoastedCoffee, &set_to("Kenya AA", 40.0, None))
            .await
            .unwrap();

        assert_eq!(stored.amount_change, -10.0);
        match &stored.payload {
            EntryPayload::RoastedAdjustment(adj) => {
                assert_eq!(adj.old_amount, 50.0);
                assert_eq!(adj.new_amount, 40.0);
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        let inventory = service.get_inventory(&user).await.unwrap();
        assert_eq!(inventory.roasted[0].amount, 40.0);
    }

    #[tokio::test]
    async fn stale_expectation_rejected() {
        let service = service();
        let user = alice();
        service
            .record_green_purchase(&user, &purchase("Kenya AA", 500.0))
            .await
            .unwrap();

        let result = service
            .record_adjustment(
                &user,
                EntityType::GreenCoffee,
                &set_to("Kenya AA", 400.0, Some(450.0)),
            )
            .await;
        assert!(
            matches!(result, Err(LedgerError::Validation(ref e)) if e.field == "expected_current")
        );

        let ok = service
            .record_adjustment(
                &user,
                EntityType::GreenCoffee,
                &set_to("Kenya AA", 400.0, Some(500.0)),
            )
            .await
            .unwrap();
        assert_eq!(ok.amount_change, -100.0);
    }

    #[tokio::test]
    async fn concurrent_adjustments_serialize() {
        let service = std::sync::Arc::new(service());
        let user = alice();
        service
            .record_green_purchase(&user, &purchase("Kenya AA", 500.0))
            .await
            .unwrap();

        let a = {
            let service = service.clone();
            let user = user.clone();
            tokio::spawn(async move {
                service
                    .record_adjustment(&user, EntityType::GreenCoffee, &set_to("Kenya AA", 300.0, None))
                    .await
            })
        };
        let b = {
            let service = service.clone();
            let user = user.clone();
            tokio::spawn(async move {
                service
                    .record_adjustment(&user, EntityType::GreenCoffee, &set_to("Kenya AA", 300.0, None))
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let inventory = service.get_inventory(&user).await.unwrap();
        assert_eq!(inventory.green[0].amount, 300.0);
    }

    #[tokio::test]
    async fn reason_must_fit_entity_type() {
        let service = service();
        let result = service
            .record_adjustment(
                &alice(),
                EntityType::GreenCoffee,
                &AdjustmentRequest {
                    reason: AdjustmentReason::Stale,
                    ..set_to("Kenya AA", 10.0, None)
                },
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}

// =============================================================================
// Schedules
// =============================================================================

mod schedules {
    use super::*;

    #[tokio::test]
    async fn lifecycle() {
        let service = service();
        let user = alice();
        let schedule = service.schedule();

        let created = schedule
            .create(&user, schedule_record("Kenya AA", 15, 250.0))
            .await
            .unwrap();
        assert_eq!(created.state, ScheduleState::Scheduled);

        let upcoming = schedule.list_upcoming(&user, 7, date(6, 10)).await.unwrap();
        assert_eq!(upcoming.len(), 1);

        let completed = schedule
            .complete(&user, &created.id, date(6, 15), None)
            .await
            .unwrap();
        assert!(completed.completed);
        assert_eq!(completed.state, ScheduleState::Completed);

        let upcoming = schedule.list_upcoming(&user, 7, date(6, 10)).await.unwrap();
        assert!(upcoming.is_empty());

        let entries_before = service.store().len();
        let edited = schedule
            .edit(
                &user,
                &created.id,
                &SchedulePatch {
                    green_weight: Some(500.0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.green_weight, 250.0);
        assert_eq!(service.store().len(), entries_before);

        let listed = schedule.list(&user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].completed);
    }

    #[tokio::test]
    async fn deleted_schedule_cannot_complete() {
        let service = service();
        let user = alice();
        let schedule = service.schedule();

        let created = schedule
            .create(&user, schedule_record("Kenya AA", 15, 250.0))
            .await
            .unwrap();
        schedule.delete(&user, &created.id).await.unwrap();

        let result = schedule
            .complete(&user, &created.id, date(6, 15), None)
            .await;
        assert!(matches!(result, Err(LedgerError::InvalidTransition(_))));
        assert!(schedule.list(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completed_schedule_survives_delete() {
        let service = service();
        let user = alice();
        let schedule = service.schedule();

        let created = schedule
            .create(&user, schedule_record("Kenya AA", 15, 250.0))
            .await
            .unwrap();
        schedule
            .complete(&user, &created.id, date(6, 15), None)
            .await
            .unwrap();
        let entries_before = service.store().len();

        let after = schedule.delete(&user, &created.id).await.unwrap();
        assert_eq!(after.state, ScheduleState::Completed);
        assert!(!after.deleted);
        assert_eq!(service.store().len(), entries_before);

        let listed = schedule.list(&user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, ScheduleState::Completed);
    }

    #[tokio::test]
    async fn unknown_schedule_not_found() {
        let service = service();
        let result = service
            .schedule()
            .delete(&alice(), &EntityId::new("schedule-missing").unwrap())
            .await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
    }

    #[tokio::test]
    async fn roast_completes_matching_schedule() {
        let service = service();
        let user = alice();

        let early = service
            .schedule()
            .create(&user, schedule_record("Kenya AA", 12, 250.0))
            .await
            .unwrap();
        let late = service
            .schedule()
            .create(&user, schedule_record("Kenya AA", 14, 250.0))
            .await
            .unwrap();

        let recorded = service
            .record_roast_completed(&user, &roast("kenya aa", 252.0, 212.0, date(6, 12)))
            .await
            .unwrap();

        let matched = recorded.matched_schedule.expect("schedule should match");
        assert_eq!(matched.id, early.id);
        assert!(matched.completed);
        let outcome = matched.outcome.unwrap();
        assert_eq!(outcome.batch_number, recorded.batch_number);
        assert_eq!(outcome.roast_entry, Some(recorded.roasted_entry.id.clone()));

        let still_open = service.schedule().get(&user, &late.id).await.unwrap().unwrap();
        assert!(still_open.is_open());
    }

    #[tokio::test]
    async fn roast_outside_tolerance_matches_nothing() {
        let service = service();
        let user = alice();
        service
            .schedule()
            .create(&user, schedule_record("Kenya AA", 12, 250.0))
            .await
            .unwrap();

        let recorded = service
            .record_roast_completed(&user, &roast("Kenya AA", 300.0, 250.0, date(6, 12)))
            .await
            .unwrap();
        assert!(recorded.matched_schedule.is_none());
    }

    #[tokio::test]
    async fn overdue_lists_open_past_schedules() {
        let service = service();
        let user = alice();
        let schedule = service.schedule();

        let past = schedule
            .create(&user, schedule_record("Kenya AA", 2, 250.0))
            .await
            .unwrap();
        schedule
            .create(&user, schedule_record("Kenya AA", 20, 250.0))
            .await
            .unwrap();

        let overdue = schedule.list_overdue(&user, date(6, 10)).await.unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, past.id);
    }
}

// =============================================================================
// Negative balances
// =============================================================================

mod negative_balance {
    use super::*;

    #[tokio::test]
    async fn hidden_from_snapshot_but_reported() {
        let service = service();
        let user = alice();

        service
            .record_green_purchase(&user, &purchase("Kenya AA", 100.0))
            .await
            .unwrap();
        let overdraw = service
            .record_consumption(&user, &consumption("Kenya AA", EntityType::GreenCoffee, 150.0))
            .await
            .unwrap();

        let inventory = service.get_inventory(&user).await.unwrap();
        assert!(inventory.green.is_empty());
        assert_eq!(inventory.warnings.len(), 1);
        match &inventory.warnings[0] {
            ConsistencyWarning::NegativeBalance {
                first_negative,
                total,
                ..
            } => {
                assert_eq!(first_negative, &overdraw.id);
                assert_eq!(*total, -50.0);
            }
            other => panic!("unexpected warning: {:?}", other),
        }

        let report = service.audit(&user).await.unwrap();
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].total, -50.0);
        assert_eq!(report.rows[0].display, 0.0);
    }

    #[tokio::test]
    async fn consumption_without_stock_is_allowed() {
        let service = service();
        let stored = service
            .record_consumption(
                &alice(),
                &consumption("Never Bought", EntityType::RoastedCoffee, 18.0),
            )
            .await
            .unwrap();
        assert_eq!(stored.amount_change, -18.0);
    }
}

// =============================================================================
// Failure handling
// =============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn failed_green_side_is_compensated() {
        let store = MemoryStore::new()
            .with_atomic_batches(false)
            .fail_on(FailOn::AppendOf {
                entity_type: EntityType::GreenCoffee,
                error: StoreError::Constraint("green lot rejected".into()),
            });
        let service = service_with(store);
        let user = alice();

        let result = service
            .record_roast_completed(&user, &roast("Kenya AA", 250.0, 212.0, date(6, 3)))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Persistence(StoreError::Constraint(_)))
        ));

        let entries = service.store().all_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].amount_change, 212.0);
        assert_eq!(entries[1].amount_change, -212.0);
        match &entries[1].payload {
            EntryPayload::RoastedAdjustment(adj) => {
                assert_eq!(adj.reverses, Some(entries[0].id.clone()));
            }
            other => panic!("unexpected payload: {:?}", other),
        }

        let inventory = service.get_inventory(&user).await.unwrap();
        assert!(inventory.roasted.is_empty());

        let report = service.audit(&user).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.rows[0].compensations, vec![entries[1].id.clone()]);
    }

    #[tokio::test]
    async fn brew_stays_logged_when_its_draw_fails() {
        let service = service_with(MemoryStore::new().with_atomic_batches(false));
        let user = alice();
        service
            .record_roast_completed(&user, &roast("Kenya AA", 250.0, 212.0, date(6, 3)))
            .await
            .unwrap();

        // Clones share state, so this rule applies to the service's store.
        let _ = service.store().clone().fail_on(FailOn::AppendOf {
            entity_type: EntityType::RoastedCoffee,
            error: StoreError::Constraint("roasted lot rejected".into()),
        });
        let entries_before = service.store().len();

        let result = service
            .record_brew(
                &user,
                &NewBrew {
                    coffee_name: "Kenya AA".into(),
                    method: Some("V60".into()),
                    dose_grams: 18.0,
                    water_grams: 300.0,
                    grind_size: None,
                    brew_time_secs: None,
                    water_temp_c: None,
                    rating: None,
                    notes: None,
                    consume: true,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Persistence(StoreError::Constraint(_)))
        ));

        let entries = service.store().all_entries();
        assert_eq!(entries.len(), entries_before + 1);
        assert_eq!(entries[entries_before].entity_type, EntityType::Brew);

        let inventory = service.get_inventory(&user).await.unwrap();
        assert_eq!(inventory.roasted[0].amount, 212.0);
    }

    #[tokio::test]
    async fn atomic_store_writes_nothing_on_failure() {
        let store = MemoryStore::new().fail_on(FailOn::AppendOf {
            entity_type: EntityType::GreenCoffee,
            error: StoreError::Constraint("green lot rejected".into()),
        });
        let service = service_with(store);

        let result = service
            .record_roast_completed(&alice(), &roast("Kenya AA", 250.0, 212.0, date(6, 3)))
            .await;
        assert!(result.is_err());
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = MemoryStore::new().fail_on(FailOn::NextAppends {
            count: 2,
            error: StoreError::Unavailable("busy".into()),
        });
        let service = service_with(store);

        service
            .record_green_purchase(&alice(), &purchase("Kenya AA", 500.0))
            .await
            .unwrap();

        let appends = service
            .store()
            .operations()
            .into_iter()
            .filter(|op| matches!(op, StoreOperation::Append { .. }))
            .count();
        assert_eq!(appends, 3);
        assert_eq!(service.store().len(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let store = MemoryStore::new().fail_on(FailOn::NextAppends {
            count: 5,
            error: StoreError::Unavailable("busy".into()),
        });
        let service = service_with(store);

        let result = service
            .record_green_purchase(&alice(), &purchase("Kenya AA", 500.0))
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::Persistence(StoreError::Unavailable(_)))
        ));
        assert!(service.store().is_empty());
    }

    #[tokio::test]
    async fn validation_errors_never_reach_store() {
        let service = service();
        let result = service
            .record_green_purchase(&alice(), &purchase("Kenya AA", -5.0))
            .await;

        assert!(matches!(result, Err(LedgerError::Validation(ref e)) if e.field == "weight"));
        assert!(service.store().operations().is_empty());
    }
}

// =============================================================================
// Append-only history
// =============================================================================

mod history {
    use super::*;

    #[tokio::test]
    async fn entity_history_is_stable() {
        let service = service();
        let user = alice();

        service
            .record_green_purchase(&user, &purchase("Kenya AA", 500.0))
            .await
            .unwrap();
        service
            .record_consumption(&user, &consumption("Kenya AA", EntityType::GreenCoffee, 100.0))
            .await
            .unwrap();

        let key = CoffeeKey::new("Kenya AA").unwrap();
        let id = EntityId::for_coffee(&user, EntityType::GreenCoffee, &key);

        let first = service.get_entity_history(&user, &id).await.unwrap();
        let second = service.store().query_by_entity(&user, &id).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert!(first[0].order_key() < first[1].order_key());
    }

    #[tokio::test]
    async fn entries_page_newest_first() {
        let service = service();
        let user = alice();
        for weight in [100.0, 200.0, 300.0] {
            service
                .record_green_purchase(&user, &purchase("Kenya AA", weight))
                .await
                .unwrap();
        }

        let page = service.get_entries(&user, Some(2), 0).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].amount_change, 300.0);
        assert_eq!(page[1].amount_change, 200.0);

        let rest = service.get_entries(&user, Some(2), 2).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].amount_change, 100.0);
    }
}
