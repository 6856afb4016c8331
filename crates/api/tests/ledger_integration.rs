//! Engine-level tests for the ledger invariants: paired transfer legs,
//! all-or-nothing event awards, withheld purchases, and the consistency
//! between stored balances and transaction history.
//!
//! These exercise the services directly against a real PostgreSQL database.
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test ledger_integration

mod common;

use campus_points_api::services::events::EventAllocationManager;
use campus_points_api::services::transactions::TransactionEngine;
use campus_points_api::services::EngineError;
use chrono::Utc;
use common::{
    cleanup_all_test_data, create_test_pool, create_user, create_user_with, grant_points,
    reload_user, run_migrations,
};
use domain::models::event::CreateEventRequest;
use persistence::repositories::{EventRepository, TransactionRepository};

#[tokio::test]
async fn test_transfer_creates_paired_legs_and_symmetric_balances() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let sender = create_user(&pool, "regular").await;
    let recipient = create_user(&pool, "regular").await;
    grant_points(&pool, &sender, 200).await;

    let engine = TransactionEngine::new(pool.clone(), 1.0);
    let sender_entity = reload_user(&pool, sender.id()).await;
    let record = engine
        .record_transfer(&sender_entity, recipient.id(), 80, "lunch".to_string())
        .await
        .expect("transfer should succeed");

    // Sender leg: negative amount, pointing at the recipient.
    assert_eq!(record.amount, -80);
    assert_eq!(record.related_id, Some(recipient.id()));

    // The credit leg exists, points back, and the amounts sum to zero.
    let transactions = TransactionRepository::new(pool.clone());
    let filter = persistence::repositories::TransactionFilter {
        owner_id: Some(recipient.id()),
        kind: Some("transfer".to_string()),
        ..Default::default()
    };
    let (credit_count, credit_rows) = transactions.list(&filter, 10, 0).await.unwrap();
    assert_eq!(credit_count, 1);
    let credit = &credit_rows[0];
    assert_eq!(credit.amount, 80);
    assert_eq!(credit.related_id, Some(sender.id()));
    assert_eq!(record.amount + credit.amount, 0);

    // Balances moved symmetrically and match the ledger sums.
    let sender_after = reload_user(&pool, sender.id()).await;
    let recipient_after = reload_user(&pool, recipient.id()).await;
    assert_eq!(sender_after.points, 120);
    assert_eq!(recipient_after.points, 80);
    assert_eq!(
        transactions.ledger_sum(sender.id()).await.unwrap(),
        sender_after.points
    );
    assert_eq!(
        transactions.ledger_sum(recipient.id()).await.unwrap(),
        recipient_after.points
    );

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_insufficient_transfer_leaves_everything_unchanged() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let sender = create_user(&pool, "regular").await;
    let recipient = create_user(&pool, "regular").await;
    grant_points(&pool, &sender, 50).await;

    let engine = TransactionEngine::new(pool.clone(), 1.0);
    let sender_entity = reload_user(&pool, sender.id()).await;
    let result = engine
        .record_transfer(&sender_entity, recipient.id(), 80, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientBalance(_))));

    let transactions = TransactionRepository::new(pool.clone());
    assert_eq!(reload_user(&pool, sender.id()).await.points, 50);
    assert_eq!(reload_user(&pool, recipient.id()).await.points, 0);
    // No transfer legs were written.
    let (count, _) = transactions
        .list(&Default::default(), 100, 0)
        .await
        .unwrap();
    assert_eq!(count, 1); // only the seed adjustment

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_concurrent_opposite_transfers_settle_without_deadlock() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let alice = create_user(&pool, "regular").await;
    let bob = create_user(&pool, "regular").await;
    grant_points(&pool, &alice, 100).await;
    grant_points(&pool, &bob, 100).await;

    let alice_entity = reload_user(&pool, alice.id()).await;
    let bob_entity = reload_user(&pool, bob.id()).await;

    let engine_a = TransactionEngine::new(pool.clone(), 1.0);
    let engine_b = TransactionEngine::new(pool.clone(), 1.0);

    let (a_to_b, b_to_a) = tokio::join!(
        engine_a.record_transfer(&alice_entity, bob.id(), 30, String::new()),
        engine_b.record_transfer(&bob_entity, alice.id(), 45, String::new()),
    );
    a_to_b.expect("alice's transfer should commit");
    b_to_a.expect("bob's transfer should commit");

    // Total points are conserved and both ledgers reconcile.
    let alice_after = reload_user(&pool, alice.id()).await;
    let bob_after = reload_user(&pool, bob.id()).await;
    assert_eq!(alice_after.points, 115);
    assert_eq!(bob_after.points, 85);

    let transactions = TransactionRepository::new(pool.clone());
    assert_eq!(
        transactions.ledger_sum(alice.id()).await.unwrap(),
        alice_after.points
    );
    assert_eq!(
        transactions.ledger_sum(bob.id()).await.unwrap(),
        bob_after.points
    );

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_event_award_is_all_or_nothing() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let organizer = create_user(&pool, "manager").await;
    let manager = EventAllocationManager::new(pool.clone());
    let (start, end) = common::window(-1, 24);
    let detail = manager
        .create(&CreateEventRequest {
            name: "Frosh Fair".to_string(),
            description: "Welcome-week fair".to_string(),
            location: "Front Campus".to_string(),
            start_time: start,
            end_time: end,
            capacity: None,
            points: 100,
        })
        .await
        .expect("event creation should succeed");
    let event_id = detail.id;

    let mut guests = Vec::new();
    for _ in 0..3 {
        let guest = create_user(&pool, "regular").await;
        manager
            .add_guest(event_id, guest.utorid(), Utc::now())
            .await
            .expect("guest add should succeed");
        guests.push(guest);
    }

    let organizer_entity = reload_user(&pool, organizer.id()).await;

    // 40 x 3 = 120 > 100: rejected before any write.
    let result = manager
        .award(&organizer_entity, event_id, None, 40, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::InsufficientBudget(_))));

    let events = EventRepository::new(pool.clone());
    let event = events.find_by_id(event_id).await.unwrap().unwrap();
    assert_eq!(event.points_remain, 100);
    assert_eq!(event.points_awarded, 0);
    for guest in &guests {
        assert_eq!(reload_user(&pool, guest.id()).await.points, 0);
    }

    // 30 x 3 = 90 <= 100: commits as one unit.
    let receipts = manager
        .award(&organizer_entity, event_id, None, 30, String::new())
        .await
        .expect("award should succeed");
    assert_eq!(receipts.len(), 3);

    let event = events.find_by_id(event_id).await.unwrap().unwrap();
    assert_eq!(event.points_remain, 10);
    assert_eq!(event.points_awarded, 90);
    assert_eq!(event.points_remain + event.points_awarded, event.points_total);

    let transactions = TransactionRepository::new(pool.clone());
    for guest in &guests {
        let after = reload_user(&pool, guest.id()).await;
        assert_eq!(after.points, 30);
        assert_eq!(
            transactions.ledger_sum(guest.id()).await.unwrap(),
            after.points
        );
    }

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_withheld_purchase_credits_only_when_cleared() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let cashier = create_user_with(&pool, "cashier", true, true).await;
    let manager = create_user(&pool, "manager").await;
    let buyer = create_user(&pool, "regular").await;

    let engine = TransactionEngine::new(pool.clone(), 1.0);
    let cashier_entity = reload_user(&pool, cashier.id()).await;
    let record = engine
        .record_purchase(
            &cashier_entity,
            buyer.utorid(),
            25.0,
            &[],
            String::new(),
            Utc::now(),
        )
        .await
        .expect("purchase should record");

    assert!(record.suspicious);
    assert_eq!(record.amount, 25);
    assert_eq!(reload_user(&pool, buyer.id()).await.points, 0);

    // Clearing the flag credits exactly the row amount.
    let manager_entity = reload_user(&pool, manager.id()).await;
    let cleared = engine
        .set_suspicious(&manager_entity, record.id, false)
        .await
        .expect("clear should succeed");
    assert!(!cleared.suspicious);
    assert_eq!(reload_user(&pool, buyer.id()).await.points, 25);

    // Clearing twice is a no-op.
    engine
        .set_suspicious(&manager_entity, record.id, false)
        .await
        .expect("repeat clear should be a no-op");
    assert_eq!(reload_user(&pool, buyer.id()).await.points, 25);

    // Re-flagging withholds it again.
    engine
        .set_suspicious(&manager_entity, record.id, true)
        .await
        .expect("re-flag should succeed");
    assert_eq!(reload_user(&pool, buyer.id()).await.points, 0);

    cleanup_all_test_data(&pool).await;
}

#[tokio::test]
async fn test_adjustment_below_floor_is_validation_error() {
    let pool = create_test_pool().await;
    run_migrations(&pool).await;
    cleanup_all_test_data(&pool).await;

    let manager = create_user(&pool, "manager").await;
    let target = create_user(&pool, "regular").await;
    grant_points(&pool, &target, 10).await;

    let engine = TransactionEngine::new(pool.clone(), 1.0);
    let manager_entity = reload_user(&pool, manager.id()).await;
    let result = engine
        .record_adjustment(&manager_entity, target.utorid(), -50, None, String::new())
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert_eq!(reload_user(&pool, target.id()).await.points, 10);

    // A corrective negative adjustment inside the floor is fine.
    engine
        .record_adjustment(&manager_entity, target.utorid(), -10, None, String::new())
        .await
        .expect("in-range adjustment should succeed");
    assert_eq!(reload_user(&pool, target.id()).await.points, 0);

    cleanup_all_test_data(&pool).await;
}
