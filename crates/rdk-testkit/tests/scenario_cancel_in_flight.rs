//! Scenario: cancelling an in-flight validation.
//!
//! # Invariant under test
//!
//! Cancel while IN_PROGRESS returns the field to ACCEPTED with the old value.
//! The oracle call is not aborted; when it later approves, the answer is
//! stale and discarded. Cancel outside IN_PROGRESS changes nothing.

use rdk_field::FieldStatus;
use rdk_testkit::{advance_ms, currency, settle, DeskHarness};

#[tokio::test(start_paused = true)]
async fn cancel_reverts_and_late_approval_is_ignored() {
    let h = DeskHarness::start_empty().unwrap();
    let accepted = h
        .desk
        .accepted_value_stream(currency("rup").unwrap())
        .await
        .unwrap();

    h.edit("rup", 80.0).await.unwrap();
    advance_ms(500).await;
    assert_eq!(h.field("rup").await.unwrap().status, FieldStatus::InProgress);

    let view = h.cancel("rup").await.unwrap();
    assert_eq!(view.status, FieldStatus::Accepted);
    assert_eq!(view.display_value, 97.45);
    assert!(!view.locked);

    assert!(h.oracle.resolve(0, true));
    settle().await;

    let rup = h.field("rup").await.unwrap();
    assert_eq!(rup.status, FieldStatus::Accepted);
    assert_eq!(rup.accepted_value, 97.45);
    assert!(!accepted.has_changed().unwrap());
}

#[tokio::test(start_paused = true)]
async fn cancel_while_dirty_is_a_no_op() {
    let h = DeskHarness::start_empty().unwrap();

    let dirty = h.edit("eur", 9.0).await.unwrap();
    let after = h.cancel("eur").await.unwrap();
    assert_eq!(after.status, FieldStatus::Dirty);
    assert_eq!(after.generation, dirty.generation);

    // The debounce keeps running.
    advance_ms(500).await;
    assert_eq!(h.oracle.call_count(), 1);
}
