//! Scenario: an oracle answer for a superseded generation is ignored.
//!
//! # Invariant under test
//!
//! A field validated with candidate A is edited to B while the call is in
//! flight. When A's approval finally arrives it changes nothing: the field
//! stays DIRTY/B and the accepted value is untouched. B is then validated on
//! its own schedule.

use rdk_field::FieldStatus;
use rdk_testkit::{advance_ms, currency, settle, DeskHarness};

#[tokio::test(start_paused = true)]
async fn late_approval_for_old_candidate_is_dropped() {
    let h = DeskHarness::start_empty().unwrap();
    let accepted = h
        .desk
        .accepted_value_stream(currency("aus").unwrap())
        .await
        .unwrap();

    h.edit("aus", 2.0).await.unwrap();
    advance_ms(500).await;
    assert_eq!(h.field("aus").await.unwrap().status, FieldStatus::InProgress);

    // Edit while locked at the render boundary is still honoured by the core.
    let view = h.edit("aus", 3.0).await.unwrap();
    assert_eq!(view.status, FieldStatus::Dirty);

    assert!(h.oracle.resolve(0, true));
    settle().await;

    let aus = h.field("aus").await.unwrap();
    assert_eq!(aus.status, FieldStatus::Dirty);
    assert_eq!(aus.display_value, 3.0);
    assert_eq!(aus.accepted_value, 1.75);
    assert!(!accepted.has_changed().unwrap());

    advance_ms(500).await;
    let calls = h.oracle.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].candidate, 3.0);

    assert!(h.oracle.resolve(1, true));
    settle().await;
    let aus = h.field("aus").await.unwrap();
    assert_eq!(aus.status, FieldStatus::Accepted);
    assert_eq!(aus.accepted_value, 3.0);
}

#[tokio::test(start_paused = true)]
async fn answers_arriving_out_of_order_only_honour_the_current_one() {
    let h = DeskHarness::start_empty().unwrap();

    h.edit("can", 2.0).await.unwrap();
    advance_ms(500).await;
    h.edit("can", 4.0).await.unwrap();
    advance_ms(500).await;
    assert_eq!(h.oracle.call_count(), 2);

    // Current call answers first, the superseded one after.
    assert!(h.oracle.resolve(1, false));
    settle().await;
    assert!(h.oracle.resolve(0, true));
    settle().await;

    let can = h.field("can").await.unwrap();
    assert_eq!(can.status, FieldStatus::Accepted);
    assert_eq!(can.accepted_value, 1.75);
    assert_eq!(can.display_value, 1.75);
}
