//! Scenario: a second edit inside the debounce window restarts it.
//!
//! # Invariant under test
//!
//! Edits at t=0 and t=499 ms produce no oracle call at t=500 ms. The single
//! call happens 500 ms after the last edit and carries the latest value.

use rdk_field::FieldStatus;
use rdk_testkit::{advance_ms, DeskHarness};

#[tokio::test(start_paused = true)]
async fn edit_at_499ms_restarts_the_window() {
    let h = DeskHarness::start_empty().unwrap();

    h.edit("usd", 2.0).await.unwrap();
    advance_ms(499).await;
    h.edit("usd", 3.0).await.unwrap();

    advance_ms(1).await;
    assert_eq!(h.oracle.call_count(), 0, "first timer must not fire");
    assert_eq!(h.field("usd").await.unwrap().status, FieldStatus::Dirty);

    advance_ms(498).await;
    assert_eq!(h.oracle.call_count(), 0);

    advance_ms(1).await;
    let calls = h.oracle.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].candidate, 3.0);
    assert_eq!(h.field("usd").await.unwrap().status, FieldStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn fields_debounce_independently() {
    let h = DeskHarness::start_empty().unwrap();

    h.edit("eur", 2.0).await.unwrap();
    advance_ms(300).await;
    h.edit("rup", 90.0).await.unwrap();

    advance_ms(200).await;
    let calls = h.oracle.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].key.as_str(), "eur");

    advance_ms(300).await;
    let calls = h.oracle.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].key.as_str(), "rup");
}
