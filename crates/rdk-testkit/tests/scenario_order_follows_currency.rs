//! Scenario: orders re-subscribe when their currency changes.
//!
//! # Invariant under test
//!
//! An order moved from eur to usd immediately shows price / usd, and a later
//! eur approval leaves it alone while a usd approval moves it. Orders never
//! see DIRTY or IN_PROGRESS rates.

use rdk_runtime::DeskNotification;
use rdk_testkit::{advance_ms, currency, settle, DeskHarness};

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[tokio::test(start_paused = true)]
async fn retargeted_order_tracks_new_currency_only() {
    let mut h = DeskHarness::start(&[]).unwrap();

    // Position 3 is the 1200 eur pair of boots.
    let boots = h.order_at(3).await.unwrap();
    assert_eq!(boots.currency.as_str(), "eur");
    assert!(close(boots.base_price, 1200.0 / 1.12));

    let moved = h
        .desk
        .edit_order_currency(boots.id, currency("usd").unwrap())
        .await
        .unwrap();
    assert!(close(moved.base_price, 1200.0 / 1.33));

    // eur moves; the boots must not.
    h.edit("eur", 2.0).await.unwrap();
    advance_ms(500).await;
    assert!(h.oracle.resolve_last(true));
    settle().await;
    let boots_now = h.order_at(3).await.unwrap();
    assert!(close(boots_now.base_price, 1200.0 / 1.33));
    // The cheese (eur) did move.
    let cheese = h.order_at(2).await.unwrap();
    assert!(close(cheese.base_price, 12.99 / 2.0));

    // A pending usd edit is invisible to the order...
    h.drain_notifications();
    h.edit("usd", 3.0).await.unwrap();
    advance_ms(500).await;
    let boots_now = h.order_at(3).await.unwrap();
    assert!(close(boots_now.base_price, 1200.0 / 1.33));

    // ...until it is accepted.
    assert!(h.oracle.resolve_last(true));
    settle().await;
    let boots_now = h.order_at(3).await.unwrap();
    assert!(close(boots_now.base_price, 400.0));

    let changed: Vec<_> = h
        .drain_notifications()
        .into_iter()
        .filter_map(|n| match n {
            DeskNotification::OrderChanged(view) => Some(view.id),
            _ => None,
        })
        .collect();
    // LEGO (usd) and the boots, in order-set order.
    let lego = h.order_at(0).await.unwrap();
    assert_eq!(changed, vec![lego.id, boots.id]);
}

#[tokio::test(start_paused = true)]
async fn unknown_currency_is_refused_without_change() {
    let h = DeskHarness::start(&[]).unwrap();
    let before = h.snapshot().await.unwrap();
    let lego = &before.orders[0];

    let err = h
        .desk
        .edit_order_currency(lego.id, currency("cad").unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown currency 'cad'"));
    assert_eq!(h.snapshot().await.unwrap(), before);
}
