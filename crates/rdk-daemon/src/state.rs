//! Shared runtime state for rdk-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The desk itself runs in
//! its own task behind a [`DeskHandle`]; this module only wires its
//! notifications onto the SSE bus.

use std::time::Duration;

use rdk_runtime::{DeskHandle, DeskNotification};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Desk { event: DeskNotification },
}

impl BusMsg {
    /// SSE event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Desk { event } => event.kind(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Cloneable handle shared across all Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    /// Static build metadata.
    pub build: BuildInfo,
    /// Client of the running desk.
    pub desk: DeskHandle,
    /// Hash of the effective desk configuration.
    pub config_hash: String,
}

impl AppState {
    pub fn new(desk: DeskHandle, config_hash: impl Into<String>) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "rdk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            desk,
            config_hash: config_hash.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}

/// Spawn a background task that republishes desk notifications on `bus`.
///
/// Ends when the desk stops. A lagging receiver skips the missed
/// notifications; clients re-sync from `GET /v1/snapshot`.
pub fn spawn_desk_forwarder(desk: &DeskHandle, bus: broadcast::Sender<BusMsg>) {
    let mut rx = desk.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let _ = bus.send(BusMsg::Desk { event });
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "desk notifications dropped for SSE bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("desk notification stream closed");
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use rdk_field::FixedOracle;

    #[tokio::test]
    async fn forwarder_republishes_desk_notifications() {
        let loaded = rdk_config::load_desk_config_from_strings(&["orders: []"]).unwrap();
        let (desk, _task) =
            rdk_runtime::spawn_desk_from_config(&loaded.desk, Arc::new(FixedOracle::approve_all()))
                .unwrap();
        let st = AppState::new(desk, loaded.config_hash);
        let mut rx = st.bus.subscribe();
        spawn_desk_forwarder(&st.desk, st.bus.clone());

        st.desk.add_order(None).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.event_name(), "order_added");
        let json = serde_json::to_value(&first).unwrap();
        assert_eq!(json["type"], "desk");
        assert_eq!(json["event"]["type"], "order_added");
        assert_eq!(rx.recv().await.unwrap().event_name(), "total_changed");
    }

    #[test]
    fn heartbeat_event_name() {
        assert_eq!(BusMsg::Heartbeat { ts_millis: 1 }.event_name(), "heartbeat");
    }
}
