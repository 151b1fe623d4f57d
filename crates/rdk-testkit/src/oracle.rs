//! Oracle whose answers are supplied by the test.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rdk_field::{CurrencyKey, ValidationOracle};
use tokio::sync::oneshot;
use tracing::debug;

/// One recorded `validate` call.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleCall {
    pub key: CurrencyKey,
    pub candidate: f64,
    pub resolved: bool,
}

struct Pending {
    call: OracleCall,
    reply: Option<oneshot::Sender<bool>>,
}

/// Records every call and blocks it until [`ScriptedOracle::resolve`].
///
/// Calls are indexed in arrival order. A call whose answer is never given
/// stays pending forever, which is exactly an oracle without a timeout.
#[derive(Default)]
pub struct ScriptedOracle {
    pending: Mutex<Vec<Pending>>,
}

impl ScriptedOracle {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<OracleCall> {
        self.lock().iter().map(|p| p.call.clone()).collect()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    /// Answer call `index`. Returns `false` if there is no such call or it
    /// was already answered.
    pub fn resolve(&self, index: usize, ok: bool) -> bool {
        let mut pending = self.lock();
        let Some(entry) = pending.get_mut(index) else {
            return false;
        };
        let Some(reply) = entry.reply.take() else {
            return false;
        };
        entry.call.resolved = true;
        debug!(index, field = %entry.call.key, ok, "scripted oracle resolved");
        // The caller may be gone if the desk shut down.
        let _ = reply.send(ok);
        true
    }

    /// Answer the most recent call.
    pub fn resolve_last(&self, ok: bool) -> bool {
        match self.call_count().checked_sub(1) {
            Some(index) => self.resolve(index, ok),
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Pending>> {
        // A panicking test thread must not hide the calls from the next assert.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ValidationOracle for ScriptedOracle {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn validate(&self, key: &CurrencyKey, candidate: f64) -> bool {
        let (tx, rx) = oneshot::channel();
        self.lock().push(Pending {
            call: OracleCall {
                key: key.clone(),
                candidate,
                resolved: false,
            },
            reply: Some(tx),
        });
        // Dropped sender only happens if the oracle itself is dropped.
        rx.await.unwrap_or(false)
    }
}
