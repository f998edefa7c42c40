use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::entities::Fingerprint;

/// Serializes renders of the same fingerprint within one process.
///
/// Renders of different fingerprints never wait on each other. A second
/// caller for a fingerprint waits until the first one finishes, then sees
/// whatever the first one wrote to the cache.
#[derive(Default, Clone)]
pub struct InFlightRenders {
    slots: Arc<DashMap<Fingerprint, Arc<Mutex<()>>>>,
}

impl InFlightRenders {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, fingerprint: &Fingerprint) -> RenderGuard {
        let slot = Arc::clone(self.slots.entry(fingerprint.clone()).or_default().value());
        let permit = slot.lock_owned().await;
        RenderGuard {
            fingerprint: fingerprint.clone(),
            slots: Arc::clone(&self.slots),
            permit: Some(permit),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

pub struct RenderGuard {
    fingerprint: Fingerprint,
    slots: Arc<DashMap<Fingerprint, Arc<Mutex<()>>>>,
    permit: Option<OwnedMutexGuard<()>>,
}

impl Drop for RenderGuard {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.slots
            .remove_if(&self.fingerprint, |_, slot| Arc::strong_count(slot) == 1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_fingerprint_waits_for_running_render() {
        let flights = InFlightRenders::new();
        let fingerprint = Fingerprint::compute("x", "");

        let first = flights.acquire(&fingerprint).await;
        let waiting = tokio::time::timeout(Duration::from_millis(50), flights.acquire(&fingerprint));
        assert!(waiting.await.is_err(), "second acquire should block");

        drop(first);
        let second = tokio::time::timeout(Duration::from_secs(1), flights.acquire(&fingerprint))
            .await
            .expect("acquire after release");
        drop(second);
        assert!(flights.is_empty());
    }

    #[tokio::test]
    async fn different_fingerprints_do_not_block() {
        let flights = InFlightRenders::new();
        let _a = flights.acquire(&Fingerprint::compute("a", "")).await;
        let _b = tokio::time::timeout(
            Duration::from_millis(50),
            flights.acquire(&Fingerprint::compute("b", "")),
        )
        .await
        .expect("independent fingerprint");
        assert_eq!(flights.len(), 2);
    }
}
