//! Per-key build claims for in-process stampede protection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of fragments currently being built.
#[derive(Debug, Default)]
pub(crate) struct BuildClaims {
    slots: Mutex<HashMap<String, Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    // Holder plus waiters; the slot is removed when this reaches zero.
    users: usize,
}

/// Exclusive right to build one fragment. Released on drop.
pub(crate) struct Claim<'a> {
    claims: &'a BuildClaims,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl BuildClaims {
    /// Claim `key`, waiting for any current holder to finish.
    pub(crate) async fn acquire(&self, key: &str) -> Claim<'_> {
        let lock = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        // Registered before waiting: dropping this future deregisters too.
        let mut claim = Claim {
            claims: self,
            key: key.to_string(),
            guard: None,
        };
        claim.guard = Some(lock.lock_owned().await);
        claim
    }

    /// Number of keys with a live claim or waiter.
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.lock().len()
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.claims.slots.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_uncontended_claim() {
        let claims = BuildClaims::default();
        let claim = claims.acquire("a").await;
        assert_eq!(claims.in_flight(), 1);

        drop(claim);
        assert_eq!(claims.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_contend() {
        let claims = BuildClaims::default();
        let _a = claims.acquire("a").await;
        // Would deadlock if distinct keys shared a slot.
        let _b = claims.acquire("b").await;
        assert_eq!(claims.in_flight(), 2);
    }

    #[tokio::test]
    async fn test_second_claim_waits_for_first() {
        let claims = Arc::new(BuildClaims::default());
        let first = claims.acquire("k").await;

        let waiter = {
            let claims = Arc::clone(&claims);
            tokio::spawn(async move {
                let _claim = claims.acquire("k").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        // Still registered: the waiter is counted.
        drop(first);
        waiter.await.unwrap();
        assert_eq!(claims.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_deregisters() {
        let claims = BuildClaims::default();
        let first = claims.acquire("k").await;

        let mut waiter = Box::pin(claims.acquire("k"));
        assert!(futures::poll!(&mut waiter).is_pending());

        // Holder leaves before the waiter is polled again, then the waiter is dropped.
        drop(first);
        drop(waiter);
        assert_eq!(claims.in_flight(), 0);

        let claim = claims.acquire("k").await;
        assert_eq!(claims.in_flight(), 1);
        drop(claim);
        assert_eq!(claims.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_waiter_deregisters() {
        let claims = BuildClaims::default();
        let first = claims.acquire("k").await;

        let waited = tokio::time::timeout(Duration::from_millis(20), claims.acquire("k")).await;
        assert!(waited.is_err());
        assert_eq!(claims.in_flight(), 1);

        drop(first);
        assert_eq!(claims.in_flight(), 0);
    }
}
