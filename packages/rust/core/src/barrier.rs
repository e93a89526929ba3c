//! Counted fan-in barrier.
//!
//! A [`PendingCount`] is created with the number of outstanding completions.
//! Every completion decrements it exactly once; the decrement that reaches
//! zero is the only one that releases waiters. Work items hold a [`Slot`],
//! which records its completion when released or dropped, so an early return
//! or a panic inside a fan-out task still counts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tracing::warn;

/// Non-negative completion counter with a single zero crossing.
#[derive(Debug)]
pub struct PendingCount {
    remaining: AtomicUsize,
    released: watch::Sender<bool>,
}

impl PendingCount {
    /// Barrier expecting `count` completions. A zero count starts released.
    pub fn new(count: usize) -> Arc<Self> {
        let (released, _) = watch::channel(count == 0);
        Arc::new(Self {
            remaining: AtomicUsize::new(count),
            released,
        })
    }

    /// Completions still outstanding.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Record one completion.
    ///
    /// Returns `true` for exactly one call: the one that brings the count to
    /// zero. Completions past zero are ignored.
    pub fn complete(&self) -> bool {
        match self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
        {
            Ok(1) => {
                self.released.send_replace(true);
                true
            }
            Ok(_) => false,
            Err(_) => {
                warn!("completion recorded on an already released barrier");
                false
            }
        }
    }

    /// Hand out a completion slot for one unit of work.
    pub fn slot(self: &Arc<Self>) -> Slot {
        Slot {
            barrier: Some(Arc::clone(self)),
        }
    }

    /// Wait until the count reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.released.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|released| *released).await;
    }
}

/// One outstanding completion of a [`PendingCount`].
#[derive(Debug)]
#[must_use = "dropping a slot immediately counts it as complete"]
pub struct Slot {
    barrier: Option<Arc<PendingCount>>,
}

impl Slot {
    /// Count this slot complete. Returns `true` if it released the barrier.
    pub fn release(mut self) -> bool {
        self.barrier.take().is_some_and(|b| b.complete())
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(barrier) = self.barrier.take() {
            barrier.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn zero_count_starts_released() {
        let barrier = PendingCount::new(0);
        assert_eq!(barrier.remaining(), 0);
        assert!(*barrier.released.borrow());
    }

    #[test]
    fn only_the_last_completion_releases() {
        let barrier = PendingCount::new(3);
        assert!(!barrier.complete());
        assert!(!barrier.complete());
        assert!(barrier.complete());
        // Past zero: ignored, never a second release.
        assert!(!barrier.complete());
        assert_eq!(barrier.remaining(), 0);
    }

    #[test]
    fn dropped_slot_counts_once() {
        let barrier = PendingCount::new(2);
        let a = barrier.slot();
        let b = barrier.slot();
        drop(a);
        assert_eq!(barrier.remaining(), 1);
        assert!(b.release());
        assert_eq!(barrier.remaining(), 0);
    }

    #[tokio::test]
    async fn wait_returns_after_all_tasks() {
        let barrier = PendingCount::new(5);
        let crossings = Arc::new(AtomicUsize::new(0));

        for i in 0..5u64 {
            let slot = barrier.slot();
            let crossings = Arc::clone(&crossings);
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(5 * (5 - i))).await;
                if slot.release() {
                    crossings.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        barrier.wait().await;
        assert_eq!(barrier.remaining(), 0);
        assert_eq!(crossings.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_task_still_completes() {
        let barrier = PendingCount::new(1);
        let slot = barrier.slot();
        let handle = tokio::spawn(async move {
            let _slot = slot;
            panic!("extension blew up");
        });
        assert!(handle.await.is_err());
        tokio::time::timeout(Duration::from_secs(1), barrier.wait())
            .await
            .expect("barrier released by unwinding slot");
    }
}
