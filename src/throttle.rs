//! Shared call budget and credential pool for the contract API.
//!
//! Both values are constructed once at startup and passed by `Arc` into
//! every client, so concurrent crawls for different seeds draw from the
//! same per-second allowance and the same key pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::time::{sleep, Duration, Instant};
use tracing::warn;

/// How long a budget window lasts before `acquire` may refill it.
const REFILL_WINDOW: Duration = Duration::from_secs(1);

/// Sleep between admission polls while the budget is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Token budget limiting outbound API calls to a per-second capacity.
///
/// Refill is lazy: the next `acquire` restores the full capacity once a
/// window has elapsed since the clock was last marked. The clock advances
/// only through [`RateBudget::mark_accessed`], called after a completed
/// call, so the budget tracks actual call cadence rather than queue time.
pub struct RateBudget {
    capacity: u32,
    state: Mutex<BudgetState>,
}

struct BudgetState {
    remaining: u32,
    last_refill: Instant,
}

impl RateBudget {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            state: Mutex::new(BudgetState {
                remaining: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Block until a token is available, then take it.
    ///
    /// Polls rather than parking on a notification; the mutex is released
    /// before each sleep so other crawl workers are never starved by a
    /// waiter.
    pub async fn acquire(&self) {
        loop {
            {
                let mut state = self.state.lock().expect("budget mutex poisoned");
                if state.last_refill.elapsed() >= REFILL_WINDOW {
                    state.remaining = self.capacity;
                }
                if state.remaining > 0 {
                    state.remaining -= 1;
                    return;
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Advance the refill clock after a completed external call.
    pub fn mark_accessed(&self) {
        let mut state = self.state.lock().expect("budget mutex poisoned");
        state.last_refill = Instant::now();
    }
}

/// Ordered pool of API credentials with circular rotation.
///
/// Rotation is the recovery move for decode/auth failures, which the client
/// treats as quota exhaustion on the current key. An empty pool makes
/// rotation a no-op; callers then retry on the same (absent) credential
/// indefinitely, which is accepted as a configuration error surfaced by log
/// volume rather than a crash.
pub struct CredentialRotator {
    keys: Vec<String>,
    current: AtomicUsize,
}

impl CredentialRotator {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            keys,
            current: AtomicUsize::new(0),
        }
    }

    /// The active credential, `None` when the pool is empty.
    pub fn current(&self) -> Option<&str> {
        if self.keys.is_empty() {
            return None;
        }
        let index = self.current.load(Ordering::SeqCst) % self.keys.len();
        Some(&self.keys[index])
    }

    /// Advance to the next credential in the pool.
    pub fn rotate(&self) {
        if self.keys.is_empty() {
            warn!("credential pool is empty, rotation is a no-op");
            return;
        }
        let next = (self.current.fetch_add(1, Ordering::SeqCst) + 1) % self.keys.len();
        warn!(
            "rotating API credential to slot {}/{}",
            next + 1,
            self.keys.len()
        );
    }

    /// Index of the active credential, for observability and tests.
    pub fn current_index(&self) -> usize {
        if self.keys.is_empty() {
            return 0;
        }
        self.current.load(Ordering::SeqCst) % self.keys.len()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_budget_admits_capacity_within_window() {
        let budget = RateBudget::new(3);
        let start = Instant::now();

        for _ in 0..3 {
            budget.acquire().await;
        }
        // All capacity tokens are handed out without the clock moving.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_blocks_until_window_elapses() {
        let budget = RateBudget::new(2);
        let start = Instant::now();

        budget.acquire().await;
        budget.acquire().await;
        // Third acquire must wait for the window to pass since the last
        // refill (creation time here, nothing marked access yet).
        budget.acquire().await;

        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mark_accessed_moves_the_window() {
        let budget = RateBudget::new(1);

        budget.acquire().await;
        tokio::time::advance(Duration::from_millis(600)).await;
        budget.mark_accessed();

        let start = Instant::now();
        budget.acquire().await;
        // The window restarted at mark_accessed, so the wait is a full
        // second from there, not 400ms from creation.
        assert!(start.elapsed() >= Duration::from_millis(900));
    }

    #[test]
    fn test_rotation_is_circular() {
        let pool = CredentialRotator::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(pool.current(), Some("a"));

        let rotations = 7;
        for _ in 0..rotations {
            pool.rotate();
        }
        assert_eq!(pool.current_index(), rotations % pool.len());
        assert_eq!(pool.current(), Some("b"));
    }

    #[test]
    fn test_empty_pool_rotation_is_noop() {
        let pool = CredentialRotator::new(Vec::new());
        assert_eq!(pool.current(), None);
        pool.rotate();
        assert_eq!(pool.current(), None);
        assert_eq!(pool.current_index(), 0);
    }
}
