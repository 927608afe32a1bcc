//! Per-identifier fixed-window rate limiting.
//!
//! Every verification attempt for a domain passes through a
//! [`RateLimitStore`] before any DNS traffic happens. The store is a trait
//! so hosts can plug in an external cache; the default in-memory store
//! prunes expired windows on access, keeping the map bounded by the set of
//! identifiers seen within the last window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Default maximum attempts per window per identifier
pub const DEFAULT_MAX_PER_WINDOW: u32 = 10;
/// Default window length
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Gate for verification attempts, keyed by an opaque identifier
/// (in practice the queried domain).
pub trait RateLimitStore: Send + Sync {
    /// Returns true when the attempt may proceed; false when the
    /// identifier has exhausted its window.
    fn allow(&self, identifier: &str) -> bool;
}

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// In-memory fixed-window limiter.
///
/// A window starts on the first attempt and ends `window` later; attempts
/// past `max_per_window` inside it are denied. The mutex is held only for
/// the map update, never across I/O.
#[derive(Debug)]
pub struct MemoryRateLimitStore {
    max_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryRateLimitStore {
    /// Create a limiter with explicit bounds
    #[must_use]
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Identifiers currently tracked (expired windows excluded)
    #[must_use]
    pub fn tracked(&self) -> usize {
        let now = Instant::now();
        let windows = self.windows.lock().expect("rate limit lock poisoned");
        windows.values().filter(|w| w.reset_at > now).count()
    }
}

impl Default for MemoryRateLimitStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }
}

impl RateLimitStore for MemoryRateLimitStore {
    fn allow(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().expect("rate limit lock poisoned");

        // Drop expired windows so untouched identifiers don't accumulate
        windows.retain(|_, w| w.reset_at > now);

        match windows.get_mut(identifier) {
            Some(w) if w.count >= self.max_per_window => false,
            Some(w) => {
                w.count += 1;
                true
            }
            None => {
                windows.insert(
                    identifier.to_string(),
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn allows_up_to_max_then_denies() {
        let store = MemoryRateLimitStore::new(10, Duration::from_secs(60));
        for _ in 0..10 {
            assert!(store.allow("example.com"));
        }
        assert!(!store.allow("example.com"));
        assert!(!store.allow("example.com"));
    }

    #[test]
    fn identifiers_are_independent() {
        let store = MemoryRateLimitStore::new(1, Duration::from_secs(60));
        assert!(store.allow("a.com"));
        assert!(!store.allow("a.com"));
        assert!(store.allow("b.com"));
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let store = MemoryRateLimitStore::new(2, Duration::from_millis(30));
        assert!(store.allow("example.com"));
        assert!(store.allow("example.com"));
        assert!(!store.allow("example.com"));

        thread::sleep(Duration::from_millis(40));
        assert!(store.allow("example.com"));
    }

    #[test]
    fn expired_windows_are_pruned() {
        let store = MemoryRateLimitStore::new(5, Duration::from_millis(20));
        for i in 0..50 {
            store.allow(&format!("domain-{i}.com"));
        }
        thread::sleep(Duration::from_millis(30));
        store.allow("fresh.com");
        assert_eq!(store.tracked(), 1);
    }

    #[test]
    fn concurrent_increments_never_exceed_max() {
        let store = Arc::new(MemoryRateLimitStore::new(10, Duration::from_secs(60)));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                let mut allowed = 0u32;
                for _ in 0..10 {
                    if store.allow("contended.com") {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }
        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 10);
    }
}
