//! Per-key mutual exclusion for work on a single source file.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};

/// Set of keys currently being worked on. Acquiring a held key blocks until
/// its guard is dropped; distinct keys never wait on each other.
#[derive(Default)]
pub struct InFlight {
    keys: Mutex<HashSet<String>>,
    released: Condvar,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, key: &str) -> InFlightGuard<'_> {
        // The set is only ever mutated by single insert/remove calls, so a
        // poisoned lock still holds a coherent set.
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        while keys.contains(key) {
            keys = self
                .released
                .wait(keys)
                .unwrap_or_else(PoisonError::into_inner);
        }
        keys.insert(key.to_string());

        InFlightGuard {
            owner: self,
            key: key.to_string(),
        }
    }

    #[cfg(test)]
    fn is_held(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

pub struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut keys = self
            .owner
            .keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        keys.remove(&self.key);
        drop(keys);
        self.owner.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_guard_releases_on_drop() {
        let in_flight = InFlight::new();
        {
            let _guard = in_flight.acquire("f1");
            assert!(in_flight.is_held("f1"));
        }
        assert!(!in_flight.is_held("f1"));
    }

    #[test]
    fn test_same_key_is_serialized() {
        let in_flight = Arc::new(InFlight::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let in_flight = Arc::clone(&in_flight);
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                thread::spawn(move || {
                    let _guard = in_flight.acquire("same");
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(!in_flight.is_held("same"));
    }

    #[test]
    fn test_distinct_keys_run_together() {
        let in_flight = Arc::new(InFlight::new());
        // Both threads must hold their guard at the same time to pass the barrier.
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|key| {
                let in_flight = Arc::clone(&in_flight);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let _guard = in_flight.acquire(key);
                    barrier.wait();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_guard_released_when_holder_panics() {
        let in_flight = Arc::new(InFlight::new());
        let cloned = Arc::clone(&in_flight);
        let result = thread::spawn(move || {
            let _guard = cloned.acquire("f1");
            panic!("worker blew up");
        })
        .join();
        assert!(result.is_err());

        let _guard = in_flight.acquire("f1");
        assert!(in_flight.is_held("f1"));
    }
}
