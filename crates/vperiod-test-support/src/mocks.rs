//! Fault-injecting state store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use vperiod_ledger::{Commit, Ledger, LedgerError, LedgerResult, StateStore, WriteSet};

/// Wraps a [`Ledger`] and fails or stalls commits on demand. Reads always
/// pass through.
#[derive(Debug)]
pub struct FaultyStore {
    inner: Ledger,
    fail_commits: AtomicBool,
    stall: Mutex<Option<Duration>>,
    in_flight: AtomicBool,
}

impl FaultyStore {
    /// Store over `inner` that commits normally until told otherwise.
    #[must_use]
    pub const fn new(inner: Ledger) -> Self {
        Self {
            inner,
            fail_commits: AtomicBool::new(false),
            stall: Mutex::new(None),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Block the calling thread for `delay` before applying the next commit.
    pub fn stall_next_commit(&self, delay: Duration) {
        *self.stall.lock().unwrap_or_else(PoisonError::into_inner) = Some(delay);
    }

    /// Whether a stalled commit is currently blocked.
    #[must_use]
    pub fn commit_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Make subsequent commits fail (`true`) or succeed (`false`).
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    /// Underlying ledger.
    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.inner
    }
}

impl StateStore for FaultyStore {
    fn get_state(&self, chaincode_id: &str, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        self.inner.get_state(chaincode_id, key)
    }

    fn commit(&self, writes: WriteSet) -> LedgerResult<Commit> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(LedgerError::Io {
                operation: "faulty_store.commit",
                path: "<injected>".into(),
                source: std::io::Error::other("injected commit failure"),
            });
        }
        let stall = self
            .stall
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(delay) = stall {
            self.in_flight.store(true, Ordering::SeqCst);
            std::thread::sleep(delay);
            self.in_flight.store(false, Ordering::SeqCst);
        }
        self.inner.commit(writes)
    }

    fn height(&self) -> u64 {
        StateStore::height(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injected_failures_leave_state_untouched() {
        let store = FaultyStore::new(Ledger::in_memory());
        let mut writes = WriteSet::new();
        writes.put("cc", "k", b"1".to_vec());
        store.commit(writes.clone()).expect("commit");

        store.fail_commits(true);
        let mut writes = WriteSet::new();
        writes.put("cc", "k", b"2".to_vec());
        assert!(store.commit(writes).is_err());
        assert_eq!(store.get_state("cc", "k").expect("read"), Some(b"1".to_vec()));
        assert_eq!(store.height(), 1);
    }

    #[test]
    fn stall_applies_to_one_commit() {
        let store = FaultyStore::new(Ledger::in_memory());
        store.stall_next_commit(Duration::from_millis(20));
        let mut writes = WriteSet::new();
        writes.put("cc", "k", b"1".to_vec());

        let started = std::time::Instant::now();
        store.commit(writes.clone()).expect("stalled commit");
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(!store.commit_in_flight());

        let started = std::time::Instant::now();
        store.commit(writes).expect("commit");
        assert!(started.elapsed() < Duration::from_millis(20));
        assert_eq!(store.height(), 2);
    }
}
