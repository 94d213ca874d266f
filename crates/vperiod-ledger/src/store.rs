//! Copy-on-write committed state.
//!
//! # Design
//! - Readers clone the current `Arc<Snapshot>` under a brief read lock and never
//!   wait on an in-flight commit.
//! - Commits are serialised by the writer mutex, journaled (when durable), and
//!   only then swapped in, so a reader sees either the old or the new state.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::journal::Journal;
use crate::model::{Commit, StateKey, StateWrite, VersionedValue, WriteSet};

/// Read and commit access to ledger state.
///
/// Chaincode support holds an `Arc<dyn StateStore>` so tests can substitute
/// failing or instrumented stores.
pub trait StateStore: Send + Sync {
    /// Point lookup of a committed value.
    ///
    /// # Errors
    ///
    /// Implementations may fail when the backing store is unavailable.
    fn get_state(&self, chaincode_id: &str, key: &str) -> LedgerResult<Option<Vec<u8>>>;

    /// Atomically apply a write set.
    ///
    /// # Errors
    ///
    /// Fails when the write set is empty or the commit cannot be persisted.
    fn commit(&self, writes: WriteSet) -> LedgerResult<Commit>;

    /// Height of the last commit; zero for an empty ledger.
    fn height(&self) -> u64;
}

#[derive(Debug, Default)]
struct Snapshot {
    height: u64,
    values: HashMap<StateKey, Vec<u8>>,
}

impl Snapshot {
    fn apply(&mut self, commit: &Commit) {
        for write in &commit.writes {
            match &write.value {
                Some(value) => {
                    self.values.insert(write.key.clone(), value.clone());
                }
                None => {
                    self.values.remove(&write.key);
                }
            }
        }
        self.height = commit.height;
    }
}

type History = HashMap<StateKey, Vec<VersionedValue>>;

fn record_history(history: &mut History, commit: &Commit) {
    for write in &commit.writes {
        history
            .entry(write.key.clone())
            .or_default()
            .push(VersionedValue {
                height: commit.height,
                value: write.value.clone(),
            });
    }
}

struct Inner {
    committed: RwLock<Arc<Snapshot>>,
    history: RwLock<History>,
    writer: Mutex<Option<Journal>>,
    path: Option<PathBuf>,
}

/// Ledger store shared between the scheduler, chaincode, and gateway.
#[derive(Clone)]
pub struct Ledger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Ledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ledger")
            .field("height", &self.height())
            .field("path", &self.inner.path)
            .finish()
    }
}

impl Ledger {
    /// Volatile ledger; state is lost on drop.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_parts(Snapshot::default(), History::new(), None, None)
    }

    /// Durable ledger journaled under `path`, replaying existing commits.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] when the directory or journal cannot be opened,
    /// or when the journal is corrupt.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        let (journal, commits) = Journal::open(path)?;
        let mut snapshot = Snapshot::default();
        let mut history = History::new();
        for commit in &commits {
            snapshot.apply(commit);
            record_history(&mut history, commit);
        }
        info!(
            path = %path.display(),
            height = snapshot.height,
            "ledger opened"
        );
        Ok(Self::from_parts(
            snapshot,
            history,
            Some(journal),
            Some(path.to_path_buf()),
        ))
    }

    /// Remove the on-disk state of a durable ledger. Missing paths are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] when the directory exists but cannot be removed.
    pub fn destroy(path: impl AsRef<Path>) -> LedgerResult<()> {
        let path = path.as_ref();
        match fs::remove_dir_all(path) {
            Ok(()) => {
                info!(path = %path.display(), "ledger destroyed");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(LedgerError::io("ledger.destroy", path, source)),
        }
    }

    fn from_parts(
        snapshot: Snapshot,
        history: History,
        journal: Option<Journal>,
        path: Option<PathBuf>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                committed: RwLock::new(Arc::new(snapshot)),
                history: RwLock::new(history),
                writer: Mutex::new(journal),
                path,
            }),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(
            &self
                .inner
                .committed
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// Directory backing a durable ledger.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Point lookup against committed state.
    #[must_use]
    pub fn get(&self, chaincode_id: &str, key: &str) -> Option<Vec<u8>> {
        let snapshot = self.snapshot();
        snapshot
            .values
            .get(&StateKey::new(chaincode_id, key))
            .cloned()
    }

    /// Every version written for a key, oldest first.
    #[must_use]
    pub fn history(&self, chaincode_id: &str, key: &str) -> Vec<VersionedValue> {
        self.inner
            .history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&StateKey::new(chaincode_id, key))
            .cloned()
            .unwrap_or_default()
    }

    /// Height of the last commit.
    #[must_use]
    pub fn current_height(&self) -> u64 {
        self.snapshot().height
    }

    /// Atomically apply `writes`, journaling first when durable.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EmptyWriteSet`] for an empty write set, or the
    /// journal error when the commit cannot be persisted. State is unchanged
    /// on error.
    pub fn apply(&self, writes: WriteSet) -> LedgerResult<Commit> {
        if writes.is_empty() {
            return Err(LedgerError::EmptyWriteSet);
        }
        let mut journal = self
            .inner
            .writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let base = self.snapshot();
        let commit = Commit {
            height: base.height + 1,
            tx_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            writes: writes.into_writes(),
        };
        if let Some(journal) = journal.as_mut() {
            journal.append(&commit)?;
        }

        let mut next = Snapshot {
            height: base.height,
            values: base.values.clone(),
        };
        next.apply(&commit);
        *self
            .inner
            .committed
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        record_history(
            &mut self
                .inner
                .history
                .write()
                .unwrap_or_else(PoisonError::into_inner),
            &commit,
        );
        drop(journal);

        debug!(
            height = commit.height,
            tx_id = %commit.tx_id,
            writes = commit.writes.len(),
            keys = %summarize(&commit.writes),
            "ledger commit applied"
        );
        Ok(commit)
    }
}

fn summarize(writes: &[StateWrite]) -> String {
    writes
        .iter()
        .map(|write| write.key.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

impl StateStore for Ledger {
    fn get_state(&self, chaincode_id: &str, key: &str) -> LedgerResult<Option<Vec<u8>>> {
        Ok(self.get(chaincode_id, key))
    }

    fn commit(&self, writes: WriteSet) -> LedgerResult<Commit> {
        self.apply(writes)
    }

    fn height(&self) -> u64 {
        self.current_height()
    }
}
