//! Durable JSON-lines commit journal.
//!
//! One [`Commit`] per line. Appends are `fsync`ed before the caller publishes
//! the new state. On replay an unterminated final line is a torn write: it is
//! dropped with a warning and truncated away. Any other undecodable line is
//! fatal. A failed append is rolled back to the previous length; when even
//! that fails the journal refuses further appends.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use crate::error::{LedgerError, LedgerResult};
use crate::model::Commit;

/// File name of the journal inside the ledger directory.
pub const JOURNAL_FILE: &str = "ledger.jsonl";

#[derive(Debug)]
pub(crate) struct Journal {
    path: PathBuf,
    file: File,
    poisoned: bool,
}

impl Journal {
    /// Open (creating if needed) the journal under `dir` and replay it.
    pub(crate) fn open(dir: &Path) -> LedgerResult<(Self, Vec<Commit>)> {
        fs::create_dir_all(dir).map_err(|source| LedgerError::io("journal.create_dir", dir, source))?;
        let path = dir.join(JOURNAL_FILE);
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::io("journal.open", &path, source))?;

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|source| LedgerError::io("journal.read", &path, source))?;

        let replay = replay(&contents)?;
        if replay.valid_len < contents.len() {
            file.set_len(replay.valid_len as u64)
                .map_err(|source| LedgerError::io("journal.truncate", &path, source))?;
        } else if !contents.is_empty() && !contents.ends_with(b"\n") {
            file.write_all(b"\n")
                .map_err(|source| LedgerError::io("journal.terminate", &path, source))?;
        }
        debug!(path = %path.display(), commits = replay.commits.len(), "journal replayed");

        Ok((
            Self {
                path,
                file,
                poisoned: false,
            },
            replay.commits,
        ))
    }

    /// Append one commit and flush it to stable storage.
    pub(crate) fn append(&mut self, commit: &Commit) -> LedgerResult<()> {
        let mut line = serde_json::to_vec(commit).map_err(|source| LedgerError::Encode { source })?;
        line.push(b'\n');
        self.append_with(&line, |file, line| {
            file.write_all(line)?;
            file.sync_data()
        })
    }

    fn append_with<F>(&mut self, line: &[u8], write: F) -> LedgerResult<()>
    where
        F: FnOnce(&mut File, &[u8]) -> io::Result<()>,
    {
        if self.poisoned {
            return Err(LedgerError::JournalPoisoned {
                path: self.path.clone(),
            });
        }
        let len = self
            .file
            .metadata()
            .map_err(|source| LedgerError::io("journal.stat", &self.path, source))?
            .len();
        let Err(source) = write(&mut self.file, line) else {
            return Ok(());
        };
        let rollback = self
            .file
            .set_len(len)
            .and_then(|()| self.file.sync_data());
        if let Err(err) = rollback {
            self.poisoned = true;
            error!(path = %self.path.display(), error = %err, "journal rollback failed");
        } else {
            warn!(path = %self.path.display(), error = %source, "journal append rolled back");
        }
        Err(LedgerError::io("journal.append", &self.path, source))
    }
}

struct Replay {
    commits: Vec<Commit>,
    valid_len: usize,
}

fn replay(contents: &[u8]) -> LedgerResult<Replay> {
    let mut commits = Vec::new();
    let mut valid_len = 0;
    let mut expected = 1_u64;

    for (index, raw) in contents.split_inclusive(|byte| *byte == b'\n').enumerate() {
        let line = index + 1;
        let terminated = raw.ends_with(b"\n");
        let body = raw.trim_ascii();
        if body.is_empty() {
            valid_len += raw.len();
            continue;
        }
        match serde_json::from_slice::<Commit>(body) {
            Ok(commit) => {
                if commit.height != expected {
                    return Err(LedgerError::OutOfOrder {
                        line,
                        expected,
                        found: commit.height,
                    });
                }
                expected += 1;
                valid_len += raw.len();
                commits.push(commit);
            }
            Err(err) if !terminated => {
                warn!(line, error = %err, "ignoring torn journal tail");
                break;
            }
            Err(source) => return Err(LedgerError::CorruptJournal { line, source }),
        }
    }

    Ok(Replay { commits, valid_len })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{StateKey, StateWrite};
    use chrono::Utc;
    use uuid::Uuid;

    fn commit(height: u64) -> Commit {
        Commit {
            height,
            tx_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            writes: vec![StateWrite {
                key: StateKey::new("cc", "k"),
                value: Some(height.to_string().into_bytes()),
            }],
        }
    }

    fn encode(commits: &[Commit]) -> Vec<u8> {
        let mut out = Vec::new();
        for commit in commits {
            out.extend(serde_json::to_vec(commit).expect("encode"));
            out.push(b'\n');
        }
        out
    }

    #[test]
    fn failed_append_leaves_journal_reopenable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut journal, _) = Journal::open(dir.path()).expect("open");
        journal.append(&commit(1)).expect("append");

        let orphan = encode(&[commit(2)]);
        let err = journal
            .append_with(&orphan, |file, line| {
                file.write_all(&line[..line.len() / 2])?;
                Err(io::Error::other("disk full"))
            })
            .expect_err("injected failure");
        assert!(matches!(
            err,
            LedgerError::Io {
                operation: "journal.append",
                ..
            }
        ));
        let err = journal
            .append_with(&orphan, |file, line| {
                file.write_all(line)?;
                Err(io::Error::other("sync failed"))
            })
            .expect_err("injected failure");
        assert!(matches!(err, LedgerError::Io { .. }));

        journal.append(&commit(2)).expect("retry");
        drop(journal);

        let (_, commits) = Journal::open(dir.path()).expect("reopen");
        let heights: Vec<u64> = commits.iter().map(|commit| commit.height).collect();
        assert_eq!(heights, vec![1, 2]);
    }

    #[test]
    fn poisoned_journal_rejects_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut journal, _) = Journal::open(dir.path()).expect("open");
        journal.poisoned = true;
        assert!(matches!(
            journal.append(&commit(1)),
            Err(LedgerError::JournalPoisoned { .. })
        ));
    }

    #[test]
    fn replay_reads_contiguous_commits() {
        let bytes = encode(&[commit(1), commit(2)]);
        let replay = replay(&bytes).expect("replay");
        assert_eq!(replay.commits.len(), 2);
        assert_eq!(replay.valid_len, bytes.len());
    }

    #[test]
    fn torn_tail_is_dropped() {
        let mut bytes = encode(&[commit(1)]);
        let good = bytes.len();
        bytes.extend_from_slice(b"{\"height\":2,\"tx_");
        let replay = replay(&bytes).expect("replay");
        assert_eq!(replay.commits.len(), 1);
        assert_eq!(replay.valid_len, good);
    }

    #[test]
    fn corrupt_middle_line_is_fatal() {
        let mut bytes = b"not json\n".to_vec();
        bytes.extend(encode(&[commit(1)]));
        assert!(matches!(
            replay(&bytes),
            Err(LedgerError::CorruptJournal { line: 1, .. })
        ));
    }

    #[test]
    fn height_gap_is_fatal() {
        let bytes = encode(&[commit(1), commit(3)]);
        assert!(matches!(
            replay(&bytes),
            Err(LedgerError::OutOfOrder {
                line: 2,
                expected: 2,
                found: 3
            })
        ));
    }
}
