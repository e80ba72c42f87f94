// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transaction handles and the optimistic commit path.

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use crate::Located;

use tracing::{debug, warn};

use super::database::Database;
use super::error::StoreError;
use super::options::WriteOptions;
use super::sequence::{overwritten_since, Sequence, SEQ_MISSING};
use super::types::SequencedValue;

/// Transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// A snapshot-reading, write-buffering transaction handle.
///
/// Reads observe the database as of `start_seq`; writes are buffered until
/// commit, which validates the read set and applies the write set
/// atomically. The handle is not thread-safe: one thread drives one
/// transaction.
#[derive(Debug)]
pub struct Transaction {
    /// Snapshot sequence taken at begin.
    pub(super) start_seq: Sequence,
    /// Sequence assigned at commit.
    pub(super) commit_seq: Option<Sequence>,
    pub(super) state: TxnState,
    /// Sequence observed per tracked read; [`SEQ_MISSING`] for absence.
    pub(super) read_set: HashMap<Located, Sequence>,
    /// Buffered writes; `None` deletes the key at commit.
    pub(super) write_set: HashMap<Located, Option<Vec<u8>>>,
}

impl Transaction {
    pub(super) fn new(start_seq: Sequence) -> Self {
        Self {
            start_seq,
            commit_seq: None,
            state: TxnState::Active,
            read_set: HashMap::new(),
            write_set: HashMap::new(),
        }
    }

    /// Returns the snapshot sequence.
    #[inline]
    pub fn start_seq(&self) -> Sequence {
        self.start_seq
    }

    /// Returns the commit sequence (if committed).
    #[inline]
    pub fn commit_seq(&self) -> Option<Sequence> {
        self.commit_seq
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Returns true if the transaction is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == TxnState::Active
    }

    /// Returns the number of buffered writes.
    #[inline]
    pub fn write_count(&self) -> usize {
        self.write_set.len()
    }

    /// Returns the number of tracked reads.
    #[inline]
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    pub(super) fn check_active(&self) -> Result<(), StoreError> {
        match self.state {
            TxnState::Active => Ok(()),
            TxnState::Committed => Err(StoreError::AlreadyCommitted),
            TxnState::Aborted => Err(StoreError::AlreadyAborted),
        }
    }
}

impl Database {
    /// Begins a transaction.
    ///
    /// Without a hint the snapshot is the current youngest sequence; a hint
    /// pins an explicit snapshot (useful for replaying or wrap testing).
    pub fn txn_begin(&self, seq_hint: Option<Sequence>) -> Transaction {
        let start_seq = seq_hint.unwrap_or_else(|| self.youngest_seq.load(Ordering::Acquire));
        Transaction::new(start_seq)
    }

    /// Commits the transaction: validates the read and write sets under
    /// the exclusive database lock, then applies all buffered writes with
    /// one fresh sequence.
    ///
    /// On [`StoreError::TransactionConflict`] the store and the handle are
    /// both left untouched; the caller restarts with a new `txn_begin`.
    pub fn txn_commit(
        &self,
        txn: &mut Transaction,
        _opts: WriteOptions,
    ) -> Result<Sequence, StoreError> {
        txn.check_active()?;
        let mut inner = self.inner.write();
        let youngest = self.youngest_seq.load(Ordering::Relaxed);

        // 1. Read validation: everything observed must be unchanged.
        for (loc, seq_at_read) in &txn.read_set {
            let ok = match inner.entry_seq(*loc) {
                Some(seq) => seq == *seq_at_read,
                None => *seq_at_read == SEQ_MISSING,
            };
            if !ok {
                warn!(
                    collection = loc.collection.raw(),
                    key = loc.key,
                    "commit aborted: tracked read was overwritten"
                );
                return Err(StoreError::TransactionConflict {
                    collection: loc.collection,
                    key: loc.key,
                });
            }
        }

        // 2. Write-write conflicts in (start, youngest].
        for loc in txn.write_set.keys() {
            inner.collection(loc.collection)?;
            if let Some(seq) = inner.entry_seq(*loc) {
                if overwritten_since(seq, txn.start_seq, youngest) {
                    warn!(
                        collection = loc.collection.raw(),
                        key = loc.key,
                        "commit aborted: write target was overwritten"
                    );
                    return Err(StoreError::TransactionConflict {
                        collection: loc.collection,
                        key: loc.key,
                    });
                }
            }
        }

        // 3. Apply with a single fresh sequence.
        let commit_seq = self
            .youngest_seq
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);
        let writes = txn.write_set.len();
        for (loc, value) in txn.write_set.drain() {
            let col = inner
                .collection_mut(loc.collection)
                .expect("validated above");
            match value {
                Some(data) => {
                    col.pairs.insert(
                        loc.key,
                        SequencedValue {
                            data,
                            sequence: commit_seq,
                        },
                    );
                }
                None => {
                    col.pairs.remove(&loc.key);
                }
            }
        }

        txn.read_set.clear();
        txn.state = TxnState::Committed;
        txn.commit_seq = Some(commit_seq);
        debug!(commit_seq, writes, "transaction committed");
        Ok(commit_seq)
    }

    /// Aborts the transaction, discarding all buffered state.
    pub fn txn_abort(&self, txn: &mut Transaction) -> Result<(), StoreError> {
        txn.check_active()?;
        txn.read_set.clear();
        txn.write_set.clear();
        txn.state = TxnState::Aborted;
        Ok(())
    }
}
