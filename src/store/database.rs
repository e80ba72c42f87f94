// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The in-memory multi-collection database.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::arena::Arena;
use crate::bitmap;

use super::error::StoreError;
use super::options::{ReadOptions, ScanOptions, WriteOptions};
use super::sequence::{overwritten_since, Sequence};
use super::transaction::Transaction;
use super::types::{
    ColSpec, CollectionId, Key, Located, MeasureOutput, ReadOutput, ScanOutput, ScanTask,
    SequencedValue, KEY_UNKNOWN, LEN_MISSING, MAX_VALUE_SIZE,
};

pub(super) struct Collection {
    pub(super) pairs: BTreeMap<Key, SequencedValue>,
}

impl Collection {
    fn new() -> Self {
        Self {
            pairs: BTreeMap::new(),
        }
    }
}

pub(super) struct DbInner {
    pub(super) collections: HashMap<u64, Collection>,
    pub(super) names: HashMap<String, CollectionId>,
    next_collection: u64,
}

impl DbInner {
    pub(super) fn collection(&self, id: CollectionId) -> Result<&Collection, StoreError> {
        self.collections
            .get(&id.0)
            .ok_or(StoreError::UnknownCollection(id))
    }

    pub(super) fn collection_mut(
        &mut self,
        id: CollectionId,
    ) -> Result<&mut Collection, StoreError> {
        self.collections
            .get_mut(&id.0)
            .ok_or(StoreError::UnknownCollection(id))
    }

    /// Sequence of the live entry at `loc`, if any. A removed collection
    /// reads as absent.
    pub(super) fn entry_seq(&self, loc: Located) -> Option<Sequence> {
        self.collections
            .get(&loc.collection.0)
            .and_then(|c| c.pairs.get(&loc.key))
            .map(|e| e.sequence)
    }
}

/// A transactional, multi-collection, in-memory key-value database.
///
/// One readers-writer lock covers the whole database; a monotonic
/// [`Sequence`] counter versions every write. The anonymous main
/// collection ([`CollectionId::MAIN`]) always exists.
pub struct Database {
    pub(super) inner: RwLock<DbInner>,
    pub(super) youngest_seq: AtomicU64,
}

impl Database {
    /// Opens a fresh, empty database.
    pub fn open() -> Self {
        let mut collections = HashMap::new();
        collections.insert(CollectionId::MAIN.0, Collection::new());
        Self {
            inner: RwLock::new(DbInner {
                collections,
                names: HashMap::new(),
                next_collection: CollectionId::MAIN.0,
            }),
            youngest_seq: AtomicU64::new(0),
        }
    }

    /// The sequence of the most recent successful write.
    #[inline]
    pub fn youngest_sequence(&self) -> Sequence {
        self.youngest_seq.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Collection management
    // ------------------------------------------------------------------

    /// Returns the handle for `name`, creating the collection if needed.
    pub fn collection_upsert(&self, name: &str) -> CollectionId {
        let mut inner = self.inner.write();
        if let Some(&id) = inner.names.get(name) {
            return id;
        }
        inner.next_collection += 1;
        let id = CollectionId(inner.next_collection);
        inner.names.insert(name.to_string(), id);
        inner.collections.insert(id.0, Collection::new());
        debug!(collection = %name, handle = id.raw(), "collection created");
        id
    }

    /// Removes a named collection and all its entries.
    ///
    /// Returns false if no collection with that name exists.
    pub fn collection_remove(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        match inner.names.remove(name) {
            Some(id) => {
                inner.collections.remove(&id.0);
                debug!(collection = %name, handle = id.raw(), "collection removed");
                true
            }
            None => false,
        }
    }

    /// Returns the handle for `name` without creating it.
    pub fn collection_handle(&self, name: &str) -> Option<CollectionId> {
        self.inner.read().names.get(name).copied()
    }

    /// Returns true if a collection with that name exists.
    pub fn contains_collection(&self, name: &str) -> bool {
        self.inner.read().names.contains_key(name)
    }

    /// Names of all named collections, sorted.
    pub fn collection_list(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut names: Vec<String> = inner.names.keys().cloned().collect();
        names.sort();
        names
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Batch read on HEAD, or inside `txn` when given.
    ///
    /// Matched values are copied contiguously into the arena tape; absent
    /// rows get a cleared presence bit and [`LEN_MISSING`] length.
    pub fn read<'a>(
        &self,
        txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        keys: &[Key],
        opts: ReadOptions,
        arena: &'a Arena,
    ) -> Result<ReadOutput<'a>, StoreError> {
        cols.check_rows(keys.len())?;
        match txn {
            None => self.read_head(cols, keys, arena),
            Some(txn) => self.read_txn(txn, cols, keys, opts, arena),
        }
    }

    /// Metadata-only batch read: presence and lengths, no value tape.
    pub fn measure<'a>(
        &self,
        txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        keys: &[Key],
        opts: ReadOptions,
        arena: &'a Arena,
    ) -> Result<MeasureOutput<'a>, StoreError> {
        cols.check_rows(keys.len())?;
        match txn {
            None => self.measure_head(cols, keys, arena),
            Some(txn) => self.measure_txn(txn, cols, keys, opts, arena),
        }
    }

    fn read_head<'a>(
        &self,
        cols: ColSpec<'_>,
        keys: &[Key],
        arena: &'a Arena,
    ) -> Result<ReadOutput<'a>, StoreError> {
        let inner = self.inner.read();
        let n = keys.len();

        let mut total = 0usize;
        for i in 0..n {
            let col = inner.collection(cols.get(i))?;
            if let Some(e) = col.pairs.get(&keys[i]) {
                total += e.data.len();
            }
        }
        check_tape_size(total)?;

        let presence = arena.alloc(bitmap::bytes_for(n), 1)?;
        let offsets = arena.alloc_u32(n + 1)?;
        let lengths = arena.alloc_u32(n)?;
        let tape = arena.alloc(total, 1)?;

        let mut volume = 0usize;
        for i in 0..n {
            let col = inner.collection(cols.get(i))?;
            offsets[i] = volume as u32;
            match col.pairs.get(&keys[i]) {
                Some(e) => {
                    bitmap::set(presence, i);
                    lengths[i] = e.data.len() as u32;
                    tape[volume..volume + e.data.len()].copy_from_slice(&e.data);
                    volume += e.data.len();
                }
                None => lengths[i] = LEN_MISSING,
            }
        }
        offsets[n] = volume as u32;

        Ok(ReadOutput {
            presence,
            offsets,
            lengths,
            tape,
        })
    }

    fn read_txn<'a>(
        &self,
        txn: &mut Transaction,
        cols: ColSpec<'_>,
        keys: &[Key],
        opts: ReadOptions,
        arena: &'a Arena,
    ) -> Result<ReadOutput<'a>, StoreError> {
        txn.check_active()?;
        let inner = self.inner.read();
        let youngest = self.youngest_seq.load(Ordering::Acquire);
        let n = keys.len();

        // Size the tape, failing fast on observable post-start overwrites.
        let mut total = 0usize;
        for i in 0..n {
            let loc = Located::new(cols.get(i), keys[i]);
            if let Some(buffered) = txn.write_set.get(&loc) {
                total += buffered.as_ref().map_or(0, |v| v.len());
                continue;
            }
            let col = inner.collection(loc.collection)?;
            if let Some(e) = col.pairs.get(&loc.key) {
                if overwritten_since(e.sequence, txn.start_seq, youngest) {
                    return Err(StoreError::TransactionConflict {
                        collection: loc.collection,
                        key: loc.key,
                    });
                }
                total += e.data.len();
            }
        }
        check_tape_size(total)?;

        let presence = arena.alloc(bitmap::bytes_for(n), 1)?;
        let offsets = arena.alloc_u32(n + 1)?;
        let lengths = arena.alloc_u32(n)?;
        let tape = arena.alloc(total, 1)?;

        let mut volume = 0usize;
        for i in 0..n {
            let loc = Located::new(cols.get(i), keys[i]);
            offsets[i] = volume as u32;

            // Buffered writes win over HEAD (read-your-writes).
            if let Some(buffered) = txn.write_set.get(&loc) {
                match buffered {
                    Some(v) => {
                        bitmap::set(presence, i);
                        lengths[i] = v.len() as u32;
                        tape[volume..volume + v.len()].copy_from_slice(v);
                        volume += v.len();
                    }
                    None => lengths[i] = LEN_MISSING,
                }
                continue;
            }

            let col = inner.collection(loc.collection)?;
            match col.pairs.get(&loc.key) {
                Some(e) => {
                    bitmap::set(presence, i);
                    lengths[i] = e.data.len() as u32;
                    tape[volume..volume + e.data.len()].copy_from_slice(&e.data);
                    volume += e.data.len();
                    if opts.track_reads {
                        txn.read_set.insert(loc, e.sequence);
                    }
                }
                None => {
                    lengths[i] = LEN_MISSING;
                    if opts.track_reads {
                        txn.read_set.insert(loc, super::sequence::SEQ_MISSING);
                    }
                }
            }
        }
        offsets[n] = volume as u32;

        Ok(ReadOutput {
            presence,
            offsets,
            lengths,
            tape,
        })
    }

    fn measure_head<'a>(
        &self,
        cols: ColSpec<'_>,
        keys: &[Key],
        arena: &'a Arena,
    ) -> Result<MeasureOutput<'a>, StoreError> {
        let inner = self.inner.read();
        let n = keys.len();
        let presence = arena.alloc(bitmap::bytes_for(n), 1)?;
        let lengths = arena.alloc_u32(n)?;

        for i in 0..n {
            let col = inner.collection(cols.get(i))?;
            match col.pairs.get(&keys[i]) {
                Some(e) => {
                    bitmap::set(presence, i);
                    lengths[i] = e.data.len() as u32;
                }
                None => lengths[i] = LEN_MISSING,
            }
        }
        Ok(MeasureOutput { presence, lengths })
    }

    fn measure_txn<'a>(
        &self,
        txn: &mut Transaction,
        cols: ColSpec<'_>,
        keys: &[Key],
        opts: ReadOptions,
        arena: &'a Arena,
    ) -> Result<MeasureOutput<'a>, StoreError> {
        txn.check_active()?;
        let inner = self.inner.read();
        let youngest = self.youngest_seq.load(Ordering::Acquire);
        let n = keys.len();
        let presence = arena.alloc(bitmap::bytes_for(n), 1)?;
        let lengths = arena.alloc_u32(n)?;

        for i in 0..n {
            let loc = Located::new(cols.get(i), keys[i]);
            if let Some(buffered) = txn.write_set.get(&loc) {
                match buffered {
                    Some(v) => {
                        bitmap::set(presence, i);
                        lengths[i] = v.len() as u32;
                    }
                    None => lengths[i] = LEN_MISSING,
                }
                continue;
            }
            let col = inner.collection(loc.collection)?;
            match col.pairs.get(&loc.key) {
                Some(e) => {
                    if overwritten_since(e.sequence, txn.start_seq, youngest) {
                        return Err(StoreError::TransactionConflict {
                            collection: loc.collection,
                            key: loc.key,
                        });
                    }
                    bitmap::set(presence, i);
                    lengths[i] = e.data.len() as u32;
                    if opts.track_reads {
                        txn.read_set.insert(loc, e.sequence);
                    }
                }
                None => {
                    lengths[i] = LEN_MISSING;
                    if opts.track_reads {
                        txn.read_set.insert(loc, super::sequence::SEQ_MISSING);
                    }
                }
            }
        }
        Ok(MeasureOutput { presence, lengths })
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Batch upsert on HEAD, or buffered into `txn` when given.
    ///
    /// `None` rows delete the key; `Some(&[])` stores an empty value.
    /// The batch is validated up front and applies atomically: a per-row
    /// failure leaves the store (and the transaction buffer) unchanged.
    pub fn write(
        &self,
        txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        keys: &[Key],
        values: &[Option<&[u8]>],
        opts: WriteOptions,
    ) -> Result<(), StoreError> {
        cols.check_rows(keys.len())?;
        if values.len() != keys.len() {
            return Err(StoreError::InvalidArgument {
                reason: format!("{} values for {} keys", values.len(), keys.len()),
            });
        }
        for (row, value) in values.iter().enumerate() {
            if let Some(v) = value {
                if v.len() > MAX_VALUE_SIZE {
                    return Err(StoreError::ValueTooLarge {
                        row,
                        size: v.len(),
                        max: MAX_VALUE_SIZE,
                    });
                }
            }
        }
        match txn {
            None => self.write_head(cols, keys, values, opts),
            Some(txn) => self.write_txn(txn, cols, keys, values),
        }
    }

    fn write_head(
        &self,
        cols: ColSpec<'_>,
        keys: &[Key],
        values: &[Option<&[u8]>],
        _opts: WriteOptions,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();

        // Resolve every collection before touching anything.
        for i in 0..keys.len() {
            inner.collection(cols.get(i))?;
        }

        for i in 0..keys.len() {
            let sequence = self.youngest_seq.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            let col = inner.collection_mut(cols.get(i)).expect("resolved above");
            match values[i] {
                Some(v) => {
                    col.pairs.insert(
                        keys[i],
                        SequencedValue {
                            data: v.to_vec(),
                            sequence,
                        },
                    );
                }
                None => {
                    col.pairs.remove(&keys[i]);
                }
            }
        }
        Ok(())
    }

    fn write_txn(
        &self,
        txn: &mut Transaction,
        cols: ColSpec<'_>,
        keys: &[Key],
        values: &[Option<&[u8]>],
    ) -> Result<(), StoreError> {
        txn.check_active()?;
        let inner = self.inner.read();

        // Validate the whole batch before buffering any of it: collections
        // must exist, and no key may be written twice in one transaction.
        let mut batch_locs = std::collections::HashSet::with_capacity(keys.len());
        for i in 0..keys.len() {
            let loc = Located::new(cols.get(i), keys[i]);
            inner.collection(loc.collection)?;
            if txn.write_set.contains_key(&loc) || !batch_locs.insert(loc) {
                return Err(StoreError::InvalidRow {
                    row: i,
                    reason: format!("key {} written twice in one transaction", loc.key),
                });
            }
        }

        for i in 0..keys.len() {
            let loc = Located::new(cols.get(i), keys[i]);
            txn.write_set.insert(loc, values[i].map(|v| v.to_vec()));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scans
    // ------------------------------------------------------------------

    /// Ordered forward key scan, one task per collection range.
    ///
    /// Inside a transaction the scan overlays the write buffer: buffered
    /// inserts appear, buffered deletes are skipped. Scanned keys are not
    /// added to the read set.
    pub fn scan<'a>(
        &self,
        txn: Option<&Transaction>,
        tasks: &[ScanTask],
        _opts: ScanOptions,
        arena: &'a Arena,
    ) -> Result<ScanOutput<'a>, StoreError> {
        let inner = self.inner.read();

        let mut found: Vec<Key> = Vec::new();
        let counts = arena.alloc_u32(tasks.len())?;
        let offsets = arena.alloc_u32(tasks.len() + 1)?;

        for (t, task) in tasks.iter().enumerate() {
            offsets[t] = found.len() as u32;
            let col = inner.collection(task.collection)?;
            let before = found.len();
            scan_collection(col, txn, task, &mut found);
            counts[t] = (found.len() - before) as u32;
        }
        offsets[tasks.len()] = found.len() as u32;

        let keys = arena.alloc_i64(found.len())?;
        keys.copy_from_slice(&found);

        Ok(ScanOutput {
            counts,
            offsets,
            keys,
        })
    }
}

/// Appends up to `task.max_count` ascending keys from `col` to `out`.
fn scan_collection(
    col: &Collection,
    txn: Option<&Transaction>,
    task: &ScanTask,
    out: &mut Vec<Key>,
) {
    let max = task.max_count as usize;
    let head = if task.min_key == KEY_UNKNOWN {
        col.pairs.range(..)
    } else {
        col.pairs.range(task.min_key..)
    };

    match txn {
        None => {
            out.extend(head.take(max).map(|(&k, _)| k));
        }
        Some(txn) => {
            // Buffered inserts of keys absent from HEAD, sorted.
            let mut added: Vec<Key> = txn
                .write_set
                .iter()
                .filter(|(loc, v)| {
                    loc.collection == task.collection
                        && v.is_some()
                        && (task.min_key == KEY_UNKNOWN || loc.key >= task.min_key)
                        && !col.pairs.contains_key(&loc.key)
                })
                .map(|(loc, _)| loc.key)
                .collect();
            added.sort_unstable();

            let mut head = head
                .map(|(&k, _)| k)
                .filter(|k| {
                    !matches!(
                        txn.write_set.get(&Located::new(task.collection, *k)),
                        Some(None)
                    )
                })
                .peekable();

            let mut taken = 0usize;
            let mut ai = 0usize;
            while taken < max {
                match (head.peek().copied(), added.get(ai).copied()) {
                    (None, None) => break,
                    (Some(h), Some(a)) if a < h => {
                        out.push(a);
                        ai += 1;
                    }
                    (Some(h), _) => {
                        head.next();
                        out.push(h);
                    }
                    (None, Some(a)) => {
                        out.push(a);
                        ai += 1;
                    }
                }
                taken += 1;
            }
        }
    }
}

fn check_tape_size(total: usize) -> Result<(), StoreError> {
    if total > u32::MAX as usize {
        return Err(StoreError::InvalidArgument {
            reason: format!("batch tape of {total} bytes exceeds u32 offsets"),
        });
    }
    Ok(())
}
