// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Path operations: write, read, prefix match, directory mirrors.

use std::collections::BTreeSet;

use tracing::debug;

use crate::arena::Arena;
use crate::bitmap;
use crate::store::{
    ColSpec, CollectionId, Database, Key, Located, ReadOptions, ReadOutput, ScanOptions, ScanTask,
    StoreError, Transaction, WriteOptions, LEN_MISSING,
};

use super::bucket::{self, BucketView, RemoveOutcome};
use super::hash::{PathHasher, Xxh3PathHasher};

/// Bucket keys fetched per scan round while matching prefixes.
const SCAN_BATCH: u32 = 256;

/// One prefix-match request with optional continuation.
#[derive(Debug, Clone, Copy)]
pub struct MatchTask<'a> {
    pub collection: CollectionId,
    pub prefix: &'a str,
    /// Last name returned by the previous call; matching resumes strictly
    /// after it. `None` starts from the beginning of the collection.
    pub previous: Option<&'a str>,
    pub max_count: u32,
}

/// Matched names, concatenated into a tape and partitioned per task.
#[derive(Debug)]
pub struct MatchOutput<'a> {
    /// Names emitted per task.
    pub counts: &'a [u32],
    /// Byte offsets into `tape`, one per name plus a trailing total.
    pub offsets: &'a [u32],
    /// Concatenated name bytes.
    pub tape: &'a [u8],
}

impl MatchOutput<'_> {
    /// Total names across all tasks.
    #[inline]
    pub fn total(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Returns name `j` counted across the whole batch.
    pub fn name(&self, j: usize) -> &[u8] {
        &self.tape[self.offsets[j] as usize..self.offsets[j + 1] as usize]
    }

    /// Iterates the names emitted for task `i`.
    pub fn task_names(&self, i: usize) -> impl Iterator<Item = &[u8]> + '_ {
        let base: u32 = self.counts[..i].iter().sum();
        (base as usize..(base + self.counts[i]) as usize).map(|j| self.name(j))
    }
}

/// The paths modality: string keys over the binary store.
///
/// Generic over the [`PathHasher`] so tests can force collisions; the
/// default reduces paths with XXH3. An optional separator enables
/// hierarchical directory mirror maintenance on writes.
pub struct Paths<H: PathHasher = Xxh3PathHasher> {
    hasher: H,
    separator: Option<u8>,
}

impl Paths<Xxh3PathHasher> {
    /// Paths over the default stable hash, without directory mirrors.
    pub fn new() -> Self {
        Self {
            hasher: Xxh3PathHasher,
            separator: None,
        }
    }
}

impl Default for Paths<Xxh3PathHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: PathHasher> Paths<H> {
    /// Paths over a caller-supplied hasher.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            hasher,
            separator: None,
        }
    }

    /// Enables directory mirror maintenance for hierarchical paths.
    ///
    /// For every inserted path, each ancestor prefix ending in `separator`
    /// gets a mirror entry linking it to its immediate child. Mirrors are
    /// maintained on insert only; removing a path does not prune them.
    pub fn with_directory_mirrors(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    #[inline]
    fn bucket_key(&self, path: &str) -> Key {
        self.hasher.bucket_key(path.as_bytes())
    }

    /// Mirror slot for a directory prefix; always negative, disjoint from
    /// the non-negative user bucket keys.
    #[inline]
    fn mirror_key(&self, dir: &str) -> Key {
        !self.hasher.bucket_key(dir.as_bytes())
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    /// Batch path upsert/remove.
    ///
    /// `None` rows remove the path; `Some` rows insert or overwrite it.
    /// Buckets are read once, edited in memory, and written back in one
    /// batched store write; a bucket left with no members is deleted.
    pub fn write(
        &self,
        db: &Database,
        mut txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        paths: &[&str],
        values: &[Option<&[u8]>],
        opts: WriteOptions,
    ) -> Result<(), StoreError> {
        cols.check_rows(paths.len())?;
        if values.len() != paths.len() {
            return Err(StoreError::InvalidArgument {
                reason: format!("{} values for {} paths", values.len(), paths.len()),
            });
        }

        // Unique bucket targets, sorted for binary search.
        let mut unique: Vec<Located> = (0..paths.len())
            .map(|i| Located::new(cols.get(i), self.bucket_key(paths[i])))
            .collect();
        unique.sort_unstable();
        unique.dedup();

        let scratch = Arena::new();
        let ucols: Vec<CollectionId> = unique.iter().map(|l| l.collection).collect();
        let ukeys: Vec<Key> = unique.iter().map(|l| l.key).collect();
        let current = db.read(
            txn.as_deref_mut(),
            ColSpec::PerRow(&ucols),
            &ukeys,
            ReadOptions::default(),
            &scratch,
        )?;

        let mut staged: Vec<Option<Vec<u8>>> = (0..unique.len())
            .map(|i| current.value(i).map(|v| v.to_vec()))
            .collect();
        let mut dirty = vec![false; unique.len()];

        enum Edit {
            Keep,
            Put(Vec<u8>),
            Del,
        }

        for i in 0..paths.len() {
            let loc = Located::new(cols.get(i), self.bucket_key(paths[i]));
            let slot = unique.binary_search(&loc).expect("bucket was staged");
            let edit = {
                let image = staged[slot].as_deref().unwrap_or(&[]);
                match values[i] {
                    Some(v) => Edit::Put(bucket::upsert(image, paths[i].as_bytes(), v)?),
                    None => match bucket::remove(image, paths[i].as_bytes())? {
                        RemoveOutcome::NotFound => Edit::Keep,
                        RemoveOutcome::Emptied => Edit::Del,
                        RemoveOutcome::Updated(b) => Edit::Put(b),
                    },
                }
            };
            match edit {
                Edit::Keep => {}
                Edit::Put(b) => {
                    staged[slot] = Some(b);
                    dirty[slot] = true;
                }
                Edit::Del => {
                    staged[slot] = None;
                    dirty[slot] = true;
                }
            }
        }

        // Second pass: directory mirror entries for inserted paths.
        let (mirror_locs, mirror_staged) = match self.separator {
            Some(sep) => self.stage_mirrors(db, txn.as_deref_mut(), cols, paths, values, sep)?,
            None => (Vec::new(), Vec::new()),
        };

        let mut wcols: Vec<CollectionId> = Vec::new();
        let mut wkeys: Vec<Key> = Vec::new();
        let mut wvals: Vec<Option<&[u8]>> = Vec::new();
        for (slot, loc) in unique.iter().enumerate() {
            if !dirty[slot] {
                continue;
            }
            wcols.push(loc.collection);
            wkeys.push(loc.key);
            wvals.push(staged[slot].as_deref());
        }
        for (loc, image) in mirror_locs.iter().zip(&mirror_staged) {
            wcols.push(loc.collection);
            wkeys.push(loc.key);
            wvals.push(Some(image.as_slice()));
        }

        if wkeys.is_empty() {
            return Ok(());
        }
        debug!(
            tasks = paths.len(),
            buckets = wkeys.len(),
            "writing path buckets"
        );
        db.write(txn, ColSpec::PerRow(&wcols), &wkeys, &wvals, opts)
    }

    /// Stages mirror buckets: for each inserted path and each ancestor
    /// prefix, the prefix's mirror gains the immediate child as a member.
    /// Idempotent and order-independent across the batch.
    fn stage_mirrors(
        &self,
        db: &Database,
        mut txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        paths: &[&str],
        values: &[Option<&[u8]>],
        sep: u8,
    ) -> Result<(Vec<Located>, Vec<Vec<u8>>), StoreError> {
        let mut links: BTreeSet<(CollectionId, &str, &str)> = BTreeSet::new();
        for i in 0..paths.len() {
            if values[i].is_none() {
                continue;
            }
            let path = paths[i];
            let bytes = path.as_bytes();
            for pos in 0..bytes.len() {
                if bytes[pos] != sep {
                    continue;
                }
                let dir = &path[..=pos];
                let child_end = bytes[pos + 1..]
                    .iter()
                    .position(|&b| b == sep)
                    .map_or(path.len(), |off| pos + 1 + off);
                let child = &path[..child_end];
                if child.len() > dir.len() {
                    links.insert((cols.get(i), dir, child));
                }
            }
        }
        if links.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut locs: Vec<Located> = links
            .iter()
            .map(|(c, dir, _)| Located::new(*c, self.mirror_key(dir)))
            .collect();
        locs.sort_unstable();
        locs.dedup();

        let scratch = Arena::new();
        let mcols: Vec<CollectionId> = locs.iter().map(|l| l.collection).collect();
        let mkeys: Vec<Key> = locs.iter().map(|l| l.key).collect();
        let current = db.read(
            txn.as_deref_mut(),
            ColSpec::PerRow(&mcols),
            &mkeys,
            ReadOptions::default(),
            &scratch,
        )?;

        let mut staged: Vec<Option<Vec<u8>>> = (0..locs.len())
            .map(|i| current.value(i).map(|v| v.to_vec()))
            .collect();
        let mut dirty = vec![false; locs.len()];

        for (collection, dir, child) in links {
            let loc = Located::new(collection, self.mirror_key(dir));
            let slot = locs.binary_search(&loc).expect("mirror was staged");
            let already = {
                let image = staged[slot].as_deref().unwrap_or(&[]);
                BucketView::parse(image)?.find(child.as_bytes()).is_some()
            };
            if already {
                continue;
            }
            let image = staged[slot].as_deref().unwrap_or(&[]);
            let updated = bucket::upsert(image, child.as_bytes(), &[])?;
            staged[slot] = Some(updated);
            dirty[slot] = true;
        }

        let mut out_locs = Vec::new();
        let mut out_images = Vec::new();
        for (slot, loc) in locs.iter().enumerate() {
            if dirty[slot] {
                out_locs.push(*loc);
                out_images.push(staged[slot].take().expect("dirty mirror has an image"));
            }
        }
        Ok((out_locs, out_images))
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Batch path read; values are packed into the arena tape with
    /// per-row presence, offsets and lengths.
    ///
    /// Repeated hits of one bucket are read repeatedly rather than
    /// deduplicated; collisions are rare enough that sorting would cost
    /// more than the occasional extra fetch.
    pub fn read<'a>(
        &self,
        db: &Database,
        txn: Option<&mut Transaction>,
        cols: ColSpec<'_>,
        paths: &[&str],
        opts: ReadOptions,
        arena: &'a Arena,
    ) -> Result<ReadOutput<'a>, StoreError> {
        cols.check_rows(paths.len())?;
        let n = paths.len();
        let keys: Vec<Key> = paths.iter().map(|p| self.bucket_key(p)).collect();
        let buckets = db.read(txn, cols, &keys, opts, arena)?;

        let mut matches: Vec<Option<&[u8]>> = Vec::with_capacity(n);
        let mut total = 0usize;
        for i in 0..n {
            let found = match buckets.value(i) {
                Some(image) => BucketView::parse(image)?
                    .find(paths[i].as_bytes())
                    .map(|m| m.value),
                None => None,
            };
            total += found.map_or(0, <[u8]>::len);
            matches.push(found);
        }
        if total > u32::MAX as usize {
            return Err(StoreError::InvalidArgument {
                reason: format!("batch tape of {total} bytes exceeds u32 offsets"),
            });
        }

        let presence = arena.alloc(bitmap::bytes_for(n), 1)?;
        let offsets = arena.alloc_u32(n + 1)?;
        let lengths = arena.alloc_u32(n)?;
        let tape = arena.alloc(total, 1)?;

        let mut volume = 0usize;
        for (i, found) in matches.iter().enumerate() {
            offsets[i] = volume as u32;
            match found {
                Some(v) => {
                    bitmap::set(presence, i);
                    lengths[i] = v.len() as u32;
                    tape[volume..volume + v.len()].copy_from_slice(v);
                    volume += v.len();
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

    // ------------------------------------------------------------------
    // Match
    // ------------------------------------------------------------------

    /// Prefix scan with continuation, one result partition per task.
    pub fn match_prefixes<'a>(
        &self,
        db: &Database,
        mut txn: Option<&mut Transaction>,
        tasks: &[MatchTask<'_>],
        arena: &'a Arena,
    ) -> Result<MatchOutput<'a>, StoreError> {
        let mut counts_v: Vec<u32> = Vec::with_capacity(tasks.len());
        let mut offsets_v: Vec<u32> = Vec::new();
        let mut tape_v: Vec<u8> = Vec::new();

        for task in tasks {
            let emitted = self.match_one(db, &mut txn, task, &mut offsets_v, &mut tape_v)?;
            counts_v.push(emitted);
        }
        offsets_v.push(tape_v.len() as u32);

        let counts = arena.alloc_u32(counts_v.len())?;
        counts.copy_from_slice(&counts_v);
        let offsets = arena.alloc_u32(offsets_v.len())?;
        offsets.copy_from_slice(&offsets_v);
        let tape = arena.alloc(tape_v.len(), 1)?;
        tape.copy_from_slice(&tape_v);

        Ok(MatchOutput {
            counts,
            offsets,
            tape,
        })
    }

    fn match_one(
        &self,
        db: &Database,
        txn: &mut Option<&mut Transaction>,
        task: &MatchTask<'_>,
        offsets_v: &mut Vec<u32>,
        tape_v: &mut Vec<u8>,
    ) -> Result<u32, StoreError> {
        let mut emitted = 0u32;
        // User buckets are non-negative, so starting at 0 skips every
        // directory mirror slot.
        let start_key = task.previous.map_or(0, |p| self.bucket_key(p));
        let mut reached = task.previous.is_none();
        let mut min_key = start_key;
        let scratch = Arena::new();

        'collection: loop {
            let scan = db.scan(
                txn.as_deref(),
                &[ScanTask {
                    collection: task.collection,
                    min_key,
                    max_count: SCAN_BATCH,
                }],
                ScanOptions {
                    dont_discard_memory: true,
                },
                &scratch,
            )?;
            let keys = scan.task_keys(0);
            if keys.is_empty() {
                break;
            }

            let buckets = db.read(
                txn.as_deref_mut(),
                ColSpec::Single(task.collection),
                keys,
                ReadOptions::default(),
                &scratch,
            )?;

            for (bi, &bkey) in keys.iter().enumerate() {
                let Some(image) = buckets.value(bi) else {
                    continue;
                };
                if !reached && bkey != start_key {
                    // The previous name's bucket vanished; resume here.
                    reached = true;
                }
                for member in BucketView::parse(image)?.iter() {
                    if !member.name.starts_with(task.prefix.as_bytes()) {
                        continue;
                    }
                    if let Some(prev) = task.previous {
                        if member.name == prev.as_bytes() {
                            reached = true;
                            continue;
                        }
                    }
                    if !reached {
                        continue;
                    }
                    if emitted >= task.max_count {
                        break 'collection;
                    }
                    offsets_v.push(tape_v.len() as u32);
                    tape_v.extend_from_slice(member.name);
                    emitted += 1;
                }
                if !reached && bkey == start_key {
                    reached = true;
                }
            }

            if keys.len() < SCAN_BATCH as usize {
                break;
            }
            let Some(&last) = keys.last() else { break };
            min_key = match last.checked_add(1) {
                Some(k) => k,
                None => break,
            };
        }
        Ok(emitted)
    }

    // ------------------------------------------------------------------
    // Directories
    // ------------------------------------------------------------------

    /// Reads one directory mirror: the immediate children recorded under
    /// the given prefix. Requires mirrors to have been maintained by
    /// [`Paths::with_directory_mirrors`] writes.
    pub fn directory_children<'a>(
        &self,
        db: &Database,
        txn: Option<&mut Transaction>,
        collection: CollectionId,
        dir: &str,
        arena: &'a Arena,
    ) -> Result<MatchOutput<'a>, StoreError> {
        let scratch = Arena::new();
        let key = self.mirror_key(dir);
        let out = db.read(
            txn,
            ColSpec::Single(collection),
            &[key],
            ReadOptions::default(),
            &scratch,
        )?;

        let mut offsets_v: Vec<u32> = Vec::new();
        let mut tape_v: Vec<u8> = Vec::new();
        let mut count = 0u32;
        if let Some(image) = out.value(0) {
            for member in BucketView::parse(image)?.iter() {
                offsets_v.push(tape_v.len() as u32);
                tape_v.extend_from_slice(member.name);
                count += 1;
            }
        }
        offsets_v.push(tape_v.len() as u32);

        let counts = arena.alloc_u32(1)?;
        counts[0] = count;
        let offsets = arena.alloc_u32(offsets_v.len())?;
        offsets.copy_from_slice(&offsets_v);
        let tape = arena.alloc(tape_v.len(), 1)?;
        tape.copy_from_slice(&tape_v);

        Ok(MatchOutput {
            counts,
            offsets,
            tape,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::CollidingPathHasher;
    use crate::store::Database;

    fn colliding() -> Paths<CollidingPathHasher> {
        Paths::with_hasher(CollidingPathHasher { buckets: 10 })
    }

    fn write_pairs<H: PathHasher>(
        paths: &Paths<H>,
        db: &Database,
        pairs: &[(&str, &[u8])],
    ) {
        let names: Vec<&str> = pairs.iter().map(|(p, _)| *p).collect();
        let values: Vec<Option<&[u8]>> = pairs.iter().map(|(_, v)| Some(*v)).collect();
        paths
            .write(
                db,
                None,
                ColSpec::main(),
                &names,
                &values,
                WriteOptions::default(),
            )
            .unwrap();
    }

    #[test]
    fn test_write_read_round_trip() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = Paths::new();

        write_pairs(
            &paths,
            &db,
            &[("home/a", b"A"), ("home/b", b"B"), ("lab/x", b"X")],
        );

        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["home/a", "home/b", "lab/x", "lab/unknown"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), Some(&b"A"[..]));
        assert_eq!(out.value(1), Some(&b"B"[..]));
        assert_eq!(out.value(2), Some(&b"X"[..]));
        assert_eq!(out.value(3), None);
        assert_eq!(out.lengths[3], LEN_MISSING);
    }

    #[test]
    fn test_collisions_resolved_in_bucket() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = colliding();

        write_pairs(
            &paths,
            &db,
            &[("home/a", b"A"), ("home/b", b"B"), ("lab/x", b"X")],
        );

        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["home/a", "home/b", "lab/x"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), Some(&b"A"[..]));
        assert_eq!(out.value(1), Some(&b"B"[..]));
        assert_eq!(out.value(2), Some(&b"X"[..]));
    }

    #[test]
    fn test_overwrite_and_remove() {
        let db = Database::open();
        let mut arena = Arena::new();
        let paths = colliding();

        write_pairs(&paths, &db, &[("k/1", b"old"), ("k/2", b"keep")]);
        write_pairs(&paths, &db, &[("k/1", b"new")]);

        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["k/1", "k/2"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), Some(&b"new"[..]));
        assert_eq!(out.value(1), Some(&b"keep"[..]));

        paths
            .write(
                &db,
                None,
                ColSpec::main(),
                &["k/1"],
                &[None],
                WriteOptions::default(),
            )
            .unwrap();
        arena.reset();
        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["k/1", "k/2"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), None);
        assert_eq!(out.value(1), Some(&b"keep"[..]));
    }

    #[test]
    fn test_removing_last_member_deletes_bucket() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = Paths::new();

        write_pairs(&paths, &db, &[("solo", b"v")]);
        paths
            .write(
                &db,
                None,
                ColSpec::main(),
                &["solo"],
                &[None],
                WriteOptions::default(),
            )
            .unwrap();

        let key = paths.bucket_key("solo");
        let out = db
            .read(
                None,
                ColSpec::main(),
                &[key],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert!(!out.is_present(0));
    }

    #[test]
    fn test_match_prefix_with_collisions() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = colliding();

        write_pairs(
            &paths,
            &db,
            &[("home/a", b"A"), ("home/b", b"B"), ("lab/x", b"X")],
        );

        let out = paths
            .match_prefixes(
                &db,
                None,
                &[MatchTask {
                    collection: CollectionId::MAIN,
                    prefix: "home/",
                    previous: None,
                    max_count: 10,
                }],
                &arena,
            )
            .unwrap();
        assert_eq!(out.counts[0], 2);
        let mut names: Vec<&[u8]> = out.task_names(0).collect();
        names.sort();
        assert_eq!(names, vec![&b"home/a"[..], &b"home/b"[..]]);
    }

    #[test]
    fn test_match_continuation_pages_everything() {
        let db = Database::open();
        let paths = colliding();

        let all: Vec<String> = (0..23).map(|i| format!("doc/{i:02}")).collect();
        let pairs: Vec<(&str, &[u8])> = all.iter().map(|p| (p.as_str(), &b"v"[..])).collect();
        write_pairs(&paths, &db, &pairs);

        let mut seen: Vec<String> = Vec::new();
        let mut previous: Option<String> = None;
        loop {
            let arena = Arena::new();
            let out = paths
                .match_prefixes(
                    &db,
                    None,
                    &[MatchTask {
                        collection: CollectionId::MAIN,
                        prefix: "doc/",
                        previous: previous.as_deref(),
                        max_count: 4,
                    }],
                    &arena,
                )
                .unwrap();
            if out.counts[0] == 0 {
                break;
            }
            for name in out.task_names(0) {
                seen.push(String::from_utf8(name.to_vec()).unwrap());
            }
            previous = seen.last().cloned();
        }

        seen.sort();
        let mut expected = all.clone();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_multi_task_match_partitions() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = colliding();

        write_pairs(
            &paths,
            &db,
            &[("a/1", b"1"), ("a/2", b"2"), ("b/1", b"3")],
        );

        let out = paths
            .match_prefixes(
                &db,
                None,
                &[
                    MatchTask {
                        collection: CollectionId::MAIN,
                        prefix: "a/",
                        previous: None,
                        max_count: 10,
                    },
                    MatchTask {
                        collection: CollectionId::MAIN,
                        prefix: "b/",
                        previous: None,
                        max_count: 10,
                    },
                ],
                &arena,
            )
            .unwrap();
        assert_eq!(out.counts, &[2, 1]);
        let mut a: Vec<&[u8]> = out.task_names(0).collect();
        a.sort();
        assert_eq!(a, vec![&b"a/1"[..], &b"a/2"[..]]);
        assert_eq!(out.task_names(1).collect::<Vec<_>>(), vec![&b"b/1"[..]]);
    }

    #[test]
    fn test_paths_inside_transaction() {
        let db = Database::open();
        let mut arena = Arena::new();
        let paths = Paths::new();

        let mut txn = db.txn_begin(None);
        paths
            .write(
                &db,
                Some(&mut txn),
                ColSpec::main(),
                &["tx/key"],
                &[Some(&b"buffered"[..])],
                WriteOptions::default(),
            )
            .unwrap();

        // Visible inside the transaction, invisible on HEAD.
        let out = paths
            .read(
                &db,
                Some(&mut txn),
                ColSpec::main(),
                &["tx/key"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), Some(&b"buffered"[..]));

        arena.reset();
        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["tx/key"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), None);

        db.txn_commit(&mut txn, WriteOptions::default()).unwrap();
        arena.reset();
        let out = paths
            .read(
                &db,
                None,
                ColSpec::main(),
                &["tx/key"],
                ReadOptions::default(),
                &arena,
            )
            .unwrap();
        assert_eq!(out.value(0), Some(&b"buffered"[..]));
    }

    #[test]
    fn test_directory_mirrors() {
        let db = Database::open();
        let mut arena = Arena::new();
        let paths = Paths::new().with_directory_mirrors(b'/');

        write_pairs(&paths, &db, &[("home/user/media/name", b"f")]);

        let out = paths
            .directory_children(&db, None, CollectionId::MAIN, "home/", &arena)
            .unwrap();
        assert_eq!(out.counts[0], 1);
        assert_eq!(out.name(0), b"home/user");

        arena.reset();
        let out = paths
            .directory_children(&db, None, CollectionId::MAIN, "home/user/", &arena)
            .unwrap();
        assert_eq!(out.name(0), b"home/user/media");

        // Idempotent: rewriting the same path adds nothing.
        write_pairs(&paths, &db, &[("home/user/media/name", b"f2")]);
        arena.reset();
        let out = paths
            .directory_children(&db, None, CollectionId::MAIN, "home/", &arena)
            .unwrap();
        assert_eq!(out.counts[0], 1);

        // A sibling appears as a second child.
        write_pairs(&paths, &db, &[("home/other/file", b"g")]);
        arena.reset();
        let out = paths
            .directory_children(&db, None, CollectionId::MAIN, "home/", &arena)
            .unwrap();
        assert_eq!(out.counts[0], 2);
        let mut children: Vec<&[u8]> = (0..2).map(|j| out.name(j)).collect();
        children.sort();
        assert_eq!(children, vec![&b"home/other"[..], &b"home/user"[..]]);
    }

    #[test]
    fn test_mirrors_do_not_pollute_match() {
        let db = Database::open();
        let arena = Arena::new();
        let paths = colliding();
        let mirrored = Paths::with_hasher(CollidingPathHasher { buckets: 10 })
            .with_directory_mirrors(b'/');

        write_pairs(&mirrored, &db, &[("home/user/a", b"A")]);

        let out = paths
            .match_prefixes(
                &db,
                None,
                &[MatchTask {
                    collection: CollectionId::MAIN,
                    prefix: "home/",
                    previous: None,
                    max_count: 100,
                }],
                &arena,
            )
            .unwrap();
        // Only the real path, not the mirror members.
        assert_eq!(out.counts[0], 1);
        assert_eq!(out.name(0), b"home/user/a");
    }
}
