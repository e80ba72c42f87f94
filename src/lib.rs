// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! LatticeKV: an embeddable, transactional, multi-collection key-value
//! engine with two modalities layered over the binary primitive.
//!
//! This crate provides:
//! - [`store`] — the versioned in-memory store: batch reads, writes and
//!   ordered scans on HEAD or inside snapshot transactions with
//!   optimistic commit validation;
//! - [`paths`] — variable-length string keys mapped onto integer keys by
//!   a stable hash, with collision buckets and prefix matching;
//! - [`gather`] — a columnar reader that turns document-valued entries
//!   into struct-of-arrays columns with per-cell validity, conversion
//!   and collision flags;
//! - [`arena`] — the caller-owned scratch allocator every operation
//!   returns its buffers through.

pub mod arena;
pub mod bitmap;
pub mod gather;
pub mod paths;
pub mod store;

pub use arena::{AllocError, Arena};
pub use gather::{
    gather, CellType, CellValue, FieldExtractor, FieldSpec, FieldValue, GatherColumn,
    GatherError, GatherTable, JsonExtractor, TableLayout,
};
pub use paths::{CollidingPathHasher, MatchOutput, MatchTask, PathHasher, Paths, Xxh3PathHasher};
pub use store::{
    ColSpec, CollectionId, Database, ErrorKind, Key, Located, MeasureOutput, ReadOptions,
    ReadOutput, ScanOptions, ScanOutput, ScanTask, Sequence, StoreError, Transaction, TxnState,
    WriteOptions, KEY_UNKNOWN, LEN_MISSING,
};
