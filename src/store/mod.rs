// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transactional multi-collection binary key-value store.
//!
//! This module provides the primitive every higher modality builds on: a
//! set of named collections mapping fixed-width integer keys to versioned
//! byte values, with batch reads, writes and ordered scans on the committed
//! HEAD state or inside a snapshot-reading transaction.
//!
//! # Key Concepts
//!
//! ## Versioning
//!
//! Every successful write stamps its entries with a fresh value of a
//! database-wide monotonic sequence counter. Transactions snapshot that
//! counter at begin and validate at commit that nothing they observed was
//! overwritten in between, using a modular half-open interval test that
//! stays correct across 64-bit wraparound.
//!
//! ## Locking
//!
//! One readers-writer database lock disciplines everything: HEAD and
//! transactional reads take it shared, HEAD writes, commits and collection
//! DDL take it exclusive. Commits are the only multi-key critical section,
//! so no per-collection locks are needed.
//!
//! # Example
//!
//! ```
//! use latticekv::arena::Arena;
//! use latticekv::store::{ColSpec, Database, ReadOptions, WriteOptions};
//!
//! let db = Database::open();
//! let arena = Arena::new();
//!
//! db.write(
//!     None,
//!     ColSpec::main(),
//!     &[1, 2],
//!     &[Some(b"one".as_slice()), Some(b"two".as_slice())],
//!     WriteOptions::default(),
//! )
//! .unwrap();
//!
//! let out = db
//!     .read(None, ColSpec::main(), &[1, 2, 3], ReadOptions::default(), &arena)
//!     .unwrap();
//! assert_eq!(out.value(0), Some(b"one".as_slice()));
//! assert_eq!(out.value(2), None);
//! ```

mod database;
mod error;
mod options;
mod sequence;
mod transaction;
mod types;

pub use database::Database;
pub use error::{ErrorKind, StoreError};
pub use options::{ReadOptions, ScanOptions, WriteOptions};
pub use sequence::{Sequence, SEQ_MISSING};
pub use transaction::{Transaction, TxnState};
pub use types::{
    ColSpec, CollectionId, Key, Located, MeasureOutput, ReadOutput, ScanOutput, ScanTask,
    KEY_UNKNOWN, LEN_MISSING, MAX_VALUE_SIZE,
};
