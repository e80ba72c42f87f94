// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Variable-length string keys layered over the binary store.
//!
//! Every path is reduced to a fixed-width bucket key by a stable 64-bit
//! hash; collisions are resolved inside the bucket, whose value bytes
//! encode a set of `(name, value)` members. Prefix matching scans bucket
//! keys in order and filters member names, so it tolerates collisions
//! without ever comparing hashes.
//!
//! # Key Concepts
//!
//! ## Buckets
//!
//! A bucket packs `N` members as
//! `[N][name_len * N][val_len * N][names][values]` with little-endian
//! `u32` counters. A bucket that would become empty is stored as an
//! absent entry, never as zero bytes.
//!
//! ## Continuation
//!
//! [`Paths::match_prefixes`] resumes strictly after the last name a
//! previous call returned, so a caller pages through a prefix with
//! repeated calls carrying the last result forward.
//!
//! # Example
//!
//! ```
//! use latticekv::arena::Arena;
//! use latticekv::paths::Paths;
//! use latticekv::store::{ColSpec, Database, ReadOptions, WriteOptions};
//!
//! let db = Database::open();
//! let arena = Arena::new();
//! let paths = Paths::new();
//!
//! paths
//!     .write(
//!         &db,
//!         None,
//!         ColSpec::main(),
//!         &["home/a", "home/b"],
//!         &[Some(b"A".as_slice()), Some(b"B".as_slice())],
//!         WriteOptions::default(),
//!     )
//!     .unwrap();
//!
//! let out = paths
//!     .read(&db, None, ColSpec::main(), &["home/a"], ReadOptions::default(), &arena)
//!     .unwrap();
//! assert_eq!(out.value(0), Some(b"A".as_slice()));
//! ```

mod bucket;
mod hash;
mod ops;

pub use hash::{CollidingPathHasher, PathHasher, Xxh3PathHasher};
pub use ops::{MatchOutput, MatchTask, Paths};
