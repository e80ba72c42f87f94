// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Per-operation option flags.
//!
//! The engine always copies results into the caller's arena, so
//! `shared_memory_ok` and `dont_discard_memory` are accepted as hints and
//! have no observable effect in this implementation. `flush` is a reserved
//! durability hint with no meaning for the in-memory engine.

/// Options for batch reads, on HEAD or inside a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Record each observed `(collection, key, sequence)` in the
    /// transaction's read set, enabling commit-time validation.
    pub track_reads: bool,
    /// Allow results to alias engine memory instead of the arena.
    pub shared_memory_ok: bool,
}

impl ReadOptions {
    /// Read options with read-set tracking enabled.
    pub fn tracked() -> Self {
        Self {
            track_reads: true,
            ..Self::default()
        }
    }
}

/// Options for batch writes and commits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Durability hint; reserved.
    pub flush: bool,
}

/// Options for ordered key scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// Reuse existing arena contents where possible.
    pub dont_discard_memory: bool,
}
