// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Gather error types.

use crate::arena::AllocError;
use crate::store::{ErrorKind, StoreError};

/// Errors that can occur while gathering columns.
#[derive(Debug, thiserror::Error)]
pub enum GatherError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("out of memory: {0}")]
    OutOfMemory(#[from] AllocError),

    #[error("field extraction failed at row {row}, field {field:?}: {message}")]
    ExtractorFailure {
        row: usize,
        field: String,
        message: String,
    },

    #[error("invalid layout: {reason}")]
    InvalidLayout { reason: String },
}

impl GatherError {
    /// Maps the error onto the stable cross-subsystem taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatherError::Store(e) => e.kind(),
            GatherError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            GatherError::ExtractorFailure { .. } => ErrorKind::ExtractorFailure,
            GatherError::InvalidLayout { .. } => ErrorKind::InvalidArgument,
        }
    }
}
