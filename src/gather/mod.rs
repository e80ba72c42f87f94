// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Columnar gather over document-valued entries.
//!
//! Given N document addresses and M field descriptors, [`gather`] reads
//! the documents once, extracts each `(document, field)` cell through an
//! injected [`FieldExtractor`], converts it to the column's target type,
//! and fills M columns in struct-of-arrays form: three LSB-first bitmaps
//! per column (validity / converted / collided) plus either a packed
//! scalar buffer or offsets and lengths into one shared tape.
//!
//! # Example
//!
//! ```
//! use latticekv::arena::Arena;
//! use latticekv::gather::{gather, CellType, FieldSpec, JsonExtractor, TableLayout};
//! use latticekv::store::{ColSpec, Database, ReadOptions, WriteOptions};
//!
//! let db = Database::open();
//! let arena = Arena::new();
//! db.write(
//!     None,
//!     ColSpec::main(),
//!     &[1],
//!     &[Some(br#"{"age": 42}"#.as_slice())],
//!     WriteOptions::default(),
//! )
//! .unwrap();
//!
//! let layout = TableLayout {
//!     cols: ColSpec::main(),
//!     keys: &[1, 2],
//!     fields: &[FieldSpec { name: "age", cell_type: CellType::I32 }],
//! };
//! let table = gather(&db, None, &layout, &JsonExtractor, ReadOptions::default(), &arena)
//!     .unwrap();
//! let age = table.column(0);
//! assert!(age.is_valid(0));
//! assert!(!age.is_valid(1)); // document 2 is absent
//! ```

mod column;
mod convert;
mod engine;
mod error;
mod extract;
mod types;

pub use column::{CellValue, GatherColumn, GatherTable};
pub use engine::gather;
pub use error::GatherError;
pub use extract::{ExtractError, FieldExtractor, FieldValue, JsonExtractor};
pub use types::{CellType, FieldSpec, TableLayout};
