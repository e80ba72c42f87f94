// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The gather loop.

use tracing::debug;

use crate::arena::Arena;
use crate::bitmap;
use crate::store::{Database, ReadOptions, Transaction};

use super::column::{GatherColumn, GatherTable};
use super::convert::{self, CellBits};
use super::error::GatherError;
use super::extract::FieldExtractor;
use super::types::TableLayout;

struct ColumnBufs<'a> {
    validity: &'a mut [u8],
    converted: &'a mut [u8],
    collided: &'a mut [u8],
    scalars: Option<&'a mut [u8]>,
    offsets: Option<&'a mut [u32]>,
    lengths: Option<&'a mut [u32]>,
}

impl ColumnBufs<'_> {
    fn set_bits(&mut self, i: usize, bits: CellBits) {
        if bits.valid {
            bitmap::set(self.validity, i);
        }
        if bits.converted {
            bitmap::set(self.converted, i);
        }
        if bits.collided {
            bitmap::set(self.collided, i);
        }
    }
}

/// Gathers N documents x M fields into columnar buffers.
///
/// Documents are fetched with one batched store read (on HEAD or inside
/// `txn`); every cell then goes through the extractor and the conversion
/// policy. Columns are filled one at a time so fixed-width output stays
/// cache-friendly; variable-length cells append to one shared tape.
///
/// All returned buffers live in `arena`. Bitmaps are zero-initialised, so
/// absent documents cost no per-cell work.
pub fn gather<'a>(
    db: &Database,
    txn: Option<&mut Transaction>,
    layout: &TableLayout<'_>,
    extractor: &dyn FieldExtractor,
    opts: ReadOptions,
    arena: &'a Arena,
) -> Result<GatherTable<'a>, GatherError> {
    let n = layout.keys.len();
    let bitmap_bytes = bitmap::bytes_for(n);

    let docs = db.read(txn, layout.cols, layout.keys, opts, arena)?;

    let mut bufs: Vec<ColumnBufs<'a>> = Vec::with_capacity(layout.fields.len());
    for field in layout.fields {
        let (scalars, offsets, lengths) = match field.cell_type.fixed_width() {
            Some(width) => (Some(arena.alloc(n * width, width)?), None, None),
            None => (
                None,
                Some(arena.alloc_u32(n + 1)?),
                Some(arena.alloc_u32(n)?),
            ),
        };
        bufs.push(ColumnBufs {
            validity: arena.alloc(bitmap_bytes, 1)?,
            converted: arena.alloc(bitmap_bytes, 1)?,
            collided: arena.alloc(bitmap_bytes, 1)?,
            scalars,
            offsets,
            lengths,
        });
    }

    let mut tape_v: Vec<u8> = Vec::new();
    for (j, field) in layout.fields.iter().enumerate() {
        let buf = &mut bufs[j];
        match field.cell_type.fixed_width() {
            Some(width) => {
                for i in 0..n {
                    let Some(doc) = docs.value(i) else {
                        continue;
                    };
                    let value = extractor.extract(doc, field.name).map_err(|e| {
                        GatherError::ExtractorFailure {
                            row: i,
                            field: field.name.to_string(),
                            message: e.to_string(),
                        }
                    })?;
                    let (bits, raw) = convert::scalar_cell(&value, field.cell_type);
                    buf.set_bits(i, bits);
                    let cells = buf.scalars.as_mut().expect("fixed-width column");
                    cells[i * width..(i + 1) * width]
                        .copy_from_slice(&raw.to_le_bytes()[..width]);
                }
            }
            None => {
                for i in 0..n {
                    let offsets = buf.offsets.as_mut().expect("variable-length column");
                    offsets[i] = tape_offset(&tape_v)?;
                    let Some(doc) = docs.value(i) else {
                        continue;
                    };
                    let value = extractor.extract(doc, field.name).map_err(|e| {
                        GatherError::ExtractorFailure {
                            row: i,
                            field: field.name.to_string(),
                            message: e.to_string(),
                        }
                    })?;
                    let before = tape_v.len();
                    let bits = convert::var_cell(&value, field.cell_type, &mut tape_v);
                    buf.set_bits(i, bits);
                    let lengths = buf.lengths.as_mut().expect("variable-length column");
                    lengths[i] = (tape_v.len() - before) as u32;
                }
                let offsets = buf.offsets.as_mut().expect("variable-length column");
                offsets[n] = tape_offset(&tape_v)?;
            }
        }
    }

    let tape: &'a [u8] = {
        let t = arena.alloc(tape_v.len(), 1)?;
        t.copy_from_slice(&tape_v);
        t
    };

    let columns: Vec<GatherColumn<'a>> = layout
        .fields
        .iter()
        .zip(bufs)
        .map(|(field, buf)| GatherColumn {
            cell_type: field.cell_type,
            rows: n,
            validity: buf.validity,
            converted: buf.converted,
            collided: buf.collided,
            scalars: buf.scalars.map(|s| &*s),
            offsets: buf.offsets.map(|o| &*o),
            lengths: buf.lengths.map(|l| &*l),
            tape,
        })
        .collect();

    debug!(
        docs = n,
        fields = layout.fields.len(),
        tape_bytes = tape.len(),
        "gathered table"
    );
    Ok(GatherTable {
        columns,
        rows: n,
        tape,
    })
}

fn tape_offset(tape: &[u8]) -> Result<u32, GatherError> {
    u32::try_from(tape.len()).map_err(|_| GatherError::InvalidLayout {
        reason: "variable-length cells exceed u32 tape offsets".to_string(),
    })
}
