// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Collision-bucket codec.
//!
//! Layout, all counters little-endian `u32`:
//!
//! ```text
//! [ N ][ name_len_0 .. name_len_{N-1} ][ val_len_0 .. val_len_{N-1} ]
//! [ name_bytes_0 || .. || name_bytes_{N-1} ][ val_bytes_0 || .. ]
//! ```
//!
//! Member names are unique within a bucket. An empty slice parses as an
//! empty bucket; a bucket that would serialise with `N = 0` is never
//! materialised (the slot is deleted instead).

use crate::store::StoreError;

const COUNTER_SIZE: usize = 4;

fn read_u32(bytes: &[u8], at: usize) -> usize {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]) as usize
}

fn push_u32(out: &mut Vec<u8>, v: usize) {
    out.extend_from_slice(&(v as u32).to_le_bytes());
}

fn corrupt(reason: &str) -> StoreError {
    StoreError::InvalidArgument {
        reason: format!("corrupt bucket: {reason}"),
    }
}

/// One member of a parsed bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BucketMember<'a> {
    pub index: usize,
    pub name: &'a [u8],
    pub value: &'a [u8],
}

/// A validated view over bucket bytes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BucketView<'a> {
    bytes: &'a [u8],
    count: usize,
    names_start: usize,
    vals_start: usize,
}

impl<'a> BucketView<'a> {
    /// Validates the header and region sizes; an empty slice is an empty
    /// bucket.
    pub(crate) fn parse(bytes: &'a [u8]) -> Result<Self, StoreError> {
        if bytes.is_empty() {
            return Ok(Self {
                bytes,
                count: 0,
                names_start: 0,
                vals_start: 0,
            });
        }
        if bytes.len() < COUNTER_SIZE {
            return Err(corrupt("shorter than its header"));
        }
        let count = read_u32(bytes, 0);
        let counters_end = count
            .checked_mul(2 * COUNTER_SIZE)
            .and_then(|c| c.checked_add(COUNTER_SIZE))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| corrupt("counter region exceeds payload"))?;

        let mut names_total = 0usize;
        let mut vals_total = 0usize;
        for i in 0..count {
            names_total = names_total
                .checked_add(read_u32(bytes, COUNTER_SIZE + i * COUNTER_SIZE))
                .ok_or_else(|| corrupt("name lengths overflow"))?;
            vals_total = vals_total
                .checked_add(read_u32(bytes, COUNTER_SIZE + (count + i) * COUNTER_SIZE))
                .ok_or_else(|| corrupt("value lengths overflow"))?;
        }
        let expected = counters_end
            .checked_add(names_total)
            .and_then(|e| e.checked_add(vals_total))
            .ok_or_else(|| corrupt("regions overflow"))?;
        if expected != bytes.len() {
            return Err(corrupt("region sizes disagree with payload length"));
        }

        Ok(Self {
            bytes,
            count,
            names_start: counters_end,
            vals_start: counters_end + names_total,
        })
    }

    #[inline]
    pub(crate) fn count(&self) -> usize {
        self.count
    }

    fn name_len(&self, i: usize) -> usize {
        read_u32(self.bytes, COUNTER_SIZE + i * COUNTER_SIZE)
    }

    fn val_len(&self, i: usize) -> usize {
        read_u32(self.bytes, COUNTER_SIZE + (self.count + i) * COUNTER_SIZE)
    }

    /// Iterates members in storage order.
    pub(crate) fn iter(&self) -> Members<'a> {
        Members {
            view: *self,
            index: 0,
            name_off: self.names_start,
            val_off: self.vals_start,
        }
    }

    /// Finds the member with the given name.
    pub(crate) fn find(&self, name: &[u8]) -> Option<BucketMember<'a>> {
        self.iter().find(|m| m.name == name)
    }
}

pub(crate) struct Members<'a> {
    view: BucketView<'a>,
    index: usize,
    name_off: usize,
    val_off: usize,
}

impl<'a> Iterator for Members<'a> {
    type Item = BucketMember<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.view.count {
            return None;
        }
        let name_len = self.view.name_len(self.index);
        let val_len = self.view.val_len(self.index);
        let member = BucketMember {
            index: self.index,
            name: &self.view.bytes[self.name_off..self.name_off + name_len],
            value: &self.view.bytes[self.val_off..self.val_off + val_len],
        };
        self.index += 1;
        self.name_off += name_len;
        self.val_off += val_len;
        Some(member)
    }
}

/// Rebuilds the bucket with `name` set to `value`.
///
/// An existing member keeps its position; a new member is appended. The
/// result is assembled in a single allocation sized from the old image.
pub(crate) fn upsert(bucket: &[u8], name: &[u8], value: &[u8]) -> Result<Vec<u8>, StoreError> {
    let view = BucketView::parse(bucket)?;
    let existing = view.find(name);

    let (new_count, old_val_len) = match existing {
        Some(m) => (view.count(), m.value.len()),
        None => (view.count() + 1, 0),
    };
    let new_bytes = COUNTER_SIZE * (1 + 2 * new_count)
        + (view.bytes.len() - view.names_start)
        + (name.len() * usize::from(existing.is_none()))
        + value.len()
        - old_val_len;

    let mut out = Vec::with_capacity(new_bytes);
    push_u32(&mut out, new_count);

    match existing {
        Some(replaced) => {
            for i in 0..view.count() {
                push_u32(&mut out, view.name_len(i));
            }
            for i in 0..view.count() {
                push_u32(&mut out, if i == replaced.index { value.len() } else { view.val_len(i) });
            }
            out.extend_from_slice(&view.bytes[view.names_start..view.vals_start]);
            for m in view.iter() {
                out.extend_from_slice(if m.index == replaced.index { value } else { m.value });
            }
        }
        None => {
            for i in 0..view.count() {
                push_u32(&mut out, view.name_len(i));
            }
            push_u32(&mut out, name.len());
            for i in 0..view.count() {
                push_u32(&mut out, view.val_len(i));
            }
            push_u32(&mut out, value.len());
            out.extend_from_slice(&view.bytes[view.names_start..view.vals_start]);
            out.extend_from_slice(name);
            out.extend_from_slice(&view.bytes[view.vals_start..]);
            out.extend_from_slice(value);
        }
    }
    debug_assert_eq!(out.len(), new_bytes);
    Ok(out)
}

/// Result of removing a member.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum RemoveOutcome {
    /// No member with that name; the bucket is unchanged.
    NotFound,
    /// The last member was removed; the slot must be deleted.
    Emptied,
    /// The compacted bucket image.
    Updated(Vec<u8>),
}

/// Removes the member with `name`, compacting the four regions.
pub(crate) fn remove(bucket: &[u8], name: &[u8]) -> Result<RemoveOutcome, StoreError> {
    let view = BucketView::parse(bucket)?;
    let Some(removed) = view.find(name) else {
        return Ok(RemoveOutcome::NotFound);
    };
    if view.count() == 1 {
        return Ok(RemoveOutcome::Emptied);
    }

    let new_count = view.count() - 1;
    let new_bytes = bucket.len() - 2 * COUNTER_SIZE - name.len() - removed.value.len();
    let mut out = Vec::with_capacity(new_bytes);

    push_u32(&mut out, new_count);
    for i in 0..view.count() {
        if i != removed.index {
            push_u32(&mut out, view.name_len(i));
        }
    }
    for i in 0..view.count() {
        if i != removed.index {
            push_u32(&mut out, view.val_len(i));
        }
    }
    for m in view.iter() {
        if m.index != removed.index {
            out.extend_from_slice(m.name);
        }
    }
    for m in view.iter() {
        if m.index != removed.index {
            out.extend_from_slice(m.value);
        }
    }
    debug_assert_eq!(out.len(), new_bytes);
    Ok(RemoveOutcome::Updated(out))
}
