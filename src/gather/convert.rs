// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The fixed source-kind x target-type conversion policy.
//!
//! Every cell resolves to three bits plus an optional value:
//! - `valid` — a value of the target type was produced;
//! - `converted` — producing it required a type conversion;
//! - `collided` — a source value existed but cannot be represented
//!   faithfully; the cell is zeroed and `valid` stays clear.

use super::extract::FieldValue;
use super::types::CellType;

/// The (validity, converted, collided) triple of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellBits {
    pub valid: bool,
    pub converted: bool,
    pub collided: bool,
}

impl CellBits {
    pub(crate) const MISSING: CellBits = CellBits {
        valid: false,
        converted: false,
        collided: false,
    };
    pub(crate) const EXACT: CellBits = CellBits {
        valid: true,
        converted: false,
        collided: false,
    };
    pub(crate) const CONVERTED: CellBits = CellBits {
        valid: true,
        converted: true,
        collided: false,
    };
    pub(crate) const COLLIDED: CellBits = CellBits {
        valid: false,
        converted: false,
        collided: true,
    };
}

/// Converts to a fixed-width target, returning the raw little-endian cell
/// bits in the low bytes of the `u64` (zeroed on miss or collision).
pub(crate) fn scalar_cell(value: &FieldValue, target: CellType) -> (CellBits, u64) {
    debug_assert!(target.fixed_width().is_some());
    match value {
        FieldValue::Missing => (CellBits::MISSING, 0),
        FieldValue::Bool(b) => bool_to_scalar(*b, target),
        FieldValue::Int(i) => int_to_scalar(*i as i128, target, CellType::I64),
        FieldValue::UInt(u) => int_to_scalar(*u as i128, target, CellType::U64),
        FieldValue::Float(f) => float_to_scalar(*f, target),
        FieldValue::Str(s) => str_to_scalar(s, target),
        FieldValue::Bin(_) => (CellBits::COLLIDED, 0),
    }
}

/// Converts to a variable-length target, appending the cell bytes to the
/// tape only when the cell is valid.
pub(crate) fn var_cell(value: &FieldValue, target: CellType, tape: &mut Vec<u8>) -> CellBits {
    debug_assert!(target.is_variable());
    match target {
        CellType::Str => match value {
            FieldValue::Missing => CellBits::MISSING,
            FieldValue::Bool(b) => {
                tape.extend_from_slice(if *b { b"true" } else { b"false" });
                CellBits::CONVERTED
            }
            FieldValue::Int(i) => {
                tape.extend_from_slice(i.to_string().as_bytes());
                CellBits::CONVERTED
            }
            FieldValue::UInt(u) => {
                tape.extend_from_slice(u.to_string().as_bytes());
                CellBits::CONVERTED
            }
            FieldValue::Float(f) => {
                // Display produces the shortest round-trip decimal.
                tape.extend_from_slice(f.to_string().as_bytes());
                CellBits::CONVERTED
            }
            FieldValue::Str(s) => {
                tape.extend_from_slice(s.as_bytes());
                CellBits::EXACT
            }
            FieldValue::Bin(b) => match std::str::from_utf8(b) {
                Ok(s) => {
                    tape.extend_from_slice(s.as_bytes());
                    CellBits::CONVERTED
                }
                Err(_) => CellBits::COLLIDED,
            },
        },
        CellType::Bin => match value {
            FieldValue::Missing => CellBits::MISSING,
            FieldValue::Bool(b) => {
                tape.push(*b as u8);
                CellBits::CONVERTED
            }
            FieldValue::Int(i) => {
                tape.extend_from_slice(&i.to_le_bytes());
                CellBits::CONVERTED
            }
            FieldValue::UInt(u) => {
                tape.extend_from_slice(&u.to_le_bytes());
                CellBits::CONVERTED
            }
            FieldValue::Float(f) => {
                tape.extend_from_slice(&f.to_le_bytes());
                CellBits::CONVERTED
            }
            FieldValue::Str(s) => {
                tape.extend_from_slice(s.as_bytes());
                CellBits::CONVERTED
            }
            FieldValue::Bin(b) => {
                tape.extend_from_slice(b);
                CellBits::EXACT
            }
        },
        _ => unreachable!("fixed-width target in var_cell"),
    }
}

fn bool_to_scalar(b: bool, target: CellType) -> (CellBits, u64) {
    match target {
        CellType::Bool => (CellBits::EXACT, b as u64),
        CellType::F32 => (CellBits::CONVERTED, f32::from(b as u8).to_bits() as u64),
        CellType::F64 => (CellBits::CONVERTED, f64::from(b as u8).to_bits()),
        _ => (CellBits::CONVERTED, b as u64),
    }
}

/// Integer source (signed or unsigned, widened into `i128`).
fn int_to_scalar(v: i128, target: CellType, source: CellType) -> (CellBits, u64) {
    let ranged = |lo: i128, hi: i128| {
        if (lo..=hi).contains(&v) {
            let bits = if target == source {
                CellBits::EXACT
            } else {
                CellBits::CONVERTED
            };
            (bits, truncate_bits(v, target))
        } else {
            (CellBits::COLLIDED, 0)
        }
    };
    match target {
        CellType::Bool => (CellBits::CONVERTED, (v != 0) as u64),
        CellType::I8 => ranged(i8::MIN as i128, i8::MAX as i128),
        CellType::I16 => ranged(i16::MIN as i128, i16::MAX as i128),
        CellType::I32 => ranged(i32::MIN as i128, i32::MAX as i128),
        CellType::I64 => ranged(i64::MIN as i128, i64::MAX as i128),
        CellType::U8 => ranged(0, u8::MAX as i128),
        CellType::U16 => ranged(0, u16::MAX as i128),
        CellType::U32 => ranged(0, u32::MAX as i128),
        CellType::U64 => ranged(0, u64::MAX as i128),
        CellType::F32 => {
            let f = v as f32;
            let bits = if f as i128 == v {
                CellBits::EXACT
            } else {
                CellBits::CONVERTED
            };
            (bits, f.to_bits() as u64)
        }
        CellType::F64 => {
            let f = v as f64;
            let bits = if f as i128 == v {
                CellBits::EXACT
            } else {
                CellBits::CONVERTED
            };
            (bits, f.to_bits())
        }
        CellType::Bin | CellType::Str => unreachable!("variable target in int_to_scalar"),
    }
}

fn float_to_scalar(f: f64, target: CellType) -> (CellBits, u64) {
    match target {
        CellType::Bool => {
            if f.is_nan() {
                (CellBits::COLLIDED, 0)
            } else {
                (CellBits::CONVERTED, (f != 0.0 && f.is_finite()) as u64)
            }
        }
        CellType::F32 => {
            let g = f as f32;
            if f.is_finite() && !g.is_finite() {
                return (CellBits::COLLIDED, 0);
            }
            let bits = if g as f64 == f {
                CellBits::EXACT
            } else {
                CellBits::CONVERTED
            };
            (bits, g.to_bits() as u64)
        }
        CellType::F64 => (CellBits::EXACT, f.to_bits()),
        _ => {
            // Integer targets: truncate toward zero, collide on NaN,
            // infinity or overflow.
            if !f.is_finite() {
                return (CellBits::COLLIDED, 0);
            }
            let t = f.trunc();
            let (lo, hi_exclusive) = int_bounds(target);
            if t >= lo && t < hi_exclusive {
                (CellBits::CONVERTED, truncate_bits(t as i128, target))
            } else {
                (CellBits::COLLIDED, 0)
            }
        }
    }
}

fn str_to_scalar(s: &str, target: CellType) -> (CellBits, u64) {
    match target {
        CellType::Bool => match s {
            "true" => (CellBits::CONVERTED, 1),
            "false" => (CellBits::CONVERTED, 0),
            _ => (CellBits::COLLIDED, 0),
        },
        CellType::F32 => match s.parse::<f64>() {
            Ok(f) => (CellBits::CONVERTED, (f as f32).to_bits() as u64),
            Err(_) => (CellBits::COLLIDED, 0),
        },
        CellType::F64 => match s.parse::<f64>() {
            Ok(f) => (CellBits::CONVERTED, f.to_bits()),
            Err(_) => (CellBits::COLLIDED, 0),
        },
        _ => match s.parse::<i128>() {
            Ok(v) => match int_to_scalar(v, target, CellType::Str) {
                (bits, raw) if bits.valid => (CellBits::CONVERTED, raw),
                collided => collided,
            },
            Err(_) => (CellBits::COLLIDED, 0),
        },
    }
}

/// Low `width` bytes of the two's-complement representation.
fn truncate_bits(v: i128, target: CellType) -> u64 {
    let raw = v as u64;
    match target.fixed_width() {
        Some(8) => raw,
        Some(width) => raw & ((1u64 << (8 * width)) - 1),
        None => unreachable!("variable target has no scalar bits"),
    }
}

/// `[lo, hi)` bounds of an integer target, exact in f64.
fn int_bounds(target: CellType) -> (f64, f64) {
    match target {
        CellType::I8 => (-128.0, 128.0),
        CellType::I16 => (-32768.0, 32768.0),
        CellType::I32 => (-2147483648.0, 2147483648.0),
        CellType::I64 => (-9223372036854775808.0, 9223372036854775808.0),
        CellType::U8 => (0.0, 256.0),
        CellType::U16 => (0.0, 65536.0),
        CellType::U32 => (0.0, 4294967296.0),
        CellType::U64 => (0.0, 18446744073709551616.0),
        _ => unreachable!("not an integer target"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(v: FieldValue, t: CellType) -> (CellBits, u64) {
        scalar_cell(&v, t)
    }

    #[test]
    fn test_bool_source() {
        assert_eq!(
            scalar(FieldValue::Bool(true), CellType::Bool),
            (CellBits::EXACT, 1)
        );
        assert_eq!(
            scalar(FieldValue::Bool(true), CellType::I32),
            (CellBits::CONVERTED, 1)
        );
        let (bits, raw) = scalar(FieldValue::Bool(true), CellType::F64);
        assert_eq!(bits, CellBits::CONVERTED);
        assert_eq!(f64::from_bits(raw), 1.0);
    }

    #[test]
    fn test_int_source_ranges() {
        assert_eq!(
            scalar(FieldValue::Int(42), CellType::I64),
            (CellBits::EXACT, 42)
        );
        assert_eq!(
            scalar(FieldValue::Int(42), CellType::I32),
            (CellBits::CONVERTED, 42)
        );
        assert_eq!(
            scalar(FieldValue::Int(300), CellType::I8),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Int(-1), CellType::U32),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::UInt(u64::MAX), CellType::U64),
            (CellBits::EXACT, u64::MAX)
        );
        assert_eq!(
            scalar(FieldValue::UInt(u64::MAX), CellType::I64),
            (CellBits::COLLIDED, 0)
        );
        // Negative narrow targets keep two's-complement bytes.
        assert_eq!(
            scalar(FieldValue::Int(-2), CellType::I8),
            (CellBits::CONVERTED, 0xFE)
        );
    }

    #[test]
    fn test_int_to_float_exactness() {
        assert_eq!(
            scalar(FieldValue::Int(1024), CellType::F64),
            (CellBits::EXACT, 1024f64.to_bits())
        );
        // 2^53 + 1 is not representable in f64.
        let v = (1i64 << 53) + 1;
        let (bits, _) = scalar(FieldValue::Int(v), CellType::F64);
        assert_eq!(bits, CellBits::CONVERTED);
    }

    #[test]
    fn test_float_source() {
        assert_eq!(
            scalar(FieldValue::Float(42.5), CellType::I32),
            (CellBits::CONVERTED, 42)
        );
        assert_eq!(
            scalar(FieldValue::Float(-42.9), CellType::I32),
            (CellBits::CONVERTED, (-42i64 as u64) & 0xFFFF_FFFF)
        );
        assert_eq!(
            scalar(FieldValue::Float(f64::NAN), CellType::I32),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Float(1e20), CellType::I64),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Float(f64::NAN), CellType::Bool),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Float(0.5), CellType::Bool),
            (CellBits::CONVERTED, 1)
        );
        assert_eq!(
            scalar(FieldValue::Float(f64::INFINITY), CellType::Bool),
            (CellBits::CONVERTED, 0)
        );
        // f64 -> f32 narrowing.
        let (bits, raw) = scalar(FieldValue::Float(0.5), CellType::F32);
        assert_eq!(bits, CellBits::EXACT);
        assert_eq!(f32::from_bits(raw as u32), 0.5);
        let (bits, _) = scalar(FieldValue::Float(0.1), CellType::F32);
        assert_eq!(bits, CellBits::CONVERTED);
        assert_eq!(
            scalar(FieldValue::Float(1e308), CellType::F32),
            (CellBits::COLLIDED, 0)
        );
    }

    #[test]
    fn test_str_source() {
        assert_eq!(
            scalar(FieldValue::Str("42".into()), CellType::I32),
            (CellBits::CONVERTED, 42)
        );
        assert_eq!(
            scalar(FieldValue::Str("x".into()), CellType::I32),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Str("42.5".into()), CellType::I32),
            (CellBits::COLLIDED, 0)
        );
        assert_eq!(
            scalar(FieldValue::Str("true".into()), CellType::Bool),
            (CellBits::CONVERTED, 1)
        );
        assert_eq!(
            scalar(FieldValue::Str("yes".into()), CellType::Bool),
            (CellBits::COLLIDED, 0)
        );
        let (bits, raw) = scalar(FieldValue::Str("2.5".into()), CellType::F64);
        assert_eq!(bits, CellBits::CONVERTED);
        assert_eq!(f64::from_bits(raw), 2.5);
        // Out-of-range decimal still collides.
        assert_eq!(
            scalar(FieldValue::Str("300".into()), CellType::I8),
            (CellBits::COLLIDED, 0)
        );
    }

    #[test]
    fn test_bin_source_collides_on_scalars() {
        for t in [CellType::Bool, CellType::I64, CellType::U8, CellType::F64] {
            assert_eq!(
                scalar(FieldValue::Bin(vec![1, 2, 3]), t),
                (CellBits::COLLIDED, 0)
            );
        }
    }

    #[test]
    fn test_missing_source() {
        for t in [CellType::Bool, CellType::I32, CellType::F64] {
            assert_eq!(scalar(FieldValue::Missing, t), (CellBits::MISSING, 0));
        }
        let mut tape = Vec::new();
        assert_eq!(
            var_cell(&FieldValue::Missing, CellType::Str, &mut tape),
            CellBits::MISSING
        );
        assert!(tape.is_empty());
    }

    #[test]
    fn test_var_str_targets() {
        let mut tape = Vec::new();
        assert_eq!(
            var_cell(&FieldValue::Bool(true), CellType::Str, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, b"true");

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Int(-7), CellType::Str, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, b"-7");

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Float(42.5), CellType::Str, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, b"42.5");

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Str("exact".into()), CellType::Str, &mut tape),
            CellBits::EXACT
        );
        assert_eq!(tape, b"exact");

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Bin(vec![0xFF, 0xFE]), CellType::Str, &mut tape),
            CellBits::COLLIDED
        );
        assert!(tape.is_empty());

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Bin(b"utf8 ok".to_vec()), CellType::Str, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, b"utf8 ok");
    }

    #[test]
    fn test_var_bin_targets() {
        let mut tape = Vec::new();
        assert_eq!(
            var_cell(&FieldValue::Int(1), CellType::Bin, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, 1i64.to_le_bytes());

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Float(1.5), CellType::Bin, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, 1.5f64.to_le_bytes());

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Bool(true), CellType::Bin, &mut tape),
            CellBits::CONVERTED
        );
        assert_eq!(tape, [1u8]);

        tape.clear();
        assert_eq!(
            var_cell(&FieldValue::Bin(vec![9, 8]), CellType::Bin, &mut tape),
            CellBits::EXACT
        );
        assert_eq!(tape, [9u8, 8]);
    }
}
