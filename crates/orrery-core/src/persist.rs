//! Binary persistence of leaf values.
//!
//! Layout: one tag byte followed by the payload in little-endian order.
//!
//! | tag | representation  | payload            |
//! |-----|-----------------|--------------------|
//! | 0   | `i64`           | 8 bytes            |
//! | 1   | `f32`           | 4 bytes            |
//! | 2   | `f64`           | 8 bytes            |
//! | 3   | `interval<f32>` | lo, hi (4 + 4)     |
//! | 4   | `interval<f64>` | lo, hi (8 + 8)     |
//!
//! Only leaves persist; composite expressions must first reduce to one.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use orrery_float::Interval;
use thiserror::Error;

use crate::leaf::Leaf;

const TAG_INT: u8 = 0;
const TAG_F32: u8 = 1;
const TAG_F64: u8 = 2;
const TAG_INTERVAL_F32: u8 = 3;
const TAG_INTERVAL_F64: u8 = 4;

/// Errors from reading or writing persisted values.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The tag byte names no representation.
    #[error("unknown representation tag {0}")]
    UnknownTag(u8),

    /// A float payload decoded to NaN.
    #[error("persisted value is NaN")]
    NotANumber,

    /// Interval bounds are out of order.
    #[error("persisted interval bounds are malformed")]
    Malformed,

    /// The expression has not reduced to a single leaf.
    #[error("expression is not fully reduced")]
    NotReduced,
}

/// Writes one leaf.
///
/// # Errors
///
/// Propagates I/O failures.
pub fn write_leaf<W: Write>(w: &mut W, leaf: &Leaf) -> Result<(), PersistError> {
    match *leaf {
        Leaf::Int(n) => {
            w.write_u8(TAG_INT)?;
            w.write_i64::<LittleEndian>(n)?;
        }
        Leaf::F32(x) => {
            w.write_u8(TAG_F32)?;
            w.write_f32::<LittleEndian>(x)?;
        }
        Leaf::F64(x) => {
            w.write_u8(TAG_F64)?;
            w.write_f64::<LittleEndian>(x)?;
        }
        Leaf::IntervalF32(iv) => {
            w.write_u8(TAG_INTERVAL_F32)?;
            w.write_f32::<LittleEndian>(iv.lo())?;
            w.write_f32::<LittleEndian>(iv.hi())?;
        }
        Leaf::IntervalF64(iv) => {
            w.write_u8(TAG_INTERVAL_F64)?;
            w.write_f64::<LittleEndian>(iv.lo())?;
            w.write_f64::<LittleEndian>(iv.hi())?;
        }
    }
    Ok(())
}

/// Reads one leaf.
///
/// # Errors
///
/// `UnknownTag`, `NotANumber` or `Malformed` for corrupt input; I/O
/// failures otherwise.
pub fn read_leaf<R: Read>(r: &mut R) -> Result<Leaf, PersistError> {
    let tag = r.read_u8()?;
    let leaf = match tag {
        TAG_INT => Leaf::Int(r.read_i64::<LittleEndian>()?),
        TAG_F32 => Leaf::F32(number(r.read_f32::<LittleEndian>()?)?),
        TAG_F64 => Leaf::F64(number(r.read_f64::<LittleEndian>()?)?),
        TAG_INTERVAL_F32 => {
            let lo = number(r.read_f32::<LittleEndian>()?)?;
            let hi = number(r.read_f32::<LittleEndian>()?)?;
            Leaf::IntervalF32(Interval::new(lo, hi).map_err(|_| PersistError::Malformed)?)
        }
        TAG_INTERVAL_F64 => {
            let lo = number(r.read_f64::<LittleEndian>()?)?;
            let hi = number(r.read_f64::<LittleEndian>()?)?;
            Leaf::IntervalF64(Interval::new(lo, hi).map_err(|_| PersistError::Malformed)?)
        }
        other => return Err(PersistError::UnknownTag(other)),
    };
    Ok(leaf)
}

fn number<T: num_traits::Float>(x: T) -> Result<T, PersistError> {
    if x.is_nan() {
        Err(PersistError::NotANumber)
    } else {
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_layout() {
        let mut buf = Vec::new();
        write_leaf(&mut buf, &Leaf::Int(-2)).unwrap();
        assert_eq!(buf[0], TAG_INT);
        assert_eq!(&buf[1..], &(-2i64).to_le_bytes());

        let mut buf = Vec::new();
        let iv = Interval::new(1.0f32, 2.0).unwrap();
        write_leaf(&mut buf, &Leaf::IntervalF32(iv)).unwrap();
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn test_stream_of_leaves() {
        let leaves = [
            Leaf::Int(i64::MIN),
            Leaf::F32(-0.5),
            Leaf::F64(f64::INFINITY),
            Leaf::IntervalF64(Interval::new(-1.0, 3.5).unwrap()),
        ];
        let mut buf = Vec::new();
        for leaf in &leaves {
            write_leaf(&mut buf, leaf).unwrap();
        }
        let mut cursor = Cursor::new(buf);
        for leaf in &leaves {
            assert_eq!(&read_leaf(&mut cursor).unwrap(), leaf);
        }
        assert!(matches!(read_leaf(&mut cursor), Err(PersistError::Io(_))));
    }

    #[test]
    fn test_corrupt_input() {
        let mut cursor = Cursor::new(vec![9u8]);
        assert!(matches!(read_leaf(&mut cursor), Err(PersistError::UnknownTag(9))));

        let mut bytes = vec![TAG_F64];
        bytes.extend_from_slice(&f64::NAN.to_le_bytes());
        assert!(matches!(
            read_leaf(&mut Cursor::new(bytes)),
            Err(PersistError::NotANumber)
        ));

        let mut bytes = vec![TAG_INTERVAL_F64];
        bytes.extend_from_slice(&2.0f64.to_le_bytes());
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        assert!(matches!(
            read_leaf(&mut Cursor::new(bytes)),
            Err(PersistError::Malformed)
        ));
    }
}
