use byteorder::{ByteOrder, LittleEndian};
use std::cmp::Ordering;

use crate::CzError;

fn field(buf: &[u8], offset: usize, width: usize) -> Result<&[u8], CzError> {
    offset
        .checked_add(width)
        .and_then(|end| buf.get(offset..end))
        .ok_or(CzError::FieldOutOfBounds {
            offset,
            width,
            len: buf.len(),
        })
}

pub fn read_u8(buf: &[u8], offset: usize) -> Result<u8, CzError> {
    Ok(field(buf, offset, 1)?[0])
}

pub fn read_u32(buf: &[u8], offset: usize) -> Result<u32, CzError> {
    Ok(LittleEndian::read_u32(field(buf, offset, 4)?))
}

pub fn read_i32(buf: &[u8], offset: usize) -> Result<i32, CzError> {
    Ok(LittleEndian::read_i32(field(buf, offset, 4)?))
}

/// Low 24 bits of a little-endian `u32`.
pub fn read_u24(buf: &[u8], offset: usize) -> Result<u32, CzError> {
    Ok(read_u32(buf, offset)? & 0x00FF_FFFF)
}

/// Compare two byte slices for the first `length` bytes as unsigned values.
///
/// Bytes past the end of the shorter slice are not compared, so equal prefixes compare equal.
///
/// 按无符号字节比较两个切片的前 `length` 字节。
pub fn compare_bytes(a: &[u8], b: &[u8], length: usize) -> Ordering {
    let n = length.min(a.len()).min(b.len());
    a[..n].cmp(&b[..n])
}

/// Drop every character outside printable ASCII (32..=126).
pub fn strip_non_printable(s: &str) -> String {
    s.chars().filter(|c| matches!(c, ' '..='~')).collect()
}
