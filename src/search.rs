//! Two-level range search: the sparse header index selects an index block, then the fixed-size
//! records inside that block are binary searched.
//!
//! All pointers are relative to the data offset (the start of the super block).

use std::cmp::Ordering;

use crate::{
    CzError,
    bytes::{compare_bytes, read_u8, read_u24},
    meta::{DbMeta, DbType, IndexHeaderEntry},
    source::DataSource,
};

/// Candidate index block. `eptr` is the offset of the last record to examine, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    pub sptr: u32,
    pub eptr: u32,
}

/// Leaf-level record mapping an address range to a region record.
///
/// IPv4 addresses occupy the first 4 bytes of each array.
///
/// 索引记录。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub start_ip: [u8; 16],
    pub end_ip: [u8; 16],
    pub data_ptr: u32,
    pub data_len: u8,
}

impl IndexRecord {
    /// Parse one `2 * width + 5` byte record.
    pub fn parse(bytes: &[u8], width: usize) -> Result<Self, CzError> {
        let data_ptr = read_u24(bytes, width * 2)?;
        let data_len = read_u8(bytes, width * 2 + 4)?;
        let mut start_ip = [0u8; 16];
        let mut end_ip = [0u8; 16];
        start_ip[..width].copy_from_slice(&bytes[..width]);
        end_ip[..width].copy_from_slice(&bytes[width..width * 2]);
        Ok(Self {
            start_ip,
            end_ip,
            data_ptr,
            data_len,
        })
    }
}

/// Binary search the header index for the block that may hold `ip`.
///
/// An exact match at `m` spans `ptr[m - 1]..=ptr[m]` (`ptr[0]..=ptr[0]` when `m == 0`);
/// otherwise the insertion point `l` spans `ptr[l - 1]..=ptr[l]`, and running off the end
/// spans the final block up to `last_record`. An address below the first entry has no block.
pub fn select_header_range(
    header: &[IndexHeaderEntry],
    ip: &[u8],
    width: usize,
    last_record: u32,
) -> Option<BlockSpan> {
    let mut l = 0usize;
    let mut h = header.len();
    while l < h {
        let m = (l + h) >> 1;
        match compare_bytes(ip, &header[m].start_ip, width) {
            Ordering::Less => h = m,
            Ordering::Greater => l = m + 1,
            Ordering::Equal => {
                return span(header[m.saturating_sub(1)].block_ptr, header[m].block_ptr);
            }
        }
    }

    if l == 0 {
        return None;
    }
    if l < header.len() {
        span(header[l - 1].block_ptr, header[l].block_ptr)
    } else {
        let sptr = header[header.len() - 1].block_ptr;
        span(sptr, last_record.max(sptr))
    }
}

fn span(sptr: u32, eptr: u32) -> Option<BlockSpan> {
    if sptr == 0 || eptr < sptr {
        return None;
    }
    Some(BlockSpan { sptr, eptr })
}

/// Read the records of `span` and binary search them for the range containing `ip`.
///
/// Reads are clamped to `index_end`, the end of the index region.
pub fn locate_record<S: DataSource + ?Sized>(
    source: &S,
    data_offset: u64,
    span: BlockSpan,
    ip: &[u8],
    db_type: DbType,
    index_end: u32,
) -> Result<Option<IndexRecord>, CzError> {
    let stride = db_type.index_block_len() as u64;
    let width = db_type.bytes_len();
    let sptr = u64::from(span.sptr);
    let end = (u64::from(span.eptr) + stride).min(u64::from(index_end).max(sptr + stride));
    let read_len = (end - sptr) as usize;

    let offset = data_offset + sptr;
    let buffer = source.read_at(offset, read_len).map_err(|e| match e {
        CzError::TruncatedRead {
            offset,
            expected,
            actual,
        } => CzError::TruncatedIndex {
            offset,
            expected,
            actual,
        },
        other => other,
    })?;

    let stride = stride as usize;
    let mut l = 0usize;
    let mut h = read_len / stride;
    while l < h {
        let m = (l + h) >> 1;
        let p = m * stride;
        let record = &buffer[p..p + stride];
        if compare_bytes(ip, &record[..width], width) == Ordering::Less {
            h = m;
        } else if compare_bytes(ip, &record[width..width * 2], width) == Ordering::Greater {
            l = m + 1;
        } else {
            return IndexRecord::parse(record, width).map(Some);
        }
    }

    Ok(None)
}

/// Check a matched record's pointer and read its region bytes.
///
/// Pointers are validated against the geo section when one is loaded, otherwise against the
/// data section.
pub fn read_region_bytes<'a, S: DataSource + ?Sized>(
    source: &'a S,
    meta: &DbMeta,
    record: &IndexRecord,
) -> Result<std::borrow::Cow<'a, [u8]>, CzError> {
    let ptr = record.data_ptr as usize;
    let len = record.data_len as usize;
    if ptr == 0 || len == 0 {
        return Err(CzError::InvalidRecordPointer { ptr, len });
    }
    let size = if meta.geo.data.is_empty() {
        usize::try_from(source.size().saturating_sub(meta.data_offset)).unwrap_or(usize::MAX)
    } else {
        meta.geo.data.len()
    };
    if ptr + len > size {
        return Err(CzError::GeoPointerOutOfBounds { ptr, len, size });
    }
    source.read_at(meta.data_offset + ptr as u64, len)
}

/// Resolve `ip` (already `width` bytes long) to a matching index record.
///
/// 定位 IP 所在的索引记录。
pub fn find_record<S: DataSource + ?Sized>(
    source: &S,
    meta: &DbMeta,
    ip: &[u8],
) -> Result<Option<IndexRecord>, CzError> {
    let db_type = meta.db_type();
    let Some(span) = select_header_range(
        &meta.header,
        ip,
        db_type.bytes_len(),
        meta.super_block.end_index_ptr as u32,
    ) else {
        return Ok(None);
    };
    locate_record(
        source,
        meta.data_offset,
        span,
        ip,
        db_type,
        meta.super_block.index_end(),
    )
}
