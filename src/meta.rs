use std::fmt;

use crate::{
    CzError,
    bytes::{read_i32, read_u8, read_u32},
    crypto::xor_decrypt,
    observer::{LoadWarning, Observer},
    source::DataSource,
};

pub const SUPER_PART_LENGTH: usize = 17;
pub const HEADER_BLOCK_LENGTH: usize = 20;
const HEADER_IP_LENGTH: usize = 16;

/// Database IP version type.
///
/// 数据库 IP 版本类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Ipv4,
    Ipv6,
}

impl DbType {
    /// Returns the index record length (`2 * width + 5`) for this database type.
    ///
    /// 返回该数据库类型的索引记录长度。
    pub fn index_block_len(&self) -> usize {
        self.bytes_len() * 2 + 5
    }

    /// Returns the IP byte length for this database type.
    ///
    /// 返回该数据库类型的 IP 字节长度。
    pub fn bytes_len(&self) -> usize {
        match self {
            DbType::Ipv4 => 4,
            DbType::Ipv6 => 16,
        }
    }
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Ipv4 => write!(f, "IPv4"),
            DbType::Ipv6 => write!(f, "IPv6"),
        }
    }
}

/// Fixed 17-byte record following the random padding.
///
/// Physical layout: `[type][db size][start index ptr][header block size][end index ptr]`.
///
/// 超级块。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuperBlock {
    pub db_type: DbType,
    pub db_size: i32,
    pub start_index_ptr: i32,
    pub header_block_size: i32,
    pub end_index_ptr: i32,
}

impl SuperBlock {
    /// Parse the 17-byte super block; the low bit of the type byte selects IPv6.
    ///
    /// 解析超级块。
    pub fn parse(bytes: &[u8]) -> Result<Self, CzError> {
        let db_type = if read_u8(bytes, 0)? & 1 == 0 {
            DbType::Ipv4
        } else {
            DbType::Ipv6
        };
        Ok(Self {
            db_type,
            db_size: read_i32(bytes, 1)?,
            start_index_ptr: read_i32(bytes, 5)?,
            header_block_size: read_i32(bytes, 9)?,
            end_index_ptr: read_i32(bytes, 13)?,
        })
    }

    /// Absolute end of the index region: one record past `end_index_ptr`.
    pub fn index_end(&self) -> u32 {
        self.end_index_ptr as u32 + self.db_type.index_block_len() as u32
    }
}

/// One entry of the sparse header index.
///
/// IPv4 start addresses occupy the first 4 bytes of the 16-byte slot.
///
/// 头部索引项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeaderEntry {
    pub start_ip: [u8; HEADER_IP_LENGTH],
    pub block_ptr: u32,
}

/// Scan the header block in 20-byte strides until a zero pointer or the end of the buffer.
pub fn parse_index_header(bytes: &[u8]) -> Vec<IndexHeaderEntry> {
    let mut entries = Vec::with_capacity(bytes.len() / HEADER_BLOCK_LENGTH);
    for chunk in bytes.chunks_exact(HEADER_BLOCK_LENGTH) {
        let block_ptr = u32::from_le_bytes([chunk[16], chunk[17], chunk[18], chunk[19]]);
        if block_ptr == 0 {
            break;
        }
        let mut start_ip = [0u8; HEADER_IP_LENGTH];
        start_ip.copy_from_slice(&chunk[..HEADER_IP_LENGTH]);
        entries.push(IndexHeaderEntry {
            start_ip,
            block_ptr,
        });
    }
    entries
}

/// Decrypted geo section plus the column selection mask that applies to it.
#[derive(Debug, Default)]
pub struct GeoMap {
    pub column_selection: u32,
    pub data: Vec<u8>,
}

impl GeoMap {
    /// Whether column `index` (0-based) is part of the output.
    pub fn column_selected(&self, index: usize) -> bool {
        u32::try_from(index + 1)
            .ok()
            .and_then(|shift| self.column_selection.checked_shr(shift))
            .is_some_and(|bits| bits & 1 == 1)
    }
}

/// Parsed metadata used for searching.
///
/// 查询所需的解析元数据。
#[derive(Debug)]
pub struct DbMeta {
    pub data_offset: u64,
    pub super_block: SuperBlock,
    pub header: Vec<IndexHeaderEntry>,
    pub geo: GeoMap,
}

impl DbMeta {
    /// Read the super block, header index and geo section starting at `data_offset`.
    ///
    /// 从超级块起解析元数据。
    pub fn load<S: DataSource + ?Sized>(
        source: &S,
        data_offset: u64,
        key_bytes: &[u8],
        geo_map_limit: usize,
        observer: &dyn Observer,
    ) -> Result<Self, CzError> {
        let super_bytes = source.read_at(data_offset, SUPER_PART_LENGTH)?;
        let super_block = SuperBlock::parse(&super_bytes)?;
        observer.debug(format_args!("parsed super block: {super_block:?}"));

        let real_size = source.size().saturating_sub(data_offset);
        if i64::from(super_block.db_size) != real_size as i64 {
            observer.warning(&LoadWarning::FileSizeMismatch {
                expected: i64::from(super_block.db_size),
                actual: real_size,
            });
        }

        if super_block.header_block_size <= 0 {
            return Err(CzError::InvalidHeaderBlockSize(super_block.header_block_size));
        }
        let header_block_size = super_block.header_block_size as usize;
        let header_bytes =
            source.read_up_to(data_offset + SUPER_PART_LENGTH as u64, header_block_size)?;
        if header_bytes.len() < header_block_size {
            observer.warning(&LoadWarning::ShortHeaderBlock {
                expected: header_block_size,
                actual: header_bytes.len(),
            });
        }
        let header = parse_index_header(&header_bytes);
        if header.is_empty() {
            observer.warning(&LoadWarning::EmptyHeaderIndex);
        }
        observer.debug(format_args!("header index has {} entries", header.len()));

        if super_block.end_index_ptr <= 0 {
            return Err(CzError::InvalidIndexPointer(super_block.end_index_ptr));
        }
        let geo = load_geo_map(
            source,
            data_offset + u64::from(super_block.index_end()),
            key_bytes,
            geo_map_limit,
            observer,
        )?;

        Ok(Self {
            data_offset,
            super_block,
            header,
            geo,
        })
    }

    /// Returns the database IP version.
    ///
    /// 返回数据库类型。
    pub fn db_type(&self) -> DbType {
        self.super_block.db_type
    }
}

fn load_geo_map<S: DataSource + ?Sized>(
    source: &S,
    column_selection_offset: u64,
    key_bytes: &[u8],
    limit: usize,
    observer: &dyn Observer,
) -> Result<GeoMap, CzError> {
    let column_selection = read_u32(&source.read_at(column_selection_offset, 4)?, 0)?;
    observer.debug(format_args!("column selection: {column_selection:#x}"));
    if column_selection == 0 {
        observer.warning(&LoadWarning::NoGeoMapping);
        return Ok(GeoMap::default());
    }

    let declared = read_i32(&source.read_at(column_selection_offset + 4, 4)?, 0)?;
    if declared <= 0 {
        observer.warning(&LoadWarning::EmptyGeoMap { declared });
        return Ok(GeoMap {
            column_selection,
            data: Vec::new(),
        });
    }
    let mut size = declared as usize;
    if size > limit {
        observer.warning(&LoadWarning::GeoMapTruncated {
            declared: size,
            limit,
        });
        size = limit;
    }

    let encrypted = source.read_up_to(column_selection_offset + 8, size)?;
    if encrypted.len() < size {
        observer.warning(&LoadWarning::ShortGeoMap {
            expected: size,
            actual: encrypted.len(),
        });
    }
    let data = xor_decrypt(&encrypted, key_bytes);
    observer.debug(format_args!("loaded and decrypted {} bytes of geo data", data.len()));

    Ok(GeoMap {
        column_selection,
        data,
    })
}
