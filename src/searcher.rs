use std::{fmt, net::IpAddr, path::Path};

use crate::{
    CzError, NOT_FOUND,
    config::{OpenOptions, SearchMode},
    crypto::decode_aes_key,
    header::HyperHeader,
    meta::{DbMeta, DbType, SuperBlock},
    region::decode_region,
    search::{IndexRecord, find_record, read_region_bytes},
    source::{Backend, BytesSource, DataSource, FileSource, LazyMemorySource},
};

#[cfg(feature = "mmap")]
use crate::source::MmapSource;

/// A long-lived lookup session over one database.
///
/// Queries take `&self` and may run concurrently from several threads in every mode.
///
/// CZDB 查询器，可在多线程间共享。
#[derive(Debug)]
pub struct Searcher {
    backend: Option<Backend>,
    mode: SearchMode,
    header: HyperHeader,
    meta: DbMeta,
}

fn init<S: DataSource + ?Sized>(
    source: &S,
    key_bytes: &[u8],
    options: &OpenOptions,
) -> Result<(HyperHeader, DbMeta), CzError> {
    let header = HyperHeader::read(source, key_bytes)?;
    if options.verify_license {
        header.verify_license(chrono::Local::now().date_naive())?;
    }
    let data_offset = header.data_offset();
    options.observer.debug(format_args!(
        "hyper header: version={}, client id={}, data offset={data_offset}",
        header.version, header.client_id
    ));
    let meta = DbMeta::load(
        source,
        data_offset,
        key_bytes,
        options.geo_map_limit,
        options.observer.as_ref(),
    )?;
    Ok((header, meta))
}

impl Searcher {
    /// Open a database file with default options.
    ///
    /// 以默认选项打开数据库文件。
    pub fn open<P: AsRef<Path>>(db_path: P, key: &str, mode: SearchMode) -> Result<Self, CzError> {
        OpenOptions::new().mode(mode).open(db_path, key)
    }

    /// Build a searcher over a complete database image held in memory.
    ///
    /// 从内存中的完整数据库字节构建查询器。
    pub fn open_bytes(data: Vec<u8>, key: &str) -> Result<Self, CzError> {
        OpenOptions::new().open_bytes(data, key)
    }

    pub(crate) fn open_with(
        db_path: &Path,
        key: &str,
        options: &OpenOptions,
    ) -> Result<Self, CzError> {
        let key_bytes = decode_aes_key(key)?;
        let (backend, header, meta) = match options.mode {
            SearchMode::BTree => {
                let file = FileSource::open(db_path)?;
                let (header, meta) = init(&file, &key_bytes, options)?;
                (Backend::File(file), header, meta)
            }
            SearchMode::Memory => {
                let file = FileSource::open(db_path)?;
                let (header, meta) = init(&file, &key_bytes, options)?;
                let source = LazyMemorySource::new(file, meta.data_offset);
                (Backend::Memory(source), header, meta)
            }
            #[cfg(feature = "mmap")]
            SearchMode::Mmap => {
                let mmap = MmapSource::open(db_path)?;
                let (header, meta) = init(&mmap, &key_bytes, options)?;
                (Backend::Mmap(mmap), header, meta)
            }
        };
        Ok(Self {
            backend: Some(backend),
            mode: options.mode,
            header,
            meta,
        })
    }

    pub(crate) fn open_bytes_with(
        data: Vec<u8>,
        key: &str,
        options: &OpenOptions,
    ) -> Result<Self, CzError> {
        let key_bytes = decode_aes_key(key)?;
        let backend = Backend::Bytes(BytesSource::new(data));
        let (header, meta) = init(&backend, &key_bytes, options)?;
        Ok(Self {
            backend: Some(backend),
            mode: SearchMode::Memory,
            header,
            meta,
        })
    }

    fn backend(&self) -> Result<&Backend, CzError> {
        self.backend.as_ref().ok_or(CzError::Closed)
    }

    fn ip_bytes(&self, ip: IpAddr) -> Result<Vec<u8>, CzError> {
        match (self.meta.db_type(), ip) {
            (DbType::Ipv4, IpAddr::V4(v4)) => Ok(v4.octets().to_vec()),
            (DbType::Ipv4, IpAddr::V6(v6)) => v6
                .to_ipv4_mapped()
                .map(|v4| v4.octets().to_vec())
                .ok_or(CzError::AddressFamilyMismatch {
                    expected: DbType::Ipv4,
                    ip,
                }),
            (DbType::Ipv6, IpAddr::V6(v6)) => Ok(v6.octets().to_vec()),
            (DbType::Ipv6, IpAddr::V4(_)) => Err(CzError::AddressFamilyMismatch {
                expected: DbType::Ipv6,
                ip,
            }),
        }
    }

    /// Find the index record covering `ip`, without decoding its region.
    ///
    /// 查找覆盖该 IP 的索引记录。
    pub fn locate(&self, ip: IpAddr) -> Result<Option<IndexRecord>, CzError> {
        let backend = self.backend()?;
        let ip_bytes = self.ip_bytes(ip)?;
        find_record(backend, &self.meta, &ip_bytes)
    }

    /// Resolve `ip` to its region string, or `None` when no range covers it.
    ///
    /// 查询 IP 对应的地区字符串，未命中返回 `None`。
    pub fn lookup(&self, ip: IpAddr) -> Result<Option<String>, CzError> {
        let backend = self.backend()?;
        let ip_bytes = self.ip_bytes(ip)?;
        let Some(record) = find_record(backend, &self.meta, &ip_bytes)? else {
            return Ok(None);
        };
        let region_bytes = read_region_bytes(backend, &self.meta, &record)?;
        decode_region(&region_bytes, &self.meta.geo).map(Some)
    }

    /// Look up an address given as text; returns [`NOT_FOUND`] when no range covers it.
    ///
    /// 查询文本形式的 IP，未命中返回 [`NOT_FOUND`]。
    pub fn search(&self, ip: &str) -> Result<String, CzError> {
        let ip: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| CzError::InvalidIp(ip.to_string()))?;
        Ok(self.lookup(ip)?.unwrap_or_else(|| NOT_FOUND.to_string()))
    }

    /// Search a small batch of IP addresses.
    ///
    /// 批量查询 IP。
    pub fn search_many(&self, ips: &[IpAddr]) -> Vec<Result<Option<String>, CzError>> {
        ips.iter().map(|ip| self.lookup(*ip)).collect()
    }

    /// Release the file handle or buffer. Further queries fail with [`CzError::Closed`].
    ///
    /// 关闭查询器，可重复调用。
    pub fn close(&mut self) {
        self.backend = None;
    }

    /// Returns true after [`Searcher::close`].
    ///
    /// 查询器是否已关闭。
    pub fn is_closed(&self) -> bool {
        self.backend.is_none()
    }

    /// Returns the database IP version.
    ///
    /// 返回数据库类型（IPv4 或 IPv6）。
    pub fn db_type(&self) -> DbType {
        self.meta.db_type()
    }

    /// Returns the data access mode this searcher was opened with.
    ///
    /// 返回数据访问模式。
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Returns the decrypted hyper header.
    ///
    /// 返回解密后的超头。
    pub fn hyper_header(&self) -> &HyperHeader {
        &self.header
    }

    /// Returns the parsed super block.
    ///
    /// 返回超级块。
    pub fn super_block(&self) -> &SuperBlock {
        &self.meta.super_block
    }

    /// Summary of the parsed headers.
    ///
    /// 数据库信息摘要。
    pub fn info(&self) -> DbInfo {
        DbInfo {
            db_type: self.meta.db_type(),
            mode: self.mode,
            version: self.header.version,
            client_id: self.header.client_id,
            expiration_date: self.header.secret.expiration_date,
            data_offset: self.meta.data_offset,
            start_index_ptr: self.meta.super_block.start_index_ptr,
            end_index_ptr: self.meta.super_block.end_index_ptr,
            header_block_size: self.meta.super_block.header_block_size,
            header_entries: self.meta.header.len(),
            column_selection: self.meta.geo.column_selection,
            geo_map_size: self.meta.geo.data.len(),
            loaded: match &self.backend {
                Some(Backend::Memory(source)) => source.is_loaded(),
                Some(Backend::File(_)) | None => false,
                Some(_) => true,
            },
        }
    }
}

/// Parsed header summary of an open database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInfo {
    pub db_type: DbType,
    pub mode: SearchMode,
    pub version: i32,
    pub client_id: i32,
    pub expiration_date: u32,
    pub data_offset: u64,
    pub start_index_ptr: i32,
    pub end_index_ptr: i32,
    pub header_block_size: i32,
    pub header_entries: usize,
    pub column_selection: u32,
    pub geo_map_size: usize,
    /// Whether the index and region data are already in memory.
    pub loaded: bool,
}

impl fmt::Display for DbInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IP Type: {}", self.db_type)?;
        writeln!(f, "Search Type: {}", self.mode)?;
        writeln!(f, "Version: {}", self.version)?;
        writeln!(f, "Client ID: {}", self.client_id)?;
        writeln!(f, "Expiration Date: {:06}", self.expiration_date)?;
        writeln!(f, "Data Offset: {}", self.data_offset)?;
        writeln!(f, "Start Index Pointer: {}", self.start_index_ptr)?;
        writeln!(f, "End Index Pointer: {}", self.end_index_ptr)?;
        writeln!(f, "Header Block Size: {}", self.header_block_size)?;
        writeln!(f, "BTree Header Length: {}", self.header_entries)?;
        writeln!(f, "Column Selection: {:#x}", self.column_selection)?;
        write!(f, "Geo Map Data Size: {} bytes", self.geo_map_size)
    }
}
