//! # CZDB Search Library
//!
//! A Rust library for decoding encrypted CZDB IP geolocation databases and answering
//! point lookups ("which region does this IP belong to?").
//!
//! ## Features
//! - Supports both IPv4 and IPv6 databases.
//! - Two-level binary search: a sparse header index selects an index block, then fixed-size
//!   range records inside that block are searched.
//! - Two interchangeable data-access modes: a lazily loaded in-memory buffer (`Memory`) or
//!   positional reads against the open file (`BTree`). Both are safe to share between threads.
//! - Optional memory-mapped file support (`mmap` feature).
//! - Load-time irregularities are reported through an injected [`Observer`] instead of global
//!   state; the default observer forwards to the `log` crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use czdb_search::{SearchMode, Searcher};
//!
//! let searcher = Searcher::open("path/to/file.czdb", "your_base64_key", SearchMode::BTree)?;
//! println!("{}", searcher.search("8.8.8.8")?);
//! ```
//!
//! Finer control goes through [`OpenOptions`]:
//!
//! ```rust,ignore
//! use czdb_search::{OpenOptions, SearchMode};
//!
//! let searcher = OpenOptions::new()
//!     .mode(SearchMode::Memory)
//!     .verify_license(true)
//!     .open("path/to/file.czdb", "your_base64_key")?;
//! ```
//!
//! ## Error Handling
//! Every failure is a [`CzError`]; [`CzError::kind`] groups them into I/O failures, format
//! corruption, invalid query input and license failures. An address that no range covers is
//! not an error: [`Searcher::lookup`] returns `Ok(None)` and [`Searcher::search`] returns
//! [`NOT_FOUND`].
//!
//! # 纯真 CZDB 查询库
//!
//! 用于解码加密的 CZDB IP 地理位置数据库并执行单点查询的 Rust 库。
//!
//! ## 功能
//! - 支持 IPv4 与 IPv6 数据库。
//! - 两级二分查找：先在稀疏头部索引中定位索引块，再在块内查找定长区间记录。
//! - 两种数据访问模式：懒加载的内存缓冲（`Memory`）或基于文件定位读取（`BTree`），均可多线程共享。
//! - 可选的 mmap 支持（`mmap` feature）。
//! - 加载过程中的告警通过注入的 [`Observer`] 上报，默认转发至 `log`。

use std::net::IpAddr;

mod bytes;
mod config;
mod crypto;
mod header;
mod meta;
mod observer;
mod region;
mod search;
mod searcher;
mod source;

pub use bytes::compare_bytes;
pub use config::{OpenOptions, SearchMode};
pub use crypto::{aes_decrypt_ecb, decode_aes_key, xor_decrypt};
pub use header::{DecryptedSecret, HyperHeader};
pub use meta::{DbType, IndexHeaderEntry, SuperBlock};
pub use observer::{LoadWarning, LogObserver, NullObserver, Observer};
pub use search::IndexRecord;
pub use searcher::{DbInfo, Searcher};

/// Result returned by [`search`] and [`Searcher::search`] when no range covers the address.
///
/// 未命中任何区间时返回的字符串。
pub const NOT_FOUND: &str = "IP not found";

/// Errors raised while opening or querying a CZDB database.
#[derive(Debug, thiserror::Error)]
pub enum CzError {
    #[error("Failed to read the database file: {0}")]
    DatabaseFileReadError(#[from] std::io::Error),
    #[error("Failed to decode the key from base64: {0}")]
    KeyDecodingError(#[from] base64::DecodeError),
    #[error("Invalid AES key length: {0} bytes (expected 16, 24 or 32)")]
    InvalidAesKeyLength(usize),
    #[error("Ciphertext length {0} is not a multiple of the AES block size")]
    MisalignedCiphertext(usize),
    #[error("Invalid encrypted block size: {0}")]
    InvalidBlockSize(i32),
    #[error("Decrypted secret too small: {0} bytes")]
    TruncatedSecret(usize),
    #[error("Invalid random padding size: {0}")]
    InvalidPaddingSize(i32),
    #[error("Invalid header block size: {0}")]
    InvalidHeaderBlockSize(i32),
    #[error("Invalid end index pointer: {0}")]
    InvalidIndexPointer(i32),
    #[error("Truncated read at offset {offset}: wanted {expected} bytes, got {actual}")]
    TruncatedRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("Truncated index block at offset {offset}: wanted {expected} bytes, got {actual}")]
    TruncatedIndex {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    #[error("Field of {width} bytes at offset {offset} exceeds buffer of {len} bytes")]
    FieldOutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },
    #[error("Geo pointer out of bounds: ptr={ptr}, len={len}, size={size}")]
    GeoPointerOutOfBounds { ptr: usize, len: usize, size: usize },
    #[error("Invalid record pointer: ptr={ptr}, len={len}")]
    InvalidRecordPointer { ptr: usize, len: usize },
    #[error("Failed to decode region record: {0}")]
    RecordDecode(String),
    #[error("Invalid IP address: {0}")]
    InvalidIp(String),
    #[error("{ip} does not match the {expected} database")]
    AddressFamilyMismatch { expected: DbType, ip: IpAddr },
    #[error("Invalid client ID: header says {header}, secret says {secret}")]
    InvalidClientId { header: i32, secret: u32 },
    #[error("The database file expired on {0:06}")]
    DatabaseExpired(u32),
    #[error("The searcher has been closed")]
    Closed,
}

/// Coarse classification of [`CzError`] values.
///
/// 错误分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open, seek or read failures from the operating system.
    Io,
    /// The file contents are inconsistent with the format.
    FormatCorruption,
    /// The caller supplied a bad key, address or an already closed searcher.
    InvalidInput,
    /// The database belongs to another client or has expired.
    License,
}

impl CzError {
    /// Returns the category of this error.
    ///
    /// 返回错误所属类别。
    pub fn kind(&self) -> ErrorKind {
        match self {
            CzError::DatabaseFileReadError(_) => ErrorKind::Io,
            CzError::KeyDecodingError(_)
            | CzError::InvalidAesKeyLength(_)
            | CzError::InvalidIp(_)
            | CzError::AddressFamilyMismatch { .. }
            | CzError::Closed => ErrorKind::InvalidInput,
            CzError::InvalidClientId { .. } | CzError::DatabaseExpired(_) => ErrorKind::License,
            CzError::MisalignedCiphertext(_)
            | CzError::InvalidBlockSize(_)
            | CzError::TruncatedSecret(_)
            | CzError::InvalidPaddingSize(_)
            | CzError::InvalidHeaderBlockSize(_)
            | CzError::InvalidIndexPointer(_)
            | CzError::TruncatedRead { .. }
            | CzError::TruncatedIndex { .. }
            | CzError::FieldOutOfBounds { .. }
            | CzError::GeoPointerOutOfBounds { .. }
            | CzError::InvalidRecordPointer { .. }
            | CzError::RecordDecode(_) => ErrorKind::FormatCorruption,
        }
    }
}

/// Open a database file with default options and the given access mode.
///
/// 以默认选项和指定模式打开数据库文件。
pub fn open(db_path: &str, key: &str, mode: SearchMode) -> Result<Searcher, CzError> {
    Searcher::open(db_path, key, mode)
}

/// Look up an address given as text. Returns [`NOT_FOUND`] when no range covers it.
///
/// 查询文本形式的 IP 地址。
pub fn search(searcher: &Searcher, ip: &str) -> Result<String, CzError> {
    searcher.search(ip)
}

/// Release the searcher's file handle. Accepts `None` and already closed searchers.
///
/// 关闭查询器并释放文件句柄，可重复调用。
pub fn close(searcher: Option<&mut Searcher>) {
    if let Some(searcher) = searcher {
        searcher.close();
    }
}
