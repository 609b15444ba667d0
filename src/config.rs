use std::{fmt, path::Path, str::FromStr, sync::Arc};

use crate::{
    CzError, Searcher,
    observer::{LogObserver, Observer},
};

/// Upper bound on the geo section loaded into memory.
pub const DEFAULT_GEO_MAP_LIMIT: usize = 100_000_000;

/// How lookups reach the index and region data.
///
/// 数据访问模式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// Load everything after the headers into memory on the first query.
    Memory,
    /// Positional reads against the open file for every query.
    #[default]
    BTree,
    /// Memory-map the whole file.
    #[cfg(feature = "mmap")]
    Mmap,
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMode::Memory => write!(f, "Memory"),
            SearchMode::BTree => write!(f, "B-tree"),
            #[cfg(feature = "mmap")]
            SearchMode::Mmap => write!(f, "Mmap"),
        }
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(SearchMode::Memory),
            "btree" | "b-tree" => Ok(SearchMode::BTree),
            #[cfg(feature = "mmap")]
            "mmap" => Ok(SearchMode::Mmap),
            other => Err(format!("unknown search mode: {other}")),
        }
    }
}

/// Options for opening a database, in the style of [`std::fs::OpenOptions`].
///
/// 打开数据库的选项。
#[derive(Clone)]
pub struct OpenOptions {
    pub(crate) mode: SearchMode,
    pub(crate) geo_map_limit: usize,
    pub(crate) verify_license: bool,
    pub(crate) observer: Arc<dyn Observer>,
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("mode", &self.mode)
            .field("geo_map_limit", &self.geo_map_limit)
            .field("verify_license", &self.verify_license)
            .finish_non_exhaustive()
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::default(),
            geo_map_limit: DEFAULT_GEO_MAP_LIMIT,
            verify_license: false,
            observer: Arc::new(LogObserver),
        }
    }
}

impl OpenOptions {
    /// Default options: B-tree mode, 100 MB geo limit, no license check, `log` output.
    ///
    /// 默认选项。
    pub fn new() -> Self {
        Self::default()
    }

    /// Select how the index and region data are read.
    ///
    /// 设置数据访问模式。
    pub fn mode(&mut self, mode: SearchMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Cap on the decrypted geo section. Larger declared sizes are truncated with a warning.
    ///
    /// 地理数据区大小上限。
    pub fn geo_map_limit(&mut self, limit: usize) -> &mut Self {
        self.geo_map_limit = limit;
        self
    }

    /// Reject databases issued to another client id or past their expiration date.
    ///
    /// 校验客户端 ID 与有效期。
    pub fn verify_license(&mut self, verify: bool) -> &mut Self {
        self.verify_license = verify;
        self
    }

    /// Receive load-time warnings and debug messages.
    ///
    /// 设置加载过程观察者。
    pub fn observer(&mut self, observer: Arc<dyn Observer>) -> &mut Self {
        self.observer = observer;
        self
    }

    /// Open the database file at `path`.
    ///
    /// 打开指定路径的数据库文件。
    pub fn open<P: AsRef<Path>>(&self, path: P, key: &str) -> Result<Searcher, CzError> {
        Searcher::open_with(path.as_ref(), key, self)
    }

    /// Open a database image already held in memory. The mode is ignored.
    ///
    /// 从内存中的数据库字节打开。
    pub fn open_bytes(&self, data: Vec<u8>, key: &str) -> Result<Searcher, CzError> {
        Searcher::open_bytes_with(data, key, self)
    }
}
