use std::fmt;

/// Irregularities found while loading a database that do not prevent opening it.
///
/// 加载数据库时发现但不影响打开的异常。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    /// The super block's size field disagrees with the bytes after the data offset.
    FileSizeMismatch { expected: i64, actual: u64 },
    /// The file ended before the declared header block size.
    ShortHeaderBlock { expected: usize, actual: usize },
    /// The header block holds no usable entries; every lookup will miss.
    EmptyHeaderIndex,
    /// The column selection is zero, so lookups return only the fallback string.
    NoGeoMapping,
    /// The declared geo section size is zero or negative.
    EmptyGeoMap { declared: i32 },
    /// The declared geo section exceeds the configured limit and was truncated.
    GeoMapTruncated { declared: usize, limit: usize },
    /// The file ended before the declared geo section size.
    ShortGeoMap { expected: usize, actual: usize },
}

impl fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadWarning::FileSizeMismatch { expected, actual } => {
                write!(f, "db file size mismatch, expected [{expected}], real [{actual}]")
            }
            LoadWarning::ShortHeaderBlock { expected, actual } => {
                write!(f, "incomplete header block read: {actual} of {expected} bytes")
            }
            LoadWarning::EmptyHeaderIndex => write!(f, "header block contains no entries"),
            LoadWarning::NoGeoMapping => write!(f, "column selection is 0, not using geo mapping"),
            LoadWarning::EmptyGeoMap { declared } => {
                write!(f, "no geo data available (declared size {declared})")
            }
            LoadWarning::GeoMapTruncated { declared, limit } => {
                write!(f, "geo data size too large ({declared}), limiting to {limit} bytes")
            }
            LoadWarning::ShortGeoMap { expected, actual } => {
                write!(f, "read {actual} of {expected} bytes for geo data")
            }
        }
    }
}

/// Receives load-time warnings and debug messages from a searcher.
///
/// Passed in through [`crate::OpenOptions::observer`]; nothing is reported through global state.
///
/// 加载过程观察者。
pub trait Observer: Send + Sync {
    fn warning(&self, warning: &LoadWarning);

    fn debug(&self, _message: fmt::Arguments<'_>) {}
}

/// Forwards everything to the `log` crate. The default observer.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn warning(&self, warning: &LoadWarning) {
        log::warn!("{warning}");
    }

    fn debug(&self, message: fmt::Arguments<'_>) {
        log::debug!("{message}");
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn warning(&self, _warning: &LoadWarning) {}
}
