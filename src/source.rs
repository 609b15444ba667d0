//! Uniform "read N bytes at an absolute offset" access to a database image.
//!
//! Every implementation reads without a shared cursor, so a single source can serve
//! concurrent lookups.

use once_cell::sync::OnceCell;
use std::{borrow::Cow, fs::File, io, path::Path};

#[cfg(feature = "mmap")]
use memmap2::{Mmap, MmapOptions};

use crate::CzError;

/// Positional read access to a database image.
///
/// 按绝对偏移读取数据库内容。
pub trait DataSource: Send + Sync {
    /// Total size in bytes, measured from the start of the file.
    fn size(&self) -> u64;

    /// Read up to `len` bytes at `offset`; fewer bytes are returned at the end of the data.
    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError>;

    /// Read exactly `len` bytes at `offset`.
    fn read_at(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        let bytes = self.read_up_to(offset, len)?;
        if bytes.len() < len {
            return Err(CzError::TruncatedRead {
                offset,
                expected: len,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }
}

fn clamp_len(available: u64, len: usize) -> usize {
    usize::try_from(available).map_or(len, |available| available.min(len))
}

fn slice_up_to(data: &[u8], base: u64, offset: u64, len: usize) -> &[u8] {
    let Some(start) = offset.checked_sub(base) else {
        return &[];
    };
    let Ok(start) = usize::try_from(start) else {
        return &[];
    };
    if start >= data.len() {
        return &[];
    }
    let end = start + len.min(data.len() - start);
    &data[start..end]
}

#[cfg(unix)]
fn read_once_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_once_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

fn read_full_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match read_once_at(file, &mut buf[filled..], offset + filled as u64) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A complete database image held in memory.
#[derive(Debug)]
pub struct BytesSource {
    data: Vec<u8>,
}

impl BytesSource {
    /// Wrap an image that starts at file offset zero.
    ///
    /// 包装从偏移 0 开始的内存数据。
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl DataSource for BytesSource {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        Ok(Cow::Borrowed(slice_up_to(&self.data, 0, offset, len)))
    }
}

/// Positional reads against an open file.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open `path` for positional reads.
    ///
    /// 打开文件用于定位读取。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CzError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl DataSource for FileSource {
    fn size(&self) -> u64 {
        self.len
    }

    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        let len = clamp_len(self.len.saturating_sub(offset), len);
        let mut buf = vec![0u8; len];
        let read = read_full_at(&self.file, &mut buf, offset)?;
        buf.truncate(read);
        Ok(Cow::Owned(buf))
    }
}

/// File-backed source whose content past `base` is loaded into memory on first use.
///
/// Reads before `base` (the headers) always go to the file.
#[derive(Debug)]
pub struct LazyMemorySource {
    file: FileSource,
    base: u64,
    data: OnceCell<Vec<u8>>,
}

impl LazyMemorySource {
    /// Serve offsets from `base` onward from a buffer filled on first use.
    ///
    /// 从 `base` 起的内容在首次访问时载入内存。
    pub fn new(file: FileSource, base: u64) -> Self {
        Self {
            file,
            base,
            data: OnceCell::new(),
        }
    }

    /// Returns true once the buffer has been materialized.
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    fn loaded(&self) -> Result<&[u8], CzError> {
        self.data
            .get_or_try_init(|| {
                let len = clamp_len(self.file.size().saturating_sub(self.base), usize::MAX);
                self.file
                    .read_up_to(self.base, len)
                    .map(Cow::into_owned)
            })
            .map(Vec::as_slice)
    }
}

impl DataSource for LazyMemorySource {
    fn size(&self) -> u64 {
        self.file.size()
    }

    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        if offset < self.base {
            return self.file.read_up_to(offset, len);
        }
        Ok(Cow::Borrowed(slice_up_to(self.loaded()?, self.base, offset, len)))
    }
}

/// Read-only memory map of the whole file.
#[cfg(feature = "mmap")]
#[derive(Debug)]
pub struct MmapSource {
    mmap: Mmap,
}

#[cfg(feature = "mmap")]
impl MmapSource {
    /// Map the whole file read-only.
    ///
    /// 只读映射整个文件。
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CzError> {
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Ok(Self { mmap })
    }
}

#[cfg(feature = "mmap")]
impl DataSource for MmapSource {
    fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        Ok(Cow::Borrowed(slice_up_to(&self.mmap, 0, offset, len)))
    }
}

/// The concrete source owned by a searcher.
#[derive(Debug)]
pub enum Backend {
    Bytes(BytesSource),
    File(FileSource),
    Memory(LazyMemorySource),
    #[cfg(feature = "mmap")]
    Mmap(MmapSource),
}

impl DataSource for Backend {
    fn size(&self) -> u64 {
        match self {
            Backend::Bytes(s) => s.size(),
            Backend::File(s) => s.size(),
            Backend::Memory(s) => s.size(),
            #[cfg(feature = "mmap")]
            Backend::Mmap(s) => s.size(),
        }
    }

    fn read_up_to(&self, offset: u64, len: usize) -> Result<Cow<'_, [u8]>, CzError> {
        match self {
            Backend::Bytes(s) => s.read_up_to(offset, len),
            Backend::File(s) => s.read_up_to(offset, len),
            Backend::Memory(s) => s.read_up_to(offset, len),
            #[cfg(feature = "mmap")]
            Backend::Mmap(s) => s.read_up_to(offset, len),
        }
    }
}
