// File region mapping over memmap2: open by path or borrowed descriptor, map, flush.
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{MmapOptions, MmapRaw};
use serde::Serialize;

use crate::core::error::{Error, ErrorKind, io_error_kind, map_error_kind};

#[cfg(unix)]
pub type RawDescriptor = std::os::fd::RawFd;
#[cfg(windows)]
pub type RawDescriptor = std::os::windows::io::RawHandle;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum AccessMode {
    ReadOnly = 0,
    ReadWrite = 1,
}

impl AccessMode {
    pub fn from_code(code: i32) -> Result<Self, Error> {
        match code {
            0 => Ok(AccessMode::ReadOnly),
            1 => Ok(AccessMode::ReadWrite),
            other => Err(Error::new(ErrorKind::InvalidArgument)
                .with_message(format!("invalid access mode {other}"))
                .with_hint("Use 0 for read-only or 1 for read-write.")),
        }
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ReadWrite)
    }
}

/// Where a mapping's bytes come from.
///
/// A descriptor is borrowed: the region maps a duplicate of it, and the
/// caller keeps sole responsibility for closing the original.
#[derive(Clone, Debug)]
pub enum Source {
    Path(PathBuf),
    Descriptor(RawDescriptor),
}

impl Source {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Source::Path(path.into())
    }

    fn path_ref(&self) -> Option<&Path> {
        match self {
            Source::Path(path) => Some(path),
            Source::Descriptor(_) => None,
        }
    }

    fn contextualize(&self, err: Error) -> Error {
        match self.path_ref() {
            Some(path) => err.with_path(path),
            None => err,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => write!(f, "{}", path.display()),
            Source::Descriptor(descriptor) => write!(f, "descriptor:{descriptor:?}"),
        }
    }
}

/// One live OS mapping of `[offset, offset + len)` of a file.
///
/// The mapping is released exactly once, when the region is dropped. The
/// same file may be written at any time through another region or another
/// process, so bytes leave the region as copies or raw pointers only.
pub struct Region {
    map: MmapRaw,
    mode: AccessMode,
    offset: u64,
    len: usize,
    total_size: u64,
    _file: File,
}

impl Region {
    /// Map `length` bytes starting at `offset`; a `length` of zero maps the
    /// remainder of the file.
    pub fn open(source: &Source, mode: AccessMode, offset: u64, length: u64) -> Result<Self, Error> {
        let file = open_source(source, mode).map_err(|err| source.contextualize(err))?;
        let metadata = file.metadata().map_err(|err| {
            source.contextualize(
                Error::new(io_error_kind(&err))
                    .with_message("failed to stat file")
                    .with_source(err),
            )
        })?;
        if metadata.is_dir() {
            return Err(source.contextualize(
                Error::new(ErrorKind::InvalidArgument).with_message("cannot map a directory"),
            ));
        }
        let total_size = metadata.len();
        let len = resolve_len(total_size, offset, length).map_err(|err| source.contextualize(err))?;

        let mut options = MmapOptions::new();
        options.offset(offset).len(len);
        let map = match mode {
            AccessMode::ReadOnly => options.map_raw_read_only(&file),
            AccessMode::ReadWrite => options.map_raw(&file),
        }
        .map_err(|err| {
            source.contextualize(
                Error::new(map_error_kind(&err))
                    .with_message("mmap failed")
                    .with_offset(offset)
                    .with_source(err),
            )
        })?;

        Ok(Self {
            map,
            mode,
            offset,
            len,
            total_size,
            _file: file,
        })
    }

    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Span covered by the OS mapping, measured from the page-aligned start.
    pub fn mapped_len(&self) -> usize {
        self.len + alignment_slack(self.offset)
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.map.as_ptr()
    }

    /// `None` for read-only regions.
    pub fn as_mut_ptr(&self) -> Option<*mut u8> {
        self.mode.is_writable().then(|| self.map.as_mut_ptr())
    }

    /// Borrow the mapped bytes in place.
    ///
    /// # Safety
    ///
    /// Nothing may write these bytes while the returned slice is alive: not
    /// a writable view of this or any other mapping of the same file, and
    /// not another process sharing the file.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.map.as_ptr(), self.len) }
    }

    /// Copy `buf.len()` bytes starting at `offset` (relative to the region).
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        check_range(offset, buf.len(), self.len, "read")?;
        // SAFETY: bounds checked above; the mapping lives as long as `self`
        // and `buf` cannot overlap it.
        unsafe {
            std::ptr::copy_nonoverlapping(self.map.as_ptr().add(offset), buf.as_mut_ptr(), buf.len());
        }
        Ok(())
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.len];
        // SAFETY: `bytes` is exactly `len` long and the mapping lives as long as `self`.
        unsafe {
            std::ptr::copy_nonoverlapping(self.map.as_ptr(), bytes.as_mut_ptr(), self.len);
        }
        bytes
    }

    /// Flush dirty pages to the backing file. Read-only regions succeed trivially.
    pub fn flush(&self) -> Result<(), Error> {
        if !self.mode.is_writable() {
            return Ok(());
        }
        self.map.flush().map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("flush failed")
                .with_source(err)
        })
    }

    pub fn flush_range(&self, offset: usize, len: usize) -> Result<(), Error> {
        check_range(offset, len, self.len, "flush")?;
        if !self.mode.is_writable() {
            return Ok(());
        }
        self.map.flush_range(offset, len).map_err(|err| {
            Error::new(io_error_kind(&err))
                .with_message("flush failed")
                .with_offset(offset as u64)
                .with_source(err)
        })
    }
}

/// `[offset, offset + len)` must lie inside a mapping of `mapped` bytes.
pub(crate) fn check_range(offset: usize, len: usize, mapped: usize, op: &str) -> Result<(), Error> {
    let fits = offset.checked_add(len).is_some_and(|end| end <= mapped);
    if fits {
        return Ok(());
    }
    Err(Error::new(ErrorKind::InvalidArgument)
        .with_message(format!("{op} of {len} bytes at {offset} does not fit in {mapped} byte mapping"))
        .with_offset(offset as u64))
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("mode", &self.mode)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .field("total_size", &self.total_size)
            .finish()
    }
}

fn open_source(source: &Source, mode: AccessMode) -> Result<File, Error> {
    match source {
        Source::Path(path) => OpenOptions::new()
            .read(true)
            .write(mode.is_writable())
            .open(path)
            .map_err(|err| Error::new(io_error_kind(&err)).with_source(err)),
        Source::Descriptor(descriptor) => duplicate_descriptor(*descriptor),
    }
}

#[cfg(unix)]
fn duplicate_descriptor(fd: RawDescriptor) -> Result<File, Error> {
    use std::os::fd::BorrowedFd;

    if fd < 0 {
        return Err(Error::new(ErrorKind::InvalidArgument).with_message("descriptor is negative"));
    }
    // SAFETY: F_GETFD only inspects the descriptor table.
    if unsafe { libc::fcntl(fd, libc::F_GETFD) } == -1 {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("descriptor {fd} is not open")));
    }
    // SAFETY: the caller guarantees `fd` stays open for this call; it is only
    // borrowed long enough to duplicate it.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let owned = borrowed.try_clone_to_owned().map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message(format!("failed to duplicate descriptor {fd}"))
            .with_source(err)
    })?;
    Ok(File::from(owned))
}

#[cfg(windows)]
fn duplicate_descriptor(handle: RawDescriptor) -> Result<File, Error> {
    use std::os::windows::io::BorrowedHandle;

    if handle.is_null() || handle as isize == -1 {
        return Err(Error::new(ErrorKind::InvalidArgument).with_message("handle is invalid"));
    }
    // SAFETY: the caller guarantees `handle` stays open for this call; it is
    // only borrowed long enough to duplicate it.
    let borrowed = unsafe { BorrowedHandle::borrow_raw(handle) };
    let owned = borrowed.try_clone_to_owned().map_err(|err| {
        Error::new(io_error_kind(&err))
            .with_message("failed to duplicate handle")
            .with_source(err)
    })?;
    Ok(File::from(owned))
}

fn resolve_len(total_size: u64, offset: u64, length: u64) -> Result<usize, Error> {
    if total_size == 0 {
        return Err(Error::new(ErrorKind::InvalidArgument).with_message("file is empty"));
    }
    if offset >= total_size {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message("offset is past end of file")
            .with_offset(offset));
    }
    let len = if length == 0 { total_size - offset } else { length };
    let end = offset.checked_add(len).ok_or_else(|| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("range overflows")
            .with_offset(offset)
    })?;
    if end > total_size {
        return Err(Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("range ends at {end} but file is {total_size} bytes"))
            .with_offset(offset));
    }
    usize::try_from(len).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("range does not fit in the address space")
            .with_source(err)
    })
}

#[cfg(unix)]
pub fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 { size as usize } else { 4096 }
}

#[cfg(unix)]
fn alignment_slack(offset: u64) -> usize {
    (offset % page_size() as u64) as usize
}

#[cfg(not(unix))]
fn alignment_slack(_offset: u64) -> usize {
    0
}
