//! Purpose: Capability views over a live mapping's bytes.
//! Exports: `DataView`, `WritableView`.
//! Role: What the engine hands out instead of raw pointers.
//! Invariants: A view keeps its region mapped for as long as it exists.
//! Invariants: Writes through a view are refused once its identity is destroyed.
//! Invariants: Safe reads copy out; in-place slices are `unsafe` because any writable
//! view of the same file (or another process) may change the bytes underneath.
//! Notes: Overlapping concurrent writers are the caller's concern, as with any shared mapping.
use std::fmt;
use std::sync::Arc;

use crate::core::error::{Error, ErrorKind};
use crate::core::region::check_range;
use crate::core::registry::{Mapping, MappingId};

pub struct DataView {
    mapping: Arc<Mapping>,
}

impl DataView {
    pub(crate) fn new(mapping: Arc<Mapping>) -> Self {
        Self { mapping }
    }

    pub fn id(&self) -> MappingId {
        self.mapping.id()
    }

    /// False once the identity has been destroyed; the bytes stay readable.
    pub fn is_live(&self) -> bool {
        !self.mapping.is_released()
    }

    pub fn len(&self) -> usize {
        self.mapping.region().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.mapping.region().as_ptr()
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.mapping.region().read_at(offset, buf)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.mapping.region().to_vec()
    }

    /// # Safety
    ///
    /// Nothing may write the mapped bytes while the returned slice is alive:
    /// no `WritableView` of this or any other mapping of the same file, and
    /// no other process sharing the file.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { self.mapping.region().as_slice() }
    }
}

impl fmt::Debug for DataView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataView")
            .field("id", &self.id())
            .field("len", &self.len())
            .field("live", &self.is_live())
            .finish()
    }
}

pub struct WritableView {
    mapping: Arc<Mapping>,
    ptr: *mut u8,
}

// SAFETY: `ptr` points into the region owned by `mapping`, which is Send + Sync
// and stays mapped while this view holds the Arc. Every access through `ptr`
// is a raw copy or sits behind an `unsafe fn`.
unsafe impl Send for WritableView {}
unsafe impl Sync for WritableView {}

impl WritableView {
    pub(crate) fn new(mapping: Arc<Mapping>) -> Result<Self, Error> {
        let ptr = mapping.region().as_mut_ptr().ok_or_else(|| {
            Error::new(ErrorKind::InvalidArgument)
                .with_message("mapping is read-only")
                .with_hint("Create the mapping with read-write access to obtain writable data.")
        })?;
        Ok(Self { mapping, ptr })
    }

    pub fn id(&self) -> MappingId {
        self.mapping.id()
    }

    pub fn is_live(&self) -> bool {
        !self.mapping.is_released()
    }

    pub fn len(&self) -> usize {
        self.mapping.region().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<(), Error> {
        self.mapping.region().read_at(offset, buf)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.mapping.region().to_vec()
    }

    /// # Safety
    ///
    /// Nothing may write the mapped bytes while the returned slice is alive,
    /// including other views of the same file and other processes.
    pub unsafe fn as_slice(&self) -> &[u8] {
        unsafe { self.mapping.region().as_slice() }
    }

    /// # Safety
    ///
    /// No other view may read or write the same bytes while the returned
    /// slice is alive, in this process or any other sharing the file.
    pub unsafe fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr, self.len()) }
    }

    /// Copy `bytes` into the mapping at `offset` (relative to the mapped range).
    pub fn write_at(&mut self, offset: usize, bytes: &[u8]) -> Result<(), Error> {
        if !self.is_live() {
            return Err(Error::new(ErrorKind::InvalidHandle)
                .with_message(format!("mapping {} was destroyed", self.id())));
        }
        check_range(offset, bytes.len(), self.len(), "write")?;
        // SAFETY: bounds checked above; the region is live while `self.mapping` is held.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.ptr.add(offset), bytes.len());
        }
        Ok(())
    }
}

impl fmt::Debug for WritableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WritableView")
            .field("id", &self.id())
            .field("len", &self.len())
            .field("live", &self.is_live())
            .finish()
    }
}
