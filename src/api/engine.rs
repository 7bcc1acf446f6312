// Rust-facing boundary: one owned registry plus the mapping operations over it.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::view::{DataView, WritableView};
use crate::core::catalog;
use crate::core::error::{Error, ErrorKind};
use crate::core::region::{AccessMode, RawDescriptor, Region, Source};
use crate::core::registry::{MappingId, Registry};

/// Snapshot of a live mapping, suitable for JSON output.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct MappingInfo {
    pub id: MappingId,
    pub access: AccessMode,
    pub source: String,
    pub offset: u64,
    pub size: u64,
    pub mapped_length: u64,
    pub file_size: u64,
}

/// Owns the handle registry. Every operation that takes a [`MappingId`]
/// resolves it first and fails with `InvalidHandle` before touching the
/// mapping.
#[derive(Default)]
pub struct MapEngine {
    registry: Registry,
}

impl MapEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        source: Source,
        mode: AccessMode,
        offset: u64,
        length: u64,
    ) -> Result<MappingId, Error> {
        let region = Region::open(&source, mode, offset, length)?;
        let len = region.len();
        let mapping = self.registry.insert(source.to_string(), region)?;
        debug!(id = %mapping.id(), ?mode, offset, len, source = %source, "mapping created");
        Ok(mapping.id())
    }

    pub fn create_from_path(
        &self,
        path: impl AsRef<Path>,
        mode: AccessMode,
        offset: u64,
        length: u64,
    ) -> Result<MappingId, Error> {
        let path: PathBuf = path.as_ref().to_path_buf();
        if path.as_os_str().is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument).with_message("path is empty"));
        }
        self.create(Source::Path(path), mode, offset, length)
    }

    /// The descriptor is duplicated for the mapping; the caller still owns
    /// and must close the original.
    pub fn create_from_descriptor(
        &self,
        descriptor: RawDescriptor,
        mode: AccessMode,
        offset: u64,
        length: u64,
    ) -> Result<MappingId, Error> {
        self.create(Source::Descriptor(descriptor), mode, offset, length)
    }

    pub fn data(&self, id: MappingId) -> Result<DataView, Error> {
        Ok(DataView::new(self.registry.get(id)?))
    }

    pub fn data_writable(&self, id: MappingId) -> Result<WritableView, Error> {
        WritableView::new(self.registry.get(id)?)
    }

    pub fn size(&self, id: MappingId) -> Result<u64, Error> {
        Ok(self.registry.get(id)?.region().len() as u64)
    }

    pub fn mapped_length(&self, id: MappingId) -> Result<u64, Error> {
        Ok(self.registry.get(id)?.region().mapped_len() as u64)
    }

    pub fn is_open(&self, id: MappingId) -> bool {
        self.registry.contains(id)
    }

    pub fn is_mapped(&self, id: MappingId) -> bool {
        self.registry
            .get(id)
            .is_ok_and(|mapping| !mapping.region().is_empty())
    }

    pub fn sync(&self, id: MappingId) -> Result<(), Error> {
        let mapping = self.registry.get(id)?;
        mapping.region().flush().inspect_err(|err| {
            warn!(id = %id, error = %err, "flush failed");
        })?;
        debug!(id = %id, "mapping synced");
        Ok(())
    }

    pub fn sync_range(&self, id: MappingId, offset: usize, len: usize) -> Result<(), Error> {
        let mapping = self.registry.get(id)?;
        mapping.region().flush_range(offset, len).inspect_err(|err| {
            warn!(id = %id, offset, len, error = %err, "range flush failed");
        })
    }

    /// Never fails; unknown or already destroyed identities are ignored.
    pub fn destroy(&self, id: MappingId) {
        match self.registry.remove(id) {
            Some(mapping) => {
                debug!(id = %id, outstanding_views = std::sync::Arc::strong_count(&mapping) - 1, "mapping destroyed");
            }
            None => debug!(id = %id, "destroy ignored for unknown identity"),
        }
    }

    pub fn info(&self, id: MappingId) -> Result<MappingInfo, Error> {
        let mapping = self.registry.get(id)?;
        let region = mapping.region();
        Ok(MappingInfo {
            id,
            access: region.mode(),
            source: mapping.source().to_string(),
            offset: region.offset(),
            size: region.len() as u64,
            mapped_length: region.mapped_len() as u64,
            file_size: region.total_size(),
        })
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Destroy every live mapping; returns how many were released.
    pub fn shutdown(&self) -> usize {
        let drained = self.registry.drain();
        if drained > 0 {
            debug!(count = drained, "registry drained");
        }
        drained
    }
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn error_message(code: i32) -> &'static str {
    catalog::error_message(code)
}
