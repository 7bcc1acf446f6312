// Error kinds, the builder-style error value, and OS error classification.
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use crate::core::catalog::ErrorCode;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    FileNotFound,
    PermissionDenied,
    OutOfMemory,
    MappingFailed,
    InvalidHandle,
    Unknown,
}

impl ErrorKind {
    pub fn code(self) -> ErrorCode {
        match self {
            ErrorKind::InvalidArgument => ErrorCode::InvalidArgument,
            ErrorKind::FileNotFound => ErrorCode::FileNotFound,
            ErrorKind::PermissionDenied => ErrorCode::PermissionDenied,
            ErrorKind::OutOfMemory => ErrorCode::OutOfMemory,
            ErrorKind::MappingFailed => ErrorCode::MappingFailed,
            ErrorKind::InvalidHandle => ErrorCode::InvalidHandle,
            ErrorKind::Unknown => ErrorCode::Unknown,
        }
    }
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    path: Option<PathBuf>,
    offset: Option<u64>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            path: None,
            offset: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn code(&self) -> ErrorCode {
        self.kind.code()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.kind.code().message())?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(path) = &self.path {
            write!(f, " (path: {})", path.display())?;
        }
        if let Some(offset) = self.offset {
            write!(f, " (offset: {offset})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

pub fn to_error_code(kind: ErrorKind) -> i32 {
    kind.code().as_i32()
}

/// Classify a failure from opening, statting or duplicating a file.
pub(crate) fn io_error_kind(err: &io::Error) -> ErrorKind {
    #[cfg(unix)]
    {
        use libc::{EACCES, EBADF, EINVAL, EISDIR, ENOENT, ENOMEM, ENOTDIR, EPERM, EROFS};
        match err.raw_os_error().unwrap_or_default() {
            EACCES | EPERM | EROFS => return ErrorKind::PermissionDenied,
            ENOENT | ENOTDIR => return ErrorKind::FileNotFound,
            ENOMEM => return ErrorKind::OutOfMemory,
            EBADF | EINVAL | EISDIR => return ErrorKind::InvalidArgument,
            _ => {}
        }
    }
    match err.kind() {
        io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        io::ErrorKind::InvalidInput => ErrorKind::InvalidArgument,
        io::ErrorKind::OutOfMemory => ErrorKind::OutOfMemory,
        _ => ErrorKind::Unknown,
    }
}

/// Classify a failure from the mapping call itself.
pub(crate) fn map_error_kind(err: &io::Error) -> ErrorKind {
    #[cfg(unix)]
    {
        let errno = err.raw_os_error().unwrap_or_default();
        if errno == libc::EACCES || errno == libc::EPERM {
            return ErrorKind::PermissionDenied;
        }
    }
    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::MappingFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, io_error_kind, map_error_kind, to_error_code};
    use std::io;

    #[test]
    fn error_code_mapping_is_stable() {
        let cases = [
            (ErrorKind::InvalidArgument, 1),
            (ErrorKind::FileNotFound, 2),
            (ErrorKind::PermissionDenied, 3),
            (ErrorKind::OutOfMemory, 4),
            (ErrorKind::MappingFailed, 5),
            (ErrorKind::InvalidHandle, 6),
            (ErrorKind::Unknown, 7),
        ];

        for (kind, code) in cases {
            assert_eq!(to_error_code(kind), code);
        }
    }

    #[test]
    fn display_leads_with_catalog_message() {
        let err = Error::new(ErrorKind::InvalidArgument)
            .with_message("offset is past end of file")
            .with_path("/tmp/data.bin")
            .with_offset(128);
        assert_eq!(
            err.to_string(),
            "Invalid argument: offset is past end of file (path: /tmp/data.bin) (offset: 128)"
        );
        assert_eq!(Error::new(ErrorKind::InvalidHandle).to_string(), "Invalid handle");
    }

    #[test]
    fn io_errors_map_by_kind() {
        let err = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(io_error_kind(&err), ErrorKind::FileNotFound);

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(io_error_kind(&err), ErrorKind::PermissionDenied);

        let err = io::Error::other("strange");
        assert_eq!(io_error_kind(&err), ErrorKind::Unknown);
        assert_eq!(map_error_kind(&err), ErrorKind::MappingFailed);
    }

    #[cfg(unix)]
    #[test]
    fn errno_values_map_to_expected_kinds() {
        let err = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(io_error_kind(&err), ErrorKind::FileNotFound);

        let err = io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(io_error_kind(&err), ErrorKind::PermissionDenied);
        assert_eq!(map_error_kind(&err), ErrorKind::PermissionDenied);

        let err = io::Error::from_raw_os_error(libc::EPERM);
        assert_eq!(io_error_kind(&err), ErrorKind::PermissionDenied);

        let err = io::Error::from_raw_os_error(libc::ENOMEM);
        assert_eq!(io_error_kind(&err), ErrorKind::OutOfMemory);
        assert_eq!(map_error_kind(&err), ErrorKind::MappingFailed);

        let err = io::Error::from_raw_os_error(libc::EBADF);
        assert_eq!(io_error_kind(&err), ErrorKind::InvalidArgument);

        let err = io::Error::from_raw_os_error(libc::EIO);
        assert_eq!(io_error_kind(&err), ErrorKind::Unknown);
    }
}
