//! Purpose: Stable numeric error catalog shared by every boundary surface.
//! Exports: `ErrorCode`, `error_message`, `UNKNOWN_MESSAGE`.
//! Role: Sole source of message text for error kinds (Rust API, C ABI, CLI).
//! Invariants: Codes are frozen once published; `0` is always success.
//! Invariants: Out-of-range codes resolve to the generic unknown message, never fail.
use std::ffi::CStr;

pub const UNKNOWN_MESSAGE: &str = "Unknown error";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
    Success = 0,
    InvalidArgument = 1,
    FileNotFound = 2,
    PermissionDenied = 3,
    OutOfMemory = 4,
    MappingFailed = 5,
    InvalidHandle = 6,
    Unknown = 7,
}

impl ErrorCode {
    pub const ALL: [ErrorCode; 8] = [
        ErrorCode::Success,
        ErrorCode::InvalidArgument,
        ErrorCode::FileNotFound,
        ErrorCode::PermissionDenied,
        ErrorCode::OutOfMemory,
        ErrorCode::MappingFailed,
        ErrorCode::InvalidHandle,
        ErrorCode::Unknown,
    ];

    pub fn from_i32(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|candidate| *candidate as i32 == code)
    }

    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorCode::Success => "Success",
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::FileNotFound => "FileNotFound",
            ErrorCode::PermissionDenied => "PermissionDenied",
            ErrorCode::OutOfMemory => "OutOfMemory",
            ErrorCode::MappingFailed => "MappingFailed",
            ErrorCode::InvalidHandle => "InvalidHandle",
            ErrorCode::Unknown => "Unknown",
        }
    }

    /// NUL-terminated form of [`ErrorCode::message`], with static lifetime so
    /// it can be handed across the C ABI without an ownership transfer.
    pub fn c_message(self) -> &'static CStr {
        match self {
            ErrorCode::Success => c"Success",
            ErrorCode::InvalidArgument => c"Invalid argument",
            ErrorCode::FileNotFound => c"File not found",
            ErrorCode::PermissionDenied => c"Permission denied",
            ErrorCode::OutOfMemory => c"Out of memory",
            ErrorCode::MappingFailed => c"Memory mapping failed",
            ErrorCode::InvalidHandle => c"Invalid handle",
            ErrorCode::Unknown => c"Unknown error",
        }
    }

    pub fn message(self) -> &'static str {
        self.c_message().to_str().unwrap_or(UNKNOWN_MESSAGE)
    }
}

/// Resolve any integer code to its message; unrecognised codes are "Unknown error".
pub fn error_message(code: i32) -> &'static str {
    ErrorCode::from_i32(code)
        .map(ErrorCode::message)
        .unwrap_or(UNKNOWN_MESSAGE)
}

#[cfg(test)]
mod tests {
    use super::{ErrorCode, UNKNOWN_MESSAGE, error_message};

    #[test]
    fn codes_are_stable() {
        let cases = [
            (ErrorCode::Success, 0),
            (ErrorCode::InvalidArgument, 1),
            (ErrorCode::FileNotFound, 2),
            (ErrorCode::PermissionDenied, 3),
            (ErrorCode::OutOfMemory, 4),
            (ErrorCode::MappingFailed, 5),
            (ErrorCode::InvalidHandle, 6),
            (ErrorCode::Unknown, 7),
        ];

        for (code, value) in cases {
            assert_eq!(code.as_i32(), value);
            assert_eq!(ErrorCode::from_i32(value), Some(code));
        }
    }

    #[test]
    fn messages_are_fixed_strings() {
        assert_eq!(error_message(0), "Success");
        assert_eq!(error_message(2), "File not found");
        assert_eq!(error_message(5), "Memory mapping failed");
        assert_eq!(error_message(6), "Invalid handle");
    }

    #[test]
    fn out_of_range_codes_resolve_to_unknown() {
        for code in [-1, 8, 42, i32::MIN, i32::MAX] {
            assert_eq!(ErrorCode::from_i32(code), None);
            assert_eq!(error_message(code), UNKNOWN_MESSAGE);
        }
    }

    #[test]
    fn c_messages_match_rust_messages() {
        for code in ErrorCode::ALL {
            assert_eq!(code.c_message().to_str().expect("utf8"), code.message());
            assert!(!code.message().is_empty());
        }
    }
}
