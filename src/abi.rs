//! Purpose: C ABI bridge for plugin shims (libmmapkit).
//! Exports: `mmk_*` create/data/query/sync/destroy functions and diagnostics.
//! Role: Flat, stable call surface over one process-wide `MapEngine`.
//! Invariants: Status returns are catalog codes; `0` is success, out-params are written only on success.
//! Invariants: Identities are opaque integers; `0` is never a valid identity.
//! Invariants: Data pointers stay valid until `mmk_destroy` (or `mmk_shutdown`) for that identity.
//! Notes: Static strings (`mmk_get_version`, `mmk_error_message`) are never freed by callers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

use std::cell::RefCell;
use std::ffi::{CStr, CString, c_char};
use std::path::PathBuf;
use std::ptr;
use std::sync::OnceLock;

use crate::api::{AccessMode, Error, ErrorCode, ErrorKind, MapEngine, MappingId, RawDescriptor};

static ENGINE: OnceLock<MapEngine> = OnceLock::new();
const VERSION: &CStr =
    match CStr::from_bytes_with_nul(concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes()) {
        Ok(version) => version,
        Err(_) => panic!("package version contains NUL"),
    };

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn engine() -> &'static MapEngine {
    ENGINE.get_or_init(MapEngine::new)
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_create_from_path(
    path: *const c_char,
    access_mode: i32,
    offset: u64,
    length: u64,
    out_id: *mut u64,
) -> i32 {
    if out_id.is_null() {
        return fail(Error::new(ErrorKind::InvalidArgument).with_message("out_id is null"));
    }
    let path = match parse_path(path) {
        Ok(path) => path,
        Err(err) => return fail(err),
    };
    let mode = match AccessMode::from_code(access_mode) {
        Ok(mode) => mode,
        Err(err) => return fail(err),
    };
    match engine().create_from_path(path, mode, offset, length) {
        Ok(id) => {
            unsafe {
                *out_id = id.into_raw();
            }
            succeed()
        }
        Err(err) => fail(err),
    }
}

/// `descriptor` is an `int` file descriptor on Unix and a `HANDLE` on
/// Windows, passed as `intptr_t`. It is never closed by the library.
#[unsafe(no_mangle)]
pub extern "C" fn mmk_create_from_descriptor(
    descriptor: isize,
    access_mode: i32,
    offset: u64,
    length: u64,
    out_id: *mut u64,
) -> i32 {
    if out_id.is_null() {
        return fail(Error::new(ErrorKind::InvalidArgument).with_message("out_id is null"));
    }
    let descriptor = match to_raw_descriptor(descriptor) {
        Ok(descriptor) => descriptor,
        Err(err) => return fail(err),
    };
    let mode = match AccessMode::from_code(access_mode) {
        Ok(mode) => mode,
        Err(err) => return fail(err),
    };
    match engine().create_from_descriptor(descriptor, mode, offset, length) {
        Ok(id) => {
            unsafe {
                *out_id = id.into_raw();
            }
            succeed()
        }
        Err(err) => fail(err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_get_data(id: u64, out_data: *mut *const u8, out_len: *mut usize) -> i32 {
    if out_data.is_null() || out_len.is_null() {
        return fail(Error::new(ErrorKind::InvalidArgument).with_message("out_data or out_len is null"));
    }
    match engine().data(MappingId::from_raw(id)) {
        Ok(view) => {
            unsafe {
                *out_data = view.as_ptr();
                *out_len = view.len();
            }
            succeed()
        }
        Err(err) => fail(err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_get_data_writable(
    id: u64,
    out_data: *mut *mut u8,
    out_len: *mut usize,
) -> i32 {
    if out_data.is_null() || out_len.is_null() {
        return fail(Error::new(ErrorKind::InvalidArgument).with_message("out_data or out_len is null"));
    }
    match engine().data_writable(MappingId::from_raw(id)) {
        Ok(view) => {
            unsafe {
                *out_data = view.as_mut_ptr();
                *out_len = view.len();
            }
            succeed()
        }
        Err(err) => fail(err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_get_size(id: u64, out_size: *mut u64) -> i32 {
    write_query(out_size, "out_size", || engine().size(MappingId::from_raw(id)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_get_mapped_length(id: u64, out_length: *mut u64) -> i32 {
    write_query(out_length, "out_length", || {
        engine().mapped_length(MappingId::from_raw(id))
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_is_open(id: u64) -> i32 {
    i32::from(engine().is_open(MappingId::from_raw(id)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_is_mapped(id: u64) -> i32 {
    i32::from(engine().is_mapped(MappingId::from_raw(id)))
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_sync(id: u64) -> i32 {
    match engine().sync(MappingId::from_raw(id)) {
        Ok(()) => succeed(),
        Err(err) => fail(err),
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_destroy(id: u64) {
    engine().destroy(MappingId::from_raw(id));
}

/// Destroy every live mapping; returns how many were released.
#[unsafe(no_mangle)]
pub extern "C" fn mmk_shutdown() -> usize {
    ENGINE.get().map(MapEngine::shutdown).unwrap_or(0)
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_get_version() -> *const c_char {
    VERSION.as_ptr()
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_error_message(code: i32) -> *const c_char {
    ErrorCode::from_i32(code)
        .unwrap_or(ErrorCode::Unknown)
        .c_message()
        .as_ptr()
}

/// Detail text for the last failure on the calling thread, or NULL.
/// The returned string is owned by the caller; free it with `mmk_string_free`.
#[unsafe(no_mangle)]
pub extern "C" fn mmk_last_error_detail() -> *mut c_char {
    LAST_ERROR.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|detail| detail.clone().into_raw())
            .unwrap_or(ptr::null_mut())
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn mmk_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    unsafe {
        drop(CString::from_raw(value));
    }
}

fn write_query(
    out: *mut u64,
    name: &str,
    query: impl FnOnce() -> Result<u64, Error>,
) -> i32 {
    if out.is_null() {
        return fail(Error::new(ErrorKind::InvalidArgument).with_message(format!("{name} is null")));
    }
    match query() {
        Ok(value) => {
            unsafe {
                *out = value;
            }
            succeed()
        }
        Err(err) => fail(err),
    }
}

fn parse_path(input: *const c_char) -> Result<PathBuf, Error> {
    if input.is_null() {
        return Err(Error::new(ErrorKind::InvalidArgument).with_message("path is null"));
    }
    path_from_c(unsafe { CStr::from_ptr(input) })
}

#[cfg(unix)]
fn path_from_c(raw: &CStr) -> Result<PathBuf, Error> {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    Ok(PathBuf::from(OsStr::from_bytes(raw.to_bytes())))
}

#[cfg(not(unix))]
fn path_from_c(raw: &CStr) -> Result<PathBuf, Error> {
    let text = raw.to_str().map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message("path is not valid UTF-8")
            .with_source(err)
    })?;
    Ok(PathBuf::from(text))
}

#[cfg(unix)]
fn to_raw_descriptor(descriptor: isize) -> Result<RawDescriptor, Error> {
    RawDescriptor::try_from(descriptor).map_err(|err| {
        Error::new(ErrorKind::InvalidArgument)
            .with_message(format!("descriptor {descriptor} is out of range"))
            .with_source(err)
    })
}

#[cfg(windows)]
fn to_raw_descriptor(descriptor: isize) -> Result<RawDescriptor, Error> {
    Ok(descriptor as RawDescriptor)
}

fn succeed() -> i32 {
    LAST_ERROR.with(|slot| slot.borrow_mut().take());
    ErrorCode::Success.as_i32()
}

fn fail(err: Error) -> i32 {
    let detail = CString::new(err.to_string()).ok();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = detail);
    err.code().as_i32()
}
