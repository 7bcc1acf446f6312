// C ABI contract tests: status codes, out-params, identity lifecycle, static strings.
use std::ffi::{CStr, CString};
use std::fs;
use std::path::{Path, PathBuf};
use std::ptr;

use mmapkit::abi::{
    mmk_create_from_descriptor, mmk_create_from_path, mmk_destroy, mmk_error_message,
    mmk_get_data, mmk_get_data_writable, mmk_get_mapped_length, mmk_get_size, mmk_get_version,
    mmk_is_mapped, mmk_is_open, mmk_last_error_detail, mmk_string_free, mmk_sync,
};

const SUCCESS: i32 = 0;
const INVALID_ARGUMENT: i32 = 1;
const FILE_NOT_FOUND: i32 = 2;
const INVALID_HANDLE: i32 = 6;

fn fixture(dir: &Path, len: usize) -> PathBuf {
    let path = dir.join("data.bin");
    let bytes: Vec<u8> = (0..len).map(|i| i as u8).collect();
    fs::write(&path, bytes).expect("write fixture");
    path
}

fn c_path(path: &Path) -> CString {
    CString::new(path.to_str().expect("utf8")).expect("cstring")
}

fn create(path: &Path, mode: i32, offset: u64, length: u64) -> Result<u64, i32> {
    let c_path = c_path(path);
    let mut id = 0u64;
    match mmk_create_from_path(c_path.as_ptr(), mode, offset, length, &mut id) {
        SUCCESS => Ok(id),
        code => Err(code),
    }
}

fn read_data(id: u64) -> Result<Vec<u8>, i32> {
    let mut data = ptr::null();
    let mut len = 0usize;
    match mmk_get_data(id, &mut data, &mut len) {
        SUCCESS => Ok(unsafe { std::slice::from_raw_parts(data, len) }.to_vec()),
        code => Err(code),
    }
}

fn last_detail() -> Option<String> {
    let raw = mmk_last_error_detail();
    if raw.is_null() {
        return None;
    }
    let detail = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
    mmk_string_free(raw);
    Some(detail)
}

#[test]
fn subrange_scenario_over_c_abi() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 100);
    let id = create(&path, 0, 10, 20).expect("create");
    assert_ne!(id, 0);

    let mut size = 0u64;
    assert_eq!(mmk_get_size(id, &mut size), SUCCESS);
    assert_eq!(size, 20);
    assert_eq!(read_data(id).expect("data"), (10u8..30).collect::<Vec<_>>());
    assert_eq!(mmk_is_open(id), 1);
    assert_eq!(mmk_is_mapped(id), 1);

    mmk_destroy(id);
    let mut after = 77u64;
    assert_eq!(mmk_get_size(id, &mut after), INVALID_HANDLE);
    assert_eq!(after, 77);
    assert_eq!(mmk_is_open(id), 0);
    assert_eq!(mmk_is_mapped(id), 0);
    assert_eq!(mmk_sync(id), INVALID_HANDLE);
    mmk_destroy(id);
}

#[test]
fn writable_pointer_round_trips_through_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 64);
    let id = create(&path, 1, 32, 8).expect("create");

    let mut data = ptr::null_mut();
    let mut len = 0usize;
    assert_eq!(mmk_get_data_writable(id, &mut data, &mut len), SUCCESS);
    assert_eq!(len, 8);
    unsafe { ptr::copy_nonoverlapping(b"ABCDEFGH".as_ptr(), data, 8) };
    assert_eq!(mmk_sync(id), SUCCESS);
    assert_eq!(mmk_sync(id), SUCCESS);

    assert_eq!(&fs::read(&path).expect("read")[32..40], b"ABCDEFGH");
    mmk_destroy(id);
}

#[test]
fn read_only_mapping_refuses_writable_pointer() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 64);
    let id = create(&path, 0, 0, 0).expect("create");

    let mut data = ptr::null_mut();
    let mut len = 0usize;
    assert_eq!(mmk_get_data_writable(id, &mut data, &mut len), INVALID_ARGUMENT);
    assert!(data.is_null());
    assert!(last_detail().expect("detail").contains("read-only"));
    assert_eq!(mmk_sync(id), SUCCESS);
    mmk_destroy(id);
}

#[test]
fn missing_file_reports_code_and_message() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = create(&temp.path().join("absent.bin"), 0, 0, 0).expect_err("missing");
    assert_eq!(err, FILE_NOT_FOUND);

    let message = unsafe { CStr::from_ptr(mmk_error_message(err)) };
    assert_eq!(message.to_str().expect("utf8"), "File not found");
    assert!(last_detail().expect("detail").contains("absent.bin"));
}

#[test]
fn bad_arguments_are_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 64);
    let c_path = c_path(&path);
    let mut id = 0u64;

    assert_eq!(mmk_create_from_path(ptr::null(), 0, 0, 0, &mut id), INVALID_ARGUMENT);
    assert_eq!(
        mmk_create_from_path(c_path.as_ptr(), 0, 0, 0, ptr::null_mut()),
        INVALID_ARGUMENT
    );
    assert_eq!(mmk_create_from_path(c_path.as_ptr(), 2, 0, 0, &mut id), INVALID_ARGUMENT);
    assert_eq!(mmk_create_from_path(c_path.as_ptr(), 0, 64, 0, &mut id), INVALID_ARGUMENT);
    assert_eq!(id, 0);
    assert_eq!(
        mmk_create_from_descriptor(-1, 0, 0, 0, &mut id),
        INVALID_ARGUMENT
    );

    let live = create(&path, 0, 0, 0).expect("create");
    assert_eq!(mmk_get_size(live, ptr::null_mut()), INVALID_ARGUMENT);
    assert_eq!(mmk_get_mapped_length(live, ptr::null_mut()), INVALID_ARGUMENT);
    assert_eq!(mmk_get_data(live, ptr::null_mut(), ptr::null_mut()), INVALID_ARGUMENT);
    mmk_destroy(live);
}

#[test]
fn success_clears_last_error_detail() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 16);
    assert_eq!(mmk_sync(0), INVALID_HANDLE);
    assert!(last_detail().is_some());

    let id = create(&path, 0, 0, 0).expect("create");
    assert!(last_detail().is_none());
    mmk_destroy(id);
}

#[test]
fn mapped_length_is_reported() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 100);
    let id = create(&path, 0, 10, 20).expect("create");
    let mut mapped = 0u64;
    assert_eq!(mmk_get_mapped_length(id, &mut mapped), SUCCESS);
    assert!(mapped >= 20);
    mmk_destroy(id);
}

#[test]
fn version_and_unknown_messages_are_static() {
    let version = unsafe { CStr::from_ptr(mmk_get_version()) };
    assert_eq!(version.to_str().expect("utf8"), env!("CARGO_PKG_VERSION"));
    let unknown = unsafe { CStr::from_ptr(mmk_error_message(1234)) };
    assert_eq!(unknown.to_str().expect("utf8"), "Unknown error");
}

#[cfg(unix)]
#[test]
fn descriptor_creation_does_not_take_ownership() {
    use std::io::Read;
    use std::os::fd::AsRawFd;

    let temp = tempfile::tempdir().expect("tempdir");
    let path = fixture(temp.path(), 100);
    let mut file = fs::File::open(&path).expect("open");
    let mut id = 0u64;
    assert_eq!(
        mmk_create_from_descriptor(file.as_raw_fd() as isize, 0, 50, 0, &mut id),
        SUCCESS
    );
    assert_eq!(read_data(id).expect("data"), (50u8..100).collect::<Vec<_>>());
    mmk_destroy(id);

    let mut first = [0u8; 1];
    file.read_exact(&mut first).expect("descriptor still open");
    assert_eq!(first, [0]);
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_paths_are_accepted() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = tempfile::tempdir().expect("tempdir");
    let name = OsStr::from_bytes(b"data-\xff\xfe.bin");
    let path = temp.path().join(name);
    fs::write(&path, [3u8; 24]).expect("write fixture");

    let mut raw = temp.path().as_os_str().as_bytes().to_vec();
    raw.push(b'/');
    raw.extend_from_slice(name.as_bytes());
    let c_path = CString::new(raw).expect("cstring");

    let mut id = 0u64;
    assert_eq!(mmk_create_from_path(c_path.as_ptr(), 0, 4, 0, &mut id), SUCCESS);
    assert_eq!(read_data(id).expect("data"), vec![3u8; 20]);
    mmk_destroy(id);
}
