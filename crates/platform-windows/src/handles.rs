//! Handle Manager: RAII ownership of Service Control Manager handles
//!
//! Every `SC_HANDLE` lives inside an [`ScHandle`] and is closed exactly once
//! when it is dropped, on success and failure paths alike.

use svcscope_core::decode::to_wide;
use svcscope_core::ScmResult;
use tracing::debug;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::System::Services::{CloseServiceHandle, OpenSCManagerW, OpenServiceW, SC_HANDLE};

use crate::error::scm_error;

/// Owned manager-level or service-level handle
#[derive(Debug)]
pub struct ScHandle(SC_HANDLE);

// SAFETY: SC_HANDLE values are valid process-wide and the SCM query
// functions may be called on the same handle from any thread.
unsafe impl Send for ScHandle {}
unsafe impl Sync for ScHandle {}

impl ScHandle {
    pub fn raw(&self) -> SC_HANDLE {
        self.0
    }
}

impl Drop for ScHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseServiceHandle(self.0);
            }
            debug!("closed service handle");
        }
    }
}

/// Label used for the host in error messages
pub fn host_label(host: &str) -> &str {
    if host.is_empty() {
        "localhost"
    } else {
        host
    }
}

/// Open the Service Control Manager on `host` (empty for the local machine)
pub fn open_manager(host: &str, access: u32) -> ScmResult<ScHandle> {
    let machine = to_wide(host);
    let machine = if host.is_empty() {
        PCWSTR::null()
    } else {
        PCWSTR(machine.as_ptr())
    };

    let handle = unsafe { OpenSCManagerW(machine, PCWSTR::null(), access) }
        .map_err(|e| scm_error("OpenSCManagerW", &e, host_label(host)))?;
    debug!(host = host_label(host), access, "opened service control manager");
    Ok(ScHandle(handle))
}

/// Open one service through an already-open manager handle
pub fn open_service(manager: &ScHandle, name: &str, access: u32) -> ScmResult<ScHandle> {
    let wide = to_wide(name);
    let handle = unsafe { OpenServiceW(manager.raw(), PCWSTR(wide.as_ptr()), access) }
        .map_err(|e| scm_error("OpenServiceW", &e, name))?;
    debug!(service = name, access, "opened service");
    Ok(ScHandle(handle))
}

/// Convert PWSTR to String
///
/// # Safety
/// `pwstr` must be null or point to a null-terminated wide string.
pub unsafe fn pwstr_to_string(pwstr: PWSTR) -> String {
    if pwstr.is_null() {
        return String::new();
    }
    String::from_utf16_lossy(std::slice::from_raw_parts(pwstr.0, wide_len(pwstr.0)))
}

unsafe fn wide_len(ptr: *const u16) -> usize {
    (0..).take_while(|&i| *ptr.add(i) != 0).count()
}

/// Read a double-null-terminated wide multi-string
///
/// # Safety
/// `pwstr` must be null or point to a multi-string ending in an empty entry.
pub unsafe fn pwstr_to_multi_sz(pwstr: PWSTR) -> Vec<String> {
    let mut entries = Vec::new();
    if pwstr.is_null() {
        return entries;
    }

    let mut cursor = pwstr.0;
    loop {
        let len = wide_len(cursor);
        if len == 0 {
            break;
        }
        entries.push(String::from_utf16_lossy(std::slice::from_raw_parts(cursor, len)));
        cursor = cursor.add(len + 1);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::System::Services::SC_MANAGER_CONNECT;

    #[test]
    fn test_open_local_manager() {
        let scm = open_manager("", SC_MANAGER_CONNECT).expect("Should open local SCM");
        assert!(!scm.raw().is_invalid());
    }

    #[test]
    fn test_multi_sz_from_pointer() {
        let mut wide: Vec<u16> = "RpcSs\0+TDI\0\0".encode_utf16().collect();
        let entries = unsafe { pwstr_to_multi_sz(PWSTR(wide.as_mut_ptr())) };
        assert_eq!(entries, vec!["RpcSs".to_string(), "+TDI".to_string()]);
        assert!(unsafe { pwstr_to_multi_sz(PWSTR::null()) }.is_empty());
    }
}
