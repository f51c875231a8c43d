//! Mapping of `windows` crate failures onto the svcscope error taxonomy

use svcscope_core::error::codes::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
use svcscope_core::ScmError;

/// Win32 status code carried by a `windows` error
pub fn win32_code(err: &windows::core::Error) -> u32 {
    let hr = err.code().0 as u32;
    // HRESULT_FROM_WIN32 wraps the status as 0x8007xxxx
    if hr & 0xFFFF_0000 == 0x8007_0000 {
        hr & 0xFFFF
    } else {
        hr
    }
}

/// Classify a failed `api` call against `target` (service name or host)
pub fn scm_error(api: &'static str, err: &windows::core::Error, target: &str) -> ScmError {
    ScmError::from_win32(api, win32_code(err), target)
}

/// Whether the call only failed because the supplied buffer was too small
pub fn is_buffer_too_small(err: &windows::core::Error) -> bool {
    matches!(win32_code(err), ERROR_MORE_DATA | ERROR_INSUFFICIENT_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcscope_core::ErrorKind;
    use windows::core::HRESULT;

    #[test]
    fn test_win32_code_unwraps_hresult() {
        let err = windows::core::Error::from(HRESULT(0x80070005u32 as i32));
        assert_eq!(win32_code(&err), 5);
        assert_eq!(scm_error("OpenServiceW", &err, "Spooler").kind(), ErrorKind::AccessDenied);
    }

    #[test]
    fn test_more_data_is_buffer_too_small() {
        let err = windows::core::Error::from(HRESULT(0x800700EAu32 as i32));
        assert!(is_buffer_too_small(&err));
    }
}
