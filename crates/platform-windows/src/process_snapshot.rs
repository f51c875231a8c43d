//! Process snapshot using CreateToolhelp32Snapshot
//!
//! Used to attach image names to running services during enumeration.

use std::collections::HashMap;

use svcscope_core::decode::wide_to_string;
use svcscope_core::ScmResult;
use windows::Win32::Foundation::{CloseHandle, HANDLE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};

use crate::error::scm_error;

/// RAII wrapper for snapshot handle
struct SnapshotHandle(HANDLE);

impl Drop for SnapshotHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }
}

/// Map every running PID to its executable name (not full path)
pub fn image_names() -> ScmResult<HashMap<u32, String>> {
    let mut names = HashMap::new();

    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0)
            .map_err(|e| scm_error("CreateToolhelp32Snapshot", &e, "localhost"))?;
        let _handle = SnapshotHandle(snapshot);

        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        if Process32FirstW(snapshot, &mut entry).is_ok() {
            loop {
                names.insert(entry.th32ProcessID, wide_to_string(&entry.szExeFile));
                if Process32NextW(snapshot, &mut entry).is_err() {
                    break;
                }
            }
        }
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_process_has_a_name() {
        let names = image_names().expect("Failed to snapshot processes");
        let current = names
            .get(&std::process::id())
            .expect("Current process should be in snapshot");
        assert!(current.to_lowercase().ends_with(".exe"));
    }
}
