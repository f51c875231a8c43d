//! Direct dependents via `EnumDependentServicesW`

use svcscope_core::buffer::{negotiate, Probe};
use svcscope_core::models::{DesiredState, Service, ServiceProcess, StatusFields};
use svcscope_core::ScmResult;
use windows::Win32::System::Services::{
    EnumDependentServicesW, ENUM_SERVICE_STATE, ENUM_SERVICE_STATUSW, SERVICE_STATUS,
};

use crate::error::{is_buffer_too_small, scm_error};
use crate::handles::{pwstr_to_string, ScHandle};

const API: &str = "EnumDependentServicesW";

/// Services that depend directly on an open service (needs
/// `SERVICE_ENUMERATE_DEPENDENTS`), with reduced process status.
pub fn query_dependents(
    service: &ScHandle,
    name: &str,
    state: DesiredState,
    max_bytes: usize,
) -> ScmResult<Vec<Service>> {
    let mut returned = 0u32;

    let buffer = negotiate(API, max_bytes, |buf| {
        let mut needed = 0u32;
        returned = 0;
        let entries = if buf.is_empty() {
            None
        } else {
            Some(buf.as_mut_ptr::<ENUM_SERVICE_STATUSW>())
        };
        let result = unsafe {
            EnumDependentServicesW(
                service.raw(),
                ENUM_SERVICE_STATE(state.native()),
                entries,
                buf.len() as u32,
                &mut needed,
                &mut returned,
            )
        };
        match result {
            Ok(()) => Ok(Probe::Filled),
            Err(e) if is_buffer_too_small(&e) => Ok(Probe::Needs(needed as usize)),
            Err(e) => Err(scm_error(API, &e, name)),
        }
    })?;

    let entries = unsafe {
        std::slice::from_raw_parts(buffer.as_ptr::<ENUM_SERVICE_STATUSW>(), returned as usize)
    };

    Ok(entries
        .iter()
        .map(|entry| Service {
            name: unsafe { pwstr_to_string(entry.lpServiceName) },
            display_name: unsafe { pwstr_to_string(entry.lpDisplayName) },
            process: ServiceProcess::reduced(&status_fields(&entry.ServiceStatus)),
        })
        .collect())
}

fn status_fields(status: &SERVICE_STATUS) -> StatusFields {
    StatusFields {
        service_type: status.dwServiceType.0,
        current_state: status.dwCurrentState.0,
        controls_accepted: status.dwControlsAccepted,
        win32_exit_code: status.dwWin32ExitCode,
        service_specific_exit_code: status.dwServiceSpecificExitCode,
        check_point: status.dwCheckPoint,
        wait_hint: status.dwWaitHint,
    }
}
