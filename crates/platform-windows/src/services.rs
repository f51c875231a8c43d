//! Service Enumerator: paged `EnumServicesStatusExW` over Win32 services

use std::collections::HashMap;

use svcscope_core::buffer::{collect_pages, negotiate, Page, Probe};
use svcscope_core::models::{DesiredState, Service, ServiceProcess, StatusFields};
use svcscope_core::{ManagerConfig, ScmResult};
use tracing::{debug, warn};
use windows::core::PCWSTR;
use windows::Win32::System::Services::{
    EnumServicesStatusExW, ENUM_SERVICE_STATE, ENUM_SERVICE_STATUS_PROCESSW, SC_ENUM_PROCESS_INFO,
    SERVICE_STATUS_PROCESS, SERVICE_WIN32,
};

use crate::error::{is_buffer_too_small, scm_error};
use crate::handles::{host_label, pwstr_to_string, ScHandle};
use crate::process_snapshot::image_names;

const API: &str = "EnumServicesStatusExW";

/// List every Win32 service matching `state` through `manager`.
///
/// `host` must be the machine `manager` was opened on; process image names
/// are only attached for the local machine.
pub fn enumerate_services(
    manager: &ScHandle,
    host: &str,
    state: DesiredState,
    config: &ManagerConfig,
) -> ScmResult<Vec<Service>> {
    let images = if host.is_empty() {
        image_names().unwrap_or_else(|e| {
            warn!(error = %e, "process snapshot failed, omitting image names");
            HashMap::new()
        })
    } else {
        HashMap::new()
    };

    let mut resume = 0u32;
    let services = collect_pages(API, config.max_pages, || {
        fetch_page(manager, host, state, &mut resume, config.max_buffer_bytes, &images)
    })?;

    debug!(host = host_label(host), %state, count = services.len(), "enumerated services");
    Ok(services)
}

fn fetch_page(
    manager: &ScHandle,
    host: &str,
    state: DesiredState,
    resume: &mut u32,
    max_bytes: usize,
    images: &HashMap<u32, String>,
) -> ScmResult<Page<Service>> {
    let mut returned = 0u32;
    let mut more = false;

    let buffer = negotiate(API, max_bytes, |buf| {
        let mut needed = 0u32;
        returned = 0;
        let bytes = if buf.is_empty() {
            None
        } else {
            Some(buf.as_bytes_mut())
        };

        let result = unsafe {
            EnumServicesStatusExW(
                manager.raw(),
                SC_ENUM_PROCESS_INFO,
                SERVICE_WIN32,
                ENUM_SERVICE_STATE(state.native()),
                bytes,
                &mut needed,
                &mut returned,
                Some(&mut *resume),
                PCWSTR::null(),
            )
        };

        match result {
            Ok(()) => {
                more = false;
                Ok(Probe::Filled)
            }
            // a full page; the resume handle already points past it
            Err(e) if is_buffer_too_small(&e) && returned > 0 => {
                more = true;
                Ok(Probe::Filled)
            }
            Err(e) if is_buffer_too_small(&e) => Ok(Probe::Needs(needed as usize)),
            Err(e) => Err(scm_error(API, &e, host_label(host))),
        }
    })?;

    let entries = unsafe {
        std::slice::from_raw_parts(
            buffer.as_ptr::<ENUM_SERVICE_STATUS_PROCESSW>(),
            returned as usize,
        )
    };

    let items = entries
        .iter()
        .map(|entry| {
            let status = &entry.ServiceStatusProcess;
            let image = images.get(&status.dwProcessId).cloned();
            Service {
                name: unsafe { pwstr_to_string(entry.lpServiceName) },
                display_name: unsafe { pwstr_to_string(entry.lpDisplayName) },
                process: ServiceProcess::extended(
                    &status_fields(status),
                    status.dwProcessId,
                    status.dwServiceFlags.0,
                    image,
                ),
            }
        })
        .collect();

    Ok(if more {
        Page::partial(items)
    } else {
        Page::last(items)
    })
}

fn status_fields(status: &SERVICE_STATUS_PROCESS) -> StatusFields {
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
