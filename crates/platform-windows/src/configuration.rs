//! Configuration Reader: `QueryServiceConfigW` plus the service description

use svcscope_core::buffer::{negotiate, NativeBuffer, Probe};
use svcscope_core::decode::non_empty;
use svcscope_core::error::codes;
use svcscope_core::models::{ConfigFields, ServiceInformation};
use svcscope_core::{ScmError, ScmResult};
use tracing::debug;
use windows::Win32::System::Services::{
    QueryServiceConfig2W, QueryServiceConfigW, QUERY_SERVICE_CONFIGW, SERVICE_CONFIG,
    SERVICE_CONFIG_DESCRIPTION, SERVICE_DESCRIPTIONW,
};

use crate::error::{is_buffer_too_small, scm_error};
use crate::handles::{pwstr_to_multi_sz, pwstr_to_string, ScHandle};

/// Read the static configuration of an open service (needs `SERVICE_QUERY_CONFIG`)
pub fn query_configuration(
    service: &ScHandle,
    name: &str,
    max_bytes: usize,
) -> ScmResult<ServiceInformation> {
    const API: &str = "QueryServiceConfigW";

    let buffer = negotiate(API, max_bytes, |buf| {
        let mut needed = 0u32;
        let config = if buf.is_empty() {
            None
        } else {
            Some(buf.as_mut_ptr::<QUERY_SERVICE_CONFIGW>())
        };
        match unsafe { QueryServiceConfigW(service.raw(), config, buf.len() as u32, &mut needed) } {
            Ok(()) => Ok(Probe::Filled),
            Err(e) if is_buffer_too_small(&e) => Ok(Probe::Needs(needed as usize)),
            Err(e) => Err(scm_error(API, &e, name)),
        }
    })?;

    // an empty buffer means the call succeeded without writing anything,
    // which QueryServiceConfigW never does for a valid handle
    if buffer.len() < std::mem::size_of::<QUERY_SERVICE_CONFIGW>() {
        return Err(ScmError::BufferNegotiationFailed {
            api: API,
            reason: format!("returned {} bytes, smaller than the header", buffer.len()),
        });
    }

    let description = query_description(service, name, max_bytes)?;

    let fields = unsafe {
        let config = &*buffer.as_ptr::<QUERY_SERVICE_CONFIGW>();
        ConfigFields {
            service_type: config.dwServiceType.0,
            start_type: config.dwStartType.0,
            error_control: config.dwErrorControl.0,
            binary_path: pwstr_to_string(config.lpBinaryPathName),
            account: pwstr_to_string(config.lpServiceStartName),
            load_order_group: pwstr_to_string(config.lpLoadOrderGroup),
            tag_id: config.dwTagId,
            dependencies: pwstr_to_multi_sz(config.lpDependencies),
        }
    };

    Ok(ServiceInformation::from_native(fields, description))
}

/// Read the optional description. An absent or empty description is `None`,
/// and so is one whose resource text cannot be loaded. Other failures,
/// access denied included, are errors.
pub fn query_description(service: &ScHandle, name: &str, max_bytes: usize) -> ScmResult<Option<String>> {
    let buffer = match query_config2(service, name, SERVICE_CONFIG_DESCRIPTION, max_bytes) {
        Ok(buffer) => buffer,
        Err(e) if e.code().is_some_and(codes::is_description_unavailable) => {
            debug!(service = name, error = %e, "description unavailable");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if buffer.len() < std::mem::size_of::<SERVICE_DESCRIPTIONW>() {
        return Ok(None);
    }

    let description = unsafe {
        let desc = &*buffer.as_ptr::<SERVICE_DESCRIPTIONW>();
        pwstr_to_string(desc.lpDescription)
    };
    Ok(non_empty(description))
}

/// Negotiate a `QueryServiceConfig2W` buffer for `level`
pub(crate) fn query_config2(
    service: &ScHandle,
    name: &str,
    level: SERVICE_CONFIG,
    max_bytes: usize,
) -> ScmResult<NativeBuffer> {
    const API: &str = "QueryServiceConfig2W";

    negotiate(API, max_bytes, |buf| {
        let mut needed = 0u32;
        let bytes = if buf.is_empty() {
            None
        } else {
            Some(buf.as_bytes_mut())
        };
        match unsafe { QueryServiceConfig2W(service.raw(), level, bytes, &mut needed) } {
            Ok(()) => Ok(Probe::Filled),
            Err(e) if is_buffer_too_small(&e) => Ok(Probe::Needs(needed as usize)),
            Err(e) => Err(scm_error(API, &e, name)),
        }
    })
}
