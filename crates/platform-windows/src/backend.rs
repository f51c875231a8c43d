//! `ServiceControl` implementation over the native SCM

use std::sync::{Arc, Mutex};

use svcscope_core::models::{DesiredState, Service, ServiceInformation, ServiceTrigger};
use svcscope_core::{ManagerConfig, ScmResult, ServiceControl};
use tracing::debug;
use windows::Win32::System::Services::{
    SC_MANAGER_CONNECT, SC_MANAGER_ENUMERATE_SERVICE, SERVICE_ENUMERATE_DEPENDENTS,
    SERVICE_QUERY_CONFIG,
};

use crate::configuration::query_configuration;
use crate::dependents::query_dependents;
use crate::handles::{open_manager, open_service, ScHandle};
use crate::services::enumerate_services;
use crate::triggers::query_triggers;

const LOCAL_ACCESS: u32 = SC_MANAGER_CONNECT | SC_MANAGER_ENUMERATE_SERVICE;

/// Native backend for the local machine and, for enumeration, remote hosts.
///
/// The local manager handle is opened on first use and shared by every
/// call. Service handles are opened per call and never shared.
pub struct NativeBackend {
    config: ManagerConfig,
    local: Mutex<Option<Arc<ScHandle>>>,
}

impl NativeBackend {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config: config.normalized(),
            local: Mutex::new(None),
        }
    }

    fn local_manager(&self) -> ScmResult<Arc<ScHandle>> {
        let mut slot = self.local.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(handle) = slot.as_ref() {
            return Ok(Arc::clone(handle));
        }
        let handle = Arc::new(open_manager("", LOCAL_ACCESS)?);
        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    fn open_local_service(&self, name: &str, access: u32) -> ScmResult<ScHandle> {
        let manager = self.local_manager()?;
        open_service(&manager, name, access)
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new(ManagerConfig::default())
    }
}

impl ServiceControl for NativeBackend {
    fn enumerate(&self, state: DesiredState, host: &str) -> ScmResult<Vec<Service>> {
        if host.is_empty() {
            let manager = self.local_manager()?;
            return enumerate_services(&manager, host, state, &self.config);
        }
        debug!(host, "opening remote service control manager");
        let manager = open_manager(host, SC_MANAGER_ENUMERATE_SERVICE)?;
        enumerate_services(&manager, host, state, &self.config)
    }

    fn configuration(&self, service_name: &str) -> ScmResult<ServiceInformation> {
        let service = self.open_local_service(service_name, SERVICE_QUERY_CONFIG)?;
        query_configuration(&service, service_name, self.config.max_buffer_bytes)
    }

    fn triggers(&self, service_name: &str) -> ScmResult<Vec<ServiceTrigger>> {
        let service = self.open_local_service(service_name, SERVICE_QUERY_CONFIG)?;
        query_triggers(&service, service_name, self.config.max_buffer_bytes)
    }

    fn dependents(&self, service_name: &str, state: DesiredState) -> ScmResult<Vec<Service>> {
        let service = self.open_local_service(service_name, SERVICE_ENUMERATE_DEPENDENTS)?;
        query_dependents(&service, service_name, state, self.config.max_buffer_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcscope_core::ErrorKind;

    #[test]
    fn test_local_manager_is_cached() {
        let backend = NativeBackend::default();
        let first = backend.local_manager().unwrap();
        let second = backend.local_manager().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_service_is_not_found() {
        let backend = NativeBackend::default();
        let err = backend
            .configuration("svcscope-does-not-exist")
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ServiceNotFound);
    }
}
