//! The seam between the async facade and a concrete Service Control Manager

use crate::error::ScmResult;
use crate::models::{DesiredState, Service, ServiceInformation, ServiceTrigger};

/// Blocking access to a Service Control Manager.
///
/// Each method is one unit of native work: it acquires whatever handles it
/// needs, releases them before returning, and never shares a service-level
/// handle with another call. Implementations must be safe to call from
/// several worker threads at once. Service names reaching a backend have
/// already been validated as non-empty.
pub trait ServiceControl: Send + Sync + 'static {
    /// List services matching `state` on `host` (empty for the local machine),
    /// in the order the manager returns them. All-or-nothing.
    fn enumerate(&self, state: DesiredState, host: &str) -> ScmResult<Vec<Service>>;

    /// Static configuration of one service, including its description.
    fn configuration(&self, service_name: &str) -> ScmResult<ServiceInformation>;

    /// Start/stop triggers of one service; empty when none are configured.
    fn triggers(&self, service_name: &str) -> ScmResult<Vec<ServiceTrigger>>;

    /// Direct dependents of one service, with reduced process status.
    fn dependents(&self, service_name: &str, state: DesiredState) -> ScmResult<Vec<Service>>;
}

impl<T: ServiceControl + ?Sized> ServiceControl for Box<T> {
    fn enumerate(&self, state: DesiredState, host: &str) -> ScmResult<Vec<Service>> {
        (**self).enumerate(state, host)
    }

    fn configuration(&self, service_name: &str) -> ScmResult<ServiceInformation> {
        (**self).configuration(service_name)
    }

    fn triggers(&self, service_name: &str) -> ScmResult<Vec<ServiceTrigger>> {
        (**self).triggers(service_name)
    }

    fn dependents(&self, service_name: &str, state: DesiredState) -> ScmResult<Vec<Service>> {
        (**self).dependents(service_name, state)
    }
}
