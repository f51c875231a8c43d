//! Non-blocking facade over a [`ServiceControl`] backend
//!
//! Each public operation validates its arguments on the caller's thread,
//! then runs as one blocking unit on a bounded worker pool. The caller gets a
//! [`Pending`] that resolves exactly once with the result. Operations cannot
//! be cancelled mid-flight; dropping a `Pending` only discards the result.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::backend::ServiceControl;
use crate::config::ManagerConfig;
use crate::error::{ScmError, ScmResult};
use crate::models::{
    dependents_by_name, DependentServices, DesiredState, Service, ServiceInformation,
    ServiceTrigger,
};
use crate::request::{validate_service_name, Request};

/// Result of an operation submitted to the worker pool
#[must_use = "a Pending does nothing useful unless awaited"]
pub struct Pending<T> {
    handle: JoinHandle<ScmResult<T>>,
}

impl<T> Future for Pending<T> {
    type Output = ScmResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join)) => Poll::Ready(Err(ScmError::WorkerFailed(join.to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Async entry point for service introspection
pub struct ServiceManager<B: ServiceControl> {
    backend: Arc<B>,
    permits: Arc<Semaphore>,
    runtime: Handle,
    config: ManagerConfig,
}

impl<B: ServiceControl> Clone for ServiceManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            permits: Arc::clone(&self.permits),
            runtime: self.runtime.clone(),
            config: self.config.clone(),
        }
    }
}

impl<B: ServiceControl> ServiceManager<B> {
    /// Create a manager bound to the current Tokio runtime
    pub fn new(backend: B, config: ManagerConfig) -> ScmResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| ScmError::WorkerFailed(format!("no async runtime available: {}", e)))?;
        Ok(Self::with_runtime(backend, config, runtime))
    }

    /// Create a manager that schedules work on `runtime`
    pub fn with_runtime(backend: B, config: ManagerConfig, runtime: Handle) -> Self {
        let config = config.normalized();
        Self {
            backend: Arc::new(backend),
            permits: Arc::new(Semaphore::new(config.workers)),
            runtime,
            config,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// List services filtered by activity on `host` ("" for the local machine)
    pub fn enumerate_services(
        &self,
        state: DesiredState,
        host: &str,
    ) -> ScmResult<Pending<Vec<Service>>> {
        if host.contains('\0') {
            return Err(ScmError::invalid_argument(
                "argument host should not contain NUL characters!",
            ));
        }
        let host = host.to_string();
        Ok(self.submit("enumerateServices", move |backend| {
            backend.enumerate(state, &host)
        }))
    }

    /// Static configuration of one service
    pub fn get_service_configuration(
        &self,
        service_name: &str,
    ) -> ScmResult<Pending<ServiceInformation>> {
        validate_service_name(service_name)?;
        let name = service_name.to_string();
        Ok(self.submit("getServiceConfiguration", move |backend| {
            backend.configuration(&name)
        }))
    }

    /// Triggers of one service, in native order
    pub fn get_service_triggers(
        &self,
        service_name: &str,
    ) -> ScmResult<Pending<Vec<ServiceTrigger>>> {
        validate_service_name(service_name)?;
        let name = service_name.to_string();
        Ok(self.submit("getServiceTriggers", move |backend| {
            backend.triggers(&name)
        }))
    }

    /// Direct dependents of one service keyed by name
    pub fn enum_dependent_services(
        &self,
        service_name: &str,
        state: DesiredState,
    ) -> ScmResult<Pending<DependentServices>> {
        validate_service_name(service_name)?;
        let name = service_name.to_string();
        Ok(self.submit("enumDependentServices", move |backend| {
            backend.dependents(&name, state).map(dependents_by_name)
        }))
    }

    /// Run an already-validated request and return its JSON result
    pub fn dispatch(&self, request: Request) -> Pending<Value> {
        self.submit(request.op(), move |backend| match request {
            Request::EnumerateServices { state, host } => to_json(backend.enumerate(state, &host)?),
            Request::GetServiceConfiguration { service_name } => {
                to_json(backend.configuration(&service_name)?)
            }
            Request::GetServiceTriggers { service_name } => {
                to_json(backend.triggers(&service_name)?)
            }
            Request::EnumDependentServices {
                service_name,
                state,
            } => to_json(dependents_by_name(
                backend.dependents(&service_name, state)?,
            )),
        })
    }

    fn submit<T, F>(&self, op: &'static str, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&B) -> ScmResult<T> + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let permits = Arc::clone(&self.permits);

        let handle = self.runtime.spawn(async move {
            let _permit = permits
                .acquire_owned()
                .await
                .map_err(|e| ScmError::WorkerFailed(e.to_string()))?;
            debug!(op, "running on worker pool");

            tokio::task::spawn_blocking(move || work(backend.as_ref()))
                .await
                .map_err(|e| ScmError::WorkerFailed(e.to_string()))?
        });

        Pending { handle }
    }
}

fn to_json<T: Serialize>(value: T) -> ScmResult<Value> {
    serde_json::to_value(value).map_err(|e| ScmError::WorkerFailed(format!("serialize: {}", e)))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{ErrorControl, ServiceProcess, ServiceType, StartType, StatusFields};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted backend: dependents by service name, config for known names
    #[derive(Default)]
    pub(crate) struct FakeScm {
        pub services: Vec<Service>,
        pub graph: HashMap<String, Vec<String>>,
        pub denied: Vec<String>,
        pub calls: AtomicUsize,
        pub in_flight: AtomicUsize,
        pub peak: AtomicUsize,
        pub delay: Option<Duration>,
        pub seen: Mutex<Vec<String>>,
    }

    pub(crate) fn service(name: &str, state: u32) -> Service {
        let status = StatusFields {
            service_type: 0x10,
            current_state: state,
            ..Default::default()
        };
        Service {
            name: name.to_string(),
            display_name: format!("{} Service", name),
            process: ServiceProcess::extended(&status, if state == 4 { 100 } else { 0 }, 0, None),
        }
    }

    impl FakeScm {
        /// Edges as `(service, "dependent,dependent")`
        pub(crate) fn with_graph(edges: &[(&str, &str)]) -> Self {
            let mut fake = FakeScm::default();
            for (root, deps) in edges {
                fake.graph.insert(
                    root.to_string(),
                    deps.split(',')
                        .filter(|d| !d.is_empty())
                        .map(|d| d.to_string())
                        .collect(),
                );
            }
            fake
        }

        fn enter(&self, what: &str) -> ScmResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(what.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.denied.iter().any(|d| d == what) {
                return Err(ScmError::AccessDenied { api: "OpenServiceW" });
            }
            Ok(())
        }

        fn lookup(&self, name: &str) -> ScmResult<()> {
            if self.services.iter().any(|s| s.name == name) || self.graph.contains_key(name) {
                Ok(())
            } else {
                Err(ScmError::from_win32("OpenServiceW", 1060, name))
            }
        }
    }

    impl ServiceControl for FakeScm {
        fn enumerate(&self, state: DesiredState, host: &str) -> ScmResult<Vec<Service>> {
            self.enter("enumerate")?;
            if host == "unreachable" {
                return Err(ScmError::from_win32("OpenSCManagerW", 1722, host));
            }
            Ok(self
                .services
                .iter()
                .filter(|s| state.admits(s.state()))
                .cloned()
                .collect())
        }

        fn configuration(&self, service_name: &str) -> ScmResult<ServiceInformation> {
            self.enter(service_name)?;
            self.lookup(service_name)?;
            Ok(ServiceInformation {
                service_type: ServiceType::OWN_PROCESS,
                start_type: StartType::Demand,
                error_control: ErrorControl::Normal,
                binary_path: format!(r"C:\Services\{}.exe", service_name),
                account: "LocalSystem".to_string(),
                description: None,
                load_order_group: None,
                tag_id: None,
                dependencies: None,
            })
        }

        fn triggers(&self, service_name: &str) -> ScmResult<Vec<ServiceTrigger>> {
            self.enter(service_name)?;
            self.lookup(service_name)?;
            Ok(Vec::new())
        }

        fn dependents(&self, service_name: &str, _state: DesiredState) -> ScmResult<Vec<Service>> {
            self.enter(service_name)?;
            self.lookup(service_name)?;
            Ok(self.graph[service_name]
                .iter()
                .map(|name| Service {
                    process: ServiceProcess::reduced(&StatusFields {
                        current_state: 4,
                        ..Default::default()
                    }),
                    ..service(name, 4)
                })
                .collect())
        }
    }

    fn manager(fake: FakeScm) -> ServiceManager<FakeScm> {
        ServiceManager::new(fake, ManagerConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_enumerate_partitions_by_state() {
        let mut fake = FakeScm::default();
        fake.services = vec![service("a", 4), service("b", 1), service("c", 7), service("d", 1)];
        let mgr = manager(fake);

        let all = mgr.enumerate_services(DesiredState::All, "").unwrap().await.unwrap();
        let active = mgr.enumerate_services(DesiredState::Active, "").unwrap().await.unwrap();
        let inactive = mgr.enumerate_services(DesiredState::Inactive, "").unwrap().await.unwrap();

        assert_eq!(all.len(), 4);
        assert_eq!(active.len() + inactive.len(), all.len());
        assert!(active.iter().all(|s| s.state().is_active()));
        assert!(inactive.iter().all(|s| !s.state().is_active()));

        let mut names: Vec<_> = active.iter().chain(&inactive).map(|s| s.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[tokio::test]
    async fn test_enumerate_error_fails_whole_call() {
        let mut fake = FakeScm::default();
        fake.services = vec![service("a", 4)];
        let mgr = manager(fake);
        let err = mgr
            .enumerate_services(DesiredState::All, "unreachable")
            .unwrap()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HostUnreachable);
    }

    #[tokio::test]
    async fn test_invalid_name_fails_before_backend() {
        let mgr = manager(FakeScm::default());
        let err = mgr.get_service_configuration("").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(mgr.get_service_triggers("").is_err());
        assert!(mgr.enum_dependent_services("", DesiredState::All).is_err());
        assert_eq!(mgr.backend().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_detail_failures_are_per_call() {
        let mut fake = FakeScm::default();
        fake.services = vec![service("a", 4), service("b", 1)];
        fake.denied = vec!["b".to_string()];
        let mgr = manager(fake);

        let services = mgr.enumerate_services(DesiredState::All, "").unwrap().await.unwrap();
        let mut ok = 0;
        for svc in &services {
            match mgr.get_service_configuration(&svc.name).unwrap().await {
                Ok(info) => {
                    assert!(!info.binary_path.is_empty());
                    assert!(!info.account.is_empty());
                    ok += 1;
                }
                Err(e) => assert!(matches!(
                    e.kind(),
                    ErrorKind::AccessDenied | ErrorKind::ServiceNotFound
                )),
            }
        }
        assert_eq!(ok, 1);

        let missing = mgr.get_service_configuration("ghost").unwrap().await.unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::ServiceNotFound);
    }

    #[tokio::test]
    async fn test_no_triggers_is_empty_not_error() {
        let mut fake = FakeScm::default();
        fake.services = vec![service("a", 4)];
        let mgr = manager(fake);
        let triggers = mgr.get_service_triggers("a").unwrap().await.unwrap();
        assert!(triggers.is_empty());
    }

    #[tokio::test]
    async fn test_dependents_keyed_by_name() {
        let mgr = manager(FakeScm::with_graph(&[("RpcSs", "b,a,b")]));
        let deps = mgr
            .enum_dependent_services("RpcSs", DesiredState::All)
            .unwrap()
            .await
            .unwrap();
        assert_eq!(deps.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        for (key, svc) in &deps {
            assert_eq!(key, &svc.name);
            assert_eq!(svc.process.id, None);
            assert_eq!(svc.process.check_point, None);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_is_bounded() {
        let mut fake = FakeScm::default();
        fake.services = (0..8).map(|i| service(&format!("s{}", i), 4)).collect();
        fake.delay = Some(Duration::from_millis(20));
        let config = ManagerConfig {
            workers: 2,
            ..Default::default()
        };
        let mgr = ServiceManager::new(fake, config).unwrap();

        let pending: Vec<_> = (0..8)
            .map(|i| mgr.get_service_configuration(&format!("s{}", i)).unwrap())
            .collect();
        for p in pending {
            p.await.unwrap();
        }

        assert_eq!(mgr.backend().calls.load(Ordering::SeqCst), 8);
        assert!(mgr.backend().peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_dispatch_returns_json() {
        let mut fake = FakeScm::default();
        fake.services = vec![service("a", 4)];
        let mgr = manager(fake);

        let request = Request::from_json(&serde_json::json!({
            "op": "getServiceConfiguration",
            "args": ["a"]
        }))
        .unwrap();
        let value = mgr.dispatch(request).await.unwrap();
        assert_eq!(value["startType"], 3);
        assert_eq!(value["account"], "LocalSystem");
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let err = ServiceManager::new(FakeScm::default(), ManagerConfig::default()).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::WorkerFailed);
    }
}
