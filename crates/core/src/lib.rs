//! svcscope-core: Host-agnostic model and async facade for SCM introspection
//!
//! This crate contains everything that does not touch the native Service
//! Control Manager: the data model, error taxonomy, buffer negotiation and
//! paging logic, argument validation, the worker-pool facade and rendering.
//! A concrete manager plugs in through [`ServiceControl`].
//!
//! # Modules
//!
//! - [`models`] - Services, process status, configuration and triggers
//! - [`error`] - `ScmError` and the taxonomy exposed to callers
//! - [`buffer`] - Two-phase buffer negotiation and page accumulation
//! - [`manager`] - The async `ServiceManager` facade
//! - [`walk`] - Transitive dependent-service closure
//! - [`render`] - Output formatters (human, JSON)
//!
//! # Example
//!
//! ```
//! use svcscope_core::{render, DesiredState, ServiceState};
//!
//! assert!(DesiredState::Active.admits(ServiceState::Running));
//! let json = render::render_json_compact(&DesiredState::All).unwrap();
//! assert_eq!(json, "2");
//! ```

pub mod backend;
pub mod buffer;
pub mod config;
pub mod constants;
pub mod decode;
pub mod error;
pub mod manager;
pub mod models;
pub mod render;
pub mod request;
pub mod walk;

// Re-export commonly used types at crate root
pub use backend::ServiceControl;
pub use config::ManagerConfig;
pub use error::{ErrorKind, ErrorReport, ScmError, ScmResult};
pub use manager::{Pending, ServiceManager};
pub use models::{
    ControlsAccepted, DependentServices, DesiredState, ErrorControl, Service, ServiceFlags,
    ServiceInformation, ServiceProcess, ServiceState, ServiceTrigger, ServiceType, StartType,
    StatusFields, TriggerAction, TriggerDataItem, TriggerDataType, TriggerType,
};
pub use request::Request;
pub use walk::{DependencyClosure, DependentNode, WalkError};
