//! svcscope-platform-windows: Native Service Control Manager backend
//!
//! Provides [`NativeBackend`], the `ServiceControl` implementation that the
//! svcscope facade drives on Windows, along with the individual native
//! readers it is built from.

#[cfg(windows)]
pub mod backend;
#[cfg(windows)]
pub mod configuration;
#[cfg(windows)]
pub mod dependents;
#[cfg(windows)]
pub mod error;
#[cfg(windows)]
pub mod handles;
#[cfg(windows)]
pub mod process_snapshot;
#[cfg(windows)]
pub mod services;
#[cfg(windows)]
pub mod triggers;

#[cfg(windows)]
pub use backend::*;
#[cfg(windows)]
pub use configuration::*;
#[cfg(windows)]
pub use dependents::*;
#[cfg(windows)]
pub use handles::*;
#[cfg(windows)]
pub use process_snapshot::*;
#[cfg(windows)]
pub use services::*;
#[cfg(windows)]
pub use triggers::*;
