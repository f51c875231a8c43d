//! Service data model shared by every backend
//!
//! Numeric native values travel as plain numbers on the wire; the Rust side
//! wraps them in typed enums and bitmask newtypes. Unknown native values are
//! kept verbatim in `Other` variants rather than dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::decode::non_empty;
use crate::error::{ScmError, ScmResult};

/// Declares a `u32`-backed enum with an `Other(u32)` fallback, wire-encoded as the number.
macro_rules! native_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "u32", into = "u32")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Value with no named counterpart
            Other(u32),
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                match value {
                    $( $value => $name::$variant, )+
                    other => $name::Other(other),
                }
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                match value {
                    $( $name::$variant => $value, )+
                    $name::Other(other) => other,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $( $name::$variant => write!(f, $label), )+
                    $name::Other(other) => write!(f, "Other ({})", other),
                }
            }
        }
    };
}

/// Declares a transparent `u32` bitmask with named flags.
macro_rules! native_flags {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $( const $flag:ident = $value:literal => $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            $( pub const $flag: $name = $name($value); )+

            const NAMES: &'static [(u32, &'static str)] = &[ $( ($value, $label), )+ ];

            pub fn bits(self) -> u32 {
                self.0
            }

            pub fn contains(self, other: $name) -> bool {
                other.0 != 0 && self.0 & other.0 == other.0
            }

            /// Labels of the named flags that are set
            pub fn names(self) -> Vec<&'static str> {
                Self::NAMES
                    .iter()
                    .filter(|(bits, _)| self.0 & bits == *bits)
                    .map(|(_, label)| *label)
                    .collect()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let names = self.names();
                if names.is_empty() {
                    write!(f, "0x{:x}", self.0)
                } else {
                    write!(f, "{}", names.join(" | "))
                }
            }
        }
    };
}

native_enum! {
    /// Current state reported by the SCM
    pub enum ServiceState {
        Stopped = 1 => "Stopped",
        StartPending = 2 => "Start Pending",
        StopPending = 3 => "Stop Pending",
        Running = 4 => "Running",
        ContinuePending = 5 => "Continue Pending",
        PausePending = 6 => "Pause Pending",
        Paused = 7 => "Paused",
    }
}

impl ServiceState {
    /// Anything other than stopped counts as active for enumeration filters
    pub fn is_active(self) -> bool {
        !matches!(self, ServiceState::Stopped)
    }
}

native_enum! {
    /// How the service is started
    pub enum StartType {
        Boot = 0 => "Boot",
        System = 1 => "System",
        Auto = 2 => "Auto",
        Demand = 3 => "Demand",
        Disabled = 4 => "Disabled",
    }
}

native_enum! {
    /// Severity of a start failure
    pub enum ErrorControl {
        Ignore = 0 => "Ignore",
        Normal = 1 => "Normal",
        Severe = 2 => "Severe",
        Critical = 3 => "Critical",
    }
}

native_enum! {
    /// Event class that fires a trigger
    pub enum TriggerType {
        DeviceInterfaceArrival = 1 => "Device Interface Arrival",
        AddressAvailability = 2 => "IP Address Availability",
        DomainJoin = 3 => "Domain Join",
        FirewallPortEvent = 4 => "Firewall Port Event",
        GroupPolicy = 5 => "Group Policy",
        NetworkEndpoint = 6 => "Network Endpoint",
        Custom = 20 => "Custom",
        Aggregate = 30 => "Aggregate",
    }
}

native_enum! {
    /// What a trigger does to the service
    pub enum TriggerAction {
        Start = 1 => "Start",
        Stop = 2 => "Stop",
    }
}

native_enum! {
    /// Encoding of a trigger data item payload
    pub enum TriggerDataType {
        Binary = 1 => "Binary",
        String = 2 => "String",
        Level = 3 => "Level",
        KeywordAny = 4 => "Keyword Any",
        KeywordAll = 5 => "Keyword All",
    }
}

native_flags! {
    /// Kind of service image
    pub struct ServiceType {
        const KERNEL_DRIVER = 0x1 => "Kernel Driver";
        const FILE_SYSTEM_DRIVER = 0x2 => "File System Driver";
        const ADAPTER = 0x4 => "Adapter";
        const RECOGNIZER_DRIVER = 0x8 => "Recognizer Driver";
        const OWN_PROCESS = 0x10 => "Own Process";
        const SHARE_PROCESS = 0x20 => "Shared Process";
        const USER_SERVICE = 0x40 => "User Service";
        const USER_SERVICE_INSTANCE = 0x80 => "User Service Instance";
        const INTERACTIVE_PROCESS = 0x100 => "Interactive";
    }
}

native_flags! {
    /// Control codes the service currently accepts
    pub struct ControlsAccepted {
        const STOP = 0x1 => "Stop";
        const PAUSE_CONTINUE = 0x2 => "Pause/Continue";
        const SHUTDOWN = 0x4 => "Shutdown";
        const PARAM_CHANGE = 0x8 => "Param Change";
        const NET_BIND_CHANGE = 0x10 => "NetBind Change";
        const HARDWARE_PROFILE_CHANGE = 0x20 => "Hardware Profile Change";
        const POWER_EVENT = 0x40 => "Power Event";
        const SESSION_CHANGE = 0x80 => "Session Change";
        const PRESHUTDOWN = 0x100 => "Preshutdown";
        const TIME_CHANGE = 0x200 => "Time Change";
        const TRIGGER_EVENT = 0x400 => "Trigger Event";
    }
}

native_flags! {
    /// Runtime flags of a running service process
    pub struct ServiceFlags {
        const RUNS_IN_SYSTEM_PROCESS = 0x1 => "Runs In System Process";
    }
}

/// Activity filter for enumeration calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum DesiredState {
    Active,
    Inactive,
    #[default]
    All,
}

impl DesiredState {
    /// Native `ENUM_SERVICE_STATE` value
    pub fn native(self) -> u32 {
        match self {
            DesiredState::Active => 1,
            DesiredState::Inactive => 2,
            DesiredState::All => 3,
        }
    }

    /// Whether a service in `state` belongs to this filter
    pub fn admits(self, state: ServiceState) -> bool {
        match self {
            DesiredState::Active => state.is_active(),
            DesiredState::Inactive => !state.is_active(),
            DesiredState::All => true,
        }
    }
}

impl TryFrom<u32> for DesiredState {
    type Error = ScmError;

    fn try_from(value: u32) -> ScmResult<Self> {
        match value {
            0 => Ok(DesiredState::Active),
            1 => Ok(DesiredState::Inactive),
            2 => Ok(DesiredState::All),
            other => Err(ScmError::invalid_argument(format!(
                "argument desiredState should be one of 0 (Active), 1 (Inactive), 2 (All), got {}",
                other
            ))),
        }
    }
}

impl From<DesiredState> for u32 {
    fn from(value: DesiredState) -> u32 {
        match value {
            DesiredState::Active => 0,
            DesiredState::Inactive => 1,
            DesiredState::All => 2,
        }
    }
}

impl std::str::FromStr for DesiredState {
    type Err = ScmError;

    fn from_str(s: &str) -> ScmResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "0" => Ok(DesiredState::Active),
            "inactive" | "1" => Ok(DesiredState::Inactive),
            "all" | "2" => Ok(DesiredState::All),
            other => Err(ScmError::invalid_argument(format!(
                "unknown service state {:?} (expected active, inactive or all)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Active => write!(f, "active"),
            DesiredState::Inactive => write!(f, "inactive"),
            DesiredState::All => write!(f, "all"),
        }
    }
}

/// Status fields common to every native status structure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFields {
    pub service_type: u32,
    pub current_state: u32,
    pub controls_accepted: u32,
    pub win32_exit_code: u32,
    pub service_specific_exit_code: u32,
    pub check_point: u32,
    pub wait_hint: u32,
}

/// Runtime status of a service process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceProcess {
    /// Process ID, absent when the service is not running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u32>,
    /// Image name of the hosting process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub current_state: ServiceState,
    pub service_type: ServiceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_point: Option<u32>,
    pub controls_accepted: ControlsAccepted,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_flags: Option<ServiceFlags>,
    pub service_specific_exit_code: u32,
    pub wait_hint: u32,
    pub win32_exit_code: u32,
}

impl ServiceProcess {
    /// Build from the reduced status returned by dependent enumeration
    pub fn reduced(status: &StatusFields) -> Self {
        Self {
            id: None,
            name: None,
            current_state: ServiceState::from(status.current_state),
            service_type: ServiceType(status.service_type),
            check_point: None,
            controls_accepted: ControlsAccepted(status.controls_accepted),
            service_flags: None,
            service_specific_exit_code: status.service_specific_exit_code,
            wait_hint: status.wait_hint,
            win32_exit_code: status.win32_exit_code,
        }
    }

    /// Build from the extended status returned by full enumeration
    ///
    /// A zero `pid` means the service has no process.
    pub fn extended(status: &StatusFields, pid: u32, flags: u32, image: Option<String>) -> Self {
        let id = (pid != 0).then_some(pid);
        Self {
            id,
            name: id.and(image),
            check_point: Some(status.check_point),
            service_flags: Some(ServiceFlags(flags)),
            ..Self::reduced(status)
        }
    }
}

/// A service as listed by the SCM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service name (internal name used by SCM)
    pub name: String,
    /// Display name (human-readable)
    pub display_name: String,
    pub process: ServiceProcess,
}

impl Service {
    pub fn state(&self) -> ServiceState {
        self.process.current_state
    }

    pub fn is_running(&self) -> bool {
        self.process.current_state == ServiceState::Running
    }
}

/// Dependent services keyed by service name
pub type DependentServices = BTreeMap<String, Service>;

/// Key a list of dependents by name; the first occurrence of a name wins
pub fn dependents_by_name(services: Vec<Service>) -> DependentServices {
    let mut map = DependentServices::new();
    for service in services {
        map.entry(service.name.clone()).or_insert(service);
    }
    map
}

/// Static configuration of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInformation {
    #[serde(rename = "type")]
    pub service_type: ServiceType,
    pub start_type: StartType,
    pub error_control: ErrorControl,
    pub binary_path: String,
    /// Logon identity
    pub account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_order_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_id: Option<u32>,
    /// Raw dependency list, entries separated by `/`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<String>,
}

/// Raw fields of a native configuration record, strings already decoded
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFields {
    pub service_type: u32,
    pub start_type: u32,
    pub error_control: u32,
    pub binary_path: String,
    pub account: String,
    pub load_order_group: String,
    pub tag_id: u32,
    /// Multi-string entries, in native order
    pub dependencies: Vec<String>,
}

impl ServiceInformation {
    /// Build from a native record. Empty strings, an empty dependency list
    /// and a zero tag become `None`.
    pub fn from_native(fields: ConfigFields, description: Option<String>) -> Self {
        Self {
            service_type: ServiceType(fields.service_type),
            start_type: StartType::from(fields.start_type),
            error_control: ErrorControl::from(fields.error_control),
            binary_path: fields.binary_path,
            account: fields.account,
            description: description.and_then(non_empty),
            load_order_group: non_empty(fields.load_order_group),
            tag_id: (fields.tag_id != 0).then_some(fields.tag_id),
            dependencies: non_empty(fields.dependencies.join("/")),
        }
    }

    /// Individual dependency names; group dependencies keep their `+` prefix
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies
            .as_deref()
            .map(|deps| deps.split('/').filter(|d| !d.is_empty()).collect())
            .unwrap_or_default()
    }
}

/// One typed data item attached to a trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDataItem {
    pub data_type: TriggerDataType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A start or stop trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTrigger {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub action: TriggerAction,
    /// Trigger subtype, `{xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx}`
    pub guid: String,
    pub data_items: Vec<TriggerDataItem>,
}
