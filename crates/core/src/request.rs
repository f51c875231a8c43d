//! Dynamically-typed request boundary
//!
//! Requests arrive as JSON (`{"op": "getServiceConfiguration", "args": ["Spooler"]}`)
//! and are validated here, synchronously, before any backend is touched.

use serde_json::Value;

use crate::error::{ScmError, ScmResult};
use crate::models::DesiredState;

pub const WRONG_ARGUMENT_COUNT: &str = "Wrong number of argument provided!";

/// A validated operation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    EnumerateServices { state: DesiredState, host: String },
    GetServiceConfiguration { service_name: String },
    GetServiceTriggers { service_name: String },
    EnumDependentServices { service_name: String, state: DesiredState },
}

impl Request {
    /// Parse and validate a `{"op": .., "args": [..]}` object
    pub fn from_json(value: &Value) -> ScmResult<Self> {
        let op = value
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| ScmError::invalid_argument("request field op should be typeof string!"))?;

        let args: &[Value] = match value.get("args") {
            None | Some(Value::Null) => &[],
            Some(Value::Array(items)) => items.as_slice(),
            Some(_) => {
                return Err(ScmError::invalid_argument(
                    "request field args should be an array!",
                ))
            }
        };

        match op {
            "enumerateServices" | "enumServicesStatus" => Ok(Request::EnumerateServices {
                state: desired_state_arg(args.first())?,
                host: host_arg(args.get(1))?,
            }),
            "getServiceConfiguration" => Ok(Request::GetServiceConfiguration {
                service_name: service_name_arg(args.first())?,
            }),
            "getServiceTriggers" => Ok(Request::GetServiceTriggers {
                service_name: service_name_arg(args.first())?,
            }),
            "enumDependentServices" => Ok(Request::EnumDependentServices {
                service_name: service_name_arg(args.first())?,
                state: desired_state_arg(args.get(1))?,
            }),
            other => Err(ScmError::invalid_argument(format!("unknown operation {:?}", other))),
        }
    }

    /// Wire name of the operation
    pub fn op(&self) -> &'static str {
        match self {
            Request::EnumerateServices { .. } => "enumerateServices",
            Request::GetServiceConfiguration { .. } => "getServiceConfiguration",
            Request::GetServiceTriggers { .. } => "getServiceTriggers",
            Request::EnumDependentServices { .. } => "enumDependentServices",
        }
    }
}

/// Require a non-empty service name
pub fn validate_service_name(name: &str) -> ScmResult<()> {
    if name.is_empty() {
        return Err(ScmError::invalid_argument(
            "argument serviceName should not be empty!",
        ));
    }
    if name.contains('\0') {
        return Err(ScmError::invalid_argument(
            "argument serviceName should not contain NUL characters!",
        ));
    }
    Ok(())
}

/// Mandatory service name argument
pub fn service_name_arg(value: Option<&Value>) -> ScmResult<String> {
    let value = value.ok_or_else(|| ScmError::invalid_argument(WRONG_ARGUMENT_COUNT))?;
    let name = value.as_str().ok_or_else(|| {
        ScmError::invalid_argument("argument serviceName should be typeof string!")
    })?;
    validate_service_name(name)?;
    Ok(name.to_string())
}

/// Optional desired state argument, defaulting to `All`
pub fn desired_state_arg(value: Option<&Value>) -> ScmResult<DesiredState> {
    match value {
        None | Some(Value::Null) => Ok(DesiredState::All),
        Some(Value::Number(n)) => {
            let code = n
                .as_u64()
                .and_then(|code| u32::try_from(code).ok())
                .ok_or_else(|| {
                    ScmError::invalid_argument(format!(
                        "argument desiredState should be an unsigned integer, got {}",
                        n
                    ))
                })?;
            DesiredState::try_from(code)
        }
        Some(_) => Err(ScmError::invalid_argument(
            "argument desiredState should be typeof number!",
        )),
    }
}

/// Optional host argument, defaulting to the local machine
pub fn host_arg(value: Option<&Value>) -> ScmResult<String> {
    match value {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(host)) => Ok(host.clone()),
        Some(_) => Err(ScmError::invalid_argument(
            "argument host should be typeof string!",
        )),
    }
}
