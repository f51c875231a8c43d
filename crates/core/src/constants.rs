//! Numeric enums callers pass to or read back from the facade
//!
//! | enum            | values                                                  |
//! |-----------------|---------------------------------------------------------|
//! | `DesiredState`  | Active = 0, Inactive = 1, All = 2                       |
//! | `TriggerAction` | Start = 1, Stop = 2                                     |
//! | `TriggerType`   | 1 ..= 6, Custom = 20, Aggregate = 30                    |
//!
//! Codes the SCM reports that are not listed come back as `Other(code)`.

pub use crate::models::{DesiredState, TriggerAction, TriggerType};

/// Every `DesiredState` in wire order
pub const DESIRED_STATES: [DesiredState; 3] =
    [DesiredState::Active, DesiredState::Inactive, DesiredState::All];
