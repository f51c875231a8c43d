//! Output rendering for services, configuration, triggers and closures

pub mod json;
pub mod text;

pub use json::{render_json, render_json_compact, render_json_string};
pub use text::{
    render_closure, render_configuration, render_dependents, render_service, render_short,
    render_triggers,
};
