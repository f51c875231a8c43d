//! Text-based rendering for services, configuration and triggers

use std::collections::BTreeMap;

use crate::models::{DependentServices, Service, ServiceInformation, ServiceTrigger};
use crate::walk::DependencyClosure;

/// Render a human-readable block for one service
pub fn render_service(service: &Service) -> String {
    let mut out = String::new();
    let process = &service.process;

    out.push_str(&format!("─── {} ───\n", service.name));
    out.push_str(&format!("  Display name: {}\n", service.display_name));
    out.push_str(&format!("  State: {}\n", process.current_state));
    out.push_str(&format!("  Type: {}\n", process.service_type));

    if let Some(pid) = process.id {
        match &process.name {
            Some(name) => out.push_str(&format!("  Process: {} (PID {})\n", name, pid)),
            None => out.push_str(&format!("  Process: PID {}\n", pid)),
        }
    }

    out.push_str(&format!("  Accepts: {}\n", process.controls_accepted));

    if process.win32_exit_code != 0 {
        out.push_str(&format!("  Win32 exit code: {}\n", process.win32_exit_code));
    }
    if process.service_specific_exit_code != 0 {
        out.push_str(&format!(
            "  Service exit code: {}\n",
            process.service_specific_exit_code
        ));
    }
    if let Some(flags) = process.service_flags {
        if flags.bits() != 0 {
            out.push_str(&format!("  Flags: {}\n", flags));
        }
    }

    out
}

/// Render a single line per service: name, state, pid
pub fn render_short(service: &Service) -> String {
    let pid = service
        .process
        .id
        .map(|pid| pid.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} [{}] pid={} ({})",
        service.name, service.process.current_state, pid, service.display_name
    )
}

/// Render the static configuration of a service
pub fn render_configuration(name: &str, info: &ServiceInformation) -> String {
    let mut out = String::new();

    out.push_str(&format!("─── Configuration: {} ───\n\n", name));
    out.push_str(&format!("  Type: {}\n", info.service_type));
    out.push_str(&format!("  Start type: {}\n", info.start_type));
    out.push_str(&format!("  Error control: {}\n", info.error_control));
    out.push_str(&format!("  Binary path: {}\n", info.binary_path));
    out.push_str(&format!("  Account: {}\n", info.account));

    if let Some(group) = &info.load_order_group {
        out.push_str(&format!("  Load order group: {}\n", group));
    }
    if let Some(tag) = info.tag_id {
        out.push_str(&format!("  Tag: {}\n", tag));
    }

    let deps = info.dependency_names();
    if !deps.is_empty() {
        out.push_str("\nDepends on:\n");
        for dep in deps {
            // group dependencies are stored with a leading '+'
            match dep.strip_prefix('+') {
                Some(group) => out.push_str(&format!("  • {} (group)\n", group)),
                None => out.push_str(&format!("  • {}\n", dep)),
            }
        }
    }

    if let Some(description) = &info.description {
        out.push_str(&format!("\nDescription:\n  {}\n", description));
    }

    out
}

/// Render the trigger list of a service
pub fn render_triggers(name: &str, triggers: &[ServiceTrigger]) -> String {
    if triggers.is_empty() {
        return format!("No triggers configured for {}\n", name);
    }

    let mut out = String::new();
    out.push_str(&format!("Triggers for {}:\n\n", name));

    for trigger in triggers {
        out.push_str(&format!(
            "  {} on {} {}\n",
            trigger.action, trigger.trigger_type, trigger.guid
        ));
        for item in &trigger.data_items {
            match &item.data {
                Some(data) => out.push_str(&format!("      ↳ {}: {}\n", item.data_type, data)),
                None => out.push_str(&format!("      ↳ {}: <empty>\n", item.data_type)),
            }
        }
    }

    out
}

/// Render the direct dependents of a service
pub fn render_dependents(root: &str, dependents: &DependentServices) -> String {
    if dependents.is_empty() {
        return format!("No services depend on {}\n", root);
    }

    let mut out = String::new();
    out.push_str(&format!("Services depending on {}:\n\n", root));
    for service in dependents.values() {
        out.push_str(&format!(
            "  {} [{}]\n",
            service.name, service.process.current_state
        ));
    }
    out
}

/// Render a transitive dependent closure as an indented tree
pub fn render_closure(closure: &DependencyClosure) -> String {
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, node) in &closure.dependents {
        children
            .entry(node.parent.as_str())
            .or_default()
            .push(name.as_str());
    }

    let mut out = String::new();
    out.push_str(&format!("{}\n", closure.root));
    push_children(&mut out, closure, &children, closure.root.as_str(), 1);

    if closure.truncated {
        out.push_str("\n⚠ Depth limit reached, the tree is incomplete\n");
    }
    for error in &closure.errors {
        out.push_str(&format!(
            "✗ {}: {}\n",
            error.service, error.error.message
        ));
    }

    out
}

fn push_children(
    out: &mut String,
    closure: &DependencyClosure,
    children: &BTreeMap<&str, Vec<&str>>,
    parent: &str,
    level: usize,
) {
    let Some(names) = children.get(parent) else {
        return;
    };
    for name in names {
        let state = closure
            .dependents
            .get(*name)
            .map(|node| node.service.process.current_state.to_string())
            .unwrap_or_default();
        out.push_str(&format!("{}└─ {} [{}]\n", "  ".repeat(level - 1), name, state));
        push_children(out, closure, children, name, level + 1);
    }
}
