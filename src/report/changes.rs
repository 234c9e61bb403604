//! Rendering of a task's `changes` payload.

use super::host::Renderer;
use crate::console_format::{FIELD_INDENT, indent_lines};
use crate::types::{HostPayload, display_value, is_truthy};
use serde_json::{Map, Value};

/// Format `changes`, returning whether the task changed anything and the
/// text shown after `Changes:`.
///
/// A payload of the form `{"out": "highstate", "ret": {host: ...}}` holds a
/// complete nested report; each host in it is rendered like a top-level
/// host and indented under the task. Anything else goes to the renderer's
/// changes printer.
pub fn format_changes(renderer: &Renderer<'_>, changes: &Value) -> (bool, String) {
    if let Some(Value::Object(hosts)) = embedded_hosts(changes) {
        let rendered = hosts
            .iter()
            .map(|(host, data)| renderer.render_host(host, &HostPayload::from_value(data.clone()), 1));
        return join_embedded(rendered);
    }
    format_plain_changes(renderer, changes)
}

/// Everything but the embedded-report case
pub(crate) fn format_plain_changes(renderer: &Renderer<'_>, changes: &Value) -> (bool, String) {
    if !is_truthy(changes) {
        return (false, String::new());
    }

    if !changes.is_object() {
        return (true, format!("Invalid Changes data: {}", display_value(changes)));
    }

    (true, format!("\n{}", renderer.printer().print(changes, FIELD_INDENT)))
}

fn embedded_hosts(changes: &Value) -> Option<&Value> {
    let map = changes.as_object()?;
    if map.get("out").and_then(Value::as_str) != Some("highstate") {
        return None;
    }
    map.get("ret").filter(|ret| ret.is_object())
}

/// Move the hosts of an embedded report out of `changes`, leaving the rest
/// of the payload in place
pub(crate) fn take_embedded_hosts(changes: &mut Value) -> Option<Map<String, Value>> {
    embedded_hosts(changes)?;
    match changes.as_object_mut()?.remove("ret") {
        Some(Value::Object(hosts)) => Some(hosts),
        _ => None,
    }
}

/// Combine rendered embedded hosts into a changes text: every host on its
/// own line block, indented under the task
pub(crate) fn join_embedded(rendered: impl IntoIterator<Item = (String, bool)>) -> (bool, String) {
    let mut text = String::new();
    let mut changed = false;
    for (host_text, host_changed) in rendered {
        text.push('\n');
        text.push_str(&host_text.lines().map(|line| indent_lines(line, FIELD_INDENT)).collect::<Vec<_>>().join("\n"));
        changed = changed || host_changed;
    }
    (changed, text)
}
