//! Envelope normalization for state returns.
//!
//! Returns reach the renderer wrapped in different ways depending on where
//! they came from: a job lookup, an orchestration run, or a direct call.
//! This module peels those layers off and classifies what is left.

use serde_json::{Map, Value};

/// What a state return reduces to once its envelopes are removed
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// Printed as-is, no host iteration (integers, strings, `None`)
    Verbatim(String),
    /// The canonical `host -> payload` mapping
    Hosts(Map<String, Value>),
    /// Nothing the renderer knows how to print
    Degenerate(Value),
}

/// Strip wrapper layers from a raw return.
///
/// Each step runs once, in order:
/// 1. `{"return": x}` becomes `x`
/// 2. `{"data": x}` becomes `x`
/// 3. a single-entry job lookup (`{jid: {"jid", "fun", "return": {"data": x}}}`)
///    becomes `x`
/// 4. a `retcode` key next to exactly one `*_master` key is dropped
pub fn normalize(data: Value) -> Value {
    let mut data = data;

    if let Value::Object(ref mut map) = data
        && let Some(inner) = map.remove("return")
    {
        data = inner;
    }

    if let Value::Object(ref mut map) = data
        && let Some(inner) = map.remove("data")
    {
        data = inner;
    }

    if let Some(inner) = job_lookup_data(&data) {
        data = inner;
    }

    if let Value::Object(ref mut map) = data {
        let masters = map.keys().filter(|k| k.ends_with("_master")).count();
        if masters == 1 && map.contains_key("retcode") {
            map.remove("retcode");
        }
    }

    data
}

/// Payload of a job lookup envelope, when `data` is one
fn job_lookup_data(data: &Value) -> Option<Value> {
    let map = data.as_object()?;
    if map.len() != 1 {
        return None;
    }
    let job = map.values().next()?.as_object()?;
    if !(job.contains_key("jid") && job.contains_key("fun")) {
        return None;
    }
    job.get("return")?.as_object()?.get("data").cloned()
}

/// Normalize and classify a raw return
pub fn classify(data: Value) -> Normalized {
    match normalize(data) {
        Value::Null => Normalized::Verbatim("None".to_string()),
        Value::String(s) => Normalized::Verbatim(s),
        Value::Bool(b) => Normalized::Verbatim(if b { "True" } else { "False" }.to_string()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Normalized::Verbatim(n.to_string()),
        Value::Object(map) => Normalized::Hosts(map),
        other => Normalized::Degenerate(other),
    }
}
