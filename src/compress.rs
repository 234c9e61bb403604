//! Id compression for state returns.
//!
//! States using `names:` produce one record per name under the same id,
//! which floods terse output. Compression folds records that share
//! `(module, id, sls, result)` into a single row per host:
//!
//! ```text
//! 19:10:10.969 [ 8.546 ms]   cmd.run   Changed   Name: mix-matched results
//! 19:10:10.977 [ 8.606 ms]   cmd.run   Changed   Name: mix-matched results
//!                       becomes
//! 19:10:10.969 [17.152 ms]   cmd.run   Changed   Name: mix-matched results (2)
//! ```
//!
//! The folded row keeps the lowest run order, the summed duration, the
//! earliest start time, and every constituent's changes keyed by name.

use crate::types::{
    COMPRESSED_MARKER, HostPayload, HostReport, Outcome, Report, TaskEntry, TaskKey, display_value, is_truthy,
};
use chrono::NaiveTime;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Key under which folded change payloads are nested
pub const COMPRESSED_CHANGES: &str = "compressed changes";

/// Why a report could not be compressed
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompressionError {
    /// A record needed for grouping or folding lacks a field
    #[error("{host}: task {task} has no {field}")]
    MissingField { host: String, task: String, field: &'static str },
    /// A duration that cannot be summed
    #[error("{host}: task {task} has a non-numeric duration {value:?}")]
    InvalidDuration { host: String, task: String, value: String },
    /// Existing changes are not a mapping and cannot hold nested changes
    #[error("{host}: task {task} has changes that are not a mapping")]
    InvalidChanges { host: String, task: String },
}

/// Grouping identity of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Identity {
    module: String,
    id: String,
    sls: String,
    result: Outcome,
}

/// Compress every host of `report`. Non-task payloads pass through.
///
/// Either every host is compressed or an error is returned; the input is
/// never modified.
pub fn compress_ids(report: &Report) -> Result<Report, CompressionError> {
    let mut hosts = Vec::with_capacity(report.hosts.len());

    for (host, payload) in &report.hosts {
        let payload = match payload {
            HostPayload::Tasks(tasks) => HostPayload::Tasks(compress_host(host, tasks)?),
            other => other.clone(),
        };
        hosts.push((host.clone(), payload));
    }

    Ok(Report { hosts })
}

fn compress_host(host: &str, report: &HostReport) -> Result<HostReport, CompressionError> {
    let mut identities = Vec::with_capacity(report.tasks.len());
    let mut counts: HashMap<Identity, usize> = HashMap::new();

    for entry in &report.tasks {
        let identity = identity_of(host, entry)?;
        *counts.entry(identity.clone()).or_default() += 1;
        identities.push(identity);
    }

    let mut tasks: Vec<TaskEntry> = Vec::with_capacity(report.tasks.len());
    let mut folded_at: HashMap<Identity, usize> = HashMap::new();

    for (entry, identity) in report.tasks.iter().zip(identities) {
        let count = counts[&identity];
        if count == 1 {
            tasks.push(entry.clone());
            continue;
        }

        match folded_at.get(&identity) {
            Some(&index) => fold_into(host, &mut tasks[index], entry)?,
            None => {
                let key = TaskKey {
                    module: entry.key.module.clone(),
                    id: format!("{} ({})", identity.id, count),
                    name: format!("{}{}_{}_{}", COMPRESSED_MARKER, identity.sls, identity.id, identity.result),
                    function: entry.key.function.clone(),
                };
                folded_at.insert(identity, tasks.len());
                tasks.push(TaskEntry { key, task: entry.task.clone() });
            }
        }
    }

    Ok(HostReport { tasks, malformed: report.malformed.clone() })
}

fn identity_of(host: &str, entry: &TaskEntry) -> Result<Identity, CompressionError> {
    let id = entry.task.id.as_ref().ok_or_else(|| missing(host, entry, "__id__"))?;
    let sls = entry.task.sls.as_ref().ok_or_else(|| missing(host, entry, "__sls__"))?;
    Ok(Identity {
        module: entry.key.module.clone(),
        id: display_value(id),
        sls: display_value(sls),
        result: entry.task.result,
    })
}

fn missing(host: &str, entry: &TaskEntry, field: &'static str) -> CompressionError {
    CompressionError::MissingField { host: host.to_string(), task: entry.key.to_string(), field }
}

/// Merge `entry` into the already folded record `target`
fn fold_into(host: &str, target: &mut TaskEntry, entry: &TaskEntry) -> Result<(), CompressionError> {
    let incoming = &entry.task;

    let run_num = incoming.run_num.ok_or_else(|| missing(host, entry, "__run_num__"))?;
    let folded_run_num = target.task.run_num.ok_or_else(|| missing(host, target, "__run_num__"))?;
    target.task.run_num = Some(run_num.min(folded_run_num));

    let duration = summable_duration(host, &entry.key, incoming.duration.as_ref())?;
    let folded_duration = summable_duration(host, &target.key, target.task.duration.as_ref())?;
    let total = ((duration + folded_duration) * 1000.0).round() / 1000.0;
    target.task.duration = serde_json::Number::from_f64(total).map(Value::Number);

    let start = incoming.start_time.as_deref().ok_or_else(|| missing(host, entry, "start_time"))?;
    let folded_start = target.task.start_time.as_deref().ok_or_else(|| missing(host, target, "start_time"))?;
    if compare_start_times(start, folded_start) == Ordering::Less {
        target.task.start_time = Some(start.to_string());
    }

    if is_truthy(&incoming.changes) {
        let incoming_name = incoming.name.clone().ok_or_else(|| missing(host, entry, "name"))?;
        if is_truthy(&target.task.changes) {
            nest_existing_changes(host, target)?;
        } else {
            let empty = Map::from_iter([(COMPRESSED_CHANGES.to_string(), Value::Object(Map::new()))]);
            target.task.changes = Value::Object(empty);
        }
        let nested = target
            .task
            .changes
            .get_mut(COMPRESSED_CHANGES)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| CompressionError::InvalidChanges { host: host.to_string(), task: entry.key.to_string() })?;
        nested.insert(incoming_name, incoming.changes.clone());
    }

    Ok(())
}

/// Move the folded record's own changes under its name, once
fn nest_existing_changes(host: &str, target: &mut TaskEntry) -> Result<(), CompressionError> {
    let task_name = target.key.to_string();
    let Value::Object(existing) = &target.task.changes else {
        return Err(CompressionError::InvalidChanges { host: host.to_string(), task: task_name });
    };
    if existing.get(COMPRESSED_CHANGES).is_some_and(is_truthy) {
        return Ok(());
    }

    let name = target.task.name.clone().ok_or_else(|| missing(host, target, "name"))?;
    let own = std::mem::take(&mut target.task.changes);
    let nested = Map::from_iter([(name, own)]);
    target.task.changes = Value::Object(Map::from_iter([(COMPRESSED_CHANGES.to_string(), Value::Object(nested))]));
    Ok(())
}

fn summable_duration(host: &str, key: &TaskKey, value: Option<&Value>) -> Result<f64, CompressionError> {
    let task = key.to_string();
    let invalid = |value: String| CompressionError::InvalidDuration { host: host.to_string(), task: task.clone(), value };
    match value {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| invalid(n.to_string())),
        Some(other) => Err(invalid(display_value(other))),
        None => Err(CompressionError::MissingField { host: host.to_string(), task: key.to_string(), field: "duration" }),
    }
}

/// Order two start times chronologically when both parse as times of day,
/// otherwise lexicographically.
fn compare_start_times(a: &str, b: &str) -> Ordering {
    match (NaiveTime::parse_from_str(a, "%H:%M:%S%.f"), NaiveTime::parse_from_str(b, "%H:%M:%S%.f")) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
#[path = "compress_test.rs"]
mod compress_test;
