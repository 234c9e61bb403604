/// Core data structures for state run results
///
/// This module defines the typed view of a state return used throughout
/// highstate-render: the four-part task key, per-task results, and the
/// per-host payload variants the renderer dispatches on.
use log::debug;
use serde_json::{Map, Value};
use std::fmt;

/// Separator between the four parts of a legacy task key
pub const KEY_DELIMITER: &str = "_|-";

/// Prefix of the name segment written into keys produced by id compression
pub const COMPRESSED_MARKER: &str = "state_compressed_";

/// Task names that run a nested orchestration and embed its full return
pub const ORCHESTRATION_FUNCTIONS: [&str; 3] = ["state.orch", "state.orchestrate", "state.sls"];

/// Identity of one task: `{module}_|-{id}_|-{name}_|-{function}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskKey {
    pub module: String,   // "pkg"
    pub id: String,       // "vim" or "vim (3)" once compressed
    pub name: String,     // "vim-enhanced"
    pub function: String, // "installed"
}

impl TaskKey {
    pub fn new(
        module: impl Into<String>,
        id: impl Into<String>,
        name: impl Into<String>,
        function: impl Into<String>,
    ) -> Self {
        Self { module: module.into(), id: id.into(), name: name.into(), function: function.into() }
    }

    /// Parse the delimited form. Missing parts become empty strings and any
    /// extra delimiters stay inside the function part.
    pub fn parse(raw: &str) -> Self {
        let mut parts = raw.splitn(4, KEY_DELIMITER);
        let module = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        let function = parts.next().unwrap_or_default();

        if !raw.contains(KEY_DELIMITER) {
            debug!("Task key {:?} has no {} delimiters", raw, KEY_DELIMITER);
        }

        Self::new(module, id, name, function)
    }

    /// Copy of this key showing `name` in the name segment
    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    /// Number of records folded into this key by id compression.
    ///
    /// Only keys whose name segment carries the compression marker are
    /// considered; the count is the trailing `(n)` of the id segment.
    pub fn compressed_count(&self) -> Option<usize> {
        if !self.name.starts_with(COMPRESSED_MARKER) {
            return None;
        }
        let inner = self.id.strip_suffix(')')?;
        let open = inner.rfind('(')?;
        let digits = &inner[open + 1..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.module,
            self.id,
            self.name,
            self.function,
            d = KEY_DELIMITER
        )
    }
}

/// Tri-state result of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// `result: true`
    Succeeded,
    /// `result: false`
    Failed,
    /// `result: null` - the task would change something (test run)
    Pending,
}

impl Outcome {
    /// Interpret a raw `result` value. Non-boolean values follow truthiness.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Bool(true) => Outcome::Succeeded,
            Value::Bool(false) => Outcome::Failed,
            Value::Null => Outcome::Pending,
            other if is_truthy(other) => Outcome::Succeeded,
            _ => Outcome::Failed,
        }
    }

    /// Stringified form, as matched by filter sets
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Succeeded => "True",
            Outcome::Failed => "False",
            Outcome::Pending => "None",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One executed task's outcome
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub result: Outcome,
    /// Opaque change payload; null or empty means "no change"
    pub changes: Value,
    /// String, list of strings, or anything else printable
    pub comment: Value,
    pub run_num: Option<i64>,
    pub start_time: Option<String>,
    /// Number of milliseconds, or a string such as `"12.5 ms"`
    pub duration: Option<Value>,
    pub warnings: Option<Vec<String>>,
    pub parallel: bool,
    pub sls: Option<Value>,
    pub id: Option<Value>,
    pub name: Option<String>,
    /// Extra return data appended to the comment
    pub data: Option<Value>,
}

impl TaskResult {
    /// Build from a raw record. Returns `None` when `result` is missing.
    pub fn from_map(mut map: Map<String, Value>) -> Option<Self> {
        let result = Outcome::from_value(map.get("result")?);

        let run_num = map.get("__run_num__").and_then(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

        let warnings = map.get("warnings").map(|w| match w {
            Value::Array(items) => items.iter().map(display_value).collect(),
            Value::Null => Vec::new(),
            other => vec![display_value(other)],
        });

        Some(TaskResult {
            result,
            run_num,
            start_time: map.get("start_time").map(display_value),
            warnings,
            parallel: map.contains_key("__parallel__"),
            name: map.get("name").map(display_value),
            changes: map.remove("changes").unwrap_or(Value::Null),
            comment: map.remove("comment").unwrap_or(Value::Null),
            duration: map.remove("duration"),
            sls: map.remove("__sls__"),
            id: map.remove("__id__"),
            data: map.remove("data"),
        })
    }

    /// True when `changes` is non-empty
    pub fn has_changes(&self) -> bool {
        is_truthy(&self.changes)
    }

    /// True when this task ran a nested orchestration
    pub fn is_orchestration(&self) -> bool {
        self.name.as_deref().is_some_and(|n| ORCHESTRATION_FUNCTIONS.contains(&n))
    }
}

/// A task key together with its result
#[derive(Debug, Clone, PartialEq)]
pub struct TaskEntry {
    pub key: TaskKey,
    pub task: TaskResult,
}

/// All task records for one host, in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostReport {
    pub tasks: Vec<TaskEntry>,
    /// Raw records that lack `result` or `__run_num__`
    pub malformed: Vec<Value>,
}

impl HostReport {
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut report = HostReport::default();

        for (tname, info) in map {
            let Value::Object(record) = info else {
                continue;
            };

            let has_result = record.contains_key("result");
            if tname != "changes" && !record.is_empty() && (!has_result || !record.contains_key("__run_num__")) {
                debug!("Task {:?} is missing its result or run order", tname);
                if !has_result {
                    report.malformed.push(Value::Object(record));
                    continue;
                }
                report.malformed.push(Value::Object(record.clone()));
            }

            if let Some(task) = TaskResult::from_map(record) {
                report.tasks.push(TaskEntry { key: TaskKey::parse(&tname), task });
            }
        }

        report
    }

    /// Tasks with their position in `tasks`, sorted by run order (stable,
    /// missing order counts as 0)
    pub fn ordered(&self) -> Vec<(usize, &TaskEntry)> {
        let mut tasks: Vec<(usize, &TaskEntry)> = self.tasks.iter().enumerate().collect();
        tasks.sort_by_key(|(_, entry)| entry.task.run_num.unwrap_or(0));
        tasks
    }
}

/// What one host returned
#[derive(Debug, Clone, PartialEq)]
pub enum HostPayload {
    /// A bare integer (or boolean)
    Scalar(String),
    /// Free text, e.g. from a remote function call
    Text(String),
    /// Compile errors; no task ran
    ErrorList(Vec<String>),
    /// The normal case: task key to result
    Tasks(HostReport),
    /// Anything else; only the host banner is shown
    Empty,
}

impl HostPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Bool(b) => HostPayload::Scalar(if b { "True" } else { "False" }.to_string()),
            Value::Number(n) if n.is_i64() || n.is_u64() => HostPayload::Scalar(n.to_string()),
            Value::String(s) => HostPayload::Text(s),
            Value::Array(items) => HostPayload::ErrorList(items.iter().map(display_value).collect()),
            Value::Object(map) => HostPayload::Tasks(HostReport::from_map(map)),
            _ => HostPayload::Empty,
        }
    }
}

/// A normalized state return: host to payload, in insertion order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Report {
    pub hosts: Vec<(String, HostPayload)>,
}

impl Report {
    pub fn from_map(map: Map<String, Value>) -> Self {
        Report { hosts: map.into_iter().map(|(host, data)| (host, HostPayload::from_value(data))).collect() }
    }

    /// Number of records that carry a `result`, across all hosts
    pub fn valid_task_count(&self) -> usize {
        self.hosts
            .iter()
            .map(|(_, payload)| match payload {
                HostPayload::Tasks(report) => report.tasks.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Truthiness of a JSON value: null, false, zero and empty containers are false
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text form of a value as it appears in rendered output
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
