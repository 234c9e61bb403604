/// Tests for id compression
///
/// These tests ensure folded records keep their numeric invariants and
/// that a report which cannot be compressed is reported as an error
/// instead of being half-compressed.

#[cfg(test)]
mod tests {
    use crate::compress::{COMPRESSED_CHANGES, CompressionError, compress_ids};
    use crate::types::{HostPayload, HostReport, Outcome, Report};
    use serde_json::{Value, json};

    fn report_from(data: Value) -> Report {
        Report::from_map(data.as_object().expect("test data is a mapping").clone())
    }

    fn host_tasks<'a>(report: &'a Report, host: &str) -> &'a HostReport {
        match report.hosts.iter().find(|(h, _)| h == host).map(|(_, p)| p) {
            Some(HostPayload::Tasks(tasks)) => tasks,
            other => panic!("expected tasks for {}, got {:?}", host, other),
        }
    }

    fn cmd_run(name: &str, result: bool, run_num: i64, start: &str, duration: f64, changes: Value) -> Value {
        json!({
            "name": name,
            "result": result,
            "changes": changes,
            "comment": format!("Command \"{}\" run", name),
            "__run_num__": run_num,
            "__id__": "mix-matched results",
            "__sls__": "web",
            "start_time": start,
            "duration": duration,
        })
    }

    fn mixed_report() -> Report {
        report_from(json!({
            "minion": {
                "cmd_|-mix-matched results_|-true_|-run":
                    cmd_run("true", true, 0, "19:10:10.969049", 8.546, json!({"pid": 1})),
                "cmd_|-mix-matched results_|-false_|-run":
                    cmd_run("false", false, 1, "19:10:10.977998", 8.606, json!({"pid": 2})),
                "cmd_|-mix-matched results_|-/bin/true_|-run":
                    cmd_run("/bin/true", true, 2, "19:10:10.987116", 7.618, json!({"pid": 3})),
                "cmd_|-mix-matched results_|-/bin/false_|-run":
                    cmd_run("/bin/false", false, 3, "19:10:10.995172", 9.344, json!({"pid": 4})),
            }
        }))
    }

    #[test]
    fn test_distinct_identities_unchanged() {
        let report = report_from(json!({
            "minion": {
                "pkg_|-vim_|-vim_|-installed": {
                    "result": true, "changes": {}, "comment": "ok", "__run_num__": 0,
                    "__id__": "vim", "__sls__": "editors", "name": "vim",
                },
                "pkg_|-git_|-git_|-installed": {
                    "result": true, "changes": {}, "comment": "ok", "__run_num__": 1,
                    "__id__": "git", "__sls__": "editors", "name": "git",
                },
            },
            "other": "plain text payload",
        }));

        let compressed = compress_ids(&report).expect("compression should succeed");
        assert_eq!(compressed, report);
    }

    #[test]
    fn test_groups_by_result() {
        let report = mixed_report();
        let compressed = compress_ids(&report).expect("compression should succeed");
        let tasks = host_tasks(&compressed, "minion");

        assert_eq!(tasks.tasks.len(), 2, "one row per (id, result)");

        let ok = &tasks.tasks[0];
        assert_eq!(ok.key.id, "mix-matched results (2)");
        assert_eq!(ok.key.name, "state_compressed_web_mix-matched results_True");
        assert_eq!(ok.key.module, "cmd");
        assert_eq!(ok.key.function, "run");
        assert_eq!(ok.key.compressed_count(), Some(2));
        assert_eq!(ok.task.result, Outcome::Succeeded);

        let failed = &tasks.tasks[1];
        assert_eq!(failed.key.compressed_count(), Some(2));
        assert_eq!(failed.task.result, Outcome::Failed);
    }

    #[test]
    fn test_folded_numeric_invariants() {
        let compressed = compress_ids(&mixed_report()).expect("compression should succeed");
        let tasks = host_tasks(&compressed, "minion");

        let ok = &tasks.tasks[0].task;
        assert_eq!(ok.run_num, Some(0));
        assert_eq!(ok.start_time.as_deref(), Some("19:10:10.969049"));
        let duration = ok.duration.as_ref().and_then(Value::as_f64).unwrap();
        assert!((duration - 16.164).abs() < 1e-9, "duration was {}", duration);

        let failed = &tasks.tasks[1].task;
        assert_eq!(failed.run_num, Some(1));
        assert_eq!(failed.start_time.as_deref(), Some("19:10:10.977998"));
        let duration = failed.duration.as_ref().and_then(Value::as_f64).unwrap();
        assert!((duration - 17.95).abs() < 1e-9, "duration was {}", duration);
    }

    #[test]
    fn test_earliest_start_and_lowest_run_num_win_regardless_of_order() {
        let report = report_from(json!({
            "minion": {
                "file_|-dirs_|-/srv/b_|-absent":
                    cmd_run("/srv/b", true, 7, "10:00:02.000000", 1.0, json!({})),
                "file_|-dirs_|-/srv/a_|-absent":
                    cmd_run("/srv/a", true, 3, "9:59:59.500000", 2.25, json!({})),
                "file_|-dirs_|-/srv/c_|-absent":
                    cmd_run("/srv/c", true, 5, "10:00:01.000000", 0.5, json!({})),
            }
        }));

        let compressed = compress_ids(&report).expect("compression should succeed");
        let task = &host_tasks(&compressed, "minion").tasks[0].task;

        assert_eq!(task.run_num, Some(3));
        // Compared as times of day, not as strings
        assert_eq!(task.start_time.as_deref(), Some("9:59:59.500000"));
        assert_eq!(task.duration, Some(json!(3.75)));
        assert_eq!(task.changes, json!({}));
    }

    #[test]
    fn test_changes_nested_by_name() {
        let compressed = compress_ids(&mixed_report()).expect("compression should succeed");
        let ok = &host_tasks(&compressed, "minion").tasks[0].task;

        assert_eq!(
            ok.changes,
            json!({COMPRESSED_CHANGES: {"true": {"pid": 1}, "/bin/true": {"pid": 3}}})
        );
    }

    #[test]
    fn test_changes_from_later_member_only() {
        let report = report_from(json!({
            "minion": {
                "cmd_|-mix_|-a_|-run": cmd_run("a", true, 0, "10:00:00.0", 1.0, json!({})),
                "cmd_|-mix_|-b_|-run": cmd_run("b", true, 1, "10:00:01.0", 1.0, json!({"pid": 9})),
            }
        }));

        let compressed = compress_ids(&report).expect("compression should succeed");
        let task = &host_tasks(&compressed, "minion").tasks[0].task;
        assert_eq!(task.changes, json!({COMPRESSED_CHANGES: {"b": {"pid": 9}}}));
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let report = report_from(json!({
            "minion": {
                "pkg_|-vim_|-vim_|-installed": {"result": true, "changes": {}, "__run_num__": 0, "__sls__": "x"},
            }
        }));

        match compress_ids(&report) {
            Err(CompressionError::MissingField { field, host, .. }) => {
                assert_eq!(field, "__id__");
                assert_eq!(host, "minion");
            }
            other => panic!("expected a missing field error, got {:?}", other),
        }
    }

    #[test]
    fn test_string_duration_is_an_error() {
        let mut first = cmd_run("a", true, 0, "10:00:00.0", 1.0, json!({}));
        first["duration"] = json!("1.0 ms");
        let report = report_from(json!({
            "minion": {
                "cmd_|-mix_|-a_|-run": first,
                "cmd_|-mix_|-b_|-run": cmd_run("b", true, 1, "10:00:01.0", 1.0, json!({})),
            }
        }));

        let err = compress_ids(&report).unwrap_err();
        assert!(matches!(err, CompressionError::InvalidDuration { .. }));
        assert!(err.to_string().contains("non-numeric duration"));
    }

    #[test]
    fn test_malformed_records_carried_over() {
        let report = report_from(json!({
            "minion": {
                "cmd_|-mix_|-a_|-run": cmd_run("a", true, 0, "10:00:00.0", 1.0, json!({})),
                "cmd_|-broken_|-x_|-run": {"comment": "no result here", "__run_num__": 4},
            }
        }));

        let compressed = compress_ids(&report).expect("compression should succeed");
        assert_eq!(host_tasks(&compressed, "minion").malformed.len(), 1);
    }
}
