//! Translation of the Marathon `/v2/apps` document.
//!
//! Produces one gauge per task counter, labeled with the application id and
//! the version of its current configuration.

use serde_json::Value;

use crate::error::{ExporterError, Result};
use crate::registry::Generation;

/// (source field, series name, help)
const APP_GAUGES: [(&str, &str, &str); 5] = [
    ("instances", "app_instances", "Marathon app configured instances"),
    ("tasksRunning", "app_tasks_running", "Marathon app running tasks"),
    ("tasksStaged", "app_tasks_staged", "Marathon app staged tasks"),
    ("tasksHealthy", "app_tasks_healthy", "Marathon app healthy tasks"),
    ("tasksUnhealthy", "app_tasks_unhealthy", "Marathon app unhealthy tasks"),
];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AppsReport {
    pub apps: usize,
    pub skipped: usize,
}

/// Translate an apps document into `generation`.
pub fn translate_apps(doc: &Value, generation: &Generation) -> Result<AppsReport> {
    if let Some(message) = doc.get("message") {
        let message = message
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| message.to_string());
        return Err(ExporterError::SourceReported(message));
    }
    let apps = doc
        .get("apps")
        .and_then(Value::as_array)
        .ok_or_else(|| ExporterError::Parse("apps document has no `apps` array".into()))?;

    let mut report = AppsReport::default();
    for app in apps {
        match translate_app(app, generation) {
            Ok(()) => report.apps += 1,
            Err(e) => {
                report.skipped += 1;
                tracing::debug!(kind = e.kind(), error = %e, "skipping app");
            }
        }
    }
    Ok(report)
}

fn translate_app(app: &Value, generation: &Generation) -> Result<()> {
    let id = app
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ExporterError::missing("<app>", "id"))?;
    let version = app
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| ExporterError::missing(id, "version"))?;

    for (field, name, help) in APP_GAUGES {
        let Some(value) = app.get(field).and_then(Value::as_f64) else {
            continue;
        };
        let (gauge, _) = generation.gauges.fetch_or_create(name, help, &["app", "version"]);
        gauge.set(&[("app", id), ("version", version)], value)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::exposition::Exposition;

    #[test]
    fn app_gauges() {
        let generation = Generation::new("marathon", &[]);
        let report = translate_apps(
            &json!({ "apps": [
                { "id": "/web", "version": "2024-01-01T00:00:00.000Z", "instances": 3,
                  "tasksRunning": 2, "tasksStaged": 1, "tasksHealthy": 2, "tasksUnhealthy": 0 },
                { "id": "/batch", "version": "v2", "instances": 1 },
                { "version": "v1", "instances": 9 }
            ] }),
            &generation,
        )
        .unwrap();
        assert_eq!(report, AppsReport { apps: 2, skipped: 1 });

        let mut out = Exposition::new();
        generation.collect_into(&mut out);
        let web = [("app", "/web"), ("version", "2024-01-01T00:00:00.000Z")];
        assert_eq!(out.value("marathon_app_instances", &web), Some(3.0));
        assert_eq!(out.value("marathon_app_tasks_running", &web), Some(2.0));
        assert_eq!(out.value("marathon_app_tasks_unhealthy", &web), Some(0.0));
        assert_eq!(
            out.value("marathon_app_instances", &[("app", "/batch"), ("version", "v2")]),
            Some(1.0)
        );
        assert_eq!(
            out.value("marathon_app_tasks_running", &[("app", "/batch"), ("version", "v2")]),
            None
        );
    }

    #[test]
    fn missing_apps_array() {
        let generation = Generation::new("marathon", &[]);
        let err = translate_apps(&json!({ "app": {} }), &generation).unwrap_err();
        assert_eq!(err.kind(), "PARSE");
    }

    #[test]
    fn message_is_reported() {
        let generation = Generation::new("marathon", &[]);
        let err = translate_apps(&json!({ "message": "Unauthorized" }), &generation).unwrap_err();
        assert_eq!(err.kind(), "SOURCE_REPORTED");
    }
}
