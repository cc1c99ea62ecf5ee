//! Health reporting for `/health`.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Ok,
    ShuttingDown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthState,
    pub version: String,
    pub project: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_secs: u64,
    /// Name of the compiled-in inference backend.
    pub backend: String,
    pub model_loaded: bool,
}

pub struct HealthChecker {
    project: String,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(project: impl Into<String>) -> Self {
        Self { project: project.into(), start_time: Instant::now() }
    }

    pub fn report(&self, shutdown: ShutdownState, backend: &str, model_loaded: bool) -> HealthReport {
        let status = match shutdown {
            ShutdownState::Running => HealthState::Ok,
            ShutdownState::Draining | ShutdownState::Stopped => HealthState::ShuttingDown,
        };
        HealthReport {
            status,
            version: crate::VERSION.to_string(),
            project: self.project.clone(),
            timestamp: Utc::now(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            backend: backend.to_string(),
            model_loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_is_ok() {
        let checker = HealthChecker::new("Chatbot WebUI");
        let report = checker.report(ShutdownState::Running, "unavailable", false);
        assert_eq!(report.status, HealthState::Ok);
        assert_eq!(report.project, "Chatbot WebUI");
        assert_eq!(report.version, crate::VERSION);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[test]
    fn test_draining_reports_shutting_down() {
        let checker = HealthChecker::new("x");
        let report = checker.report(ShutdownState::Draining, "llama.cpp", true);
        assert_eq!(report.status, HealthState::ShuttingDown);
        assert!(report.model_loaded);
    }
}
