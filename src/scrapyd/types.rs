use serde::{Deserialize, Serialize};

/// Every Scrapyd JSON response carries `status: "ok" | "error"`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaemonStatus {
    #[serde(default)]
    pub node_name: String,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub running: u64,
    #[serde(default)]
    pub finished: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Projects {
    pub projects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Versions {
    pub versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Spiders {
    pub spiders: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobEntry {
    pub id: String,
    #[serde(default)]
    pub project: Option<String>,
    pub spider: String,
    #[serde(default)]
    pub pid: Option<u64>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub log_url: Option<String>,
    #[serde(default)]
    pub items_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobList {
    #[serde(default)]
    pub pending: Vec<JobEntry>,
    #[serde(default)]
    pub running: Vec<JobEntry>,
    #[serde(default)]
    pub finished: Vec<JobEntry>,
}

impl JobList {
    /// Locate a job and report which queue it is in.
    pub fn find(&self, job_id: &str) -> Option<(&'static str, &JobEntry)> {
        [
            ("pending", &self.pending),
            ("running", &self.running),
            ("finished", &self.finished),
        ]
        .into_iter()
        .find_map(|(state, jobs)| jobs.iter().find(|j| j.id == job_id).map(|j| (state, j)))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScheduledJob {
    pub jobid: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Cancelled {
    #[serde(default)]
    pub prevstate: Option<String>,
}

/// Which per-job file to fetch from the daemon's web root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    #[default]
    Log,
    Items,
}

impl LogKind {
    pub fn dir_and_ext(&self) -> (&'static str, &'static str) {
        match self {
            LogKind::Log => ("logs", "log"),
            LogKind::Items => ("items", "jl"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_find_job_in_any_queue() {
        let jobs: JobList = serde_json::from_value(json!({
            "pending": [{"id": "p1", "spider": "s"}],
            "running": [{"id": "r1", "spider": "s", "pid": 42}],
            "finished": [{"id": "f1", "spider": "s", "end_time": "2024-01-01 00:00:00"}]
        }))
        .unwrap();

        assert_eq!(jobs.find("r1").map(|(s, j)| (s, j.pid)), Some(("running", Some(42))));
        assert_eq!(jobs.find("f1").map(|(s, _)| s), Some("finished"));
        assert!(jobs.find("nope").is_none());
    }

    #[test]
    fn test_error_envelope() {
        let env: Envelope =
            serde_json::from_value(json!({"status": "error", "message": "no such project"})).unwrap();
        assert_eq!(env.status, "error");
        assert_eq!(env.message.as_deref(), Some("no such project"));
    }
}
