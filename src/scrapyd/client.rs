/// HTTP client for the Scrapyd JSON API.
/// Read calls go through reqwest-middleware with retries; mutating calls
/// (schedule, cancel, delete) are sent once.
use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use url::Url;

use super::types::{
    Cancelled, DaemonStatus, Envelope, JobList, LogKind, Projects, ScheduledJob, Spiders, Versions,
};
use crate::errors::AppError;

#[derive(Debug, Clone)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

pub struct ScrapydClient {
    base: Url,
    auth: Option<BasicAuth>,
    reads: ClientWithMiddleware,
    writes: reqwest::Client,
}

impl ScrapydClient {
    pub fn new(base_url: &str, auth: Option<BasicAuth>) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        // Retries: 3 times, exponential backoff
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let reads = ClientBuilder::new(http.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            base,
            auth,
            reads,
            writes: http,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, AppError> {
        self.base
            .join(path)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("bad daemon path {}: {}", path, e)))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, AppError> {
        let mut req = self.reads.get(self.endpoint(path)?).query(query);
        if let Some(auth) = &self.auth {
            req = req.basic_auth(&auth.username, auth.password.as_ref());
        }
        let resp = req.send().await.map_err(|e| {
            tracing::warn!("daemon request failed after retries: {}", e);
            AppError::Upstream(e.to_string())
        })?;
        parse_envelope(path, resp).await
    }

    async fn post_form<T: DeserializeOwned>(&self, path: &str, form: &[(&str, String)]) -> Result<T, AppError> {
        let mut req = self.writes.post(self.endpoint(path)?).form(form);
        if let Some(auth) = &self.auth {
            req = req.basic_auth(&auth.username, auth.password.as_ref());
        }
        let resp = req.send().await.map_err(|e| {
            tracing::warn!("daemon request failed: {}", e);
            AppError::Upstream(e.to_string())
        })?;
        parse_envelope(path, resp).await
    }

    pub async fn daemon_status(&self) -> Result<DaemonStatus, AppError> {
        self.get_json("daemonstatus.json", &[]).await
    }

    pub async fn list_projects(&self) -> Result<Vec<String>, AppError> {
        let p: Projects = self.get_json("listprojects.json", &[]).await?;
        Ok(p.projects)
    }

    pub async fn list_versions(&self, project: &str) -> Result<Vec<String>, AppError> {
        let v: Versions = self.get_json("listversions.json", &[("project", project)]).await?;
        Ok(v.versions)
    }

    pub async fn list_spiders(&self, project: &str) -> Result<Vec<String>, AppError> {
        let s: Spiders = self.get_json("listspiders.json", &[("project", project)]).await?;
        Ok(s.spiders)
    }

    pub async fn list_jobs(&self, project: &str) -> Result<JobList, AppError> {
        self.get_json("listjobs.json", &[("project", project)]).await
    }

    /// Schedule a spider run. Each settings entry is sent as `setting=KEY=VALUE`.
    pub async fn schedule(
        &self,
        project: &str,
        spider: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<ScheduledJob, AppError> {
        let mut form = vec![("project", project.to_string()), ("spider", spider.to_string())];
        form.extend(settings.iter().map(|(k, v)| ("setting", format!("{}={}", k, v))));
        let job: ScheduledJob = self.post_form("schedule.json", &form).await?;
        tracing::info!(project = project, spider = spider, job_id = %job.jobid, "spider scheduled");
        Ok(job)
    }

    /// Returns the job's state before cancellation, if the daemon reports one.
    pub async fn cancel(&self, project: &str, job_id: &str) -> Result<Option<String>, AppError> {
        let form = [("project", project.to_string()), ("job", job_id.to_string())];
        let c: Cancelled = self.post_form("cancel.json", &form).await?;
        tracing::info!(project = project, job_id = job_id, "job cancelled");
        Ok(c.prevstate)
    }

    pub async fn delete_version(&self, project: &str, version: &str) -> Result<(), AppError> {
        let form = [("project", project.to_string()), ("version", version.to_string())];
        let _: serde_json::Value = self.post_form("delversion.json", &form).await?;
        tracing::info!(project = project, version = version, "project version deleted");
        Ok(())
    }

    pub async fn delete_project(&self, project: &str) -> Result<(), AppError> {
        let form = [("project", project.to_string())];
        let _: serde_json::Value = self.post_form("delproject.json", &form).await?;
        tracing::info!(project = project, "project deleted");
        Ok(())
    }

    /// Fetch a job's log or scraped items file as text.
    pub async fn job_file(
        &self,
        project: &str,
        spider: &str,
        job_id: &str,
        kind: LogKind,
    ) -> Result<String, AppError> {
        let (dir, ext) = kind.dir_and_ext();
        let file = format!("{}.{}", job_id, ext);
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Internal(anyhow::anyhow!("daemon URL cannot be a base")))?
            .pop_if_empty()
            .extend([dir, project, spider, file.as_str()]);

        let mut req = self.reads.get(url);
        if let Some(auth) = &self.auth {
            req = req.basic_auth(&auth.username, auth.password.as_ref());
        }
        let resp = req
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => resp.text().await.map_err(|e| AppError::Upstream(e.to_string())),
            StatusCode::NOT_FOUND => Err(AppError::NotFound("job file not found")),
            s => Err(AppError::Upstream(format!("{} returned HTTP {}", dir, s))),
        }
    }
}

async fn parse_envelope<T: DeserializeOwned>(path: &str, resp: reqwest::Response) -> Result<T, AppError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(AppError::Upstream(format!("{} returned HTTP {}", path, status)));
    }
    let value: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| AppError::Upstream(format!("{}: invalid JSON: {}", path, e)))?;

    let envelope: Envelope = serde_json::from_value(value.clone())
        .map_err(|e| AppError::Upstream(format!("{}: unexpected response: {}", path, e)))?;
    if envelope.status != "ok" {
        return Err(AppError::Upstream(format!(
            "{}: {}",
            path,
            envelope.message.unwrap_or_else(|| "daemon reported an error".into())
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::Upstream(format!("{}: unexpected response: {}", path, e)))
}
