//! Crawl-daemon routes. Thin pass-through to [`ScrapydClient`](crate::scrapyd::ScrapydClient);
//! this layer only checks that the required parameters are present.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthContext;
use crate::errors::AppError;
use crate::scrapyd::LogKind;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct JobParams {
    pub project: Option<String>,
    pub spider: Option<String>,
    pub job_id: Option<String>,
    pub version: Option<String>,
    pub log_type: Option<LogKind>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    pub project: Option<String>,
    pub spider: Option<String>,
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub project: Option<String>,
    pub job_id: Option<String>,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("missing required parameter '{}'", name)))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(v)| v)
        .map_err(|_| AppError::Validation("invalid request body".into()))
}

fn data(value: impl serde::Serialize) -> Json<Value> {
    Json(json!({ "data": value }))
}

/// GET /api/v1/status
pub async fn daemon_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    Ok(data(state.scrapyd.daemon_status().await?))
}

/// GET /api/v1/projects
pub async fn list_projects(State(state): State<Arc<AppState>>) -> Result<Json<Value>, AppError> {
    Ok(data(state.scrapyd.list_projects().await?))
}

/// GET /api/v1/versions?project=
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    Ok(data(state.scrapyd.list_versions(project).await?))
}

/// GET /api/v1/spiders?project=
pub async fn list_spiders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    Ok(data(state.scrapyd.list_spiders(project).await?))
}

/// GET /api/v1/jobs?project=
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    Ok(data(state.scrapyd.list_jobs(project).await?))
}

/// GET /api/v1/job/stats?project=&job_id=
pub async fn job_stats(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    let job_id = required(&params.job_id, "job_id")?;

    let jobs = state.scrapyd.list_jobs(project).await?;
    let (status, job) = jobs.find(job_id).ok_or(AppError::NotFound("job not found"))?;
    Ok(data(json!({ "status": status, "job": job })))
}

/// GET /api/v1/log?project=&spider=&job_id=&log_type=
pub async fn job_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    let spider = required(&params.spider, "spider")?;
    let job_id = required(&params.job_id, "job_id")?;
    let kind = params.log_type.unwrap_or_default();

    Ok(data(state.scrapyd.job_file(project, spider, job_id, kind).await?))
}

/// GET /api/v1/job/items?project=&spider=&job_id=
pub async fn job_items(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    let spider = required(&params.spider, "spider")?;
    let job_id = required(&params.job_id, "job_id")?;

    let raw = state
        .scrapyd
        .job_file(project, spider, job_id, LogKind::Items)
        .await?;
    // items feed is JSON lines; skip lines that do not parse
    let items: Vec<Value> = raw
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect();
    Ok(data(items))
}

/// POST /api/v1/schedule (admin)
pub async fn schedule(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    payload: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let req = body(payload)?;
    let project = required(&req.project, "project")?;
    let spider = required(&req.spider, "spider")?;

    let settings: BTreeMap<String, String> = req
        .settings
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect();

    let job = state.scrapyd.schedule(project, spider, &settings).await?;
    tracing::info!(subject = %ctx.subject, job_id = %job.jobid, "schedule requested");
    Ok(data(job))
}

/// POST /api/v1/cancel (admin)
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let req = body(payload)?;
    let project = required(&req.project, "project")?;
    let job_id = required(&req.job_id, "job_id")?;

    let prevstate = state.scrapyd.cancel(project, job_id).await?;
    Ok(data(json!({ "prevstate": prevstate })))
}

/// DELETE /api/v1/project?project= (admin)
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    state.scrapyd.delete_project(project).await?;
    Ok(data(json!({ "deleted": project })))
}

/// DELETE /api/v1/version?project=&version= (admin)
pub async fn delete_version(
    State(state): State<Arc<AppState>>,
    Query(params): Query<JobParams>,
) -> Result<Json<Value>, AppError> {
    let project = required(&params.project, "project")?;
    let version = required(&params.version, "version")?;
    state.scrapyd.delete_version(project, version).await?;
    Ok(data(json!({ "deleted": version })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_blank() {
        assert!(required(&None, "project").is_err());
        assert!(required(&Some("  ".into()), "project").is_err());
        assert_eq!(required(&Some(" demo ".into()), "project").unwrap(), "demo");
    }

    #[test]
    fn test_log_type_parsing() {
        let p: JobParams = serde_json::from_value(json!({"log_type": "items"})).unwrap();
        assert_eq!(p.log_type, Some(LogKind::Items));
        let p: JobParams = serde_json::from_value(json!({})).unwrap();
        assert_eq!(p.log_type.unwrap_or_default(), LogKind::Log);
    }
}
