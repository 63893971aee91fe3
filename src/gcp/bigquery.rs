/// Warehouse Client Module
///
/// Talks to the BigQuery REST API: a query job for the delete phase and a
/// CSV load job (header row skipped) for the load phase. Both jobs are
/// driven to completion before a verdict is returned — a delete that
/// outlives the query timeout is polled until done, so the load never
/// races an in-flight delete. The load job's error result, if any, is
/// surfaced to the replacer, which decides whether the failure is fatal.
use crate::errors::RegenError;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

const BIGQUERY_BASE_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";
const QUERY_TIMEOUT_MS: u64 = 100_000;
const JOB_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Verdict of one load job. A job that completed with a per-file error
/// result carries `succeeded: false` and the reported message.
#[derive(Debug, Clone)]
pub struct LoadJobResult {
    pub succeeded: bool,
    pub message: String,
}

/// The two operations the replacer needs from the warehouse.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    /// Run a delete statement against the warehouse and wait for it to
    /// complete.
    async fn delete(&self, query: &str) -> Result<(), RegenError>;

    /// Load a staged CSV object into a destination table. `Err` means the
    /// job could not be submitted or tracked (transport failure); a job
    /// that ran and reported an error comes back as `Ok` with
    /// `succeeded: false`.
    async fn load(&self, bucket: &str, name: &str, table: &str) -> Result<LoadJobResult, RegenError>;
}

pub struct BigQueryClient {
    http: reqwest::Client,
    base_url: String,
    project_id: String,
    dataset: String,
    access_token: String,
}

impl BigQueryClient {
    pub fn new(project_id: &str, dataset: &str, access_token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: BIGQUERY_BASE_URL.to_string(),
            project_id: project_id.to_string(),
            dataset: dataset.to_string(),
            access_token: access_token.to_string(),
        }
    }

    /// Point the client at a test double instead of the Google endpoint.
    #[cfg(test)]
    fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<Value, reqwest::Error> {
        self.http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }

    /// Poll a submitted job until BigQuery reports it DONE, then return
    /// its final status object.
    async fn wait_for_job(&self, job_id: &str) -> Result<Value, reqwest::Error> {
        let url = format!("{}/projects/{}/jobs/{}", self.base_url, self.project_id, job_id);

        loop {
            let job = self
                .http
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await?;

            let state = job.pointer("/status/state").and_then(Value::as_str).unwrap_or("");
            if state == "DONE" {
                return Ok(job["status"].clone());
            }

            tokio::time::sleep(JOB_POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn delete(&self, query: &str) -> Result<(), RegenError> {
        let url = format!("{}/projects/{}/queries", self.base_url, self.project_id);
        let body = json!({
            "query": query,
            "useLegacySql": false,
            "timeoutMs": QUERY_TIMEOUT_MS,
        });

        let response = self.post_json(&url, &body).await.map_err(|e| RegenError::Replace(e.to_string()))?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                let message =
                    errors[0].get("message").and_then(Value::as_str).unwrap_or("unknown query error").to_string();
                return Err(RegenError::Replace(message));
            }
        }

        // A delete that outlasts timeoutMs comes back with
        // jobComplete: false and no errors. The subsequent load must not
        // run until the delete has actually finished.
        let complete = response.get("jobComplete").and_then(Value::as_bool).unwrap_or(false);
        if !complete {
            let job_id = response
                .pointer("/jobReference/jobId")
                .and_then(Value::as_str)
                .ok_or_else(|| RegenError::Replace("incomplete delete job without a job id".to_string()))?
                .to_string();

            let status = self.wait_for_job(&job_id).await.map_err(|e| RegenError::Replace(e.to_string()))?;
            if let Some(error) = status.get("errorResult") {
                let message =
                    error.get("message").and_then(Value::as_str).unwrap_or("unknown delete error").to_string();
                return Err(RegenError::Replace(message));
            }
        }

        Ok(())
    }

    async fn load(&self, bucket: &str, name: &str, table: &str) -> Result<LoadJobResult, RegenError> {
        let url = format!("{}/projects/{}/jobs", self.base_url, self.project_id);
        let body = json!({
            "configuration": {
                "load": {
                    "sourceUris": [format!("gs://{}/{}", bucket, name)],
                    "destinationTable": {
                        "projectId": self.project_id,
                        "datasetId": self.dataset,
                        "tableId": table,
                    },
                    "sourceFormat": "CSV",
                    "skipLeadingRows": 1,
                }
            }
        });

        let submitted = self.post_json(&url, &body).await.map_err(|e| RegenError::Load(e.to_string()))?;

        let job_id = submitted
            .pointer("/jobReference/jobId")
            .and_then(Value::as_str)
            .ok_or_else(|| RegenError::Load("load job submitted without a job id".to_string()))?
            .to_string();

        let status = self.wait_for_job(&job_id).await.map_err(|e| RegenError::Load(e.to_string()))?;

        // The presence of an errorResult is the failure signal, whether
        // or not it carries a message.
        match status.get("errorResult") {
            Some(error) => {
                let message =
                    error.get("message").and_then(Value::as_str).unwrap_or("unknown load error").to_string();
                Ok(LoadJobResult { succeeded: false, message })
            }
            None => Ok(LoadJobResult { succeeded: true, message: "SUCCESS".to_string() }),
        }
    }
}
