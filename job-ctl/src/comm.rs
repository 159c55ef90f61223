//! Communication layer to workers.

use std::time::Duration;

use job_shr::retry::with_retry;
use log::error;
use reqwest::Client;
use specifications::task::TaskDAG;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);


/***** LIBRARY *****/
pub struct WorkerComm {
    client: Client,
}

impl Default for WorkerComm {
    fn default() -> Self { Self::new() }
}

impl WorkerComm {
    pub fn new() -> Self { Self { client: Client::new() } }

    /// Submits a job's materialized schedule to a worker. Retries a bounded
    /// number of times on transport error; a non-2xx response is not
    /// retried, since the worker has already answered.
    pub async fn call_submit(&self, worker_url: &str, job_id: &str, dag: &TaskDAG) -> Result<(), String> {
        let url = format!("{worker_url}/jobs/submit/{job_id}");
        with_retry(MAX_ATTEMPTS, RETRY_BACKOFF, || async {
            let resp = self.client.put(&url).json(dag).send().await.map_err(|e| e.to_string())?;
            if resp.status().is_success() { Ok(()) } else { Err(format!("worker responded with {}", resp.status())) }
        })
        .await
    }

    /// Calls a worker's liveness endpoint. Logs and returns `false` on any
    /// failure rather than surfacing an error; the heartbeat loop treats
    /// that as "not seen this round", nothing more.
    pub async fn call_heartbeat(&self, worker_url: &str) -> bool {
        let url = format!("{worker_url}/status");
        match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                error!("worker at {worker_url} failed heartbeat: status {}", resp.status());
                false
            }
            Err(err) => {
                error!("worker at {worker_url} failed heartbeat: {err}");
                false
            }
        }
    }
}
