//! Route handler for job submission, and the task execution loop it spawns.

use std::collections::HashMap;
use std::time::Duration;

use job_shr::retry::with_retry;
use log::{error, info};
use specifications::dataset::{shmem_id_for, DatasetId};
use specifications::job::{JobId, JobStatusEnum, JobStatusUpdate};
use specifications::task::TaskDAG;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::child;
use crate::db::JobRunState;
use crate::errors::WrkError;
use crate::spec::Context;

const MAX_UPDATE_ATTEMPTS: u32 = 3;
const UPDATE_BACKOFF: Duration = Duration::from_millis(500);


/***** LIBRARY *****/
/// `PUT /jobs/submit/{job-id}`.
pub async fn submit(job_id: String, dag: TaskDAG, ctx: Context) -> Result<impl Reply, Rejection> {
    let job_id = JobId(job_id);
    if !ctx.db.accept(job_id.clone()) {
        return Err(warp::reject::custom(WrkError::Task(format!("job {job_id} was already submitted to this worker"))));
    }

    info!("accepted job {job_id} ({} tasks)", dag.tasks.len());
    tokio::spawn(run_job(job_id, dag, ctx));
    Ok(warp::reply::with_status("ok", StatusCode::OK))
}

/// Runs every task in `dag` in order, publishing each one's output to
/// shared memory and reporting per-task `running`/`finished` transitions
/// back to the controller. Stops and reports `failed` at the first task
/// that errors.
async fn run_job(job_id: JobId, dag: TaskDAG, ctx: Context) {
    ctx.db.set_state(&job_id, JobRunState::Preparing);
    send_update(&ctx, JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Preparing, task_name: None, result: None, status_detail: None }).await;

    let mut known_lengths: HashMap<DatasetId, usize> = HashMap::new();

    for task in &dag.tasks {
        ctx.db.set_state(&job_id, JobRunState::Running { task: task.name.clone() });
        send_update(&ctx, JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Running, task_name: Some(task.name.clone()), result: None, status_detail: None }).await;

        match child::spawn_and_wait(&ctx.self_exe, &job_id, task, &known_lengths, ctx.install_bin.as_deref()).await {
            Ok(Some((dataset_id, len))) => {
                let shm_id = shmem_id_for(job_id.as_str(), &dataset_id);
                ctx.dataset_lengths.record(&job_id, shm_id, len);
                known_lengths.insert(dataset_id, len);
            }
            Ok(None) => {}
            Err(err) => {
                error!("job {job_id} failed at task '{}': {err}", task.name);
                ctx.db.set_state(&job_id, JobRunState::Failed { detail: err.to_string() });
                send_update(&ctx, JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Failed, task_name: Some(task.name.clone()), result: None, status_detail: Some(err.to_string()) }).await;
                if let Err(purge_err) = ctx.dataset_lengths.purge_job(&job_id) {
                    error!("failed to purge datasets for job {job_id}: {purge_err}");
                }
                return;
            }
        }

        send_update(&ctx, JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Finished, task_name: Some(task.name.clone()), result: None, status_detail: None }).await;
    }

    let result_digest = dag.output_id.as_ref().map(|output_id| shmem_id_for(job_id.as_str(), output_id));
    ctx.db.set_state(&job_id, JobRunState::Finished { result: result_digest.clone().unwrap_or_default() });
    send_update(&ctx, JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Finished, task_name: None, result: result_digest.clone(), status_detail: None }).await;

    // Intermediate datasets between tasks are no longer needed once the job
    // is done; the final output (if any) stays servable from `/data/...`.
    if let Err(err) = ctx.dataset_lengths.purge_job_except(&job_id, result_digest.as_deref()) {
        error!("failed to purge intermediate datasets for job {job_id}: {err}");
    }
}

/// Reports a status update to the controller, retrying a bounded number of
/// times on transport error. A failure here is logged and otherwise
/// swallowed: the worker has already recorded the authoritative state
/// locally, and the controller will learn of it on the next successful
/// report or its own heartbeat round.
async fn send_update(ctx: &Context, update: JobStatusUpdate) {
    let url = format!("{}/jobs/update/{}", ctx.controller_url, ctx.worker_id);
    let result = with_retry(MAX_UPDATE_ATTEMPTS, UPDATE_BACKOFF, || async {
        let resp = ctx.http.post(&url).json(&update).send().await.map_err(|e| e.to_string())?;
        if resp.status().is_success() { Ok(()) } else { Err(format!("controller responded with {}", resp.status())) }
    })
    .await;

    if let Err(err) = result {
        error!("failed to report status update for job {}: {err}", update.job_id);
    }
}
