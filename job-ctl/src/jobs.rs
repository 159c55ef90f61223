//! Route handlers for job submission and status.

use std::collections::HashMap;
use std::convert::Infallible;

use chrono::Utc;
use job_sched::linearize;
use log::{error, info};
use serde::{Deserialize, Serialize};
use specifications::job::{JobId, JobStatusEnum, JobStatusUpdate};
use specifications::task::{TaskDAG, TaskDAGBuilder};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::errors::CtlError;
use crate::spec::Context;


/***** HELPER STRUCTS *****/
/// Body of `PUT /jobs/schedulable_submit`: a template plus the user's
/// literal answers to its parameter form, to be materialized into a
/// [`TaskDAG`] before scheduling.
#[derive(Deserialize)]
pub struct SchedulableSubmission {
    pub builder: TaskDAGBuilder,
    #[serde(default)]
    pub user_literals: HashMap<String, HashMap<String, String>>,
}

#[derive(Serialize)]
struct Accepted {
    job_id: JobId,
    status: JobStatusEnum,
}


/***** LIBRARY *****/
/// `PUT /jobs/submit`: accepts an already-materialized [`TaskDAG`].
pub async fn submit(dag: TaskDAG, ctx: Context) -> Result<impl Reply, Rejection> {
    let errors = dag.validate_structure();
    if !errors.is_empty() { return Err(warp::reject::custom(CtlError::Validation(errors))); }

    let status = ctx.db.job_submit(dag);
    let job_id = status.job_id.clone();
    info!("accepted job {job_id}");

    tokio::spawn(assign_job(job_id, ctx));
    Ok(warp::reply::with_status(warp::reply::json(&Accepted { job_id: status.job_id, status: status.status }), StatusCode::OK))
}

/// `PUT /jobs/schedulable_submit`: accepts a [`TaskDAGBuilder`] template and
/// the user's literal parameter answers, materializes it, then proceeds
/// exactly as [`submit`] does.
pub async fn schedulable_submit(body: SchedulableSubmission, ctx: Context) -> Result<impl Reply, Rejection> {
    let builder_errors = body.builder.validate();
    if !builder_errors.is_empty() { return Err(warp::reject::custom(CtlError::Validation(builder_errors))); }

    let dag = body.builder.materialize(&body.user_literals).map_err(|errs| warp::reject::custom(CtlError::Validation(errs)))?;

    let structural_errors = dag.validate_structure();
    if !structural_errors.is_empty() { return Err(warp::reject::custom(CtlError::Validation(structural_errors))); }

    let status = ctx.db.job_submit(dag);
    let job_id = status.job_id.clone();
    info!("accepted schedulable job {job_id}");

    tokio::spawn(assign_job(job_id, ctx));
    Ok(warp::reply::with_status(warp::reply::json(&Accepted { job_id: status.job_id, status: status.status }), StatusCode::OK))
}

/// `GET /jobs/status/{job-id}`.
pub async fn status(job_id: String, ctx: Context) -> Result<impl Reply, Rejection> {
    let job_id = JobId(job_id);
    let status = ctx.db.job_status(&job_id).ok_or_else(|| warp::reject::custom(CtlError::UnknownJob(job_id)))?;
    Ok(warp::reply::json(&status))
}

/// `POST /jobs/update/{worker-id}`: a worker reporting a job's status
/// change. The worker id in the path refreshes its heartbeat and, on a
/// `finished` update, resolves the dataset digest the worker reports into
/// the full URL the worker's own streaming endpoint answers on — the
/// worker knows only the digest, not its own externally-reachable address.
pub async fn update(worker_id: String, mut update: JobStatusUpdate, ctx: Context) -> Result<impl Reply, Infallible> {
    let worker_id = specifications::worker::WorkerId(worker_id);
    ctx.db.worker_heartbeat(&worker_id, Utc::now());

    if let Some(digest) = update.result.take() {
        update.result = Some(match ctx.db.workers.get(&worker_id) {
            Some(worker) => format!("{}/data/{digest}", worker.url),
            None => digest,
        });
    }

    match ctx.db.job_update(&update) {
        Ok(status) => Ok(warp::reply::with_status(warp::reply::json(&status), StatusCode::OK)),
        Err(err) => {
            error!("rejected status update for job {}: {err}", update.job_id);
            Ok(warp::reply::with_status(warp::reply::json(&serde_json::json!({ "error": err.to_string() })), StatusCode::CONFLICT))
        }
    }
}

/// Picks a worker, schedules the job's DAG onto it, and hands it off. Runs
/// detached from the submitting request; failures are recorded onto the
/// job's own status rather than returned anywhere, since by this point the
/// client has already received its 200 and a job id to poll.
async fn assign_job(job_id: JobId, ctx: Context) {
    if let Err(err) = try_assign_job(&job_id, &ctx).await {
        error!("failed to assign job {job_id}: {err}");
        let update = JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Failed, task_name: None, result: None, status_detail: Some(err.to_string()) };
        if let Err(e) = ctx.db.job_update(&update) {
            error!("could not even record job {job_id} as failed: {e}");
        }
    }
}

async fn try_assign_job(job_id: &JobId, ctx: &Context) -> Result<(), CtlError> {
    let workers = ctx.db.workers_snapshot();
    let (worker_id, worker) = workers.first().cloned().ok_or(CtlError::NoWorkers)?;

    let dag = {
        let job = ctx.db.jobs.get(job_id).ok_or_else(|| CtlError::UnknownJob(job_id.clone()))?;
        job.definition.clone()
    };

    // A single worker gets the whole DAG; multi-host partitioning via
    // `job_sched::partition` is for when more than one worker is known.
    linearize(&dag).map_err(|e| CtlError::Scheduling(e.to_string()))?;

    ctx.worker_comm.call_submit(&worker.url, job_id.as_str(), &dag).await.map_err(CtlError::Transport)?;

    ctx.db.job_assign_worker(job_id, worker_id)?;
    let update = JobStatusUpdate { job_id: job_id.clone(), status: JobStatusEnum::Assigned, task_name: None, result: None, status_detail: None };
    ctx.db.job_update(&update)?;
    Ok(())
}
