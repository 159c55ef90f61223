//! In-memory persistence for jobs and workers.
//!
//! Not immediately scalable (a restart loses all state); adequate for a
//! small-scale engine. A production deployment would externalize this into
//! a real database, as the module doc in the original controller notes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use specifications::job::{JobId, JobStatus, JobStatusUpdate};
use specifications::task::TaskDAG;
use specifications::worker::{Worker, WorkerId, WorkerRegistration};

use crate::errors::CtlError;


/***** LIBRARY *****/
/// A job as tracked by the controller: its current status, the DAG it was
/// submitted with, and which worker (if any) it has been assigned to.
pub struct Job {
    pub status: JobStatus,
    pub definition: TaskDAG,
    pub worker_id: Option<WorkerId>,
}

#[derive(Default)]
pub struct Db {
    pub jobs: DashMap<JobId, Job>,
    pub workers: DashMap<WorkerId, Worker>,
}

impl Db {
    pub fn new() -> Self { Self::default() }

    pub fn job_status(&self, job_id: &JobId) -> Option<JobStatus> { self.jobs.get(job_id).map(|j| j.status.clone()) }

    /// Registers a freshly submitted DAG and returns its initial
    /// (`submitted`) status.
    pub fn job_submit(&self, definition: TaskDAG) -> JobStatus {
        let job_id = JobId::generate();
        let status = JobStatus::new(job_id.clone(), Utc::now());
        self.jobs.insert(job_id, Job { status: status.clone(), definition, worker_id: None });
        status
    }

    pub fn job_assign_worker(&self, job_id: &JobId, worker_id: WorkerId) -> Result<(), CtlError> {
        let mut job = self.jobs.get_mut(job_id).ok_or_else(|| CtlError::UnknownJob(job_id.clone()))?;
        job.worker_id = Some(worker_id);
        Ok(())
    }

    /// Applies a status update, enforcing the monotonic lifecycle order.
    pub fn job_update(&self, update: &JobStatusUpdate) -> Result<JobStatus, CtlError> {
        let mut job = self.jobs.get_mut(&update.job_id).ok_or_else(|| CtlError::UnknownJob(update.job_id.clone()))?;
        job.status.apply_update(update, Utc::now()).map_err(CtlError::InvalidTransition)?;
        Ok(job.status.clone())
    }

    pub fn worker_register(&self, reg: &WorkerRegistration) -> Result<WorkerId, CtlError> {
        let worker = Worker::from_registration(reg, Utc::now()).map_err(CtlError::MalformedRegistration)?;
        let worker_id = WorkerId::generate();
        self.workers.insert(worker_id.clone(), worker);
        Ok(worker_id)
    }

    pub fn worker_heartbeat(&self, worker_id: &WorkerId, seen_at: DateTime<Utc>) {
        if let Some(mut worker) = self.workers.get_mut(worker_id) { worker.last_seen = seen_at; }
    }

    /// A snapshot of all known workers, for assignment and for the
    /// heartbeat maintenance loop. Snapshotting avoids holding shard locks
    /// across the subsequent network calls.
    pub fn workers_snapshot(&self) -> Vec<(WorkerId, Worker)> { self.workers.iter().map(|e| (e.key().clone(), e.value().clone())).collect() }
}


#[cfg(test)]
mod tests {
    use specifications::job::JobStatusEnum;

    use super::*;

    #[test]
    fn submit_then_status_round_trips() {
        let db = Db::new();
        let dag = TaskDAG { tasks: vec![], output_id: None };
        let status = db.job_submit(dag);
        assert_eq!(status.status, JobStatusEnum::Submitted);
        assert_eq!(db.job_status(&status.job_id).unwrap().status, JobStatusEnum::Submitted);
    }

    #[test]
    fn update_unknown_job_errors() {
        let db = Db::new();
        let update = JobStatusUpdate { job_id: JobId::generate(), status: JobStatusEnum::Assigned, task_name: None, result: None, status_detail: None };
        assert!(matches!(db.job_update(&update), Err(CtlError::UnknownJob(_))));
    }

    #[test]
    fn update_enforces_monotonic_order() {
        let db = Db::new();
        let status = db.job_submit(TaskDAG { tasks: vec![], output_id: None });
        let advance = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Running, task_name: None, result: None, status_detail: None };
        db.job_update(&advance).unwrap();

        let regress = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Assigned, task_name: None, result: None, status_detail: None };
        assert!(matches!(db.job_update(&regress), Err(CtlError::InvalidTransition(_))));
    }

    #[test]
    fn register_worker_then_heartbeat_updates_last_seen() {
        let db = Db::new();
        let reg = WorkerRegistration::from_raw("http://10.0.0.1:9000", 2048);
        let worker_id = db.worker_register(&reg).unwrap();
        let first_seen = db.workers.get(&worker_id).unwrap().last_seen;

        let later = first_seen + chrono::Duration::seconds(60);
        db.worker_heartbeat(&worker_id, later);
        assert_eq!(db.workers.get(&worker_id).unwrap().last_seen, later);
    }
}
