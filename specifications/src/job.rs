//! Job identity and status tracking.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;


/***** LIBRARY *****/
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn generate() -> Self { Self(Uuid::new_v4().to_string()) }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}

/// The six-state job lifecycle. States are ordered; a status update is
/// valid only if it strictly advances along this order (see
/// [`JobStatusEnum::valid_transition`]).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatusEnum {
    Submitted,
    Assigned,
    Preparing,
    Running,
    Failed,
    Finished,
}

impl JobStatusEnum {
    const ORDER: [JobStatusEnum; 6] = [
        JobStatusEnum::Submitted,
        JobStatusEnum::Assigned,
        JobStatusEnum::Preparing,
        JobStatusEnum::Running,
        JobStatusEnum::Failed,
        JobStatusEnum::Finished,
    ];

    fn rank(self) -> usize { Self::ORDER.iter().position(|s| *s == self).expect("exhaustive enum") }

    /// A transition from `before` (absent for a job's first status) to
    /// `after` is valid iff it does not move backwards in lifecycle order.
    /// Repeating the current status is allowed — a worker reports `running`
    /// once per task, which for a multi-task job is the same status
    /// reported more than once — but the lifecycle has no cycles and no
    /// "downgrades".
    pub fn valid_transition(before: Option<JobStatusEnum>, after: JobStatusEnum) -> bool {
        match before {
            None => true,
            Some(before) => before.rank() <= after.rank(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: JobStatusEnum,
    pub status_detail: String,
    #[serde(default)]
    pub stages: HashMap<String, JobStatusEnum>,
    /// URL where the result can be streamed from, once `status ==
    /// Finished`.
    pub result: Option<String>,
}

impl JobStatus {
    pub fn new(job_id: JobId, now: DateTime<Utc>) -> Self {
        Self { job_id, created_at: now, updated_at: now, status: JobStatusEnum::Submitted, status_detail: String::new(), stages: HashMap::new(), result: None }
    }

    /// Applies an update in place, enforcing the monotonic lifecycle order.
    /// Rejects (and leaves `self` unchanged on) any non-advancing status.
    ///
    /// A per-task update (`task_name` set) only ever records into `stages`;
    /// it advances the job's own `status` too, *unless* it reports `finished`
    /// — one task finishing does not mean the job is done, and letting it set
    /// `status` to `Finished` would both surface the wrong state to pollers
    /// and then reject every later task's own `running` update as a
    /// regression. A task reporting `failed` does end the whole job, so that
    /// one still advances `status`.
    pub fn apply_update(&mut self, update: &JobStatusUpdate, now: DateTime<Utc>) -> Result<(), String> {
        let advances_job = update.task_name.is_none() || update.status != JobStatusEnum::Finished;

        if advances_job && !JobStatusEnum::valid_transition(Some(self.status), update.status) {
            return Err(format!("invalid status transition for job {}: {:?} -> {:?}", self.job_id, self.status, update.status));
        }

        if advances_job { self.status = update.status; }
        self.updated_at = now;
        if let Some(detail) = &update.status_detail { self.status_detail = detail.clone(); }
        if let Some(result) = &update.result { self.result = Some(result.clone()); }
        if let Some(task_name) = &update.task_name { self.stages.insert(task_name.clone(), update.status); }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub job_id: JobId,
    pub status: JobStatusEnum,
    #[serde(default)]
    pub task_name: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub status_detail: Option<String>,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_order_rejects_downgrade() {
        assert!(JobStatusEnum::valid_transition(Some(JobStatusEnum::Running), JobStatusEnum::Assigned) == false);
    }

    #[test]
    fn lifecycle_order_accepts_advance() {
        assert!(JobStatusEnum::valid_transition(Some(JobStatusEnum::Assigned), JobStatusEnum::Preparing));
    }

    #[test]
    fn lifecycle_order_accepts_first_status() {
        assert!(JobStatusEnum::valid_transition(None, JobStatusEnum::Finished));
    }

    #[test]
    fn apply_update_rejects_regression_and_leaves_status_unchanged() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId::generate(), now);
        status.status = JobStatusEnum::Running;

        let update = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Assigned, task_name: None, result: None, status_detail: None };
        assert!(status.apply_update(&update, now).is_err());
        assert_eq!(status.status, JobStatusEnum::Running);
    }

    #[test]
    fn apply_update_records_stage_and_result() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId::generate(), now);
        let update = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Finished, task_name: None, result: Some("http://worker/data/abc".into()), status_detail: None };
        status.apply_update(&update, now).unwrap();
        assert_eq!(status.status, JobStatusEnum::Finished);
        assert_eq!(status.result.as_deref(), Some("http://worker/data/abc"));
    }

    #[test]
    fn a_task_reporting_finished_records_its_stage_but_does_not_complete_the_job() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId::generate(), now);
        status.status = JobStatusEnum::Running;

        let task_done = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Finished, task_name: Some("first".into()), result: None, status_detail: None };
        status.apply_update(&task_done, now).unwrap();
        assert_eq!(status.status, JobStatusEnum::Running);
        assert_eq!(status.stages.get("first"), Some(&JobStatusEnum::Finished));

        let next_task_running = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Running, task_name: Some("second".into()), result: None, status_detail: None };
        assert!(status.apply_update(&next_task_running, now).is_ok());
    }

    #[test]
    fn a_task_reporting_failed_does_complete_the_job() {
        let now = Utc::now();
        let mut status = JobStatus::new(JobId::generate(), now);
        status.status = JobStatusEnum::Running;

        let task_failed = JobStatusUpdate { job_id: status.job_id.clone(), status: JobStatusEnum::Failed, task_name: Some("first".into()), result: None, status_detail: Some("boom".into()) };
        status.apply_update(&task_failed, now).unwrap();
        assert_eq!(status.status, JobStatusEnum::Failed);
        assert_eq!(status.stages.get("first"), Some(&JobStatusEnum::Failed));
    }
}
