//! In-memory tracking of jobs currently assigned to this worker.

use dashmap::DashMap;

use specifications::job::JobId;


/***** LIBRARY *****/
#[derive(Clone, Debug)]
pub enum JobRunState {
    Preparing,
    Running { task: String },
    Finished { result: String },
    Failed { detail: String },
}

#[derive(Default)]
pub struct Db {
    pub jobs: DashMap<JobId, JobRunState>,
}

impl Db {
    pub fn new() -> Self { Self::default() }

    /// Registers a job as accepted and about to start; returns `false` (and
    /// registers nothing) if this job id is already known, since a worker
    /// never re-runs a job it has already been handed.
    pub fn accept(&self, job_id: JobId) -> bool {
        use dashmap::mapref::entry::Entry;
        match self.jobs.entry(job_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(e) => {
                e.insert(JobRunState::Preparing);
                true
            }
        }
    }

    pub fn set_state(&self, job_id: &JobId, state: JobRunState) {
        if let Some(mut entry) = self.jobs.get_mut(job_id) { *entry = state; }
    }

    pub fn state(&self, job_id: &JobId) -> Option<JobRunState> { self.jobs.get(job_id).map(|e| e.value().clone()) }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accept_rejects_a_job_already_known() {
        let db = Db::new();
        let job_id = JobId::generate();
        assert!(db.accept(job_id.clone()));
        assert!(!db.accept(job_id));
    }

    #[test]
    fn set_state_updates_an_accepted_job() {
        let db = Db::new();
        let job_id = JobId::generate();
        db.accept(job_id.clone());
        db.set_state(&job_id, JobRunState::Running { task: "a".into() });
        assert!(matches!(db.state(&job_id), Some(JobRunState::Running { .. })));
    }
}
