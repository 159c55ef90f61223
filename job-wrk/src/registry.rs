//! The dataset length registry: the only cross-process mutable state the
//! worker maintains. A task child that creates a segment reports its exact
//! byte length back to the worker main process, which records it here
//! keyed by the segment's physical (digest) id — the same id the
//! controller hands back to callers as a job's published result, and the
//! same id the streaming endpoint is queried with. Written at most once
//! per segment, so no write-write conflict ever arises.

use dashmap::DashMap;

use specifications::job::JobId;

use crate::errors::WrkError;
use crate::shmem;


/***** LIBRARY *****/
#[derive(Default)]
pub struct DatasetLengths {
    lengths: DashMap<String, usize>,
    /// Which job each physical segment belongs to, so a job's segments can
    /// be purged together without scanning the whole registry.
    by_job: DashMap<JobId, Vec<String>>,
}

impl DatasetLengths {
    pub fn new() -> Self { Self::default() }

    pub fn record(&self, job_id: &JobId, shm_id: String, len: usize) {
        self.lengths.insert(shm_id.clone(), len);
        self.by_job.entry(job_id.clone()).or_default().push(shm_id);
    }

    pub fn len_of(&self, shm_id: &str) -> Option<usize> { self.lengths.get(shm_id).map(|l| *l) }

    /// Unlinks every segment recorded for `job_id` and drops their registry
    /// entries. Only the worker main process calls this.
    pub fn purge_job(&self, job_id: &JobId) -> Result<(), WrkError> { self.purge_job_except(job_id, None) }

    /// Like [`Self::purge_job`], but leaves `keep` (if it belongs to this
    /// job) untouched — used when a job finishes successfully and its final
    /// output must stay servable from `/data/{dataset-id}` after the
    /// intermediate segments between tasks are no longer needed.
    pub fn purge_job_except(&self, job_id: &JobId, keep: Option<&str>) -> Result<(), WrkError> {
        let Some((_, shm_ids)) = self.by_job.remove(job_id) else { return Ok(()) };

        let mut kept = Vec::new();
        for shm_id in shm_ids {
            if Some(shm_id.as_str()) == keep {
                kept.push(shm_id);
                continue;
            }
            shmem::unlink(&shm_id)?;
            self.lengths.remove(&shm_id);
        }
        if !kept.is_empty() { self.by_job.insert(job_id.clone(), kept); }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_then_len_of_round_trips() {
        let reg = DatasetLengths::new();
        let job_id = JobId::generate();
        reg.record(&job_id, "abc123".to_string(), 128);
        assert_eq!(reg.len_of("abc123"), Some(128));
    }

    #[test]
    fn len_of_unknown_segment_is_none() {
        let reg = DatasetLengths::new();
        assert_eq!(reg.len_of("ghost"), None);
    }

    #[test]
    fn purge_job_except_unlinks_every_segment_but_the_one_kept() {
        use crate::shmem::Segment;

        let reg = DatasetLengths::new();
        let job_id = JobId::generate();
        let intermediate = format!("job-wrk-test-intermediate-{job_id}");
        let final_id = format!("job-wrk-test-final-{job_id}");

        Segment::create(&intermediate, 4).unwrap();
        Segment::create(&final_id, 8).unwrap();
        reg.record(&job_id, intermediate.clone(), 4);
        reg.record(&job_id, final_id.clone(), 8);

        reg.purge_job_except(&job_id, Some(&final_id)).unwrap();

        assert_eq!(reg.len_of(&final_id), Some(8));
        assert_eq!(reg.len_of(&intermediate), None);
        assert!(Segment::open(&intermediate).is_err());
        assert!(Segment::open(&final_id).is_ok());

        shmem::unlink(&final_id).unwrap();
    }
}
