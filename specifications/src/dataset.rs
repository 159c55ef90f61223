//! Dataset identifiers and the job-scoped digest that addresses their
//! physical (shared-memory) form.

use serde::{Deserialize, Serialize};


/***** LIBRARY *****/
/// A logical name for a value produced within the scope of a single job.
///
/// This is distinct from the physical address of the backing shared-memory
/// segment, which is derived from it via [`shmem_id`].
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl DatasetId {
    #[inline]
    pub fn new(name: impl Into<String>) -> Self { Self(name.into()) }

    #[inline]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl From<&str> for DatasetId {
    fn from(s: &str) -> Self { Self(s.to_string()) }
}

impl From<String> for DatasetId {
    fn from(s: String) -> Self { Self(s) }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.0) }
}



/// Computes the 24-character hex digest that addresses the shared-memory
/// segment for `(job_id, dataset_name)`.
///
/// We can't use arbitrarily long names for shared-memory segments on every
/// platform (e.g. macOS caps them well below what a job/dataset name pair
/// could produce), so we address segments by digest rather than by the
/// concatenated names themselves. This is chosen for portability, not
/// security — `md5` is fine here.
pub fn shmem_id(job_id: &str, dataset_name: &str) -> String {
    let digest = md5::compute(format!("{job_id}{dataset_name}"));
    format!("{digest:x}")[..24].to_string()
}

/// Convenience wrapper around [`shmem_id`] for a [`DatasetId`].
#[inline]
pub fn shmem_id_for(job_id: &str, dataset: &DatasetId) -> String { shmem_id(job_id, dataset.as_str()) }


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_24_hex_chars() {
        let id = shmem_id("job-1", "dataset-a");
        assert_eq!(id.len(), 24);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn digest_is_deterministic_and_order_sensitive() {
        let a = shmem_id("job-1", "dataset-a");
        let b = shmem_id("job-1", "dataset-a");
        assert_eq!(a, b);

        let c = shmem_id("job-1", "dataset-b");
        assert_ne!(a, c);

        let d = shmem_id("job-2", "dataset-a");
        assert_ne!(a, d);
    }
}
