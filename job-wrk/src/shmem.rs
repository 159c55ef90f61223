//! Shared-memory segment lifecycle.
//!
//! Three roles, never mixed within one handle: a *creator* (the task child
//! that produces a dataset) creates and writes, then only closes; a
//! *consumer* (a later task child) opens read-only, then only closes; the
//! *owner* (the worker main process) is the only one that ever unlinks, on
//! job teardown or explicit purge. See the dataset length registry for the
//! authoritative length that decoders must respect over the segment's
//! (padded) capacity.

use shared_memory::ShmemConf;

use crate::errors::WrkError;


/***** LIBRARY *****/
/// A segment opened by a creator or a consumer. Never unlinks on drop;
/// unlinking is the worker main process's job alone (see [`unlink`]).
pub struct Segment {
    shmem: shared_memory::Shmem,
}

impl Segment {
    /// Creates a new segment of exactly `len` bytes under `id`. Actual OS
    /// allocation may round up to the platform's page granularity; callers
    /// must never write or read past `len`.
    pub fn create(id: &str, len: usize) -> Result<Self, WrkError> {
        let mut shmem = ShmemConf::new().size(len).os_id(id).create().map_err(|e| WrkError::Resource(format!("creating segment '{id}': {e}")))?;
        shmem.set_owner(false);
        Ok(Self { shmem })
    }

    /// Opens an existing segment read-only.
    pub fn open(id: &str) -> Result<Self, WrkError> {
        let mut shmem = ShmemConf::new().os_id(id).open().map_err(|e| WrkError::Resource(format!("opening segment '{id}': {e}")))?;
        shmem.set_owner(false);
        Ok(Self { shmem })
    }

    /// Writes `bytes` at the start of the segment. Errors if `bytes` would
    /// not fit in the segment's capacity.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), WrkError> {
        if bytes.len() > self.shmem.len() {
            return Err(WrkError::Resource(format!("segment is {} bytes, cannot hold {} bytes", self.shmem.len(), bytes.len())));
        }
        // SAFETY: this handle is the sole writer (the creating task process)
        // and no reader observes the segment until its length is published
        // to the dataset length registry, which happens after this write.
        unsafe { self.shmem.as_slice_mut()[..bytes.len()].copy_from_slice(bytes) };
        Ok(())
    }

    /// Reads exactly `len` bytes, the registry-authoritative length, never
    /// the segment's (possibly padded) capacity.
    pub fn read(&self, len: usize) -> Result<Vec<u8>, WrkError> {
        if len > self.shmem.len() {
            return Err(WrkError::Resource(format!("registry length {len} exceeds segment capacity {}", self.shmem.len())));
        }
        // SAFETY: read-only view of a segment whose writer has already
        // finished (the length was only published to the registry after the
        // write completed).
        Ok(unsafe { self.shmem.as_slice()[..len].to_vec() })
    }
}

/// Unlinks a segment by id. Only the worker main process calls this, on job
/// teardown or explicit purge; creators and consumers must never unlink.
pub fn unlink(id: &str) -> Result<(), WrkError> {
    let mut shmem = ShmemConf::new().os_id(id).open().map_err(|e| WrkError::Resource(format!("opening segment '{id}' to unlink: {e}")))?;
    shmem.set_owner(true);
    drop(shmem);
    Ok(())
}
