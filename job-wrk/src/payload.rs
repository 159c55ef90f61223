//! The data a task child process needs, written to a scratch file by the
//! supervisor and read back by the child on start-up, and what the child
//! reports back once it is done.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use specifications::dataset::DatasetId;
use specifications::job::JobId;
use specifications::task::Task;


/***** LIBRARY *****/
/// Handed to a task child on the command line (as a path to this,
/// serialized as JSON). The child inherits no other state from its parent.
#[derive(Serialize, Deserialize)]
pub struct TaskPayload {
    pub job_id: JobId,
    pub task: Task,
    /// The byte length of every dataset this task may need to read, as
    /// known to the worker main process at spawn time. Stands in for a
    /// true cross-process registry handle: children are separate OS
    /// processes, so the length each one needs is threaded through here
    /// rather than shared live memory.
    pub known_lengths: HashMap<DatasetId, usize>,
    pub install_bin: Option<String>,
}

/// Printed by a successful child to its last line of stdout; read back by
/// the supervisor to learn what (if anything) the task produced.
#[derive(Serialize, Deserialize)]
pub struct TaskResult {
    pub output: Option<(DatasetId, usize)>,
}
