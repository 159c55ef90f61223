use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};


/***** LIBRARY *****/
#[derive(Debug)]
pub enum SchedError {
    /// A task's dataset input is not produced by any task that precedes it
    /// in the DAG's declared order.
    OutOfOrder { task: String, dataset: String },
    /// No hosts were given to place a job's tasks onto.
    NoHosts,
    /// A task named a host id that isn't among the given hosts.
    UnknownHost { task: String, host: String },
    /// No host (in a deterministic, name-stable first-fit search) has
    /// enough remaining capacity left for a task.
    CapacityExceeded { task: String, needed_mb: u64 },
}

impl Display for SchedError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use SchedError::*;
        match self {
            OutOfOrder { task, dataset } => write!(f, "task '{task}' depends on dataset '{dataset}', which is not produced by any earlier task"),
            NoHosts => write!(f, "no hosts available to schedule onto"),
            UnknownHost { task, host } => write!(f, "task '{task}' was pinned to unknown host '{host}'"),
            CapacityExceeded { task, needed_mb } => write!(f, "no host had {needed_mb}MB of remaining capacity for task '{task}'"),
        }
    }
}

impl Error for SchedError {}
