//! Errors that occur in the worker service.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use specifications::job::JobId;


/***** LIBRARY *****/
#[derive(Debug)]
pub enum WrkError {
    /// A job id submitted to a route that expects a known one.
    UnknownJob(JobId),
    /// A dataset was requested by id (logical name or physical segment id)
    /// but has no registered length.
    UnknownDataset(String),
    /// A shared-memory segment could not be created, opened, or unlinked.
    Resource(String),
    /// A task's child process exited non-zero or could not be started.
    Task(String),
    /// A status update could not be delivered to the controller.
    Transport(String),
}

impl Display for WrkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use WrkError::*;
        match self {
            UnknownJob(id) => write!(f, "no such job '{id}'"),
            UnknownDataset(id) => write!(f, "no such dataset '{id}'"),
            Resource(reason) => write!(f, "resource error: {reason}"),
            Task(reason) => write!(f, "task error: {reason}"),
            Transport(reason) => write!(f, "failed to reach controller: {reason}"),
        }
    }
}

impl Error for WrkError {}

impl warp::reject::Reject for WrkError {}
