//! Errors that occur in the controller service.

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FResult};

use specifications::job::JobId;
use specifications::worker::WorkerId;


/***** LIBRARY *****/
#[derive(Debug)]
pub enum CtlError {
    /// DAG/template validation failed; carries every defect found.
    Validation(Vec<String>),
    /// A job id was not found in the job registry.
    UnknownJob(JobId),
    /// A worker id was not found in the worker registry.
    UnknownWorker(WorkerId),
    /// A worker registration's `url_base64` was malformed.
    MalformedRegistration(String),
    /// No workers are registered to assign a job to.
    NoWorkers,
    /// Scheduling the job's DAG onto the known hosts failed.
    Scheduling(String),
    /// The worker rejected (or could not be reached for) a submission.
    Transport(String),
    /// A status update did not advance the job's lifecycle.
    InvalidTransition(String),
}

impl Display for CtlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        use CtlError::*;
        match self {
            Validation(errs) => write!(f, "{}", errs.join("\n")),
            UnknownJob(id) => write!(f, "no such job '{id}'"),
            UnknownWorker(id) => write!(f, "no such worker '{id}'"),
            MalformedRegistration(reason) => write!(f, "malformed worker registration: {reason}"),
            NoWorkers => write!(f, "no workers registered"),
            Scheduling(reason) => write!(f, "failed to schedule job: {reason}"),
            Transport(reason) => write!(f, "failed to reach worker: {reason}"),
            InvalidTransition(reason) => write!(f, "{reason}"),
        }
    }
}

impl Error for CtlError {}

impl warp::reject::Reject for CtlError {}
