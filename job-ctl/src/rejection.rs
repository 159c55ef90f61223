//! Translates a warp `Rejection` into the status codes and bodies this
//! service's external interface promises: 400 with a newline-joined list
//! of validation errors, 404 for unknown jobs/workers, 500 otherwise.

use std::convert::Infallible;

use log::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::errors::CtlError;


/***** LIBRARY *****/
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(err) = err.find::<CtlError>() {
        match err {
            CtlError::Validation(errs) => (StatusCode::BAD_REQUEST, errs.join("\n")),
            CtlError::UnknownJob(_) | CtlError::UnknownWorker(_) => (StatusCode::NOT_FOUND, err.to_string()),
            CtlError::MalformedRegistration(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            CtlError::NoWorkers | CtlError::Scheduling(_) | CtlError::Transport(_) | CtlError::InvalidTransition(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        }
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "malformed request body".to_string())
    } else {
        error!("unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
    };

    Ok(warp::reply::with_status(message, code))
}
