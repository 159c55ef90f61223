//! Translates a warp `Rejection` into this service's external status codes
//! and bodies, matching the controller's own `rejection` module.

use std::convert::Infallible;

use log::error;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

use crate::errors::WrkError;

/***** LIBRARY *****/
pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found".to_string())
    } else if let Some(err) = err.find::<WrkError>() {
        match err {
            WrkError::UnknownJob(_) | WrkError::UnknownDataset(_) => (StatusCode::NOT_FOUND, err.to_string()),
            WrkError::Resource(_) | WrkError::Task(_) | WrkError::Transport(_) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    } else if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        (StatusCode::BAD_REQUEST, "malformed request body".to_string())
    } else {
        error!("unhandled rejection: {err:?}");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string())
    };

    Ok(warp::reply::with_status(message, code))
}
