//! Liveness check.

use std::convert::Infallible;

use warp::Reply;


/***** LIBRARY *****/
/// `GET|HEAD /status`.
pub async fn get() -> Result<impl Reply, Infallible> { Ok("ok") }
