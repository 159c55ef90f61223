//! Liveness check.

use std::convert::Infallible;

use warp::Reply;

/***** LIBRARY *****/
/// `GET /status`. Carries no method filter, matching the controller's own
/// liveness route.
pub async fn get() -> Result<impl Reply, Infallible> { Ok("ok") }
