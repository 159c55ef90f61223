//! Route handler for worker registration.

use chrono::Utc;
use log::info;
use specifications::worker::WorkerRegistration;
use warp::{Rejection, Reply};

use crate::spec::Context;


/***** LIBRARY *****/
/// `PUT /workers/register`.
pub async fn register(reg: WorkerRegistration, ctx: Context) -> Result<impl Reply, Rejection> {
    let worker_id = ctx.db.worker_register(&reg).map_err(warp::reject::custom)?;
    ctx.db.worker_heartbeat(&worker_id, Utc::now());
    info!("registered worker {worker_id}");
    Ok(warp::reply::json(&worker_id))
}
