//! (Public) interfaces and structs for the `job-ctl` crate.

use std::sync::Arc;
use std::time::Duration;

use crate::comm::WorkerComm;
use crate::db::Db;


/***** LIBRARY *****/
/// The context shared between all of the controller's warp paths.
#[derive(Clone)]
pub struct Context {
    pub db: Arc<Db>,
    pub worker_comm: Arc<WorkerComm>,
    /// How long a worker may go un-heartbeated before it is due another
    /// liveness check.
    pub heartbeat_grace: Duration,
}
