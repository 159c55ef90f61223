//! (Public) interfaces and structs for the `job-wrk` crate.

use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;

use crate::db::Db;
use crate::registry::DatasetLengths;


/***** LIBRARY *****/
/// The context shared between all of the worker's warp paths.
#[derive(Clone)]
pub struct Context {
    pub db: Arc<Db>,
    pub dataset_lengths: Arc<DatasetLengths>,
    pub controller_url: String,
    pub worker_id: String,
    pub http: Client,
    /// The worker binary's own path, re-invoked for each task child.
    pub self_exe: PathBuf,
    /// Overrides the package-install binary task environments are
    /// installed with; `None` defaults to `pip`.
    pub install_bin: Option<String>,
}
