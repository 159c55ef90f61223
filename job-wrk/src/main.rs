//! Entrypoint to the `job-wrk` service.
//!
//! This binary has two faces. Run normally, it serves the worker's HTTP API.
//! Run with `--run-task <payload-path>`, it instead re-execs itself as a
//! single task's child process (see [`job_wrk::child::run_as_child`]) and
//! exits — this is how the worker spawns task isolation without a separate
//! helper binary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use job_shr::net::ensure_http_schema;
use job_shr::retry::with_retry;
use log::{debug, error, info, LevelFilter};
use specifications::worker::WorkerRegistration;
use warp::Filter;

use job_wrk::child;
use job_wrk::db::Db;
use job_wrk::registry::DatasetLengths;
use job_wrk::spec::Context;
use job_wrk::{data, jobs, rejection, status};

/***** ARGUMENTS *****/
#[derive(Parser)]
struct Args {
    #[clap(long, action, help = "Provides additional debug prints on the logger.", env = "DEBUG")]
    debug: bool,

    #[clap(short, long, default_value = "0.0.0.0:50052", help = "The address on which to serve the worker API.", env = "WRK_ADDRESS")]
    address: String,

    #[clap(long, help = "The externally-reachable URL this worker registers itself under, e.g. 'http://10.0.0.5:50052'.", env = "WRK_EXTERNAL_URL")]
    external_url: String,

    #[clap(long, help = "The controller's base URL, e.g. 'http://10.0.0.1:50051'.", env = "CTL_URL")]
    controller_url: String,

    #[clap(long, default_value_t = 4096, help = "Memory (in MB) this worker advertises to the controller.", env = "WRK_MEMORY_MB")]
    memory_mb: u64,

    #[clap(long, help = "Overrides the package-install binary used to set up a task's environment; defaults to 'pip'.", env = "WRK_INSTALL_BIN")]
    install_bin: Option<String>,

    #[clap(long, value_name = "PAYLOAD_PATH", help = "Internal: re-execs this binary as a single task's child process instead of serving the API.")]
    run_task: Option<PathBuf>,
}

/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    dotenv().ok();
    let mut args = Args::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if args.debug { logger.filter_level(LevelFilter::Debug).init() } else { logger.filter_level(LevelFilter::Info).init() }

    if let Some(payload_path) = &args.run_task {
        let code = child::run_as_child(payload_path).await;
        std::process::exit(code);
    }

    info!("Initializing job-wrk v{}...", env!("CARGO_PKG_VERSION"));

    let address: std::net::SocketAddr = match args.address.parse() {
        Ok(address) => address,
        Err(err) => {
            error!("Invalid address '{}': {err}", args.address);
            std::process::exit(1);
        }
    };

    args.external_url = match ensure_http_schema(args.external_url.clone(), false) {
        Ok(url) => url,
        Err(err) => {
            error!("Invalid external URL '{}': {err}", args.external_url);
            std::process::exit(1);
        }
    };
    args.controller_url = match ensure_http_schema(args.controller_url.clone(), false) {
        Ok(url) => url,
        Err(err) => {
            error!("Invalid controller URL '{}': {err}", args.controller_url);
            std::process::exit(1);
        }
    };

    let self_exe = match std::env::current_exe() {
        Ok(path) => path,
        Err(err) => {
            error!("Could not determine own executable path: {err}");
            std::process::exit(1);
        }
    };

    let http = reqwest::Client::new();
    let worker_id = match register_with_controller(&http, &args).await {
        Ok(id) => id,
        Err(err) => {
            error!("Could not register with controller at '{}': {err}", args.controller_url);
            std::process::exit(1);
        }
    };
    info!("Registered with controller as worker {worker_id}");

    let context = Context {
        db: Arc::new(Db::new()),
        dataset_lengths: Arc::new(DatasetLengths::new()),
        controller_url: args.controller_url,
        worker_id,
        http,
        self_exe,
        install_bin: args.install_bin,
    };
    let context = warp::any().map(move || context.clone());

    let submit = warp::put()
        .and(warp::path("jobs"))
        .and(warp::path("submit"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::body::json())
        .and(context.clone())
        .and_then(jobs::submit);
    let data_route = warp::get()
        .and(warp::path("data"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(context.clone())
        .and_then(data::get);
    // No method filter, matching the controller's own liveness route.
    let health = warp::path("status").and(warp::path::end()).and_then(status::get);

    let filter = submit.or(data_route).or(health).recover(rejection::handle_rejection);

    debug!("Serving on {address}...");
    warp::serve(filter).run(address).await;
}

const REGISTER_ATTEMPTS: u32 = 5;
const REGISTER_BACKOFF: Duration = Duration::from_secs(2);

/// Registers this worker with the controller, retrying a bounded number of
/// times since the controller may not be up yet when the worker starts.
async fn register_with_controller(http: &reqwest::Client, args: &Args) -> Result<String, String> {
    let registration = WorkerRegistration::from_raw(&args.external_url, args.memory_mb);
    let url = format!("{}/workers/register", args.controller_url);

    with_retry(REGISTER_ATTEMPTS, REGISTER_BACKOFF, || async {
        let resp = http.put(&url).json(&registration).send().await.map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("controller responded with {}", resp.status()));
        }
        resp.json::<String>().await.map_err(|e| e.to_string())
    })
    .await
}
