//! Entrypoint to the `job-ctl` service.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use dotenvy::dotenv;
use log::{debug, error, info, LevelFilter};
use warp::Filter;

use job_ctl::comm::WorkerComm;
use job_ctl::db::Db;
use job_ctl::spec::Context;
use job_ctl::{jobs, rejection, status, workers};


/***** ARGUMENTS *****/
#[derive(Parser)]
struct Args {
    #[clap(long, action, help = "Provides additional debug prints on the logger.", env = "DEBUG")]
    debug: bool,

    #[clap(short, long, default_value = "0.0.0.0:50051", help = "The address on which to serve the controller API.", env = "CTL_ADDRESS")]
    address: String,

    #[clap(long, default_value_t = 30, help = "Seconds a worker may go un-heartbeated before it is checked again.", env = "CTL_HEARTBEAT_GRACE_SECS")]
    heartbeat_grace_secs: u64,
}


/***** ENTRYPOINT *****/
#[tokio::main]
async fn main() {
    dotenv().ok();
    let args = Args::parse();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);
    if args.debug { logger.filter_level(LevelFilter::Debug).init() } else { logger.filter_level(LevelFilter::Info).init() }
    info!("Initializing job-ctl v{}...", env!("CARGO_PKG_VERSION"));

    let address: std::net::SocketAddr = match args.address.parse() {
        Ok(address) => address,
        Err(err) => {
            error!("Invalid address '{}': {err}", args.address);
            std::process::exit(1);
        }
    };

    let context = Context {
        db: Arc::new(Db::new()),
        worker_comm: Arc::new(WorkerComm::new()),
        heartbeat_grace: Duration::from_secs(args.heartbeat_grace_secs),
    };

    tokio::spawn(heartbeat_loop(context.clone()));

    let context = warp::any().map(move || context.clone());

    let submit = warp::put()
        .and(warp::path("jobs"))
        .and(warp::path("submit"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(context.clone())
        .and_then(jobs::submit);
    let schedulable_submit = warp::put()
        .and(warp::path("jobs"))
        .and(warp::path("schedulable_submit"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(context.clone())
        .and_then(jobs::schedulable_submit);
    let job_status = warp::get()
        .and(warp::path("jobs"))
        .and(warp::path("status"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(context.clone())
        .and_then(jobs::status);
    let job_update = warp::post()
        .and(warp::path("jobs"))
        .and(warp::path("update"))
        .and(warp::path::param())
        .and(warp::path::end())
        .and(warp::body::json())
        .and(context.clone())
        .and_then(jobs::update);
    let register_worker = warp::put()
        .and(warp::path("workers"))
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(context.clone())
        .and_then(workers::register);
    // No method filter: a liveness probe answers on GET or HEAD alike.
    let health = warp::path("status").and(warp::path::end()).and_then(status::get);

    let filter = submit
        .or(schedulable_submit)
        .or(job_status)
        .or(job_update)
        .or(register_worker)
        .or(health)
        .recover(rejection::handle_rejection);

    debug!("Serving on {address}...");
    warp::serve(filter).run(address).await;
}

/// Periodically re-checks every known worker's liveness. Workers that have
/// not been heard from (via registration, status update, or a passing
/// heartbeat here) within `heartbeat_grace` are due another check this
/// round; workers that fail it simply stay stale until they recover or a
/// job submission to them fails outright.
async fn heartbeat_loop(ctx: Context) {
    let mut interval = tokio::time::interval(ctx.heartbeat_grace);
    loop {
        interval.tick().await;
        let now = chrono::Utc::now();
        for (worker_id, worker) in ctx.db.workers_snapshot() {
            let due = now.signed_duration_since(worker.last_seen).num_seconds() as u64 >= ctx.heartbeat_grace.as_secs();
            if !due { continue; }

            if ctx.worker_comm.call_heartbeat(&worker.url).await {
                ctx.db.worker_heartbeat(&worker_id, now);
            }
        }
    }
}
