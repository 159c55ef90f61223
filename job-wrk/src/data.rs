//! The streaming result endpoint.

use log::{debug, error};
use warp::http::StatusCode;
use warp::hyper::body::{Bytes, Sender};
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Rejection, Reply};

use crate::errors::WrkError;
use crate::shmem::Segment;
use crate::spec::Context;

/// Chunk size for the streamed reply body. Small datasets live entirely in
/// a shared-memory segment already, so there's no reason to match the
/// larger buffer sizes a whole-file download endpoint would use.
const CHUNK_SIZE: usize = 1024;

/// `GET /data/{dataset-id}`. `dataset_id` is the segment's physical digest
/// id, exactly as published in a finished job's `result` URL.
pub async fn get(dataset_id: String, ctx: Context) -> Result<impl Reply, Rejection> {
    let len = ctx.dataset_lengths.len_of(&dataset_id).ok_or_else(|| warp::reject::custom(WrkError::UnknownDataset(dataset_id.clone())))?;

    let segment = Segment::open(&dataset_id).map_err(warp::reject::custom)?;
    let bytes = segment.read(len).map_err(warp::reject::custom)?;

    debug!("streaming {} bytes for dataset '{dataset_id}'", bytes.len());
    let (mut sender, body): (Sender, Body) = Body::channel();

    tokio::spawn(async move {
        for chunk in bytes.chunks(CHUNK_SIZE) {
            if let Err(err) = sender.send_data(Bytes::copy_from_slice(chunk)).await {
                error!("failed to send chunk for dataset '{dataset_id}': {err}");
                break;
            }
        }
    });

    Ok(warp::reply::with_status(Response::new(body), StatusCode::OK))
}
