//! Reggie's own package API.
//!
//! | Route                                          | Action                          |
//! |------------------------------------------------|---------------------------------|
//! | `PUT /package/{name}/{version}`                | upload a tarball                |
//! | `DELETE /package/{name}/{version}`             | delete a version                |
//! | `GET /package/{name}/{range}`                  | download the best match         |
//! | `GET /package/{name}/{op}/{v}`                 | download with one comparator    |
//! | `GET /package/{name}/{op1}/{v1}/{op2}/{v2}`    | download with two comparators   |
//! | `GET /versions/{name}`                         | list versions                   |
//! | `GET /index`                                   | list package names              |
//! | `GET /info/{name}`                             | full package record             |
//!
//! `op` is one of `gt`, `lt`, `gte`, `lte`.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use reggie_store::version::range_from_ops;
use reggie_store::{PackageRecord, PackageStream};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Content type of tarballs served by range
pub const TARBALL_CONTENT_TYPE: &str = "application/x-compressed";

pub async fn index_handler() -> &'static str {
    "Reggie says hi"
}

pub async fn upload_package(
    AxumPath((name, version)): AxumPath<(String, String)>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    debug!(package = %name, version = %version, size = body.len(), "Incoming package upload");
    let staged = state
        .store
        .stage_upload(&body, &name, Some(version.as_str()))
        .await?;
    state
        .store
        .ingest(&staged, Some(name.as_str()), Some(version.as_str()))
        .await?;
    info!(package = %name, version = %version, "Package uploaded");
    Ok(StatusCode::OK)
}

pub async fn delete_package(
    AxumPath((name, version)): AxumPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<StatusCode> {
    state.store.delete_version(&name, &version).await?;
    Ok(StatusCode::OK)
}

pub async fn list_versions(
    AxumPath(name): AxumPath<String>,
    State(state): State<Arc<AppState>>,
) -> Json<Vec<String>> {
    Json(state.store.list_versions(&name))
}

pub async fn list_index(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.store.list_names())
}

pub async fn package_info(
    AxumPath(name): AxumPath<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<PackageRecord>> {
    state
        .store
        .get_record(&name)
        .map(|record| Json(PackageRecord::clone(&record)))
        .ok_or_else(|| ApiError::NotFound(format!("package '{name}' not found")))
}

pub async fn download_by_range(
    AxumPath((name, range)): AxumPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    send_by_range(&state, &name, &range).await
}

pub async fn download_by_op(
    AxumPath((name, op, version)): AxumPath<(String, String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    let range = range_from_ops(&[(op.as_str(), version.as_str())])?;
    send_by_range(&state, &name, &range.to_string()).await
}

pub async fn download_by_ops(
    AxumPath((name, op1, v1, op2, v2)): AxumPath<(String, String, String, String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    let range = range_from_ops(&[(op1.as_str(), v1.as_str()), (op2.as_str(), v2.as_str())])?;
    send_by_range(&state, &name, &range.to_string()).await
}

async fn send_by_range(state: &AppState, name: &str, range: &str) -> ApiResult<Response> {
    let version = state.store.resolve_range(name, range)?.ok_or_else(|| {
        ApiError::NotFound(format!("no version of '{name}' satisfies '{range}'"))
    })?;
    debug!(package = %name, range = %range, version = %version, "Serving resolved version");

    let stream = state
        .store
        .open_stream(name, &version)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("tarball for {name}@{version} is missing")))?;
    Ok(tarball_response(stream, TARBALL_CONTENT_TYPE))
}

/// Stream a stored tarball. Headers are committed before the body, so a read
/// error after this point can only cut the transfer short.
pub fn tarball_response(stream: PackageStream, content_type: &str) -> Response {
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("filename={}", stream.file_name()),
        ),
        (header::CONTENT_LENGTH, stream.len().to_string()),
    ];
    let body = Body::from_stream(ReaderStream::new(stream));
    (headers, body).into_response()
}
