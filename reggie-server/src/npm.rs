//! # npm Registry Protocol
//!
//! Enough of the CouchDB-style npm registry API for `npm install` and
//! `npm publish` against Reggie:
//!
//! - `GET /{name}`: package document
//! - `GET /{name}/{version}`: version document, `version` may be a range or `latest`
//! - `GET /{name}/-/{filename}`: tarball download
//! - `GET /-/all`, `GET /-/all/since`: summary of every hosted package
//! - `PUT /{name}`: merge descriptive metadata
//! - `PUT /{name}/-/{filename}/-rev/{rev}`: publish a tarball
//! - `PUT /{name}/{version}/-tag/{tag}`: accepted and ignored
//!
//! Documents are built from the store's records. Tarball URLs always point
//! back at this registry (`<registry_url><name>/-/<file>`). Names unknown here
//! are looked up on the upstream registry when that is enabled.

use crate::api::tarball_response;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, NpmAck};
use axum::{
    body::Bytes,
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Response,
    Json,
};
use reggie_store::{PackageRecord, StoreError, VersionRecord};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

const OCTET_STREAM: &str = "application/octet-stream";

/// Download URL of a stored tarball.
pub fn tarball_url(registry_url: &str, name: &str, file_name: &str) -> String {
    format!("{registry_url}{name}/-/{file_name}")
}

/// The manifest of one version, with `_id` and `dist` filled in.
pub fn version_document(name: &str, record: &VersionRecord, registry_url: &str) -> Value {
    let mut document = record.data.clone();
    if let Some(object) = document.as_object_mut() {
        object
            .entry("_id")
            .or_insert_with(|| json!(format!("{name}@{}", record.version)));

        let dist = object.entry("dist").or_insert_with(|| json!({}));
        if !dist.is_object() {
            *dist = json!({});
        }
        if let Some(dist) = dist.as_object_mut() {
            dist.insert(
                "tarball".to_string(),
                json!(tarball_url(registry_url, name, &record.file_name())),
            );
            dist.insert("shasum".to_string(), json!(record.shasum));
        }
    }
    document
}

/// Full package document served on `GET /{name}`.
pub fn package_document(record: &PackageRecord, registry_url: &str) -> Value {
    let mut versions = Map::new();
    let mut times = Map::new();
    for version in record.version_list() {
        if let Some(version_record) = record.versions.get(&version) {
            versions.insert(
                version.clone(),
                version_document(&record.name, version_record, registry_url),
            );
            times.insert(version, json!(version_record.time));
        }
    }

    json!({
        "_id": record.name,
        "_rev": "1-0",
        "name": record.name,
        "description": record.description,
        "dist-tags": { "latest": record.latest() },
        "versions": versions,
        "maintainers": [],
        "author": record.author,
        "repository": record.repository,
        "time": times,
    })
}

/// Short summary of one package for the `/-/all` listing.
pub fn package_summary(record: &PackageRecord) -> Value {
    let latest = record.latest();
    let versions: Map<String, Value> = record
        .version_list()
        .into_iter()
        .map(|version| (version, json!("latest")))
        .collect();
    let modified = latest
        .as_ref()
        .and_then(|version| record.versions.get(version))
        .map(|version| json!(version.time))
        .unwrap_or(Value::Null);

    json!({
        "_id": record.name,
        "name": record.name,
        "description": record.description,
        "dist-tags": { "latest": latest },
        "versions": versions,
        "maintainers": [],
        "author": record.author,
        "repository": record.repository,
        "time": { "modified": modified },
    })
}

pub async fn package_metadata(
    AxumPath(name): AxumPath<String>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Value>> {
    debug!(package = %name, "Incoming npm metadata request");
    if let Some(record) = state.store.get_record(&name) {
        return Ok(Json(package_document(&record, &state.registry_url)));
    }

    debug!(package = %name, "Not hosted locally, checking upstream");
    state
        .upstream_client
        .fetch_npm_document(&[&name])
        .await?
        .map(Json)
        .ok_or_else(ApiError::document_not_found)
}

pub async fn version_metadata(
    AxumPath((name, version)): AxumPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<Value>> {
    let Some(record) = state.store.get_record(&name) else {
        debug!(package = %name, version = %version, "Not hosted locally, checking upstream");
        return state
            .upstream_client
            .fetch_npm_document(&[&name, &version])
            .await?
            .map(Json)
            .ok_or_else(ApiError::document_not_found);
    };

    // npm clients expect a missing document, not a range error, on this route.
    let resolved = match state.store.resolve_range(&name, &version) {
        Ok(Some(resolved)) => resolved,
        Ok(None) | Err(StoreError::BadRange(_)) => return Err(ApiError::document_not_found()),
        Err(e) => return Err(e.into()),
    };
    let version_record = record
        .versions
        .get(&resolved)
        .ok_or_else(ApiError::document_not_found)?;
    let document = version_document(&name, version_record, &state.registry_url);
    Ok(Json(document))
}

pub async fn download_tarball(
    AxumPath((name, filename)): AxumPath<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> ApiResult<Response> {
    debug!(package = %name, filename = %filename, "Incoming npm tarball download");
    let stream = state
        .store
        .open_file(&filename)
        .await?
        .ok_or_else(ApiError::document_not_found)?;
    Ok(tarball_response(stream, OCTET_STREAM))
}

pub async fn list_all(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut result = Map::new();
    result.insert("_updated".to_string(), json!(0));
    for record in state.store.list_records() {
        result.insert(record.name.clone(), package_summary(&record));
    }
    Json(Value::Object(result))
}

/// Merge descriptive metadata sent by `npm publish`.
///
/// Older clients send this document before the tarball, when the package does
/// not exist yet; that case is acknowledged without storing anything.
pub async fn update_metadata(
    AxumPath(name): AxumPath<String>,
    State(state): State<Arc<AppState>>,
    Json(document): Json<Value>,
) -> ApiResult<Json<NpmAck>> {
    match state.store.merge_metadata(&name, &document).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            debug!(package = %name, "Metadata for a package with no versions ignored");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(Json(NpmAck::ok()))
}

pub async fn publish_tarball(
    AxumPath((name, filename, rev)): AxumPath<(String, String, String)>,
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<NpmAck>)> {
    debug!(package = %name, filename = %filename, rev = %rev, size = body.len(), "Incoming npm publish");
    let staged = state.store.stage_upload(&body, &filename, None).await?;
    let record = state.store.ingest(&staged, None, None).await?;
    info!(package = %name, version = %record.version, "Package published");
    Ok((StatusCode::CREATED, Json(NpmAck::revision("-"))))
}

pub async fn tag_version(
    AxumPath((name, version, tag)): AxumPath<(String, String, String)>,
) -> (StatusCode, Json<NpmAck>) {
    debug!(package = %name, version = %version, tag = %tag, "Dist-tag request accepted");
    (StatusCode::CREATED, Json(NpmAck::revision(tag)))
}
