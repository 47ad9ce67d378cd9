//! Program download endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;
use buzza_core::program::{ProgramFile, ProgramKey};

/// Query parameters for resolving a download.
#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub os: Option<String>,
    pub arch: Option<String>,
    /// Defaults to `stable`.
    pub branch: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Files of the current release for a type/os/arch/branch.
/// GET /download
/// GET /download/:file_type
pub async fn download(
    State(state): State<AppState>,
    file_type: Option<Path<String>>,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<Json<Vec<ProgramFile>>> {
    let file_type = file_type.map(|Path(t)| t);
    let key = ProgramKey::with_defaults(
        file_type.as_deref().filter(|t| !t.is_empty()),
        query.os.as_deref().unwrap_or_default(),
        query.arch.as_deref().unwrap_or_default(),
        non_empty(&query.branch),
    )?;

    let files = state
        .query_programs("latest program files", move |store| store.latest_files(&key))
        .await?;

    Ok(Json(files))
}
