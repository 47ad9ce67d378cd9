//! Activity log endpoint.

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use buzza_core::activity::{ActivityCursor, ActivityData, ActivityEntry, MAX_ACTIVITY_PAGE};

/// Entries served per page. Not client controlled.
pub const ACTIVITY_PAGE_LIMIT: usize = MAX_ACTIVITY_PAGE;

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    /// Only entries older than this id.
    pub before: Option<String>,
}

/// Wire shape of an activity entry.
#[derive(Debug, Serialize)]
pub struct ActivityLog {
    pub id: i64,
    /// Unix seconds.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ActivityData>,
}

impl From<ActivityEntry> for ActivityLog {
    fn from(entry: ActivityEntry) -> Self {
        Self {
            id: entry.id,
            created_at: entry.created_at.timestamp(),
            name: entry.name,
            data: entry.data,
        }
    }
}

/// Newest activity of the authenticated user.
/// GET /activities?before=<id>
pub async fn list_activities(
    State(state): State<AppState>,
    user: Option<Extension<AuthenticatedUser>>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    let Some(Extension(user)) = user else {
        return Err(ApiError::unauthorized("authentication required"));
    };

    let cursor = ActivityCursor::parse(query.before.as_deref().unwrap_or_default())?;

    let logs = state
        .query_activities("get logs by user id", move |store| {
            store.by_user_id(user.id, cursor, ACTIVITY_PAGE_LIMIT)
        })
        .await?;

    Ok(Json(logs.into_iter().map(Into::into).collect()))
}
