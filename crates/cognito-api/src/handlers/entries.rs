//! Journal entry HTTP handlers.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use cognito_core::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX};
use cognito_core::timestamp::parse_date;
use cognito_core::{
    CreateEntryRequest, Entry, EntryOrder, EntryRepository, EntryStatus, ListEntriesRequest,
    UpdateEntryRequest,
};

use crate::auth::CurrentUser;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState};

/// Query parameters for `GET /api/entries`.
#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    pub status: Option<String>,
    pub after_date: Option<String>,
    pub before_date: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub order_by: Option<String>,
}

impl ListEntriesQuery {
    /// Validate into a repository request.
    pub fn into_request(self) -> Result<ListEntriesRequest, ApiError> {
        let limit = self.limit.unwrap_or(PAGE_LIMIT);
        if !(1..=PAGE_LIMIT_MAX).contains(&limit) {
            return Err(ApiError::BadRequest(format!(
                "limit must be between 1 and {}",
                PAGE_LIMIT_MAX
            )));
        }
        let offset = self.offset.unwrap_or(0);
        if offset < 0 {
            return Err(ApiError::BadRequest("offset must be >= 0".to_string()));
        }

        let status = self
            .status
            .map(|s| s.parse::<EntryStatus>())
            .transpose()
            .map_err(ApiError::BadRequest)?;
        for date in [&self.after_date, &self.before_date].into_iter().flatten() {
            parse_date(date)?;
        }
        let order = match self.order_by {
            Some(raw) => raw.parse::<EntryOrder>().map_err(ApiError::BadRequest)?,
            None => EntryOrder::default(),
        };

        Ok(ListEntriesRequest {
            status,
            after_date: self.after_date,
            before_date: self.before_date,
            limit,
            offset,
            order,
        })
    }
}

/// List the user's entries.
///
/// GET /api/entries
///
/// # Returns
/// - 200 OK `{entries, total}`; `total` ignores paging
/// - 400 Bad Request for invalid filters
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiQuery(query): ApiQuery<ListEntriesQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let req = query.into_request()?;
    let (entries, total) = state.db.entries.list(user.id, &req).await?;
    Ok(Json(json!({ "entries": entries, "total": total })))
}

/// Get one entry; counts as an interaction.
///
/// GET /api/entries/:id
pub async fn get_entry(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Entry>, ApiError> {
    let entry = state
        .db
        .entries
        .record_interaction(user.id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))?;
    Ok(Json(entry))
}

/// Create the entry for a date.
///
/// POST /api/entries
///
/// # Returns
/// - 201 Created with the new entry
/// - 200 OK with the existing entry when one already exists for the date
pub async fn create_entry(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiJson(req): ApiJson<CreateEntryRequest>,
) -> Result<(StatusCode, Json<Entry>), ApiError> {
    parse_date(&req.date)?;

    if let Some(existing) = state.db.entries.fetch_by_date(user.id, &req.date).await? {
        return Ok((StatusCode::OK, Json(existing)));
    }

    let entry = state.db.entries.insert(user.id, None, req).await?;
    info!(subsystem = "api", entry_id = %entry.id, date = %entry.date, "Entry created");
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Partially update an entry; snapshots the previous refined output.
///
/// PUT /api/entries/:id
pub async fn update_entry(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(req): ApiJson<UpdateEntryRequest>,
) -> Result<Json<Entry>, ApiError> {
    let entry = state
        .db
        .entries
        .update(user.id, id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Entry not found".to_string()))?;
    Ok(Json(entry))
}

/// Version history, newest first.
///
/// GET /api/entries/:id/versions
pub async fn list_entry_versions(
    State(state): State<AppState>,
    CurrentUser { user, .. }: CurrentUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.db.entries.fetch(user.id, id).await?.is_none() {
        return Err(ApiError::NotFound("Entry not found".to_string()));
    }
    let versions = state.db.entries.list_versions(user.id, id).await?;
    Ok(Json(json!({ "versions": versions })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cognito_core::EntryOrderField;

    #[test]
    fn test_query_defaults() {
        let req = ListEntriesQuery::default().into_request().unwrap();
        assert_eq!(req, ListEntriesRequest::default());
    }

    #[test]
    fn test_query_parses_filters() {
        let req = ListEntriesQuery {
            status: Some("archived".into()),
            after_date: Some("2024-12-01".into()),
            limit: Some(10),
            offset: Some(20),
            order_by: Some("relevance_score:asc".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap();

        assert_eq!(req.status, Some(EntryStatus::Archived));
        assert_eq!(req.limit, 10);
        assert_eq!(req.offset, 20);
        assert_eq!(req.order.field, EntryOrderField::RelevanceScore);
        assert!(!req.order.descending);
    }

    #[test]
    fn test_query_rejects_invalid_values() {
        let cases = [
            ListEntriesQuery { limit: Some(0), ..Default::default() },
            ListEntriesQuery { limit: Some(101), ..Default::default() },
            ListEntriesQuery { offset: Some(-1), ..Default::default() },
            ListEntriesQuery { status: Some("deleted".into()), ..Default::default() },
            ListEntriesQuery { before_date: Some("12/30/2024".into()), ..Default::default() },
            ListEntriesQuery { order_by: Some("date; DROP TABLE entries".into()), ..Default::default() },
        ];
        for query in cases {
            assert!(matches!(query.into_request(), Err(ApiError::BadRequest(_))));
        }
    }
}
