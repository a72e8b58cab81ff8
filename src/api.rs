// 🌐 Tracker Catalog - HTTP API with Axum
//
// Read endpoints are open; the acting user is named by the X-Catalog-User
// header and resolved against the users table. Unknown names browse as
// anonymous and cannot act.

use crate::approval::{self, ReviewState};
use crate::collision;
use crate::db;
use crate::entities::{role_of, Role, TrackerExport, User};
use crate::error::CatalogError;
use crate::listing::{self, Page, TrackerFilter};
use crate::stats;
use crate::visibility::TrackerView;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

pub const USER_HEADER: &str = "x-catalog-user";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
}

impl AppState {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ApiError> {
        self.db
            .lock()
            .map_err(|_| ApiError::internal("database lock poisoned"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

pub struct ApiError {
    status: StatusCode,
    message: String,
    details: serde_json::Value,
}

impl ApiError {
    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
            details: serde_json::Value::Null,
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status =
            StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!(error = %err, "request failed");
        }

        let details = match &err {
            CatalogError::Validation(errors) => {
                serde_json::to_value(errors.fields()).unwrap_or_default()
            }
            _ => serde_json::Value::Null,
        };

        Self {
            status,
            message: err.to_string(),
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            data: self.details,
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn acting_user(conn: &Connection, headers: &HeaderMap) -> ApiResult<Option<User>> {
    let username = match headers.get(USER_HEADER).and_then(|v| v.to_str().ok()) {
        Some(name) if !name.is_empty() => name,
        _ => return Ok(None),
    };
    Ok(db::get_user_by_username(conn, username)?)
}

fn require_user(conn: &Connection, headers: &HeaderMap) -> ApiResult<User> {
    acting_user(conn, headers)?.ok_or_else(|| {
        CatalogError::PermissionDenied("a registered user is required".to_string()).into()
    })
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
pub struct TrackerDetail {
    pub tracker: TrackerView,
    pub progress: u32,
    pub missing_fields: Vec<&'static str>,
    pub review: ReviewState,
    pub approvers: Vec<String>,
    pub creator: Option<String>,
    pub code_signature_collisions: Vec<String>,
    pub network_signature_collisions: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/trackers?tracker_name=&only_collisions=&trackers_select=&approve_select=&page=
async fn list_trackers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ApiResponse<Page<TrackerView>>>> {
    let conn = state.conn()?;
    let role = role_of(acting_user(&conn, &headers)?.as_ref());

    let page = match params.get("page") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| CatalogError::NotFound(format!("page {}", raw)))?,
        None => 1,
    };

    let filter = TrackerFilter::from_params(&params);
    let found = listing::list_trackers(&conn, &filter, page)?;

    Ok(Json(ApiResponse::ok(Page {
        items: found
            .items
            .iter()
            .map(|t| TrackerView::for_role(t, role))
            .collect(),
        count: found.count,
        page: found.page,
        num_pages: found.num_pages,
    })))
}

/// GET /api/trackers/:id
async fn get_tracker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<TrackerDetail>>> {
    let conn = state.conn()?;
    let role = role_of(acting_user(&conn, &headers)?.as_ref());

    let tracker = db::get_tracker(&conn, &id)?;
    let all = db::get_all_trackers(&conn)?;
    let names = |trackers: Vec<crate::entities::Tracker>| -> Vec<String> {
        trackers.into_iter().map(|t| t.name).collect()
    };

    let detail = TrackerDetail {
        progress: tracker.progress(),
        missing_fields: tracker.missing_fields(),
        review: approval::classify(&conn, &tracker.id)?,
        approvers: approval::approver_names(&conn, &tracker.id)?,
        creator: db::tracker_creator(&conn, &tracker.id)?,
        code_signature_collisions: names(collision::trackers_with_code_signature_collision(
            &tracker, &all,
        )),
        network_signature_collisions: names(
            collision::trackers_with_network_signature_collision(&tracker, &all),
        ),
        tracker: TrackerView::for_role(&tracker, role),
    };

    Ok(Json(ApiResponse::ok(detail)))
}

/// GET /api/stats - registered users only; `{}` for an empty catalog
async fn get_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let conn = state.conn()?;
    require_user(&conn, &headers)?;
    Ok(Json(stats::stats_json(&conn)?))
}

/// GET /trackers/export
async fn export_trackers(State(state): State<AppState>) -> ApiResult<Response> {
    let conn = state.conn()?;
    let export = TrackerExport::from_trackers(&db::get_all_trackers(&conn)?);

    Ok((
        [(header::CONTENT_DISPOSITION, "attachment; filename=trackers.json")],
        Json(export),
    )
        .into_response())
}

/// POST /api/trackers/:id/approve
async fn approve_tracker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ReviewState>>)> {
    let conn = state.conn()?;
    let user = require_user(&conn, &headers)?;

    approval::record_approval(&conn, &id, &user)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(approval::classify(&conn, &id)?)),
    ))
}

/// POST /api/trackers/:id/revoke
async fn revoke_tracker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<ReviewState>>> {
    let conn = state.conn()?;
    let user = require_user(&conn, &headers)?;

    approval::revoke_approval(&conn, &id, &user)?;
    Ok(Json(ApiResponse::ok(approval::classify(&conn, &id)?)))
}

/// POST /api/trackers/:id/ship
async fn ship_tracker(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<TrackerView>>> {
    let conn = state.conn()?;
    let user = acting_user(&conn, &headers)?;

    approval::ship(&conn, &id, user.as_ref())?;
    let tracker = db::get_tracker(&conn, &id)?;
    Ok(Json(ApiResponse::ok(TrackerView::for_role(&tracker, Role::Superuser))))
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/trackers", get(list_trackers))
        .route("/trackers/:id", get(get_tracker))
        .route("/trackers/:id/approve", post(approve_tracker))
        .route("/trackers/:id/revoke", post(revoke_tracker))
        .route("/trackers/:id/ship", post(ship_tracker))
        .route("/stats", get(get_stats))
        .with_state(state.clone());

    Router::new()
        .route("/trackers/export", get(export_trackers))
        .with_state(state)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_tracker, insert_user, setup_database, SYSTEM_ACTOR};
    use crate::entities::Tracker;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn setup() -> (AppState, Tracker) {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();

        let mut tracker = Tracker::new("toto")
            .with_signatures("com.toto", "toto.com")
            .with_website("https://toto.com");
        tracker.comments = "internal".into();
        insert_tracker(&conn, &tracker, SYSTEM_ACTOR).unwrap();
        insert_tracker(
            &conn,
            &Tracker::new("toto ads").with_signatures("com.toto.ads", ""),
            SYSTEM_ACTOR,
        )
        .unwrap();

        insert_user(&conn, &User::new("reviewer1")).unwrap();
        insert_user(&conn, &User::new("reviewer2")).unwrap();
        insert_user(&conn, &User::superuser("admin")).unwrap();

        (AppState::new(conn), tracker)
    }

    async fn send(
        state: &AppState,
        method: &str,
        uri: &str,
        user: Option<&str>,
    ) -> (StatusCode, HeaderMap, serde_json::Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            request = request.header(USER_HEADER, user);
        }

        let response = router(state.clone())
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, headers, json)
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = setup();
        let (status, _, body) = send(&state, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_list_hides_comments_from_anonymous() {
        let (state, _) = setup();

        let (status, _, body) = send(&state, "GET", "/api/trackers", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 2);
        assert!(body["data"]["items"][0].get("comments").is_none());

        let (_, _, body) = send(&state, "GET", "/api/trackers", Some("reviewer1")).await;
        assert_eq!(body["data"]["items"][0]["comments"], "internal");
    }

    #[tokio::test]
    async fn test_list_filters() {
        let (state, _) = setup();
        let (_, _, body) = send(&state, "GET", "/api/trackers?only_collisions=true", None).await;
        assert_eq!(body["data"]["count"], 1);
        assert_eq!(body["data"]["items"][0]["name"], "toto");

        let (status, _, _) = send(&state, "GET", "/api/trackers?page=9", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_tracker_detail() {
        let (state, tracker) = setup();
        let uri = format!("/api/trackers/{}", tracker.id);
        let (status, _, body) = send(&state, "GET", &uri, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tracker"]["name"], "toto");
        assert_eq!(body["data"]["review"], "no_approvals");
        assert_eq!(body["data"]["code_signature_collisions"][0], "toto ads");
        assert!(body["data"]["creator"].is_null());

        let (status, _, _) = send(&state, "GET", "/api/trackers/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_export_is_an_attachment() {
        let (state, _) = setup();
        let (status, headers, body) = send(&state, "GET", "/trackers/export", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers[header::CONTENT_DISPOSITION],
            "attachment; filename=trackers.json"
        );
        assert_eq!(body["trackers"][0]["name"], "toto");
        assert_eq!(body["trackers"][1]["name"], "toto ads");
    }

    #[tokio::test]
    async fn test_stats_requires_user() {
        let (state, _) = setup();
        let (status, _, _) = send(&state, "GET", "/api/stats", None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = send(&state, "GET", "/api/stats", Some("reviewer1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["trackers"]["all"], 2);
        assert_eq!(body["trackers"]["with_collisions"], 1);
    }

    #[tokio::test]
    async fn test_approval_flow() {
        let (state, tracker) = setup();
        let approve = format!("/api/trackers/{}/approve", tracker.id);
        let revoke = format!("/api/trackers/{}/revoke", tracker.id);

        let (status, _, _) = send(&state, "POST", &approve, None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = send(&state, "POST", &approve, Some("reviewer1")).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"], "need_review");

        let (status, _, _) = send(&state, "POST", &approve, Some("reviewer1")).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (_, _, body) = send(&state, "POST", &approve, Some("reviewer2")).await;
        assert_eq!(body["data"], "approved");

        let (status, _, body) = send(&state, "POST", &revoke, Some("reviewer2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "need_review");

        let (status, _, _) = send(&state, "POST", &revoke, Some("reviewer2")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_ship_is_superuser_only() {
        let (state, tracker) = setup();
        let ship = format!("/api/trackers/{}/ship", tracker.id);

        let (status, _, _) = send(&state, "POST", &ship, Some("reviewer1")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _, body) = send(&state, "POST", &ship, Some("admin")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["is_in_exodus"], true);
    }
}
