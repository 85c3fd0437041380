use crate::config::ApiConfig;
use crate::db::models::alert_models::Alert;
use crate::db::repositories::alerts::AlertRepository;
use crate::error::Error;
use crate::services::alerts::AlertService;
use crate::services::detector::DetectorClient;
use anyhow::Result;
use axum::{
    extract::rejection::JsonRejection,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

/// Default page size for alert listings
const DEFAULT_LIMIT: i64 = 100;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn AlertRepository>,
    pub alert_service: Arc<AlertService>,
    pub detector: Arc<DetectorClient>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub message: String,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        ApiError {
            success: false,
            message: message.into(),
            status: status.as_u16(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Api(_) | Error::Config(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, err.to_string())
            }
            Error::NotFound(_) => ApiError::new(StatusCode::NOT_FOUND, err.to_string()),
            Error::AlreadyExists(_) => ApiError::new(StatusCode::CONFLICT, err.to_string()),
            _ => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }

        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Raw paging/filter parameters as they arrive on the query string
#[derive(Debug, Default, Deserialize)]
pub struct AlertsQuery {
    camera: Option<String>,
    limit: Option<String>,
    offset: Option<String>,
}

/// Clamp raw paging parameters to safe values before they reach the
/// store: non-numeric or non-positive limit falls back to the default,
/// negative offset falls back to zero.
fn parse_paging(limit: Option<&str>, offset: Option<&str>) -> (i64, i64) {
    let limit = limit
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_LIMIT);
    let offset = offset
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v >= 0)
        .unwrap_or(0);
    (limit, offset)
}

#[derive(Debug, Deserialize)]
pub struct TriggerRequest {
    #[serde(default)]
    camera: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CameraInfo {
    pub name: String,
    pub alert_count: i64,
}

async fn get_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertsQuery>,
) -> ApiResult<Json<Vec<Alert>>> {
    let (limit, offset) = parse_paging(query.limit.as_deref(), query.offset.as_deref());

    let alerts = match query.camera.as_deref() {
        Some(camera) if !camera.is_empty() => {
            state.repository.list_by_camera(camera, limit, offset).await?
        }
        _ => state.repository.list(limit, offset).await?,
    };

    Ok(Json(alerts))
}

async fn trigger_alert(
    State(state): State<AppState>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> ApiResult<Json<TriggerResponse>> {
    let Json(request) =
        payload.map_err(|_| ApiError::new(StatusCode::BAD_REQUEST, "Invalid request"))?;

    let alert = state.alert_service.trigger_manual(&request.camera).await?;

    Ok(Json(TriggerResponse {
        success: true,
        message: format!("Manual snapshot from {} camera sent to Discord", request.camera),
        alert_id: Some(alert.id),
    }))
}

async fn get_cameras(State(state): State<AppState>) -> ApiResult<Json<Vec<CameraInfo>>> {
    let cameras = state.detector.cameras().await?;

    let mut infos = Vec::with_capacity(cameras.len());
    for camera in cameras {
        match state.repository.count_by_camera(&camera).await {
            Ok(alert_count) => infos.push(CameraInfo { name: camera, alert_count }),
            Err(e) => error!("Failed to count alerts for camera {}: {}", camera, e),
        }
    }

    Ok(Json(infos))
}

/// Build the API router for the given state
pub fn router(state: AppState) -> Router {
    // Allow all origins and preflight requests
    use std::time::Duration;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/api/alerts", get(get_alerts))
        .route("/api/cameras", get(get_cameras))
        .route("/api/trigger", post(trigger_alert))
        .with_state(state)
        // Serve static files from the public directory
        .fallback_service(ServeDir::new("public"))
        .layer(cors)
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, state: AppState) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state,
        })
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(self.state.clone());

        // Build the server address
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::alerts::SqliteAlertRepository;
    use crate::notify::AlertNotifier;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use chrono::{TimeZone, Utc};
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    /// Notifier stub: the API tests only care that sends do not fail
    struct NoopNotifier;

    #[async_trait::async_trait]
    impl AlertNotifier for NoopNotifier {
        async fn send(&self, _alert: &Alert) -> Result<()> {
            Ok(())
        }
    }

    /// Repository stub standing in for an unreachable database
    struct FailingRepository;

    #[async_trait::async_trait]
    impl AlertRepository for FailingRepository {
        async fn save(&self, _alert: &Alert) -> Result<()> {
            Err(Error::Database("connection refused".to_string()).into())
        }
        async fn list(&self, _limit: i64, _offset: i64) -> Result<Vec<Alert>> {
            Err(Error::Database("connection refused".to_string()).into())
        }
        async fn list_by_camera(&self, _camera: &str, _limit: i64, _offset: i64) -> Result<Vec<Alert>> {
            Err(Error::Database("connection refused".to_string()).into())
        }
        async fn count_by_camera(&self, _camera: &str) -> Result<i64> {
            Err(Error::Database("connection refused".to_string()).into())
        }
    }

    async fn test_state() -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::init_schema(&pool).await.unwrap();

        let repository = Arc::new(SqliteAlertRepository::new(Arc::new(pool)));
        state_with(repository)
    }

    fn state_with(repository: Arc<dyn AlertRepository>) -> AppState {
        let notifier = Arc::new(NoopNotifier);
        let alert_service = Arc::new(AlertService::new(repository.clone(), notifier));
        let detector = Arc::new(
            DetectorClient::new(&crate::config::DetectorConfig::default()).unwrap(),
        );

        AppState {
            repository,
            alert_service,
            detector,
        }
    }

    async fn seed(state: &AppState, id: &str, camera: &str, hour: u32) {
        state
            .repository
            .save(&Alert {
                id: id.to_string(),
                kind: "new".to_string(),
                camera: camera.to_string(),
                triggered_at: Utc.with_ymd_and_hms(2025, 8, 5, hour, 0, 0).unwrap(),
                message: format!("An object detected in the {} camera", camera),
            })
            .await
            .unwrap();
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_json(router: Router, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn alerts_are_returned_most_recent_first() {
        let state = test_state().await;
        seed(&state, "a", "driveway", 8).await;
        seed(&state, "b", "backyard", 10).await;
        seed(&state, "c", "driveway", 9).await;

        let (status, body) = get(router(state), "/api/alerts").await;
        assert_eq!(status, StatusCode::OK);

        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        let ids: Vec<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn camera_filter_limits_results_to_that_camera() {
        let state = test_state().await;
        seed(&state, "a", "driveway", 8).await;
        seed(&state, "b", "backyard", 10).await;
        seed(&state, "c", "driveway", 9).await;

        let (status, body) =
            get(router(state), "/api/alerts?camera=driveway&limit=1").await;
        assert_eq!(status, StatusCode::OK);

        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "c");
    }

    #[tokio::test]
    async fn bad_paging_parameters_fall_back_to_defaults() {
        let state = test_state().await;
        seed(&state, "a", "driveway", 8).await;
        seed(&state, "b", "driveway", 9).await;

        // Non-numeric limit and negative offset clamp to 100 and 0
        let (status, body) =
            get(router(state.clone()), "/api/alerts?limit=abc&offset=-5").await;
        assert_eq!(status, StatusCode::OK);
        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        assert_eq!(alerts.len(), 2);

        // limit=0 clamps to the default as well
        let (status, body) = get(router(state.clone()), "/api/alerts?limit=0").await;
        assert_eq!(status, StatusCode::OK);
        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        assert_eq!(alerts.len(), 2);

        // Offset past the end is an empty page, not an error
        let (status, body) = get(router(state), "/api/alerts?offset=50").await;
        assert_eq!(status, StatusCode::OK);
        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        assert!(alerts.is_empty());
    }

    #[tokio::test]
    async fn trigger_persists_an_alert_the_read_path_returns_first() {
        let state = test_state().await;

        let (status, body) =
            post_json(router(state.clone()), "/api/trigger", r#"{"camera":"driveway"}"#).await;
        assert_eq!(status, StatusCode::OK);

        let response: TriggerResponse = serde_json::from_value(body).unwrap();
        assert!(response.success);
        let alert_id = response.alert_id.unwrap();
        assert!(!alert_id.is_empty());

        let (status, body) =
            get(router(state), "/api/alerts?camera=driveway&limit=1").await;
        assert_eq!(status, StatusCode::OK);
        let alerts: Vec<Alert> = serde_json::from_value(body).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, alert_id);
        assert_eq!(alerts[0].kind, "manual");
    }

    #[tokio::test]
    async fn trigger_requires_a_camera_name() {
        let state = test_state().await;

        let (status, body) =
            post_json(router(state.clone()), "/api/trigger", r#"{"camera":""}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], serde_json::json!(false));

        let (status, body) = post_json(router(state), "/api/trigger", r#"{}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], serde_json::json!(false));
    }

    #[tokio::test]
    async fn trigger_rejects_malformed_bodies() {
        let state = test_state().await;

        let (status, body) = post_json(router(state), "/api/trigger", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], serde_json::json!(false));
        assert_eq!(body["message"], serde_json::json!("Invalid request"));
    }

    #[tokio::test]
    async fn trigger_reports_storage_failure_as_500() {
        let state = state_with(Arc::new(FailingRepository));

        let (status, body) =
            post_json(router(state), "/api/trigger", r#"{"camera":"driveway"}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], serde_json::json!(false));
    }

    #[test]
    fn paging_clamps() {
        assert_eq!(parse_paging(None, None), (100, 0));
        assert_eq!(parse_paging(Some("25"), Some("50")), (25, 50));
        assert_eq!(parse_paging(Some("0"), Some("-1")), (100, 0));
        assert_eq!(parse_paging(Some("-3"), Some("abc")), (100, 0));
        assert_eq!(parse_paging(Some("abc"), Some("7")), (100, 7));
    }
}
