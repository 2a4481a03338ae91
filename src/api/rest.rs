//! REST API Handlers
//!
//! JSON endpoints for network identifier lookup, datastore capacity checks
//! and database disk layouts, plus health and Prometheus metrics.

use crate::domain::ports::SessionContext;
use crate::error::Error;
use crate::inventory::{DatastoreCapacity, InventoryService, NetworkIdentifier};
use crate::layout::{compose_with, resize, DatastorePlan, DiskGroup, DiskLayout, LayoutSizes};
use axum::{
    extract::{DefaultBodyLimit, Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Endpoint and credentials sent with every inventory request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    fn session(&self, insecure_tls: bool) -> Result<SessionContext, Error> {
        Ok(
            SessionContext::new(self.url.as_str(), self.username.as_str(), self.password.as_str())?
                .with_insecure_tls(insecure_tls),
        )
    }
}

/// Network identifier request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkIdentifierRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub datacenter: String,
    pub network: String,
}

/// Network identifier response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkIdentifierResponse {
    pub identifier: String,
    /// Same value as `identifier`, under the name older clients read
    pub dpg_id: String,
    pub kind: String,
    pub path: String,
    pub ambiguous: bool,
}

impl From<NetworkIdentifier> for NetworkIdentifierResponse {
    fn from(id: NetworkIdentifier) -> Self {
        Self {
            dpg_id: id.identifier.clone(),
            identifier: id.identifier,
            kind: id.kind,
            path: id.path,
            ambiguous: id.ambiguous,
        }
    }
}

/// Datastore capacity request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatastoreCapacityRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub datacenter: String,
    pub datastore: String,
    /// Report whether free space exceeds this many GB
    pub requested_gb: Option<u64>,
}

/// Datastore capacity response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatastoreCapacityResponse {
    pub name: String,
    pub path: String,
    pub capacity_bytes: u64,
    pub free_bytes: u64,
    #[serde(rename = "capacityGB")]
    pub capacity_gb: String,
    #[serde(rename = "freeGB")]
    pub free_gb: String,
    pub ambiguous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sufficient: Option<bool>,
}

impl DatastoreCapacityResponse {
    fn new(capacity: DatastoreCapacity, requested_gb: Option<u64>) -> Self {
        let record = capacity.record;
        Self {
            capacity_gb: record.capacity_gb(),
            free_gb: record.free_gb(),
            sufficient: requested_gb.map(|gb| record.has_room_for(gb)),
            capacity_bytes: record.capacity_bytes,
            free_bytes: record.free_bytes,
            name: record.name,
            path: capacity.path,
            ambiguous: capacity.ambiguous,
        }
    }
}

/// Combined network and datastore lookup
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlacementRequest {
    #[serde(flatten)]
    pub credentials: Credentials,
    pub datacenter: String,
    pub network: String,
    pub datastore: String,
    pub requested_gb: Option<u64>,
}

/// One half of a placement lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupOutcome<T> {
    Found(T),
    Failed(ApiErrorResponse),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementResponse {
    pub network: LookupOutcome<NetworkIdentifierResponse>,
    pub datastore: LookupOutcome<DatastoreCapacityResponse>,
}

/// Layout creation request; sizes in GB
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutRequest {
    pub dump_gb: i64,
    pub data_gb: i64,
    pub archive_gb: i64,
    pub datastores: Option<DatastorePlan>,
}

impl Default for LayoutRequest {
    fn default() -> Self {
        let sizes = LayoutSizes::default();
        Self {
            dump_gb: sizes.dump_gb as i64,
            data_gb: sizes.data_gb as i64,
            archive_gb: sizes.archive_gb as i64,
            datastores: None,
        }
    }
}

/// Layout resize request
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeRequest {
    pub layout: DiskLayout,
    pub group: String,
    pub size_gb: i64,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl From<&Error> for ApiErrorResponse {
    fn from(e: &Error) -> Self {
        Self {
            error: e.code().to_string(),
            message: e.to_string(),
            hint: e.hint().map(str::to_string),
        }
    }
}

/// Error returned from handlers
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

/// HTTP status for an error
pub fn status_for(e: &Error) -> StatusCode {
    match e {
        Error::MissingInput { .. } => StatusCode::BAD_REQUEST,
        Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::Ambiguous { .. } => StatusCode::CONFLICT,
        Error::Auth(_) => StatusCode::UNAUTHORIZED,
        Error::InvalidLayout(_) => StatusCode::UNPROCESSABLE_ENTITY,
        Error::TransientNetwork(_) => StatusCode::SERVICE_UNAVAILABLE,
        Error::CommandTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        Error::MalformedResponse(_)
        | Error::Execution { .. }
        | Error::OutputLimitExceeded { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }
        (status, Json(ApiErrorResponse::from(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// =============================================================================
// REST Router
// =============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    service: Arc<InventoryService>,
    layout_plan: DatastorePlan,
    insecure_tls: bool,
}

impl AppState {
    pub fn new(service: Arc<InventoryService>, layout_plan: DatastorePlan, insecure_tls: bool) -> Self {
        Self {
            service,
            layout_plan,
            insecure_tls,
        }
    }
}

/// REST API router builder
pub struct RestRouter {
    state: AppState,
    request_timeout: Duration,
    max_body_size: usize,
}

impl RestRouter {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            request_timeout: Duration::from_secs(180),
            max_body_size: 1024 * 1024,
        }
    }

    pub fn with_limits(mut self, request_timeout: Duration, max_body_size: usize) -> Self {
        self.request_timeout = request_timeout;
        self.max_body_size = max_body_size;
        self
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        Router::new()
            // Inventory endpoints
            .route("/api/v1/network/identifier", post(resolve_network_identifier))
            .route("/api/get-dpg-id", post(resolve_network_identifier))
            .route("/api/v1/datastore/capacity", post(check_datastore_capacity))
            .route("/api/check-datastore", post(check_datastore_capacity))
            .route("/api/v1/placement", post(lookup_placement))
            // Layout endpoints
            .route("/api/v1/layouts", post(create_layout))
            .route("/api/v1/layouts/resize", post(resize_layout))
            // Operational endpoints
            .route("/health", get(health_check))
            .route("/metrics", get(render_metrics))
            .with_state(self.state)
            .layer(DefaultBodyLimit::max(self.max_body_size))
            .layer(TimeoutLayer::new(self.request_timeout))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn resolve_network_identifier(
    State(state): State<AppState>,
    Json(request): Json<NetworkIdentifierRequest>,
) -> ApiResult<NetworkIdentifierResponse> {
    let session = request.credentials.session(state.insecure_tls)?;
    info!(
        "Network identifier request: {}/{}",
        request.datacenter, request.network
    );

    let id = state
        .service
        .resolve_network_identifier(&session, &request.datacenter, &request.network)
        .await?;
    Ok(Json(id.into()))
}

async fn check_datastore_capacity(
    State(state): State<AppState>,
    Json(request): Json<DatastoreCapacityRequest>,
) -> ApiResult<DatastoreCapacityResponse> {
    let session = request.credentials.session(state.insecure_tls)?;
    info!(
        "Datastore capacity request: {}/{}",
        request.datacenter, request.datastore
    );

    let capacity = state
        .service
        .check_datastore_capacity(&session, &request.datacenter, &request.datastore)
        .await?;
    Ok(Json(DatastoreCapacityResponse::new(capacity, request.requested_gb)))
}

async fn lookup_placement(
    State(state): State<AppState>,
    Json(request): Json<PlacementRequest>,
) -> ApiResult<PlacementResponse> {
    let session = request.credentials.session(state.insecure_tls)?;
    info!(
        "Placement request: {} network={} datastore={}",
        request.datacenter, request.network, request.datastore
    );

    let placement = state
        .service
        .lookup_placement(&session, &request.datacenter, &request.network, &request.datastore)
        .await;

    Ok(Json(PlacementResponse {
        network: match placement.network {
            Ok(id) => LookupOutcome::Found(id.into()),
            Err(e) => LookupOutcome::Failed((&e).into()),
        },
        datastore: match placement.datastore {
            Ok(capacity) => {
                LookupOutcome::Found(DatastoreCapacityResponse::new(capacity, request.requested_gb))
            }
            Err(e) => LookupOutcome::Failed((&e).into()),
        },
    }))
}

async fn create_layout(
    State(state): State<AppState>,
    Json(request): Json<LayoutRequest>,
) -> ApiResult<DiskLayout> {
    if request.dump_gb < 0 {
        return Err(Error::InvalidLayout(format!(
            "dump size must not be negative, got {}",
            request.dump_gb
        ))
        .into());
    }
    let plan = request.datastores.unwrap_or(state.layout_plan);
    plan.validate()
        .map_err(|e| Error::InvalidLayout(e.to_string()))?;

    let sizes = LayoutSizes {
        dump_gb: request.dump_gb as u64,
        data_gb: request.data_gb.max(0) as u64,
        archive_gb: request.archive_gb.max(0) as u64,
    };
    Ok(Json(compose_with(&sizes, &plan)?))
}

async fn resize_layout(Json(request): Json<ResizeRequest>) -> ApiResult<DiskLayout> {
    let group: DiskGroup = request.group.parse()?;
    Ok(Json(resize(&request.layout, group, request.size_gb)?))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    ambiguity_policy: String,
    sessions: usize,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::VERSION,
        ambiguity_policy: state.service.policy().to_string(),
        sessions: state.service.client().sessions().len(),
    })
}

async fn render_metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let text = state.service.client().metrics().render()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        text,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::testing::{client, Reply, ScriptedRunner};
    use crate::inventory::AmbiguityPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router(runner: ScriptedRunner) -> Router {
        let service = InventoryService::new(client(Arc::new(runner)), AmbiguityPolicy::BestEffort);
        RestRouter::new(AppState::new(Arc::new(service), DatastorePlan::default(), true)).build()
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn credentials() -> Value {
        json!({"url": "https://vc", "username": "admin", "password": "pa$$ word"})
    }

    fn with_credentials(extra: Value) -> Value {
        let mut body = credentials();
        if let (Some(target), Some(source)) = (body.as_object_mut(), extra.as_object()) {
            target.extend(source.clone());
        }
        body
    }

    #[tokio::test]
    async fn test_dpg_alias_returns_identifier() {
        let runner = ScriptedRunner::new()
            .on("find / -type d -name DC1", Reply::stdout("/DC1"))
            .on("find /DC1 -type n -name web", Reply::stdout("/DC1/network/web"))
            .on(
                "ls -i /DC1/network/web",
                Reply::stdout("DistributedVirtualPortgroup:dvportgroup-115485 /DC1/network/web"),
            );

        let (status, body) = post_json(
            router(runner),
            "/api/get-dpg-id",
            with_credentials(json!({"datacenter": "DC1", "network": "web"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dpgId"], "dvportgroup-115485");
        assert_eq!(body["identifier"], "dvportgroup-115485");
        assert_eq!(body["ambiguous"], false);
    }

    #[tokio::test]
    async fn test_missing_password_is_bad_request() {
        let (status, body) = post_json(
            router(ScriptedRunner::new()),
            "/api/v1/network/identifier",
            json!({"url": "https://vc", "username": "admin", "datacenter": "DC1", "network": "web"}),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing_input");
    }

    #[tokio::test]
    async fn test_capacity_reports_gb_and_sufficiency() {
        let runner = ScriptedRunner::new()
            .on("find / -type d -name DC1", Reply::stdout("/DC1"))
            .on("find /DC1 -type s -name ds1", Reply::stdout("/DC1/datastore/ds1"))
            .on(
                "datastore.info -json /DC1/datastore/ds1",
                Reply::stdout(r#"{"datastores":[{"summary":{"freeSpace":500,"capacity":1073741824}}]}"#),
            );

        let (status, body) = post_json(
            router(runner),
            "/api/check-datastore",
            with_credentials(json!({"datacenter": "DC1", "datastore": "ds1", "requestedGb": 1})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["capacityGB"], "1.00");
        assert_eq!(body["freeGB"], "0.00");
        assert_eq!(body["freeBytes"], 500);
        assert_eq!(body["name"], "ds1");
        assert_eq!(body["sufficient"], false);
    }

    #[tokio::test]
    async fn test_transient_error_carries_hint() {
        let runner = ScriptedRunner::new().on("find / -type d -name DC1", Reply::Transient);

        let (status, body) = post_json(
            router(runner),
            "/api/v1/datastore/capacity",
            with_credentials(json!({"datacenter": "DC1", "datastore": "ds1"})),
        )
        .await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "transient_network_error");
        assert!(body["hint"].as_str().unwrap().contains("again"));
    }

    #[tokio::test]
    async fn test_placement_reports_partial_failure() {
        let runner = ScriptedRunner::new()
            .on("find / -type d -name DC1", Reply::stdout("/DC1"))
            .on("find /DC1 -type n -name web", Reply::stdout(""))
            .on("find /DC1 -type s -name ds1", Reply::stdout("/DC1/datastore/ds1"))
            .on(
                "datastore.info -json /DC1/datastore/ds1",
                Reply::stdout(r#"{"name":"ds1","freeSpace":2147483648,"capacity":4294967296}"#),
            );

        let (status, body) = post_json(
            router(runner),
            "/api/v1/placement",
            with_credentials(json!({"datacenter": "DC1", "network": "web", "datastore": "ds1"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["network"]["error"], "not_found");
        assert_eq!(body["datastore"]["freeGB"], "2.00");
    }

    #[tokio::test]
    async fn test_create_and_resize_layout() {
        let app = router(ScriptedRunner::new());

        let (status, layout) = post_json(
            app.clone(),
            "/api/v1/layouts",
            json!({"dumpGb": 100, "dataGb": 2500, "archiveGb": 500}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let disks = layout["disks"].as_array().unwrap();
        assert_eq!(disks.len(), 13 + 3 + 1);
        assert_eq!(disks[16]["tag"], "disk17");

        let (status, resized) = post_json(
            app,
            "/api/v1/layouts/resize",
            json!({"layout": layout, "group": "data", "sizeGb": 500}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let disks = resized["disks"].as_array().unwrap();
        assert_eq!(disks.len(), 15);
        assert_eq!(disks[14]["roleName"], "ARCHDISK1");
        assert_eq!(disks[14]["tag"], "disk15");
        assert_eq!(disks[14]["device"], "/dev/sdp");
    }

    #[tokio::test]
    async fn test_layout_rejections() {
        let app = router(ScriptedRunner::new());

        let (status, body) =
            post_json(app.clone(), "/api/v1/layouts", json!({"dumpGb": -1})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_layout");

        let (_, layout) = post_json(app.clone(), "/api/v1/layouts", json!({})).await;
        let (status, body) = post_json(
            app,
            "/api/v1/layouts/resize",
            json!({"layout": layout, "group": "baseline", "sizeGb": 10}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_layout");
    }

    #[tokio::test]
    async fn test_oversized_layout_requests_are_rejected() {
        let app = router(ScriptedRunner::new());

        let (status, body) = post_json(
            app.clone(),
            "/api/v1/layouts",
            json!({"dataGb": i64::MAX}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_layout");

        let (_, layout) = post_json(app.clone(), "/api/v1/layouts", json!({})).await;
        let (status, body) = post_json(
            app.clone(),
            "/api/v1/layouts/resize",
            json!({"layout": layout, "group": "archive", "sizeGb": i64::MAX}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_layout");

        // Region totals that disagree with the recorded sizes
        let mut stale = layout;
        stale["sizes"]["archiveGb"] = json!(200);
        let (status, body) = post_json(
            app,
            "/api/v1/layouts/resize",
            json!({"layout": stale, "group": "data", "sizeGb": 1500}),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "invalid_layout");
    }

    #[tokio::test]
    async fn test_health_and_metrics() {
        let app = router(ScriptedRunner::new());

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::missing("url")), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::Auth("401".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status_for(&Error::MalformedResponse("x".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&Error::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
