//! REST API for the load planning service.
//!
//! Accepts dispatch snapshots as JSON and returns computed load plans. Nothing is
//! persisted here; storing plans is the caller's job. Uses Axum as the web
//! framework and supports CORS.

use std::sync::OnceLock;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::capacity::{
    CapacityKind, CapacityReport, CapacityVerdict, check_capacity,
};
use crate::catalog::{standard_fleet, standard_truck_types, truck_type_by_name};
use crate::config::{ApiConfig, PlannerConfig};
use crate::model::{
    DispatchRequest, LoadPlan, Package, Placement, PlanStatus, Truck, TruckStatus, TruckType,
};
use crate::packer::PackingConfig;
use crate::planner::{LoadPlanner, PlannedLoad, PlanningError};
use crate::summary::{DispatchSummary, LatestPlanSummary, summarize};

#[derive(Clone)]
pub struct ApiState {
    planner_config: PlannerConfig,
}

impl ApiState {
    pub fn new(planner_config: PlannerConfig) -> Self {
        Self { planner_config }
    }

    fn planner(&self, allow_rotation: Option<bool>) -> LoadPlanner {
        let mut packing: PackingConfig = self.planner_config.packing_config();
        if let Some(allow) = allow_rotation {
            packing.allow_rotation = allow;
        }
        LoadPlanner::new(packing)
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>load-planner API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the planning endpoints.
///
/// `allow_rotation` overrides the service-wide rotation setting for this call.
#[derive(Deserialize, Clone, ToSchema)]
#[schema(
    example = json!({
        "dispatch": {
            "dispatch_id": 17,
            "service_date": "2025-03-14",
            "truck": { "id": 1, "label": "SM-101", "status": "AVAILABLE" },
            "truck_type": {
                "name": "Small Van",
                "length": 260, "width": 160, "height": 140,
                "max_weight": 2500.0
            },
            "packages": [
                { "id": "PKG10000001", "weight": 12.0, "length": 40, "width": 30, "height": 25, "fragile": false }
            ]
        },
        "allow_rotation": true
    })
)]
pub struct PlanRequest {
    pub dispatch: DispatchRequest,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

#[derive(Deserialize, Clone, ToSchema)]
pub struct PlanBatchRequest {
    pub dispatches: Vec<DispatchRequest>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

#[derive(Deserialize, Clone, ToSchema)]
pub struct SummaryRequest {
    pub dispatch: DispatchRequest,
    /// Plans generated for the dispatch so far, in any order.
    #[serde(default)]
    pub plans: Vec<LoadPlan>,
}

/// A package the plan could not accommodate.
#[derive(Serialize, ToSchema)]
pub struct UnplacedEntry {
    pub package_id: String,
    pub weight: f64,
    #[schema(value_type = [u32; 3], example = json!([80, 50, 40]))]
    pub dims: (u32, u32, u32),
    pub fragile: bool,
    pub reason_code: String,
    pub reason: String,
}

/// A computed plan, ready to be persisted by the caller.
#[derive(Serialize, ToSchema)]
pub struct PlanResponse {
    pub load_plan: LoadPlan,
    pub placements: Vec<Placement>,
    pub unplaced: Vec<UnplacedEntry>,
    pub capacity: CapacityReport,
}

impl From<PlannedLoad> for PlanResponse {
    fn from(planned: PlannedLoad) -> Self {
        let PlannedLoad {
            load_plan,
            placements,
            unplaced,
            capacity,
        } = planned;

        Self {
            load_plan,
            placements,
            unplaced: unplaced
                .into_iter()
                .map(|entry| UnplacedEntry {
                    dims: entry.package.dims().as_tuple(),
                    weight: entry.package.weight,
                    fragile: entry.package.fragile,
                    reason_code: entry.reason.code().to_string(),
                    reason: entry.reason.to_string(),
                    package_id: entry.package.id,
                })
                .collect(),
            capacity,
        }
    }
}

/// Outcome for one dispatch of a batch: either `plan` or `error` is set.
#[derive(Serialize, ToSchema)]
pub struct PlanBatchEntry {
    pub dispatch_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

#[derive(Serialize, ToSchema)]
pub struct PlanBatchResponse {
    pub results: Vec<PlanBatchEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    error: String,
    details: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    capacity_kind: Option<CapacityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    excess: Option<f64>,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
            capacity_kind: None,
            excess: None,
        }
    }

    fn over_capacity(kind: CapacityKind, excess: f64, details: impl Into<String>) -> Self {
        Self {
            capacity_kind: Some(kind),
            excess: Some(excess),
            ..Self::new("Dispatch exceeds truck capacity", details)
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.body_text(),
    )
}

fn planning_error_body(err: &PlanningError) -> (StatusCode, ErrorResponse) {
    match err {
        PlanningError::InvalidInput(inner) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorResponse::new("Invalid input data", inner.to_string()),
        ),
        PlanningError::OverCapacity { kind, excess } => (
            StatusCode::CONFLICT,
            ErrorResponse::over_capacity(*kind, *excess, err.to_string()),
        ),
        PlanningError::InternalInvariantViolation(violation) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("Internal planning error", violation.to_string()),
        ),
    }
}

fn planning_error_response(err: &PlanningError) -> Response {
    let (status, body) = planning_error_body(err);
    (status, Json(body)).into_response()
}

/// Runs a planning computation off the async runtime, bounded by `limit`.
async fn run_planning<T, F>(limit: Duration, work: F) -> Result<T, Response>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    match tokio::time::timeout(limit, tokio::task::spawn_blocking(work)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_err)) => {
            tracing::error!(error = %join_err, "planning task failed");
            Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Planning task failed",
                join_err.to_string(),
            ))
        }
        Err(_) => {
            tracing::warn!(limit_ms = limit.as_millis() as u64, "planning timed out");
            Err(error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "Planning timed out",
                format!("No result within {} ms", limit.as_millis()),
            ))
        }
    }
}

/// One truck of the reference fleet with its type.
#[derive(Serialize, Clone, ToSchema)]
pub struct FleetEntry {
    pub truck: Truck,
    pub truck_type: TruckType,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_plan,
        handle_plan_batch,
        handle_plan_stream,
        handle_summary,
        handle_truck_types,
        handle_truck_type,
        handle_fleet
    ),
    components(
        schemas(
            PlanRequest,
            PlanBatchRequest,
            SummaryRequest,
            PlanResponse,
            PlanBatchResponse,
            PlanBatchEntry,
            UnplacedEntry,
            ErrorResponse,
            FleetEntry,
            DispatchRequest,
            DispatchSummary,
            LatestPlanSummary,
            TruckType,
            Truck,
            TruckStatus,
            Package,
            LoadPlan,
            Placement,
            PlanStatus,
            CapacityReport,
            CapacityVerdict,
            CapacityKind
        )
    ),
    tags(
        (name = "planning", description = "Load plan computation"),
        (name = "reference", description = "Reference data and dispatch figures")
    )
)]
struct ApiDoc;

/// Builds the application router with all endpoints and open CORS.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/plan", post(handle_plan))
        .route("/plan_batch", post(handle_plan_batch))
        .route("/plan_stream", post(handle_plan_stream))
        .route("/summary", post(handle_summary))
        .route("/truck_types", get(handle_truck_types))
        .route("/truck_types/{name}", get(handle_truck_type))
        .route("/fleet", get(handle_fleet))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(
    config: ApiConfig,
    planner_config: PlannerConfig,
) -> std::io::Result<()> {
    let app = router(ApiState::new(planner_config));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.inspect_err(|err| {
        tracing::error!("Could not bind API server to {}: {}", addr, err);
    })?;

    tracing::info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() {
        tracing::info!("Local access: http://localhost:{}", config.port());
    }
    tracing::info!("API endpoints: POST /plan, POST /plan_batch, POST /plan_stream, POST /summary, GET /truck_types, GET /fleet");
    tracing::info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for POST /plan.
///
/// Computes one load plan for a dispatch snapshot.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Complete or partial load plan", body = PlanResponse),
        (status = CONFLICT, description = "Packages exceed the truck's weight or volume", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request or dispatch data", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Planning produced an inconsistent result", body = ErrorResponse),
        (status = GATEWAY_TIMEOUT, description = "Planning exceeded the configured time limit", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    tracing::info!(
        dispatch_id = request.dispatch.dispatch_id,
        packages = request.dispatch.packages.len(),
        "new plan request"
    );
    let planner = state.planner(request.allow_rotation);
    let dispatch = request.dispatch;
    let outcome = match run_planning(state.planner_config.plan_timeout(), move || {
        planner.plan(&dispatch)
    })
    .await
    {
        Ok(outcome) => outcome,
        Err(response) => return response,
    };

    match outcome {
        Ok(planned) => (StatusCode::OK, Json(PlanResponse::from(planned))).into_response(),
        Err(err) => planning_error_response(&err),
    }
}

/// Handler for POST /plan_batch.
///
/// Plans independent dispatches in parallel. Every dispatch gets its own entry,
/// in request order, with either a plan or an error.
#[utoipa::path(
    post,
    path = "/plan_batch",
    request_body = PlanBatchRequest,
    responses(
        (status = 200, description = "One result per dispatch", body = PlanBatchResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid JSON", body = ErrorResponse),
        (status = GATEWAY_TIMEOUT, description = "Planning exceeded the configured time limit", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan_batch(
    State(state): State<ApiState>,
    payload: Result<Json<PlanBatchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    tracing::info!(dispatches = request.dispatches.len(), "new batch request");
    let planner = state.planner(request.allow_rotation);
    let dispatches = request.dispatches;
    let (ids, outcomes) = match run_planning(state.planner_config.plan_timeout(), move || {
        let outcomes = planner.plan_batch(&dispatches, Utc::now());
        let ids: Vec<u64> = dispatches.iter().map(|d| d.dispatch_id).collect();
        (ids, outcomes)
    })
    .await
    {
        Ok(result) => result,
        Err(response) => return response,
    };

    let results = ids
        .into_iter()
        .zip(outcomes)
        .map(|(dispatch_id, outcome)| match outcome {
            Ok(planned) => PlanBatchEntry {
                dispatch_id,
                plan: Some(PlanResponse::from(planned)),
                error: None,
            },
            Err(err) => PlanBatchEntry {
                dispatch_id,
                plan: None,
                error: Some(planning_error_body(&err).1),
            },
        })
        .collect();

    (StatusCode::OK, Json(PlanBatchResponse { results })).into_response()
}

/// Handler for POST /plan_stream (SSE).
///
/// Streams packing events as Server-Sent Events (text/event-stream) so a client
/// can visualize the load as it is built. Invalid or over-capacity dispatches are
/// rejected with a regular JSON error before the stream starts.
#[utoipa::path(
    post,
    path = "/plan_stream",
    request_body = PlanRequest,
    responses(
        (
            status = 200,
            description = "Streams packing events in real time",
            content_type = "text/event-stream",
            body = String
        ),
        (status = CONFLICT, description = "Packages exceed the truck's weight or volume", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request or dispatch data", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_plan_stream(
    State(state): State<ApiState>,
    payload: Result<Json<PlanRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };

    if let Err(err) = request.dispatch.validate() {
        return planning_error_response(&PlanningError::InvalidInput(err));
    }
    let report = check_capacity(&request.dispatch.truck_type, &request.dispatch.packages);
    if let CapacityVerdict::OverCapacity { kind, excess } = report.verdict {
        return planning_error_response(&PlanningError::OverCapacity { kind, excess });
    }

    let planner = state.planner(request.allow_rotation);
    let dispatch = request.dispatch;
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let _ = planner.plan_with_progress(&dispatch, Utc::now(), &mut |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver means the client went away; later events are dropped.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /summary.
///
/// Package count, fragile count, totals and the newest plan's utilization.
#[utoipa::path(
    post,
    path = "/summary",
    request_body = SummaryRequest,
    responses(
        (status = 200, description = "Dispatch figures", body = DispatchSummary),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid JSON or invalid dispatch data", body = ErrorResponse)
    ),
    tag = "reference"
)]
async fn handle_summary(payload: Result<Json<SummaryRequest>, JsonRejection>) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    if let Err(err) = request.dispatch.validate() {
        return planning_error_response(&PlanningError::InvalidInput(err));
    }
    let summary = summarize(&request.dispatch, &request.plans);
    (StatusCode::OK, Json(summary)).into_response()
}

/// Handler for GET /truck_types.
#[utoipa::path(
    get,
    path = "/truck_types",
    responses(
        (status = 200, description = "Standard truck types", body = [TruckType])
    ),
    tag = "reference"
)]
async fn handle_truck_types() -> Json<Vec<TruckType>> {
    Json(standard_truck_types())
}

/// Handler for GET /truck_types/{name}.
///
/// Name matching ignores case, so `medium box` finds "Medium Box".
#[utoipa::path(
    get,
    path = "/truck_types/{name}",
    params(("name" = String, Path, description = "Truck type name")),
    responses(
        (status = 200, description = "Standard truck type", body = TruckType),
        (status = NOT_FOUND, description = "Unknown truck type", body = ErrorResponse)
    ),
    tag = "reference"
)]
async fn handle_truck_type(Path(name): Path<String>) -> Response {
    match truck_type_by_name(&name) {
        Some(truck_type) => (StatusCode::OK, Json(truck_type)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "Unknown truck type",
            format!("No standard truck type is named '{}'", name),
        ),
    }
}

/// Handler for GET /fleet.
#[utoipa::path(
    get,
    path = "/fleet",
    responses(
        (status = 200, description = "Reference fleet, every truck with its type", body = [FleetEntry])
    ),
    tag = "reference"
)]
async fn handle_fleet() -> Json<Vec<FleetEntry>> {
    Json(
        standard_fleet()
            .into_iter()
            .map(|(truck, truck_type)| FleetEntry { truck, truck_type })
            .collect(),
    )
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
