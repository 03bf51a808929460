use axum::{
    extract::{DefaultBodyLimit, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;

use crate::cli::ServeArgs;
use crate::core::patient::PatientProfile;
use crate::core::provider::ProviderRecord;
use crate::core::taxonomy::taxonomy_for_diagnosis;
use crate::core::types::ProviderId;
use crate::coverage::{CoverageSource, ScanError, TargetSet};
use crate::matching::pipeline::{MatchPipeline, PipelineConfig, PipelineError};
use crate::matching::scoring::AffinityWeights;
use crate::matching::RankingConfig;
use crate::utils::validation::{check_target_limit, MAX_CANDIDATES};

/// Maximum identifiers accepted by the coverage lookup endpoint
pub const MAX_LOOKUP_IDS: usize = 1_000;

/// Request timeout; large coverage files take a while to stream
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Shared application state
pub struct AppState {
    /// Coverage file every request is matched against
    pub coverage: PathBuf,
}

/// Enhanced error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_type: String,
    pub details: Option<String>,
}

/// Body of `POST /api/rank`
#[derive(Debug, Deserialize)]
pub struct RankRequest {
    pub patient: PatientProfile,
    pub candidates: Vec<ProviderRecord>,
    #[serde(default)]
    pub weights: Option<AffinityWeights>,
    #[serde(default)]
    pub limit: Option<usize>,
    /// Taxonomy code to keep; takes precedence over the patient's diagnosis
    #[serde(default)]
    pub taxonomy: Option<String>,
    #[serde(default)]
    pub allow_partial: bool,
}

/// Query of `GET /api/coverage`
#[derive(Debug, Deserialize)]
pub struct CoverageQuery {
    /// Comma-separated provider identifiers
    pub npi: String,
}

/// Create a safe error response that prevents information disclosure
/// while logging detailed errors server-side for debugging
pub fn create_safe_error_response(
    error_type: &str,
    user_message: &str,
    internal_error: Option<&str>,
) -> ErrorResponse {
    // Log detailed error server-side for debugging (not exposed to client)
    if let Some(internal_msg) = internal_error {
        tracing::error!("Internal error ({}): {}", error_type, internal_msg);
    }

    ErrorResponse {
        error: user_message.to_string(),
        error_type: error_type.to_string(),
        details: None, // Never expose internal details to prevent information disclosure
    }
}

fn error_response(status: StatusCode, error: ErrorResponse) -> Response {
    (status, Json(error)).into_response()
}

/// Run the web server
///
/// # Errors
///
/// Returns an error if the tokio runtime cannot be created or the server fails to start.
pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    // Build tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move { run_server(args).await })
}

/// Create the application router with all routes and middleware configured.
///
/// # Errors
///
/// Returns an error if the coverage file cannot be opened or the rate limiter
/// configuration is rejected.
pub fn create_router(coverage: PathBuf) -> anyhow::Result<Router> {
    // Fail at startup rather than on the first request
    CoverageSource::open(&coverage)?;
    let state = Arc::new(AppState { coverage });

    // Configure IP-based rate limiting
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(10) // 10 requests per second per IP
        .burst_size(50) // Allow bursts of 50 requests
        .finish()
        .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?;

    // Build router with comprehensive security layers
    let app = Router::new()
        .route("/api/rank", post(rank_handler))
        .route("/api/coverage", get(coverage_handler))
        .route("/api/health", get(health_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // Security headers for browser protection
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("strict-transport-security"),
                    HeaderValue::from_static("max-age=31536000; includeSubDomains"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("no-referrer"),
                ))
                // IP-based rate limiting to prevent abuse
                .layer(GovernorLayer {
                    config: Arc::new(governor_conf),
                })
                // Request timeout to prevent slow client attacks
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    REQUEST_TIMEOUT,
                ))
                // Limit concurrent requests to prevent DOS
                .layer(ConcurrencyLimitLayer::new(100))
                // Limit request body size
                .layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB limit
        );

    Ok(app)
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let app = create_router(args.coverage)?;

    let addr = format!("{}:{}", args.address, args.port);
    println!("Starting provider-match API at http://{addr}");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Health check
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Rank candidate providers for a patient
async fn rank_handler(State(state): State<Arc<AppState>>, Json(request): Json<RankRequest>) -> Response {
    let start_time = std::time::Instant::now();

    if request.candidates.len() > MAX_CANDIDATES {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            create_safe_error_response(
                "too_many_candidates",
                &format!("At most {MAX_CANDIDATES} candidates are accepted per request"),
                None,
            ),
        );
    }

    let patient = request.patient.normalized();
    let taxonomy = request.taxonomy.clone().or_else(|| {
        patient
            .diagnosis
            .as_deref()
            .map(|label| taxonomy_for_diagnosis(label).to_string())
    });
    let weights = request.weights.unwrap_or_default().normalized();

    let config = PipelineConfig {
        ranking: RankingConfig {
            weights,
            max_results: request.limit,
        },
        taxonomy,
        allow_partial: request.allow_partial,
    };

    let coverage = state.coverage.clone();
    let candidates = request.candidates;
    let scan_patient = patient.clone();

    // The scan is blocking I/O
    let joined = tokio::task::spawn_blocking(move || {
        let source = CoverageSource::open(&coverage)?;
        MatchPipeline::new(config).run(&scan_patient, candidates, source)
    })
    .await;

    let outcome = match joined {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return pipeline_error_response(&e),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                create_safe_error_response(
                    "internal_error",
                    "Ranking failed",
                    Some(&e.to_string()),
                ),
            )
        }
    };

    #[allow(clippy::cast_possible_truncation)] // Processing time won't exceed u64
    let processing_time = start_time.elapsed().as_millis() as u64;

    Json(serde_json::json!({
        "patient": patient,
        "results": outcome.ranked,
        "processing_info": {
            "candidates_considered": outcome.candidates_considered,
            "in_network": outcome.in_network,
            "scan": outcome.scan,
            "partial": outcome.is_partial(),
            "processing_time_ms": processing_time,
            "configuration": {
                "weights": weights,
                "limit": request.limit,
            }
        }
    }))
    .into_response()
}

/// Report the network status of a few identifiers
async fn coverage_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CoverageQuery>,
) -> Response {
    let ids: Vec<ProviderId> = query
        .npi
        .split(',')
        .map(ProviderId::new)
        .filter(|id| !id.is_empty())
        .collect();

    if ids.is_empty() || ids.len() > MAX_LOOKUP_IDS {
        return error_response(
            StatusCode::BAD_REQUEST,
            create_safe_error_response(
                "invalid_query",
                &format!("Provide between 1 and {MAX_LOOKUP_IDS} comma-separated identifiers"),
                None,
            ),
        );
    }

    let coverage = state.coverage.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let targets = TargetSet::new(ids);
        check_target_limit(targets.len())?;
        let source = CoverageSource::open(&coverage)?;
        MatchPipeline::new(PipelineConfig::default())
            .build_index(targets, source)
            .map_err(PipelineError::from)
    })
    .await;

    let (index, summary) = match joined {
        Ok(Ok((index, summary, _))) => (index, summary),
        Ok(Err(e)) => return pipeline_error_response(&e),
        Err(e) => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                create_safe_error_response("internal_error", "Lookup failed", Some(&e.to_string())),
            )
        }
    };

    let mut targets: Vec<&ProviderId> = index.targets().iter().collect();
    targets.sort();

    let providers: Vec<serde_json::Value> = targets
        .into_iter()
        .map(|id| {
            serde_json::json!({
                "npi": id,
                "network_status": index.status(id.as_str()),
                "groups": index.entry(id.as_str()).map(|e| e.groups.clone()).unwrap_or_default(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "providers": providers,
        "scan": summary,
    }))
    .into_response()
}

fn pipeline_error_response(error: &PipelineError) -> Response {
    match error {
        PipelineError::Validation(e) => error_response(
            StatusCode::BAD_REQUEST,
            create_safe_error_response("invalid_request", &e.to_string(), None),
        ),
        PipelineError::Scan(ScanError::SourceNotFound { .. }) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            create_safe_error_response(
                "coverage_unavailable",
                "Coverage data is unavailable",
                Some(&error.to_string()),
            ),
        ),
        PipelineError::Scan(ScanError::MalformedDocument { .. }) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            create_safe_error_response(
                "coverage_malformed",
                "Coverage data could not be read",
                Some(&error.to_string()),
            ),
        ),
    }
}
