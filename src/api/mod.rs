//! HTTP API for health checks, chain listing and flow verification

use crate::chain::{ChainRegistry, ExplorerClient};
use crate::config::ApiConfig;
use crate::error::{TracerError, TracerResult};
use crate::flow::{FlowController, FlowOutcome, FlowRequest, FlowStatus, MatcherConfig};
use crate::reactive::ReactiveRpc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ChainRegistry>,
    pub explorer: Arc<dyn ExplorerClient>,
    pub reactive: Arc<dyn ReactiveRpc>,
    pub matcher: MatcherConfig,
    pub shutdown: Arc<RwLock<bool>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/chains", get(get_chains))
        .route("/flows", post(track_flow))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the HTTP API server
pub async fn run_server(config: ApiConfig, state: AppState) -> TracerResult<()> {
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| TracerError::Config(format!("Cannot bind API on {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| TracerError::Internal(format!("API server failed: {}", e)))?;

    Ok(())
}

/// Health check endpoint - basic liveness
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List configured chains
async fn get_chains(State(state): State<AppState>) -> impl IntoResponse {
    let chains = state
        .registry
        .chains()
        .map(|c| ChainSummary {
            chain_id: c.chain_id,
            name: c.name.clone(),
            explorer_url: c.explorer_url.clone(),
            can_be_destination: c.supports_callbacks(),
        })
        .collect();

    Json(ChainsResponse { chains })
}

/// Verify one flow end to end
async fn track_flow(State(state): State<AppState>, Json(request): Json<FlowRequest>) -> Response {
    let controller = match FlowController::new(
        request,
        &state.registry,
        state.explorer.clone(),
        state.reactive.clone(),
    ) {
        Ok(controller) => controller
            .with_matcher_config(state.matcher)
            .with_shutdown(state.shutdown.clone()),
        Err(e) => {
            let code = if e.is_construction_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            return (
                code,
                Json(ErrorResponse {
                    error: e.to_string(),
                    kind: e.kind(),
                }),
            )
                .into_response();
        }
    };

    let status = controller.track_flow().await;
    let outcome = status.outcome();
    info!(
        run_id = %controller.run_id(),
        origin_tx = %controller.request().origin_tx_hash,
        ?outcome,
        "Flow request served"
    );

    Json(FlowResponse {
        run_id: controller.run_id(),
        outcome,
        status,
    })
    .into_response()
}

// Response types

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChainSummary {
    chain_id: u64,
    name: String,
    explorer_url: String,
    can_be_destination: bool,
}

#[derive(Serialize)]
struct ChainsResponse {
    chains: Vec<ChainSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FlowResponse {
    run_id: Uuid,
    outcome: FlowOutcome,
    status: FlowStatus,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::explorer::MockExplorerClient;
    use crate::chain::registry::test_chain;
    use crate::flow::request::test_request;
    use crate::reactive::rpc::MockReactiveRpc;
    use serde_json::Value;

    fn state(explorer: MockExplorerClient) -> AppState {
        AppState {
            registry: Arc::new(ChainRegistry::new(vec![
                test_chain(11155111, Some("0xproxy")),
                test_chain(137, None),
            ])),
            explorer: Arc::new(explorer),
            reactive: Arc::new(MockReactiveRpc::new()),
            matcher: MatcherConfig::default(),
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chains_listing() {
        let response = get_chains(State(state(MockExplorerClient::new())))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let chains = body["chains"].as_array().unwrap();
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0]["chainId"], 137);
        assert_eq!(chains[0]["canBeDestination"], false);
        assert_eq!(chains[1]["canBeDestination"], true);
    }

    #[tokio::test]
    async fn test_rejected_request_is_bad_request() {
        let response = track_flow(
            State(state(MockExplorerClient::new())),
            Json(test_request(11155111, 137)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["kind"], "destination_callback_unsupported");
    }

    #[tokio::test]
    async fn test_halted_flow_returns_status() {
        let mut explorer = MockExplorerClient::new();
        explorer
            .expect_fetch_transaction_receipt()
            .times(1)
            .returning(|_, _| Ok(None));

        let response = track_flow(State(state(explorer)), Json(test_request(11155111, 11155111))).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["outcome"]["state"], "failed");
        assert_eq!(body["outcome"]["step"], "originTransaction");
        assert_eq!(body["status"]["originTransaction"]["status"], "error");
        assert_eq!(body["status"]["eventEmission"]["status"], "pending");
        assert!(body["runId"].is_string());
    }
}
