//! AI 中继端点
//!
//! 单一 POST 端点接收 `{action, payload}`，委托给外部模型并原样返回 JSON 结果；
//! 失败时返回 4xx/5xx 与 `{error}`。

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use radio_core::CaseSummary;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::provider::CaseAnalyst;

/// 中继端点路径
pub const RELAY_PATH: &str = "/api/gemini";

/// 中继状态
#[derive(Clone)]
pub struct RelayState {
    analyst: Arc<CaseAnalyst>,
}

impl RelayState {
    pub fn new(analyst: CaseAnalyst) -> Self {
        Self {
            analyst: Arc::new(analyst),
        }
    }
}

/// 中继请求
#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub action: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeCasePayload {
    clinical_note: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SemanticSearchPayload {
    query: String,
    #[serde(default)]
    cases_summary: Vec<CaseSummary>,
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// 中继处理器
pub async fn relay_handler(
    State(state): State<RelayState>,
    request: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => {
            warn!("Rejected relay request: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Invalid request body");
        }
    };

    info!("Relay action: {}", request.action);

    match request.action.as_str() {
        "analyzeCase" => {
            let payload: AnalyzeCasePayload = match serde_json::from_value(request.payload) {
                Ok(payload) => payload,
                Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid payload"),
            };

            match state.analyst.analyze_case(&payload.clinical_note).await {
                Ok(result) => Json(result).into_response(),
                Err(e) => {
                    error!("Analyze case failed: {:#}", e);
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Gemini error")
                }
            }
        }
        "semanticSearch" => {
            let payload: SemanticSearchPayload = match serde_json::from_value(request.payload) {
                Ok(payload) => payload,
                Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid payload"),
            };

            match state
                .analyst
                .semantic_search(&payload.query, &payload.cases_summary)
                .await
            {
                Ok(result) => Json(result).into_response(),
                Err(e) => {
                    error!("Semantic search failed: {:#}", e);
                    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Gemini error")
                }
            }
        }
        other => {
            warn!("Unknown relay action: {}", other);
            error_response(StatusCode::BAD_REQUEST, "Unknown action")
        }
    }
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}

/// 健康检查
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// 创建中继路由
pub fn create_relay_routes(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(RELAY_PATH, post(relay_handler).fallback(method_not_allowed))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// 中继服务器
pub struct RelayServer {
    app: Router,
}

impl RelayServer {
    pub fn new(state: RelayState) -> Self {
        Self {
            app: create_relay_routes(state),
        }
    }

    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        info!("Starting AI relay on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::GenerativeProvider;
    use async_trait::async_trait;

    struct EchoProvider;

    #[async_trait]
    impl GenerativeProvider for EchoProvider {
        async fn generate_json(&self, _prompt: &str, _schema: &Value) -> anyhow::Result<Option<String>> {
            Ok(None)
        }
    }

    async fn spawn() -> String {
        let app = create_relay_routes(RelayState::new(CaseAnalyst::new(Arc::new(EchoProvider))));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_unknown_action_is_bad_request() {
        let base = spawn().await;
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, RELAY_PATH))
            .json(&json!({ "action": "translate", "payload": {} }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Unknown action");
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let base = spawn().await;
        let response = reqwest::get(format!("{}{}", base, RELAY_PATH)).await.unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], "Method not allowed");
    }

    #[tokio::test]
    async fn test_empty_model_output_is_null() {
        let base = spawn().await;
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, RELAY_PATH))
            .json(&json!({ "action": "analyzeCase", "payload": { "clinicalNote": "Toux" } }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_bad_request() {
        let base = spawn().await;
        let response = reqwest::Client::new()
            .post(format!("{}{}", base, RELAY_PATH))
            .json(&json!({ "action": "analyzeCase", "payload": { "note": 3 } }))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "healthy");
    }
}
