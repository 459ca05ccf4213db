//! AI 代理客户端
//!
//! 通过中继端点调用外部模型。所有失败（网络、非 2xx、响应格式错误）都折叠为 `None`，
//! 调用方把 `None` 当作“没有建议”，而不是致命错误。

use anyhow::{Context, Result};
use async_trait::async_trait;
use radio_core::{CaseClassification, CaseSummary, SemanticSearchResult};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// 中继端点支持的动作
const ACTION_ANALYZE_CASE: &str = "analyzeCase";
const ACTION_SEMANTIC_SEARCH: &str = "semanticSearch";

/// AI 辅助接口
#[async_trait]
pub trait AiAssistant: Send + Sync {
    /// 根据临床记录给出分类建议
    async fn classify(&self, clinical_note: &str) -> Option<CaseClassification>;

    /// 对病例做语义相关性排序；病例列表为空时不发起调用
    async fn rank(&self, query: &str, cases: &[CaseSummary]) -> Option<SemanticSearchResult>;
}

/// 中继端点客户端
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 发送 `{action, payload}` 请求，响应体为 `null` 时返回 `None`
    async fn call<T: DeserializeOwned>(&self, action: &str, payload: Value) -> Result<Option<T>> {
        debug!("Sending {} request to {}", action, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "action": action, "payload": payload }))
            .send()
            .await
            .context("AI relay unreachable")?;

        let status = response.status();
        if !status.is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let message = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(anyhow::anyhow!("AI relay returned {}: {}", status, message));
        }

        response
            .json::<Option<T>>()
            .await
            .context("AI relay returned a malformed body")
    }
}

#[async_trait]
impl AiAssistant for RelayClient {
    async fn classify(&self, clinical_note: &str) -> Option<CaseClassification> {
        match self
            .call(ACTION_ANALYZE_CASE, json!({ "clinicalNote": clinical_note }))
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Analyze case failed: {:#}", e);
                None
            }
        }
    }

    async fn rank(&self, query: &str, cases: &[CaseSummary]) -> Option<SemanticSearchResult> {
        if cases.is_empty() {
            debug!("Semantic search skipped: no cases to rank");
            return None;
        }

        match self
            .call(
                ACTION_SEMANTIC_SEARCH,
                json!({ "query": query, "casesSummary": cases }),
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                warn!("Semantic search failed: {:#}", e);
                None
            }
        }
    }
}
