//! 生成式 AI 提供方
//!
//! 中继端点背后的外部模型调用。模型的行为不受本系统控制，只约定两种结果：
//! 符合声明 schema 的 JSON 文本，或失败。

use anyhow::{Context, Result};
use async_trait::async_trait;
use radio_core::{CaseClassification, CaseSummary, SemanticSearchResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// 结构化输出的内容生成接口
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// 生成符合 `schema` 的 JSON 文本；模型未返回文本时为 `None`
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Option<String>>;
}

/// Gemini `generateContent` 提供方
pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    async fn generate_json(&self, prompt: &str, schema: &Value) -> Result<Option<String>> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
            }
        });

        debug!("Calling generative model {}", self.model);
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach generative model")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Generative model returned {}: {}", status, detail));
        }

        let payload: Value = response
            .json()
            .await
            .context("Generative model returned a non-JSON body")?;

        Ok(extract_text(&payload))
    }
}

/// 拼接首个候选的全部文本片段
fn extract_text(payload: &Value) -> Option<String> {
    let parts = payload
        .pointer("/candidates/0/content/parts")?
        .as_array()?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// 病例分析服务：构造提示词与输出 schema，并解析模型返回的 JSON
#[derive(Clone)]
pub struct CaseAnalyst {
    provider: Arc<dyn GenerativeProvider>,
}

impl CaseAnalyst {
    pub fn new(provider: Arc<dyn GenerativeProvider>) -> Self {
        Self { provider }
    }

    /// 根据临床记录建议专业、难度与摘要
    pub async fn analyze_case(&self, clinical_note: &str) -> Result<Option<CaseClassification>> {
        let prompt = format!(
            "Analyse la note clinique suivante en radiologie et suggère la spécialité et le niveau de difficulté.\n\
             Note clinique: \"{}\"",
            clinical_note
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "specialty": { "type": "STRING", "description": "La spécialité radiologique" },
                "difficulty": { "type": "STRING", "description": "Le niveau de difficulté suggéré" },
                "summary": { "type": "STRING", "description": "Un court résumé professionnel du cas." }
            },
            "required": ["specialty", "difficulty", "summary"]
        });

        let Some(text) = self.provider.generate_json(&prompt, &schema).await? else {
            return Ok(None);
        };
        let classification = serde_json::from_str(text.trim())
            .context("Model output does not match the classification schema")?;

        info!("Case analysis completed");
        Ok(Some(classification))
    }

    /// 在给定病例中挑选与查询语义最相关的三个
    pub async fn semantic_search(
        &self,
        query: &str,
        cases: &[CaseSummary],
    ) -> Result<Option<SemanticSearchResult>> {
        if cases.is_empty() {
            return Ok(None);
        }

        let cases_json = serde_json::to_string(cases)?;
        let prompt = format!(
            "Tu es un expert en radiologie. Analyse la requête de l'utilisateur: \"{}\".\n\
             Parmi la liste de cas suivante, identifie les 3 cas les plus pertinents sémantiquement, \
             même si les mots exacts ne correspondent pas.\n\
             Liste des cas: {}",
            query, cases_json
        );
        let schema = json!({
            "type": "OBJECT",
            "properties": {
                "matches": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": { "type": "STRING" },
                            "reason": { "type": "STRING", "description": "Pourquoi ce cas est pertinent ?" }
                        },
                        "required": ["id", "reason"]
                    }
                },
                "suggestedKeywords": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Mots-clés médicaux reliés à la recherche."
                }
            },
            "required": ["matches", "suggestedKeywords"]
        });

        let Some(text) = self.provider.generate_json(&prompt, &schema).await? else {
            return Ok(None);
        };
        let result: SemanticSearchResult = serde_json::from_str(text.trim())
            .context("Model output does not match the semantic search schema")?;

        info!(
            "Semantic search for {:?} returned {} match(es)",
            query,
            result.matches.len()
        );
        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedProvider {
        reply: Option<String>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeProvider for CannedProvider {
        async fn generate_json(&self, _prompt: &str, _schema: &Value) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn canned_analyst(reply: Option<&str>) -> (CaseAnalyst, Arc<CannedProvider>) {
        let provider = Arc::new(CannedProvider {
            reply: reply.map(str::to_string),
            calls: AtomicUsize::new(0),
        });
        (CaseAnalyst::new(provider.clone()), provider)
    }

    #[test]
    fn test_extract_text() {
        let payload = json!({
            "candidates": [{ "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }]
        });
        assert_eq!(extract_text(&payload).as_deref(), Some("{\"a\":1}"));
        assert_eq!(extract_text(&json!({ "candidates": [] })), None);
    }

    #[tokio::test]
    async fn test_analyze_case_parses_model_output() {
        let (analyst, _) = canned_analyst(Some(
            r#" {"specialty":"Neuro","difficulty":"Avancé","summary":"AVC ischémique"} "#,
        ));
        let result = analyst.analyze_case("Hémiparésie droite").await.unwrap().unwrap();
        assert_eq!(result.specialty, "Neuro");
        assert_eq!(result.summary, "AVC ischémique");
    }

    #[tokio::test]
    async fn test_analyze_case_rejects_malformed_output() {
        let (analyst, _) = canned_analyst(Some(r#"{"specialty":"Neuro"}"#));
        assert!(analyst.analyze_case("note").await.is_err());

        let (analyst, _) = canned_analyst(None);
        assert!(analyst.analyze_case("note").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_semantic_search_skips_model_for_empty_cases() {
        let (analyst, provider) = canned_analyst(Some(r#"{"matches":[],"suggestedKeywords":[]}"#));
        assert!(analyst.semantic_search("fracture", &[]).await.unwrap().is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
