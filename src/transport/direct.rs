use std::time::Duration;

use serde_json::json;
use tracing::instrument;

use crate::config::EnvConfig;
use crate::error::{MediFlowError, Result};

use super::wire::{decode_body, GenerateContentResponse};
use super::{DEFAULT_BASE_URL, DEFAULT_MODEL, GEMINI_API_KEY_ENV};

/// 候选为空或没有文本时返回的固定答复
pub const FALLBACK_REPLY: &str =
    "Sorry, I couldn't come up with a response this time. Please try asking again.";

/// 直连客户端
///
/// 绕开契约管线的逃生通道：一段裸文本进、一段裸文本出，不做 Schema
/// 校验也不做失败掩蔽，上游错误的 code/status/message 原样抛给调用方。
/// 只供手动调用，不接入编排。
pub struct DirectClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DirectClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// 从 GEMINI_API_KEY 环境变量取密钥；未设置则报配置错误
    pub fn from_env() -> Result<Self> {
        let api_key = EnvConfig::get_env(GEMINI_API_KEY_ENV)?;
        Ok(Self::new(api_key, DEFAULT_MODEL))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 单轮直连调用：最小请求体，只有一段用户文本
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    pub async fn call_direct(&self, prompt: &str) -> Result<String> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| MediFlowError::Transport(format!("direct request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MediFlowError::Transport(format!("failed to read response body: {e}")))?;

        let payload = decode_body(status, &text)?;
        Ok(reply_from_response(payload))
    }
}

pub(crate) fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
        .expect("Failed to build HTTP client with custom config")
}

/// 取第一个候选的第一段文本；任何一环缺失都退回固定答复
fn reply_from_response(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .unwrap_or_else(|| FALLBACK_REPLY.to_string())
}
