use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::config::EnvConfig;
use crate::error::{MediFlowError, Result};
use crate::model::{GenerateRequest, MessagePart, MessageRole, ModelClient, ModelMessage, ModelReply};

use super::direct::build_http_client;
use super::wire::{
    decode_body, schema_to_wire, Content, FunctionCall, FunctionResponse, GenerateContentRequest,
    GenerateContentResponse, Part, ToolSection, WireFunctionDeclaration, WireGenerationConfig,
};
use super::{DEFAULT_BASE_URL, DEFAULT_MODEL, GEMINI_API_KEY_ENV};

/// 契约管线使用的模型客户端
///
/// 携带完整会话、生成参数、结构化输出约束与工具声明。
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: build_http_client(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = EnvConfig::get_env(GEMINI_API_KEY_ENV)?;
        Ok(Self::new(api_key, DEFAULT_MODEL))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url.trim_end_matches('/'),
            self.model,
            self.api_key
        )
    }

    fn build_request(&self, request: &GenerateRequest) -> GenerateContentRequest {
        let mut contents: Vec<Content> = request.history.iter().map(content_from_message).collect();
        if !request.prompt.is_empty() {
            contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![Part::text(&request.prompt)],
            });
        }

        // 结构化输出与工具声明互斥：带工具的请求不开 JSON 模式
        let (response_mime_type, response_schema) = if request.tools.is_empty() {
            match &request.output_schema {
                Some(schema) => (
                    Some("application/json".to_string()),
                    Some(schema_to_wire(schema)),
                ),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![ToolSection {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|tool| WireFunctionDeclaration {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: schema_to_wire(&tool.parameters),
                    })
                    .collect(),
            }])
        };

        GenerateContentRequest {
            contents,
            generation_config: Some(WireGenerationConfig {
                temperature: Some(request.temperature),
                response_mime_type,
                response_schema,
            }),
            tools,
        }
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    #[instrument(skip(self, request), fields(model = %self.model))]
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        let wants_json = request.output_schema.is_some() && request.tools.is_empty();
        let payload = self.build_request(&request);

        let response = self
            .client
            .post(self.endpoint())
            .json(&payload)
            .send()
            .await
            .map_err(|e| MediFlowError::Transport(format!("model request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| MediFlowError::Transport(format!("failed to read response body: {e}")))?;

        let decoded = decode_body(status, &text)?;
        interpret(decoded, wants_json)
    }
}

fn content_from_message(message: &ModelMessage) -> Content {
    match &message.part {
        MessagePart::Text(text) => Content {
            role: Some(wire_role(message.role).to_string()),
            parts: vec![Part::text(text)],
        },
        MessagePart::ToolCall { name, arguments } => Content {
            role: Some("model".to_string()),
            parts: vec![Part {
                function_call: Some(FunctionCall {
                    name: name.clone(),
                    args: arguments.clone(),
                }),
                ..Part::default()
            }],
        },
        MessagePart::ToolResult { name, output } => Content {
            role: Some("user".to_string()),
            parts: vec![Part {
                function_response: Some(FunctionResponse {
                    name: name.clone(),
                    response: output.clone(),
                }),
                ..Part::default()
            }],
        },
    }
}

fn wire_role(role: MessageRole) -> &'static str {
    match role {
        MessageRole::User => "user",
        MessageRole::Model => "model",
        MessageRole::Tool => "user",
    }
}

fn interpret(response: GenerateContentResponse, wants_json: bool) -> Result<ModelReply> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        return Err(MediFlowError::GenerationIncomplete(
            "model returned no candidates".to_string(),
        ));
    };
    let parts = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default();

    for part in &parts {
        if let Some(call) = &part.function_call {
            return Ok(ModelReply::ToolCall {
                name: call.name.clone(),
                arguments: call.args.clone(),
            });
        }
    }

    let Some(text) = parts.into_iter().find_map(|part| part.text) else {
        return Err(MediFlowError::GenerationIncomplete(
            "model candidate carried no text".to_string(),
        ));
    };

    if wants_json {
        let value: Value = serde_json::from_str(&text).map_err(|e| {
            MediFlowError::GenerationIncomplete(format!("model returned malformed JSON: {e}"))
        })?;
        Ok(ModelReply::Structured(value))
    } else {
        Ok(ModelReply::Text(text))
    }
}
