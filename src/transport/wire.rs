use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{MediFlowError, Result};
use crate::schema::{Schema, SchemaKind};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<WireGenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSection>>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ToolSection {
    pub function_declarations: Vec<WireFunctionDeclaration>,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct WireFunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// 解码上游响应体
///
/// 响应里带 error 对象或 HTTP 非成功时，原样保留上游的 code/status/message。
pub(crate) fn decode_body(
    status: reqwest::StatusCode,
    body: &str,
) -> Result<GenerateContentResponse> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(MediFlowError::Upstream {
            code: envelope.error.code,
            status: envelope.error.status,
            message: envelope.error.message,
        });
    }
    if !status.is_success() {
        return Err(MediFlowError::Upstream {
            code: i64::from(status.as_u16()),
            status: status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_string(),
            message: truncate_body(body),
        });
    }
    serde_json::from_str(body)
        .map_err(|e| MediFlowError::Transport(format!("failed to decode model response: {e}")))
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() > 500 {
        let head: String = body.chars().take(500).collect();
        format!("{head}...")
    } else {
        body.to_string()
    }
}

/// 把契约 Schema 转成上游的 responseSchema 形式（大写类型名）
pub(crate) fn schema_to_wire(schema: &Schema) -> Value {
    let mut wire = match &schema.kind {
        SchemaKind::Null => json!({ "nullable": true }),
        SchemaKind::Boolean => json!({ "type": "BOOLEAN" }),
        SchemaKind::Integer => json!({ "type": "INTEGER" }),
        SchemaKind::Number => json!({ "type": "NUMBER" }),
        SchemaKind::String => json!({ "type": "STRING" }),
        SchemaKind::Enum { values } => json!({ "type": "STRING", "enum": values }),
        SchemaKind::Array { items } => json!({
            "type": "ARRAY",
            "items": schema_to_wire(items),
        }),
        SchemaKind::Object {
            properties,
            required,
            ..
        } => {
            let mut body = json!({
                "type": "OBJECT",
                "properties": properties
                    .iter()
                    .map(|(name, sub)| (name.clone(), schema_to_wire(sub)))
                    .collect::<serde_json::Map<String, Value>>(),
            });
            if !required.is_empty() {
                body["required"] = json!(required);
            }
            body
        }
    };
    if let Some(description) = &schema.description {
        wire["description"] = json!(description);
    }
    wire
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn error_envelope_preserves_upstream_fields() {
        let body = r#"{"error":{"code":429,"message":"Resource has been exhausted","status":"RESOURCE_EXHAUSTED"}}"#;
        let err = decode_body(StatusCode::TOO_MANY_REQUESTS, body).unwrap_err();
        match err {
            MediFlowError::Upstream {
                code,
                status,
                message,
            } => {
                assert_eq!(code, 429);
                assert_eq!(status, "RESOURCE_EXHAUSTED");
                assert_eq!(message, "Resource has been exhausted");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn non_success_without_error_object_still_maps_to_upstream() {
        let err = decode_body(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>").unwrap_err();
        match err {
            MediFlowError::Upstream { code, status, .. } => {
                assert_eq!(code, 502);
                assert_eq!(status, "Bad Gateway");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[test]
    fn success_body_decodes_candidates() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"hello"}]},"finishReason":"STOP"}]}"#;
        let response = decode_body(StatusCode::OK, body).expect("decode");
        assert_eq!(response.candidates.len(), 1);
        let content = response.candidates[0].content.as_ref().expect("content");
        assert_eq!(content.parts[0].text.as_deref(), Some("hello"));
    }

    #[test]
    fn wire_schema_uses_uppercase_type_names() {
        let schema = Schema::object(
            [
                ("topic", Schema::string()),
                ("items", Schema::array(Schema::string())),
                ("tier", Schema::enumeration(["Low", "Medium", "High"])),
            ],
            &["topic", "items"],
        );
        let wire = schema_to_wire(&schema);
        assert_eq!(wire["type"], "OBJECT");
        assert_eq!(wire["properties"]["topic"]["type"], "STRING");
        assert_eq!(wire["properties"]["items"]["type"], "ARRAY");
        assert_eq!(wire["properties"]["items"]["items"]["type"], "STRING");
        assert_eq!(wire["properties"]["tier"]["enum"][2], "High");
        assert!(wire["required"]
            .as_array()
            .expect("required")
            .contains(&json!("topic")));
    }
}
