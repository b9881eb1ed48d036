use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::Schema;

/// 会话消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    Tool,
}

/// 会话消息：文本、模型发出的工具调用、或桥接层回填的工具结果
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePart {
    Text(String),
    ToolCall { name: String, arguments: Value },
    ToolResult { name: String, output: Value },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: MessageRole,
    pub part: MessagePart,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            part: MessagePart::Text(text.into()),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Model,
            part: MessagePart::Text(text.into()),
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            role: MessageRole::Model,
            part: MessagePart::ToolCall {
                name: name.into(),
                arguments,
            },
        }
    }

    pub fn tool_result(name: impl Into<String>, output: Value) -> Self {
        Self {
            role: MessageRole::Tool,
            part: MessagePart::ToolResult {
                name: name.into(),
                output,
            },
        }
    }
}

/// 提供给模型的工具声明（只含名称、描述和参数 Schema，不含处理函数）
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Schema,
}

#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// 本轮新的用户输入；为空表示最新回合已并入 history
    pub prompt: String,
    pub history: Vec<ModelMessage>,
    pub temperature: f32,
    pub output_schema: Option<Schema>,
    pub tools: Vec<ToolDeclaration>,
}

fn default_temperature() -> f32 {
    0.2
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            temperature: default_temperature(),
            output_schema: None,
            tools: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ModelMessage>) -> Self {
        self.history = history;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_output_schema(mut self, schema: Schema) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }
}

/// 模型一次调用的回复
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    /// 自由文本回复
    Text(String),
    /// 结构化回复（要求 output_schema 时）
    Structured(Value),
    /// 模型决定调用某个工具
    ToolCall { name: String, arguments: Value },
}

impl ModelReply {
    /// 把回复转成 JSON 值：结构化回复原样返回，文本包装为 JSON 字符串
    pub fn into_value(self) -> Option<Value> {
        match self {
            ModelReply::Structured(value) => Some(value),
            ModelReply::Text(text) => Some(Value::String(text)),
            ModelReply::ToolCall { .. } => None,
        }
    }
}
