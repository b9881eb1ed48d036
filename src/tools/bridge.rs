use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::error::{MediFlowError, Result};
use crate::flow::spec::FlowSpec;
use crate::flow::unit::DEFAULT_FAILURE_MESSAGE;
use crate::model::{DynModelClient, GenerateRequest, ModelMessage, ModelReply, ToolDeclaration};
use crate::schema;
use crate::state::SessionContext;

use super::ToolSpec;

const DEFAULT_MAX_TOOL_ROUNDS: u32 = 4;

/// 会话执行单元
///
/// 与 [`crate::flow::FlowUnit`] 同样的契约管线，另外把工具声明交给模型。
/// 模型回复工具调用时，桥接层查找工具、校验参数与输出，把调用和结果
/// 合并进会话记录后再次请求模型，直到得到最终回复或用尽轮次预算。
pub struct ChatUnit {
    spec: Arc<FlowSpec>,
    model: DynModelClient,
    tools: Vec<ToolSpec>,
    max_tool_rounds: u32,
    failure_message: String,
}

impl ChatUnit {
    pub fn new(spec: Arc<FlowSpec>, model: DynModelClient) -> Result<Self> {
        spec.check()?;
        Ok(Self {
            spec,
            model,
            tools: Vec::new(),
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        })
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tools.push(tool);
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: u32) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    pub async fn invoke(&self, input: Value) -> Result<Value> {
        self.invoke_with_history(input, Vec::new()).await
    }

    /// 在会话上下文中执行一轮：载入既有记录，成功后把本轮问答写回存储
    ///
    /// 用户回合存的是实际发给模型的渲染后提示词，后续轮次原样续传。
    pub async fn invoke_in_session(
        &self,
        input: Value,
        session: &SessionContext,
    ) -> Result<Value> {
        let history = session.history().await?;
        let prompt = self.spec.template.render(&input);
        let output = self.invoke_with_history(input, history).await?;

        session.push_message(ModelMessage::user(prompt)).await?;
        let reply = match &output {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        session.push_message(ModelMessage::model(reply)).await?;
        Ok(output)
    }

    /// 携带既有会话记录执行一轮对话
    #[instrument(skip(self, input, history), fields(flow = %self.spec.name))]
    pub async fn invoke_with_history(
        &self,
        input: Value,
        mut history: Vec<ModelMessage>,
    ) -> Result<Value> {
        schema::validate(&self.spec.input_schema, &input)?;

        let declarations: Vec<ToolDeclaration> =
            self.tools.iter().map(ToolSpec::declaration).collect();
        // 当前用户回合：首轮作为 prompt 发出，触发工具后并入会话记录
        let mut pending_prompt = Some(self.spec.template.render(&input));
        let mut rounds = 0u32;

        loop {
            let request = GenerateRequest::new(pending_prompt.clone().unwrap_or_default())
                .with_history(history.clone())
                .with_temperature(self.spec.generation.temperature)
                .with_output_schema(self.spec.output_schema.clone())
                .with_tools(declarations.clone());

            let reply = match self.model.generate(request).await {
                Ok(reply) => reply,
                Err(error) => return Err(self.mask("model call failed", error)),
            };

            let output = match reply {
                ModelReply::ToolCall { name, arguments } => {
                    if rounds >= self.max_tool_rounds {
                        let error = MediFlowError::ToolRoundsExceeded(self.max_tool_rounds);
                        return Err(self.mask("tool round budget exhausted", error));
                    }
                    rounds += 1;
                    tracing::debug!(tool = %name, round = rounds, "model requested tool");

                    let Some(tool) = self.tools.iter().find(|tool| tool.name == name) else {
                        let error = MediFlowError::UnknownTool(name);
                        return Err(self.mask("tool dispatch failed", error));
                    };
                    let result = match tool.fire(arguments.clone()).await {
                        Ok(result) => result,
                        Err(error) => return Err(self.mask("tool invocation failed", error)),
                    };

                    if let Some(text) = pending_prompt.take() {
                        history.push(ModelMessage::user(text));
                    }
                    history.push(ModelMessage::tool_call(&tool.name, arguments));
                    history.push(ModelMessage::tool_result(&tool.name, result));
                    continue;
                }
                ModelReply::Text(text) => Value::String(text),
                ModelReply::Structured(value) => value,
            };

            if let Err(error) = schema::validate(&self.spec.output_schema, &output) {
                return Err(self.mask("model output failed contract validation", error));
            }
            return Ok(output);
        }
    }

    fn mask(&self, stage: &str, error: MediFlowError) -> MediFlowError {
        tracing::error!(flow = %self.spec.name, error = %error, "{}", stage);
        MediFlowError::AgentFailure {
            message: self.failure_message.clone(),
        }
    }
}
