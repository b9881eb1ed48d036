use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::client::ModelClient;
use super::types::{GenerateRequest, ModelReply};
use crate::error::Result;

/// 本地回显模型：把提示词原样回显，便于离线调试
#[derive(Default, Clone)]
pub struct EchoModel;

#[async_trait]
impl ModelClient for EchoModel {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        Ok(ModelReply::Text(format!("[Echo] {}", request.prompt)))
    }
}

/// 固定回复模型：每次调用都返回同一条回复
#[derive(Clone)]
pub struct StaticModel {
    reply: ModelReply,
}

impl StaticModel {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: ModelReply::Text(text.into()),
        }
    }

    pub fn structured(value: Value) -> Self {
        Self {
            reply: ModelReply::Structured(value),
        }
    }
}

#[async_trait]
impl ModelClient for StaticModel {
    async fn generate(&self, _request: GenerateRequest) -> Result<ModelReply> {
        Ok(self.reply.clone())
    }
}

/// 脚本化模型：按入队顺序弹出回复，并记录收到的每个请求
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelReply>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, reply: ModelReply) {
        self.replies.lock().push_back(Ok(reply));
    }

    pub fn enqueue_error(&self, error: crate::error::MediFlowError) {
        self.replies.lock().push_back(Err(error));
    }

    /// 已收到请求的快照
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply> {
        self.requests.lock().push(request);
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("scripted model has no reply queued").into()))
    }
}
