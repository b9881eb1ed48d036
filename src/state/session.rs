use std::sync::Arc;

use crate::error::{MediFlowError, Result};
use crate::model::ModelMessage;

use super::store::ContextStore;

const SESSION_PREFIX: &str = "session";

/// 会话上下文
///
/// 运行模式与会话记录都落在注入的存储里，按 session_id 隔离。
#[derive(Clone)]
pub struct SessionContext {
    session_id: String,
    store: Arc<dyn ContextStore>,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>, store: Arc<dyn ContextStore>) -> Self {
        Self {
            session_id: session_id.into(),
            store,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn key(&self, field: &str) -> String {
        format!("{SESSION_PREFIX}:{}:{field}", self.session_id)
    }

    /// 当前运行模式；未设置过则为缺席
    pub async fn mode(&self) -> Result<Option<String>> {
        self.store.get(&self.key("mode")).await
    }

    pub async fn set_mode(&self, mode: impl Into<String>) -> Result<()> {
        self.store.set(&self.key("mode"), mode.into()).await
    }

    /// 会话记录，按时间顺序
    pub async fn history(&self) -> Result<Vec<ModelMessage>> {
        let Some(raw) = self.store.get(&self.key("history")).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| MediFlowError::Serialization(e.to_string()))
    }

    /// 追加一条消息。读改写，不保证跨进程原子性。
    pub async fn push_message(&self, message: ModelMessage) -> Result<()> {
        let mut history = self.history().await?;
        history.push(message);
        let raw = serde_json::to_string(&history)
            .map_err(|e| MediFlowError::Serialization(e.to_string()))?;
        self.store.set(&self.key("history"), raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.delete(&self.key("mode")).await?;
        self.store.delete(&self.key("history")).await
    }
}
