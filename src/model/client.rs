use std::sync::Arc;

use async_trait::async_trait;

use super::types::{GenerateRequest, ModelReply};
use crate::error::Result;

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<ModelReply>;
}

pub type DynModelClient = Arc<dyn ModelClient>;
