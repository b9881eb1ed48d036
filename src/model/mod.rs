// Model 模块 - 模型客户端抽象与本地测试替身

pub mod client;
pub mod stub;
pub mod types;

pub use client::{DynModelClient, ModelClient};
pub use stub::{EchoModel, ScriptedModel, StaticModel};
pub use types::{
    GenerateRequest, MessagePart, MessageRole, ModelMessage, ModelReply, ToolDeclaration,
};
