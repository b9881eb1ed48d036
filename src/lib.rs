pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod flows;
pub mod model;
pub mod pipeline;
pub mod schema;
pub mod state;
pub mod template;
pub mod tools;
pub mod transport;
pub mod utils;

pub use cli::{contract_exports, ContractExportEntry};
pub use config::EnvConfig;
pub use error::{MediFlowError, Result};
pub use flow::{
    global_registry, install_registry, ContractRegistry, FlowSpec, FlowUnit, GenerationConfig,
    OutputRule,
};
pub use model::{
    DynModelClient, EchoModel, GenerateRequest, MessagePart, MessageRole, ModelClient,
    ModelMessage, ModelReply, ScriptedModel, StaticModel, ToolDeclaration,
};
pub use pipeline::{first_match, DynInvokable, Invokable, Pipeline, PipelineRun, PipelineStep};
pub use schema::{validate, Schema, SchemaError, SchemaKind};
pub use state::{ContextStore, MemoryStore, SessionContext};
pub use template::{PromptTemplate, TemplateError};
pub use tools::{handler_from_fn, ChatUnit, DynToolHandler, ToolHandler, ToolSpec};
pub use transport::{DirectClient, GeminiClient, FALLBACK_REPLY};
pub use utils::LoggingConfig;
