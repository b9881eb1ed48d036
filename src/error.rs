use thiserror::Error;

pub type Result<T> = std::result::Result<T, MediFlowError>;

#[derive(Debug, Error)]
pub enum MediFlowError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("validation failed at `{path}`: {message}")]
    Validation { path: String, message: String },
    #[error("generation incomplete: {0}")]
    GenerationIncomplete(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("upstream error {code} ({status}): {message}")]
    Upstream {
        code: i64,
        status: String,
        message: String,
    },
    #[error("{message}")]
    AgentFailure { message: String },
    #[error("flow `{0}` not registered")]
    UnknownFlow(String),
    #[error("tool `{0}` not declared for this unit")]
    UnknownTool(String),
    #[error("maximum tool rounds {0} exceeded")]
    ToolRoundsExceeded(u32),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MediFlowError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn agent_failure(message: impl Into<String>) -> Self {
        Self::AgentFailure {
            message: message.into(),
        }
    }
}
