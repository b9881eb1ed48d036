use crate::error::MediFlowError;
use thiserror::Error;

/// Schema 错误类型
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema validation failed: {message}")]
    Validation { message: String, path: Vec<String> },
}

impl From<SchemaError> for MediFlowError {
    fn from(error: SchemaError) -> Self {
        match error {
            SchemaError::Validation { message, path } => {
                let path = if path.is_empty() {
                    "$".to_string()
                } else {
                    path.join(".")
                };
                MediFlowError::Validation { path, message }
            }
        }
    }
}
