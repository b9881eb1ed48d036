// Schema 模块 - 输入/输出契约的声明与校验

pub mod error;
pub mod schema;
pub mod validation;

pub use error::SchemaError;
pub use schema::{Schema, SchemaKind};
pub use validation::validate_value;

use serde_json::Value;

/// 校验值是否符合 Schema，失败时给出指向第一个不符合字段的错误
pub fn validate(schema: &Schema, value: &Value) -> crate::error::Result<()> {
    validate_value(schema, value, &mut Vec::new()).map_err(Into::into)
}
