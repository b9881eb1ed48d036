// Tools 模块 - 工具声明与调用桥接

pub mod bridge;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub use bridge::ChatUnit;

use crate::error::Result;
use crate::flow::FlowUnit;
use crate::model::ToolDeclaration;
use crate::schema::{self, Schema};

/// 工具处理函数
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value) -> Result<Value>;
}

pub type DynToolHandler = Arc<dyn ToolHandler>;

struct FnHandler<F> {
    handler: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send,
{
    async fn call(&self, arguments: Value) -> Result<Value> {
        (self.handler)(arguments).await
    }
}

/// 把异步闭包包装成工具处理函数
pub fn handler_from_fn<F, Fut>(handler: F) -> DynToolHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { handler })
}

struct UnitHandler {
    unit: Arc<FlowUnit>,
}

#[async_trait]
impl ToolHandler for UnitHandler {
    async fn call(&self, arguments: Value) -> Result<Value> {
        self.unit.invoke(arguments).await
    }
}

/// 工具定义：名称、描述、参数与输出 Schema、处理函数
///
/// 是否调用工具由模型决定；桥接层只保证参数和输出的结构校验。
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    handler: DynToolHandler,
}

impl ToolSpec {
    /// 把一个 Flow 单元封装成工具
    ///
    /// 工具名与输入/输出 Schema 逐字取自单元契约，调用委托给
    /// [`FlowUnit::invoke`]；契约不能被收窄或放宽。
    pub fn from_unit(unit: Arc<FlowUnit>, description: impl Into<String>) -> Self {
        let spec = unit.spec().clone();
        Self {
            name: spec.name,
            description: description.into(),
            input_schema: spec.input_schema,
            output_schema: spec.output_schema,
            handler: Arc::new(UnitHandler { unit }),
        }
    }

    /// 自由形式的工具定义，处理函数不经过 Flow 管线。
    /// 封装 Flow 单元时用 [`ToolSpec::from_unit`]，保证契约一致。
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Schema,
        output_schema: Schema,
        handler: DynToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            output_schema,
            handler,
        }
    }

    /// 提供给模型的声明视图
    pub fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.input_schema.clone(),
        }
    }

    /// 执行工具：校验参数 → 调用处理函数 → 校验输出
    pub async fn fire(&self, arguments: Value) -> Result<Value> {
        schema::validate(&self.input_schema, &arguments)?;
        debug!(tool = %self.name, "firing tool");
        let output = self.handler.call(arguments).await?;
        schema::validate(&self.output_schema, &output)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediFlowError;
    use serde_json::json;

    fn lookup_tool() -> ToolSpec {
        ToolSpec::new(
            "drug_lookup",
            "Look up a drug by name",
            Schema::object([("name", Schema::string())], &["name"]),
            Schema::object([("summary", Schema::string())], &["summary"]),
            handler_from_fn(|arguments| async move {
                let name = arguments["name"].as_str().unwrap_or_default().to_string();
                Ok(json!({ "summary": format!("{name}: sample entry") }))
            }),
        )
    }

    #[tokio::test]
    async fn fire_validates_arguments() {
        let tool = lookup_tool();
        let err = tool.fire(json!({})).await.unwrap_err();
        assert!(matches!(err, MediFlowError::Validation { .. }));
    }

    #[tokio::test]
    async fn fire_validates_handler_output() {
        let tool = ToolSpec::new(
            "broken",
            "Always returns the wrong shape",
            Schema::object([("query", Schema::string())], &[]),
            Schema::object([("summary", Schema::string())], &["summary"]),
            handler_from_fn(|_| async move { Ok(json!("not an object")) }),
        );
        let err = tool.fire(json!({})).await.unwrap_err();
        assert!(matches!(err, MediFlowError::Validation { .. }));
    }

    #[tokio::test]
    async fn fire_returns_handler_output() {
        let tool = lookup_tool();
        let output = tool.fire(json!({ "name": "aspirin" })).await.expect("fire");
        assert_eq!(output["summary"], "aspirin: sample entry");
    }

    #[tokio::test]
    async fn wrapping_a_unit_copies_its_contract_exactly() {
        use crate::flow::FlowSpec;
        use crate::model::StaticModel;

        let spec = FlowSpec::new(
            "define_term",
            Schema::object([("term", Schema::string())], &["term"]),
            Schema::object([("definition", Schema::string())], &["definition"]),
            "Define {{term}}",
        )
        .expect("spec");
        let unit = Arc::new(
            FlowUnit::new(
                Arc::new(spec),
                Arc::new(StaticModel::structured(json!({ "definition": "entry" }))),
            )
            .expect("unit"),
        );

        let tool = ToolSpec::from_unit(Arc::clone(&unit), "Define a clinical term");
        assert_eq!(tool.name, "define_term");
        assert_eq!(tool.input_schema, unit.spec().input_schema);
        assert_eq!(tool.output_schema, unit.spec().output_schema);

        let err = tool
            .fire(json!({ "word": "syncope" }))
            .await
            .err()
            .expect("arguments outside the unit contract");
        assert!(matches!(err, MediFlowError::Validation { .. }));

        let output = tool.fire(json!({ "term": "syncope" })).await.expect("fire");
        assert_eq!(output["definition"], "entry");
    }
}
