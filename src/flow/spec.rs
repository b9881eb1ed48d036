use crate::error::{MediFlowError, Result};
use crate::schema::Schema;
use crate::template::PromptTemplate;

/// 生成参数
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { temperature: 0.2 }
    }
}

/// Flow 契约：名称、输入/输出 Schema、生成参数与提示词模板
///
/// 模板在构建时解析；契约注册后不再变更。
#[derive(Clone, Debug)]
pub struct FlowSpec {
    pub name: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub generation: GenerationConfig,
    pub template: PromptTemplate,
}

impl FlowSpec {
    pub fn new(
        name: impl Into<String>,
        input_schema: Schema,
        output_schema: Schema,
        template: &str,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            input_schema,
            output_schema,
            generation: GenerationConfig::default(),
            template: PromptTemplate::parse(template)?,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation.temperature = temperature;
        self
    }

    /// 注册前的契约检查：名称非空，temperature 落在 [0.0, 1.0]
    pub(crate) fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MediFlowError::configuration("flow contract needs a name"));
        }
        let temperature = self.generation.temperature;
        if !(0.0..=1.0).contains(&temperature) {
            return Err(MediFlowError::Configuration(format!(
                "flow `{}`: temperature {temperature} outside [0.0, 1.0]",
                self.name
            )));
        }
        Ok(())
    }
}
