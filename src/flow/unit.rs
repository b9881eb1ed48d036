use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use crate::error::{MediFlowError, Result};
use crate::model::{DynModelClient, GenerateRequest};
use crate::schema;

use super::spec::FlowSpec;

/// 模型输出的后处理规则，在输出通过 Schema 校验之后按序应用
#[derive(Clone, Debug)]
pub enum OutputRule {
    /// 输出字段强制回显输入字段的值，覆盖模型给出的内容
    EchoInput {
        output_field: String,
        input_field: String,
    },
    /// 输出字段必须有实际内容：数组非空、字符串非空白、对象非空
    NonEmpty { field: String },
}

pub(crate) const DEFAULT_FAILURE_MESSAGE: &str =
    "Unable to generate a response right now. Please try again.";

/// Flow 执行单元
///
/// 一次调用走完整的管线：输入校验 → 模板渲染 → 模型调用 → 输出校验 →
/// 回显覆盖 → 内容完整性检查。输入校验失败原样抛给调用方；
/// 其余阶段的失败记录完整原因后只向调用方暴露统一的失败消息。
pub struct FlowUnit {
    spec: Arc<FlowSpec>,
    model: DynModelClient,
    rules: Vec<OutputRule>,
    failure_message: String,
}

impl FlowUnit {
    /// 未注册的契约也会在这里过一遍检查，名称或 temperature 不合法即拒绝
    pub fn new(spec: Arc<FlowSpec>, model: DynModelClient) -> Result<Self> {
        spec.check()?;
        Ok(Self {
            spec,
            model,
            rules: Vec::new(),
            failure_message: DEFAULT_FAILURE_MESSAGE.to_string(),
        })
    }

    pub fn with_rule(mut self, rule: OutputRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    #[instrument(skip(self, input), fields(flow = %self.spec.name))]
    pub async fn invoke(&self, input: Value) -> Result<Value> {
        schema::validate(&self.spec.input_schema, &input)?;

        let prompt = self.spec.template.render(&input);
        tracing::debug!(prompt_len = prompt.len(), "prompt rendered");

        let request = GenerateRequest::new(prompt)
            .with_temperature(self.spec.generation.temperature)
            .with_output_schema(self.spec.output_schema.clone());

        let reply = match self.model.generate(request).await {
            Ok(reply) => reply,
            Err(error) => return Err(self.mask("model call failed", error)),
        };
        let mut output = match reply.into_value() {
            Some(value) => value,
            None => {
                let error = MediFlowError::agent_failure(
                    "model replied with a tool call outside a tool session",
                );
                return Err(self.mask("model call failed", error));
            }
        };

        if let Err(error) = schema::validate(&self.spec.output_schema, &output) {
            return Err(self.mask("model output failed contract validation", error));
        }

        self.apply_echo_overrides(&input, &mut output);

        if let Err(error) = self.check_required_content(&output) {
            return Err(self.mask("generated content incomplete", error));
        }

        tracing::debug!("flow completed");
        Ok(output)
    }

    /// 记录完整失败原因，对外只返回统一的失败消息
    fn mask(&self, stage: &str, error: MediFlowError) -> MediFlowError {
        tracing::error!(flow = %self.spec.name, error = %error, "{}", stage);
        MediFlowError::AgentFailure {
            message: self.failure_message.clone(),
        }
    }

    fn apply_echo_overrides(&self, input: &Value, output: &mut Value) {
        for rule in &self.rules {
            let OutputRule::EchoInput {
                output_field,
                input_field,
            } = rule
            else {
                continue;
            };
            let Some(value) = input.get(input_field) else {
                continue;
            };
            if let Some(object) = output.as_object_mut() {
                object.insert(output_field.clone(), value.clone());
            }
        }
    }

    fn check_required_content(&self, output: &Value) -> Result<()> {
        for rule in &self.rules {
            let OutputRule::NonEmpty { field } = rule else {
                continue;
            };
            if !field_has_content(output.get(field)) {
                return Err(MediFlowError::GenerationIncomplete(format!(
                    "field `{field}` came back empty"
                )));
            }
        }
        Ok(())
    }
}

fn field_has_content(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(text)) => !text.trim().is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EchoModel;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn construction_rejects_an_out_of_range_temperature() {
        let spec = FlowSpec::new(
            "hot",
            Schema::object([("topic", Schema::string())], &["topic"]),
            Schema::string(),
            "{{topic}}",
        )
        .expect("spec")
        .with_temperature(1.5);

        let err = FlowUnit::new(Arc::new(spec), Arc::new(EchoModel))
            .err()
            .expect("construction should fail");
        assert!(matches!(err, MediFlowError::Configuration(_)));
    }

    #[test]
    fn content_check_rejects_empty_shapes() {
        assert!(!field_has_content(None));
        assert!(!field_has_content(Some(&Value::Null)));
        assert!(!field_has_content(Some(&json!([]))));
        assert!(!field_has_content(Some(&json!("   "))));
        assert!(!field_has_content(Some(&json!({}))));
        assert!(field_has_content(Some(&json!(["x"]))));
        assert!(field_has_content(Some(&json!("x"))));
        assert!(field_has_content(Some(&json!(0))));
        assert!(field_has_content(Some(&json!(false))));
    }
}
