// Pipeline 模块 - 多个执行单元的顺序编排

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::instrument;

use crate::error::Result;
use crate::flow::FlowUnit;
use crate::tools::ChatUnit;

/// 可被编排调用的执行单元
#[async_trait]
pub trait Invokable: Send + Sync {
    fn name(&self) -> &str;
    async fn invoke(&self, input: Value) -> Result<Value>;
}

pub type DynInvokable = Arc<dyn Invokable>;

#[async_trait]
impl Invokable for FlowUnit {
    fn name(&self) -> &str {
        FlowUnit::name(self)
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        FlowUnit::invoke(self, input).await
    }
}

#[async_trait]
impl Invokable for ChatUnit {
    fn name(&self) -> &str {
        ChatUnit::name(self)
    }

    async fn invoke(&self, input: Value) -> Result<Value> {
        ChatUnit::invoke(self, input).await
    }
}

pub type DeriveFn = Arc<dyn Fn(&PipelineRun) -> Value + Send + Sync>;
pub type GateFn = Arc<dyn Fn(&PipelineRun) -> bool + Send + Sync>;

/// 编排中的一步：执行单元加上可选的输入派生与门控谓词
pub struct PipelineStep {
    pub name: String,
    unit: DynInvokable,
    derive: Option<DeriveFn>,
    gate: Option<GateFn>,
}

impl PipelineStep {
    pub fn new(unit: DynInvokable) -> Self {
        Self {
            name: unit.name().to_string(),
            unit,
            derive: None,
            gate: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 从已完成的部分结果派生本步输入；缺省直接使用管线输入
    pub fn with_derive<F>(mut self, derive: F) -> Self
    where
        F: Fn(&PipelineRun) -> Value + Send + Sync + 'static,
    {
        self.derive = Some(Arc::new(derive));
        self
    }

    /// 门控谓词：返回 false 时跳过本步，槽位记为缺席
    pub fn with_gate<F>(mut self, gate: F) -> Self
    where
        F: Fn(&PipelineRun) -> bool + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(gate));
        self
    }
}

/// 一次管线运行的结果：原始输入加上每步的具名槽位
///
/// 被门控跳过的步骤槽位为缺席，不是错误。
#[derive(Clone, Debug)]
pub struct PipelineRun {
    input: Value,
    slots: Vec<(String, Option<Value>)>,
}

impl PipelineRun {
    pub fn input(&self) -> &Value {
        &self.input
    }

    pub fn get(&self, step: &str) -> Option<&Value> {
        self.slots
            .iter()
            .find(|(name, _)| name == step)
            .and_then(|(_, slot)| slot.as_ref())
    }

    pub fn ran(&self, step: &str) -> bool {
        self.get(step).is_some()
    }

    /// 第一步的输出
    pub fn primary(&self) -> Option<&Value> {
        self.slots.first().and_then(|(_, slot)| slot.as_ref())
    }

    /// 第二步的输出；被跳过时为缺席
    pub fn secondary(&self) -> Option<&Value> {
        self.slots.get(1).and_then(|(_, slot)| slot.as_ref())
    }
}

/// 严格按声明顺序执行各步；任一步失败立即中止，错误原样向上传递
pub struct Pipeline {
    name: String,
    steps: Vec<PipelineStep>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(mut self, step: PipelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, input), fields(pipeline = %self.name))]
    pub async fn run(&self, input: Value) -> Result<PipelineRun> {
        let mut run = PipelineRun {
            input,
            slots: Vec::new(),
        };

        for step in &self.steps {
            if let Some(gate) = &step.gate {
                if !gate(&run) {
                    tracing::debug!(step = %step.name, "step gated off");
                    run.slots.push((step.name.clone(), None));
                    continue;
                }
            }
            let step_input = match &step.derive {
                Some(derive) => derive(&run),
                None => run.input.clone(),
            };
            tracing::debug!(step = %step.name, "running step");
            let output = step.unit.invoke(step_input).await?;
            run.slots.push((step.name.clone(), Some(output)));
        }

        Ok(run)
    }
}

/// 按数组原始顺序返回第一个满足谓词的元素
pub fn first_match<'a, F>(items: &'a Value, predicate: F) -> Option<&'a Value>
where
    F: Fn(&Value) -> bool,
{
    items.as_array()?.iter().find(|item| predicate(item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_match_keeps_original_order() {
        let items = json!([
            { "name": "A", "tier": "High" },
            { "name": "B", "tier": "Low" },
            { "name": "C", "tier": "High" }
        ]);
        let hit = first_match(&items, |item| item["tier"] == "High").expect("match");
        assert_eq!(hit["name"], "A");
    }

    #[test]
    fn first_match_on_non_array_is_none() {
        assert!(first_match(&json!({}), |_| true).is_none());
        assert!(first_match(&json!([]), |_| true).is_none());
    }
}
