use serde::Serialize;

use crate::flow::ContractRegistry;
use crate::schema::Schema;

/// 契约导出条目：JSON 形式的 Flow 定义面
#[derive(Clone, Debug, Serialize)]
pub struct ContractExportEntry {
    pub name: String,
    pub input_schema: Schema,
    pub output_schema: Schema,
    pub temperature: f32,
    pub template: String,
}

/// 把注册表里的契约导出为可序列化条目，按名称排序
pub fn contract_exports(registry: &ContractRegistry) -> Vec<ContractExportEntry> {
    registry
        .snapshot()
        .into_iter()
        .map(|spec| ContractExportEntry {
            name: spec.name.clone(),
            input_schema: spec.input_schema.clone(),
            output_schema: spec.output_schema.clone(),
            temperature: spec.generation.temperature,
            template: spec.template.source().to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows;

    #[test]
    fn exports_cover_every_registered_contract() {
        let registry = flows::default_registry().expect("registry");
        let entries = contract_exports(&registry);
        assert_eq!(entries.len(), registry.len());

        let names: Vec<_> = entries.iter().map(|entry| entry.name.clone()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        let json = serde_json::to_value(&entries).expect("serialize");
        assert!(json[0]["input_schema"]["type"].is_string());
    }
}
