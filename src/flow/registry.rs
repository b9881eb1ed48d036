use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::{MediFlowError, Result};

use super::spec::FlowSpec;

/// 契约注册表
///
/// 启动期收集全部 Flow 契约，之后只读。名称唯一，重复注册视为配置错误。
#[derive(Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Arc<FlowSpec>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self {
            contracts: HashMap::new(),
        }
    }

    pub fn register(&mut self, spec: FlowSpec) -> Result<Arc<FlowSpec>> {
        spec.check()?;
        if self.contracts.contains_key(&spec.name) {
            return Err(MediFlowError::Configuration(format!(
                "flow contract `{}` already registered",
                spec.name
            )));
        }
        let spec = Arc::new(spec);
        self.contracts.insert(spec.name.clone(), Arc::clone(&spec));
        Ok(spec)
    }

    pub fn get(&self, name: &str) -> Result<Arc<FlowSpec>> {
        self.contracts
            .get(name)
            .cloned()
            .ok_or_else(|| MediFlowError::UnknownFlow(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    /// 已注册契约的名称，按字典序
    pub fn contract_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.contracts.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn validate_input(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        crate::schema::validate(&self.get(name)?.input_schema, value)
    }

    pub fn validate_output(&self, name: &str, value: &serde_json::Value) -> Result<()> {
        crate::schema::validate(&self.get(name)?.output_schema, value)
    }

    /// 按名称排序的契约快照，用于导出
    pub fn snapshot(&self) -> Vec<Arc<FlowSpec>> {
        let mut contracts: Vec<_> = self.contracts.values().cloned().collect();
        contracts.sort_by(|a, b| a.name.cmp(&b.name));
        contracts
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

static REGISTRY: OnceLock<ContractRegistry> = OnceLock::new();

/// 安装进程级注册表，只能调用一次
pub fn install_registry(registry: ContractRegistry) -> Result<()> {
    REGISTRY
        .set(registry)
        .map_err(|_| MediFlowError::configuration("contract registry already installed"))
}

pub fn global_registry() -> Result<&'static ContractRegistry> {
    REGISTRY
        .get()
        .ok_or_else(|| MediFlowError::configuration("contract registry not installed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;

    fn sample_spec(name: &str) -> FlowSpec {
        FlowSpec::new(
            name,
            Schema::object([("topic", Schema::string())], &["topic"]),
            Schema::string(),
            "{{topic}}",
        )
        .expect("spec")
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut registry = ContractRegistry::new();
        registry.register(sample_spec("mnemonic")).expect("first");
        let err = registry.register(sample_spec("mnemonic")).unwrap_err();
        assert!(matches!(err, MediFlowError::Configuration(_)));
    }

    #[test]
    fn unknown_lookup_names_the_flow() {
        let registry = ContractRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, MediFlowError::UnknownFlow(name) if name == "missing"));
    }

    #[test]
    fn global_registry_is_installed_once() {
        let mut registry = ContractRegistry::new();
        registry
            .register(sample_spec("global_probe"))
            .expect("register");
        install_registry(registry).expect("install");
        assert!(global_registry().expect("global").contains("global_probe"));

        let err = install_registry(ContractRegistry::new()).unwrap_err();
        assert!(matches!(err, MediFlowError::Configuration(_)));
    }

    #[test]
    fn out_of_range_temperature_is_a_configuration_error() {
        let mut registry = ContractRegistry::new();
        let spec = sample_spec("hot").with_temperature(1.5);
        let err = registry.register(spec).unwrap_err();
        assert!(matches!(err, MediFlowError::Configuration(_)));
    }

    #[test]
    fn validates_values_against_the_named_contract() {
        let mut registry = ContractRegistry::new();
        registry.register(sample_spec("mnemonic")).expect("register");

        assert!(registry
            .validate_input("mnemonic", &serde_json::json!({ "topic": "Heart sounds" }))
            .is_ok());
        let err = registry
            .validate_input("mnemonic", &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, MediFlowError::Validation { .. }));
        assert!(registry
            .validate_output("mnemonic", &serde_json::json!("text"))
            .is_ok());
    }

    #[test]
    fn snapshot_is_sorted_by_name() {
        let mut registry = ContractRegistry::new();
        registry.register(sample_spec("zeta")).expect("zeta");
        registry.register(sample_spec("alpha")).expect("alpha");
        let names: Vec<_> = registry
            .snapshot()
            .iter()
            .map(|spec| spec.name.clone())
            .collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }
}
