// Flow 模块 - 契约定义、注册与执行单元

pub mod registry;
pub mod spec;
pub mod unit;

// 重新导出核心类型
pub use registry::{global_registry, install_registry, ContractRegistry};
pub use spec::{FlowSpec, GenerationConfig};
pub use unit::{FlowUnit, OutputRule};
