// 状态管理模块

mod session;
mod store;

pub use session::SessionContext;
pub use store::{ContextStore, MemoryStore};
