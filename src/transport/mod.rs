// Transport 模块 - 上游模型服务的 HTTP 通道

pub mod direct;
pub mod gemini;
mod wire;

pub use direct::{DirectClient, FALLBACK_REPLY};
pub use gemini::GeminiClient;

/// 自动加载配置时使用的环境变量
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
