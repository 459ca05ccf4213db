//! # RadioArchive集成模块
//!
//! 提供与外部生成式 AI 服务的集成功能，包括：
//! - AI 代理客户端：病例分类建议与语义检索排序，失败时返回“无结果”
//! - AI 中继端点：接收 `{action, payload}` 请求并委托给外部模型
//! - Gemini 提供方：带结构化输出约束的内容生成调用
//! - 调用点守卫：同一调用点同时只允许一个未完成的请求

pub mod client;
pub mod guard;
pub mod provider;
pub mod relay;

pub use client::{AiAssistant, RelayClient};
pub use guard::{CallSite, CallTicket};
pub use provider::{CaseAnalyst, GeminiProvider, GenerativeProvider};
pub use relay::{create_relay_routes, RelayServer, RelayState};
