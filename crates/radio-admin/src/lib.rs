//! # RadioArchive管理模块
//!
//! 提供配置管理：内置默认值、可选的 TOML 配置文件与 `RADIO` 前缀环境变量逐层覆盖，
//! 加载后统一校验，并可将生效配置写回 TOML 文件。

pub mod config;

pub use self::config::{
    AiConfig, ArchiveConfig, ConfigManager, ConfigValidator, LoggingConfig, ServerConfig,
    StorageConfig, API_KEY_ENV,
};
