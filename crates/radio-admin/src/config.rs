//! 配置管理
//!
//! 配置按 默认值 → TOML 文件 → 环境变量 的顺序逐层覆盖。
//! 环境变量形如 `RADIO_SERVER__PORT=9000`、`RADIO_AI__MODEL=...`。

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

/// 未配置 `ai.api_key` 时读取的环境变量
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const ENV_PREFIX: &str = "RADIO";

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: Arc<RwLock<ArchiveConfig>>,
    /// 配置文件路径
    config_path: Option<PathBuf>,
    /// 配置验证器
    validator: ConfigValidator,
}

/// 完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ai: AiConfig,
    pub logging: LoggingConfig,
}

/// 中继服务监听配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// 存储配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 记录文件所在目录
    pub data_dir: String,
}

/// AI 配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// 客户端调用的中继端点
    pub relay_url: String,
    /// 中继调用的模型服务根地址
    pub provider_endpoint: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` 指令，如 `info` 或 `radio_workflow=debug`
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            relay_url: "http://127.0.0.1:8787/api/gemini".to_string(),
            provider_endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ArchiveConfig {
    /// 监听地址
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 模型服务密钥：优先使用配置值，其次读取 `GEMINI_API_KEY`
    pub fn api_key(&self) -> Option<String> {
        self.ai
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&ArchiveConfig) -> Result<()>,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigManager {
    /// 创建新的配置管理器；指定的配置文件必须存在
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        Self::with_environment(config_path, environment())
    }

    fn with_environment(config_path: Option<&Path>, env: Environment) -> Result<Self> {
        let config = load_config(config_path, env)?;
        Self::from_config(config, config_path.map(Path::to_path_buf))
    }

    /// 由已有配置创建管理器（同样经过校验）
    pub fn from_config(config: ArchiveConfig, config_path: Option<PathBuf>) -> Result<Self> {
        let validator = ConfigValidator::new();
        validator.validate(&config)?;

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            config_path,
            validator,
        })
    }

    /// 获取配置
    pub async fn get_config(&self) -> ArchiveConfig {
        self.config.read().await.clone()
    }

    /// 更新配置，校验通过后写回配置文件
    pub async fn update_config(&self, new_config: ArchiveConfig) -> Result<()> {
        self.validator.validate(&new_config)?;

        {
            let mut config = self.config.write().await;
            *config = new_config;
        }

        if let Some(path) = &self.config_path {
            self.save_to(path).await?;
        }

        info!("Configuration updated successfully");
        Ok(())
    }

    /// 生效配置的 TOML 文本
    pub async fn to_toml(&self) -> Result<String> {
        let config = self.config.read().await;
        toml::to_string_pretty(&*config).context("Failed to serialize configuration")
    }

    /// 保存配置到文件
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        let config_str = self.to_toml().await?;
        tokio::fs::write(path, config_str)
            .await
            .context("Failed to write configuration file")?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// 验证配置
    pub async fn validate_config(&self) -> Result<()> {
        let config = self.config.read().await;
        self.validator.validate(&config)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// 从文件与环境变量加载配置
fn load_config(config_path: Option<&Path>, env: Environment) -> Result<ArchiveConfig> {
    let mut builder = Config::builder();
    if let Some(path) = config_path {
        let name = path.to_string_lossy();
        builder = builder.add_source(File::new(&name, FileFormat::Toml).required(true));
    }

    let settings = builder
        .add_source(env)
        .build()
        .context("Failed to load configuration")?;

    let config: ArchiveConfig = settings
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    match config_path {
        Some(path) => info!("Configuration loaded from: {}", path.display()),
        None => debug!("Configuration loaded from defaults and environment"),
    }
    Ok(config)
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"));

    match rest {
        Some(rest) => {
            let host = rest.split('/').next().unwrap_or_default();
            !host.is_empty() && !url.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid server port",
            },
            ValidationRule {
                field_path: "storage.data_dir",
                validator: |config| {
                    if config.storage.data_dir.trim().is_empty() {
                        Err(anyhow::anyhow!("Data directory cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid data directory",
            },
            ValidationRule {
                field_path: "ai.relay_url",
                validator: |config| {
                    if is_http_url(&config.ai.relay_url) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Not an http(s) URL: {}", config.ai.relay_url))
                    }
                },
                error_message: "Invalid relay URL",
            },
            ValidationRule {
                field_path: "ai.provider_endpoint",
                validator: |config| {
                    if is_http_url(&config.ai.provider_endpoint) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(
                            "Not an http(s) URL: {}",
                            config.ai.provider_endpoint
                        ))
                    }
                },
                error_message: "Invalid provider endpoint",
            },
            ValidationRule {
                field_path: "ai.model",
                validator: |config| {
                    if config.ai.model.trim().is_empty() {
                        Err(anyhow::anyhow!("Model name cannot be empty"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid model",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &ArchiveConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        debug!("Configuration validation passed");
        Ok(())
    }
}
