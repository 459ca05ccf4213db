//! 键值存储后端
//!
//! 每个键对应一个完整的 JSON 值；写入以“整个值”为粒度原子替换。

use async_trait::async_trait;
use radio_core::{RadioError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

/// 键值存储接口
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// 读取键对应的原始值，不存在时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 整体替换键对应的值
    async fn put(&self, key: &str, value: &str) -> Result<()>;
}

/// 基于目录的文件存储，每个键一个 `<key>.json` 文件
#[derive(Debug, Clone)]
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn key_path(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(RadioError::Storage(format!("非法的存储键: {:?}", key)));
        }
        Ok(self.base_path.join(format!("{}.json", key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.key_path(key)?;
        tokio::fs::create_dir_all(&self.base_path).await?;

        // 先写临时文件再重命名，读者只会看到旧值或新值
        let tmp_path = self.base_path.join(format!(".{}.json.tmp", key));
        tokio::fs::write(&tmp_path, value).await?;
        tokio::fs::rename(&tmp_path, &path).await?;

        debug!("Stored key {} ({} bytes) at {}", key, value.len(), path.display());
        Ok(())
    }
}

/// 内存存储，用于测试与演示
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        assert_eq!(store.get("cases").await.unwrap(), None);

        store.put("cases", "[]").await.unwrap();
        assert_eq!(store.get("cases").await.unwrap().as_deref(), Some("[]"));

        store.put("cases", "[1]").await.unwrap();
        assert_eq!(store.get("cases").await.unwrap().as_deref(), Some("[1]"));
        assert!(!dir.path().join("data/.cases.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        assert!(store.put("../escape", "x").await.is_err());
        assert!(store.get("").await.is_err());
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        store.put("theme", "\"dark\"").await.unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("\"dark\""));
        store.put("theme", "\"light\"").await.unwrap();
        assert_eq!(store.get("theme").await.unwrap().as_deref(), Some("\"light\""));
        assert_eq!(store.get("cases").await.unwrap(), None);
    }
}
