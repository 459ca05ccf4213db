//! 记录存储
//!
//! 在原始键值存储之上读写类型化的病例集合、收藏集合与界面偏好。
//! 读取时对无法解析的内容做容错：无效条目被丢弃，整体无法解析的值回退为默认值，
//! 启动不会因为历史数据损坏而失败。

use radio_core::{Case, EnumLabel, Result, Specialty, Theme};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;

/// 病例集合的存储键
pub const CASES_KEY: &str = "cases";
/// 收藏集合的存储键
pub const FAVORITES_KEY: &str = "favorites";
/// 可见专业标签页的存储键
pub const VISIBLE_SPECIALTIES_KEY: &str = "visible_specialties";
/// 主题的存储键
pub const THEME_KEY: &str = "theme";

/// 启动时一次性读出的持久化状态
#[derive(Debug, Clone, PartialEq)]
pub struct PersistedState {
    pub cases: Vec<Case>,
    pub favorites: Vec<String>,
    pub visible_specialties: Vec<Specialty>,
    pub theme: Theme,
}

/// 类型化记录存储
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn KeyValueStore>,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// 读取全部持久化状态
    pub async fn load(&self) -> Result<PersistedState> {
        let cases = self.load_cases().await?;
        let mut favorites = self.load_favorites().await?;

        // 收藏必须是现存病例 id 的子集
        let before = favorites.len();
        favorites.retain(|id| cases.iter().any(|c| &c.id == id));
        if favorites.len() != before {
            warn!("Dropped {} dangling favorite(s) on load", before - favorites.len());
        }

        Ok(PersistedState {
            cases,
            favorites,
            visible_specialties: self.load_visible_specialties().await?,
            theme: self.load_theme().await?,
        })
    }

    /// 读取病例集合，跳过无法解析的条目
    pub async fn load_cases(&self) -> Result<Vec<Case>> {
        let Some(items) = self.load_array(CASES_KEY).await? else {
            return Ok(Vec::new());
        };

        let total = items.len();
        let mut cases: Vec<Case> = Vec::with_capacity(total);
        for item in items {
            match serde_json::from_value::<Case>(item) {
                Ok(case) if cases.iter().any(|c| c.id == case.id) => {
                    warn!("Skipping stored case with duplicate id {}", case.id);
                }
                Ok(case) => cases.push(case),
                Err(e) => warn!("Skipping unparseable stored case: {}", e),
            }
        }

        debug!("Loaded {}/{} stored case(s)", cases.len(), total);
        Ok(cases)
    }

    pub async fn save_cases(&self, cases: &[Case]) -> Result<()> {
        self.save_json(CASES_KEY, &cases).await
    }

    /// 读取收藏集合（去重并保持顺序）
    pub async fn load_favorites(&self) -> Result<Vec<String>> {
        let Some(items) = self.load_array(FAVORITES_KEY).await? else {
            return Ok(Vec::new());
        };

        let mut favorites: Vec<String> = Vec::new();
        for item in items {
            if let Value::String(id) = item {
                if !favorites.contains(&id) {
                    favorites.push(id);
                }
            }
        }
        Ok(favorites)
    }

    pub async fn save_favorites(&self, favorites: &[String]) -> Result<()> {
        self.save_json(FAVORITES_KEY, &favorites).await
    }

    /// 读取可见专业，按枚举顺序排列；未保存或无法解析时返回默认的前六个专业
    pub async fn load_visible_specialties(&self) -> Result<Vec<Specialty>> {
        let Some(items) = self.load_array(VISIBLE_SPECIALTIES_KEY).await? else {
            return Ok(Specialty::default_visible());
        };

        let mut visible: Vec<Specialty> = Vec::new();
        for item in items {
            match serde_json::from_value::<Specialty>(item) {
                Ok(specialty) if !visible.contains(&specialty) => visible.push(specialty),
                Ok(_) => {}
                Err(e) => warn!("Skipping unknown stored specialty: {}", e),
            }
        }
        visible.sort_by_key(|s| Specialty::ALL.iter().position(|x| x == s));
        Ok(visible)
    }

    pub async fn save_visible_specialties(&self, visible: &[Specialty]) -> Result<()> {
        self.save_json(VISIBLE_SPECIALTIES_KEY, &visible).await
    }

    pub async fn load_theme(&self) -> Result<Theme> {
        let Some(raw) = self.backend.get(THEME_KEY).await? else {
            return Ok(Theme::default());
        };
        Ok(parse_or_default(THEME_KEY, &raw))
    }

    pub async fn save_theme(&self, theme: Theme) -> Result<()> {
        self.save_json(THEME_KEY, &theme).await
    }

    /// 读取一个 JSON 数组；键不存在或值不是数组时返回 `None`
    async fn load_array(&self, key: &str) -> Result<Option<Vec<Value>>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(items)) => Ok(Some(items)),
            Ok(_) => {
                warn!("Stored value for {} is not an array, ignoring it", key);
                Ok(None)
            }
            Err(e) => {
                warn!("Stored value for {} is not valid JSON, ignoring it: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn save_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let data = serde_json::to_string(value)?;
        self.backend.put(key, &data).await
    }
}

fn parse_or_default<T: DeserializeOwned + Default>(key: &str, raw: &str) -> T {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Stored value for {} is invalid, using default: {}", key, e);
        T::default()
    })
}
