//! # RadioArchive
//!
//! 放射科教学病例归档：病例目录、影像栈浏览与 AI 辅助分类/检索。
//! 各功能位于独立的 crate 中，这里统一重新导出。

pub use radio_core as model;
pub use radio_integration as integration;
pub use radio_storage as storage;
pub use radio_workflow as workflow;

use std::sync::Arc;

/// 以内存存储打开一个空归档，用于演示与测试
pub async fn open_in_memory() -> model::Result<workflow::ArchiveEngine> {
    let records = storage::RecordStore::new(Arc::new(storage::MemoryStore::new()));
    workflow::ArchiveEngine::load(records).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_is_empty() {
        let engine = open_in_memory().await.unwrap();
        assert!(engine.state().cases().is_empty());
        assert_eq!(engine.state().visible_specialties().len(), 6);
    }
}
