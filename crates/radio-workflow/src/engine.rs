//! 归档引擎
//!
//! 协调归档状态与记录存储：每次修改病例、收藏或偏好后整体写回对应的集合。

use radio_core::{Case, CaseFields, RadioError, Result, Specialty, Tab, Theme};
use radio_integration::AiAssistant;
use radio_storage::RecordStore;
use tracing::{debug, info, warn};

use crate::archive::{ArchiveState, Checkpoint, Confirmation};
use crate::view_model::CaseListView;

/// 归档引擎
pub struct ArchiveEngine {
    state: ArchiveState,
    records: RecordStore,
}

impl ArchiveEngine {
    /// 从记录存储加载归档
    pub async fn load(records: RecordStore) -> Result<Self> {
        let persisted = records.load().await?;
        info!(
            "Archive loaded: {} case(s), {} favorite(s), theme {:?}",
            persisted.cases.len(),
            persisted.favorites.len(),
            persisted.theme
        );

        Ok(Self {
            state: ArchiveState::from_persisted(persisted),
            records,
        })
    }

    pub fn state(&self) -> &ArchiveState {
        &self.state
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn view(&self) -> CaseListView<'_> {
        self.state.view()
    }

    /// 创建病例并写回病例集合，返回新病例
    pub async fn create_case(&mut self, fields: CaseFields) -> Result<Case> {
        let checkpoint = self.state.checkpoint();
        let case = self.state.create_case(fields)?.clone();
        let written = self.records.save_cases(self.state.cases()).await;
        self.settle(checkpoint, written)?;
        Ok(case)
    }

    /// 删除病例；确认后写回病例集合与收藏集合
    pub async fn delete_case(&mut self, id: &str, confirmation: &dyn Confirmation) -> Result<bool> {
        let checkpoint = self.state.checkpoint();
        if !self.state.delete_case(id, confirmation)? {
            return Ok(false);
        }

        let written = match self.records.save_cases(self.state.cases()).await {
            Ok(()) => self.records.save_favorites(self.state.favorites()).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            self.rollback(checkpoint, &e);
            // 病例集合可能已经写入，按回滚后的内容重写
            if let Err(resync) = self.records.save_cases(self.state.cases()).await {
                warn!("Failed to resync cases after rollback: {}", resync);
            }
            return Err(e);
        }
        Ok(true)
    }

    pub async fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        let checkpoint = self.state.checkpoint();
        let favorite = self.state.toggle_favorite(id)?;
        let written = self.records.save_favorites(self.state.favorites()).await;
        self.settle(checkpoint, written)?;
        Ok(favorite)
    }

    pub async fn toggle_specialty_visibility(&mut self, specialty: Specialty) -> Result<bool> {
        let checkpoint = self.state.checkpoint();
        let visible = self.state.toggle_specialty_visibility(specialty);
        let written = self
            .records
            .save_visible_specialties(self.state.visible_specialties())
            .await;
        self.settle(checkpoint, written)?;
        Ok(visible)
    }

    pub async fn set_theme(&mut self, theme: Theme) -> Result<()> {
        let checkpoint = self.state.checkpoint();
        self.state.set_theme(theme);
        let written = self.records.save_theme(theme).await;
        self.settle(checkpoint, written)
    }

    pub async fn toggle_theme(&mut self) -> Result<Theme> {
        let checkpoint = self.state.checkpoint();
        let theme = self.state.toggle_theme();
        let written = self.records.save_theme(theme).await;
        self.settle(checkpoint, written)?;
        Ok(theme)
    }

    /// 写入失败时把内存状态回滚到修改之前
    fn settle(&mut self, checkpoint: Checkpoint, written: Result<()>) -> Result<()> {
        if let Err(e) = &written {
            self.rollback(checkpoint, e);
        }
        written
    }

    fn rollback(&mut self, checkpoint: Checkpoint, error: &RadioError) {
        warn!("Write failed, rolling back archive state: {}", error);
        self.state.restore(checkpoint);
    }

    // 以下操作只影响会话状态，不写存储

    pub fn set_tab(&mut self, tab: Tab) -> Result<()> {
        self.state.set_tab(tab)
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.state.set_query(query);
    }

    pub fn toggle_anonymized(&mut self) -> bool {
        self.state.toggle_anonymized()
    }

    pub fn toggle_expanded(&mut self, id: &str) -> Option<&str> {
        self.state.toggle_expanded(id)
    }

    /// 按当前检索文本执行语义检索，返回是否得到了结果
    pub async fn semantic_search(&mut self, ai: &dyn AiAssistant) -> bool {
        let Some(job) = self.state.begin_semantic_search() else {
            debug!("Semantic search not started");
            return false;
        };
        let outcome = job.run(ai).await;
        self.state.finish_semantic_search(outcome)
    }
}
