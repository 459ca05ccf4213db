//! 归档状态
//!
//! 病例、收藏、可见专业与界面偏好的唯一数据源。所有修改都通过具名操作完成，
//! 派生视图每次由 [`ArchiveState::view`] 重新计算。

use chrono::{DateTime, Utc};
use radio_core::utils::generate_case_id;
use radio_core::{
    Case, CaseFields, CaseSummary, EnumLabel, RadioError, Result, SemanticSearchResult, Specialty,
    Tab, Theme,
};
use radio_integration::{AiAssistant, CallSite, CallTicket};
use radio_storage::PersistedState;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::form::validate_case_fields;
use crate::view_model::{build_view, CaseListView, ViewQuery};

/// 删除前向用户展示的确认提示
pub const DELETE_CONFIRMATION_PROMPT: &str = "Supprimer définitivement ce cas ?";

/// 破坏性操作的确认来源
pub trait Confirmation {
    fn confirm(&self, prompt: &str) -> bool;
}

/// 预先确认（如命令行 `--yes`）
#[derive(Debug, Clone, Copy)]
pub struct Confirmed;

impl Confirmation for Confirmed {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// 预先拒绝
#[derive(Debug, Clone, Copy)]
pub struct Declined;

impl Confirmation for Declined {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

/// 检索状态
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    /// 最近一次语义检索结果，与 `query` 对应
    pub semantic: Option<SemanticSearchResult>,
}

/// 归档状态
#[derive(Debug)]
pub struct ArchiveState {
    cases: Vec<Case>,
    favorites: Vec<String>,
    visible_specialties: Vec<Specialty>,
    theme: Theme,
    tab: Tab,
    search: SearchState,
    anonymized: bool,
    expanded_case: Option<String>,
    search_site: Arc<CallSite>,
}

impl Default for ArchiveState {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveState {
    pub fn new() -> Self {
        Self::from_persisted(PersistedState {
            cases: Vec::new(),
            favorites: Vec::new(),
            visible_specialties: Specialty::default_visible(),
            theme: Theme::default(),
        })
    }

    pub fn from_persisted(persisted: PersistedState) -> Self {
        Self {
            cases: persisted.cases,
            favorites: persisted.favorites,
            visible_specialties: persisted.visible_specialties,
            theme: persisted.theme,
            tab: Tab::All,
            search: SearchState::default(),
            anonymized: false,
            expanded_case: None,
            search_site: CallSite::new("semantic_search"),
        }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn case(&self, id: &str) -> Option<&Case> {
        self.cases.iter().find(|c| c.id == id)
    }

    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    pub fn is_favorite(&self, id: &str) -> bool {
        self.favorites.iter().any(|f| f == id)
    }

    pub fn visible_specialties(&self) -> &[Specialty] {
        &self.visible_specialties
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn is_anonymized(&self) -> bool {
        self.anonymized
    }

    pub fn expanded_case(&self) -> Option<&str> {
        self.expanded_case.as_deref()
    }

    pub fn is_searching(&self) -> bool {
        self.search_site.is_busy()
    }

    /// 当前可选的标签页：全部、收藏，然后是可见专业
    pub fn tabs(&self) -> Vec<Tab> {
        [Tab::All, Tab::Favorites]
            .into_iter()
            .chain(self.visible_specialties.iter().copied().map(Tab::Specialty))
            .collect()
    }

    pub fn create_case(&mut self, fields: CaseFields) -> Result<&Case> {
        self.create_case_at(fields, Utc::now())
    }

    /// 校验并创建病例，新病例位于集合最前
    pub fn create_case_at(&mut self, fields: CaseFields, now: DateTime<Utc>) -> Result<&Case> {
        validate_case_fields(&fields)?;

        let mut id = generate_case_id();
        while self.case(&id).is_some() {
            id = generate_case_id();
        }

        info!("Created case {} ({})", id, fields.specialty);
        self.cases.insert(0, Case::from_fields(id, now, fields));
        Ok(&self.cases[0])
    }

    /// 删除病例；用户拒绝确认时不做任何修改并返回 `Ok(false)`
    pub fn delete_case(&mut self, id: &str, confirmation: &dyn Confirmation) -> Result<bool> {
        let position = self
            .cases
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RadioError::NotFound(format!("病例 {}", id)))?;

        if !confirmation.confirm(DELETE_CONFIRMATION_PROMPT) {
            debug!("Deletion of case {} declined", id);
            return Ok(false);
        }

        self.cases.remove(position);
        self.favorites.retain(|f| f != id);
        if self.expanded_case.as_deref() == Some(id) {
            self.expanded_case = None;
        }

        info!("Deleted case {}", id);
        Ok(true)
    }

    /// 切换收藏，返回切换后的收藏状态
    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        if self.case(id).is_none() {
            return Err(RadioError::NotFound(format!("病例 {}", id)));
        }

        if self.is_favorite(id) {
            self.favorites.retain(|f| f != id);
            Ok(false)
        } else {
            self.favorites.push(id.to_string());
            Ok(true)
        }
    }

    /// 切换专业标签页的可见性，返回切换后的可见状态
    ///
    /// 可见专业按枚举顺序保存。隐藏当前所在的专业标签页时回到“全部”。
    pub fn toggle_specialty_visibility(&mut self, specialty: Specialty) -> bool {
        let visible = if self.visible_specialties.contains(&specialty) {
            self.visible_specialties.retain(|s| *s != specialty);
            if self.tab == Tab::Specialty(specialty) {
                self.tab = Tab::All;
            }
            false
        } else {
            self.visible_specialties.push(specialty);
            let order = |s: &Specialty| Specialty::ALL.iter().position(|x| x == s);
            self.visible_specialties.sort_by_key(order);
            true
        };

        debug!("Specialty {} visible: {}", specialty, visible);
        visible
    }

    /// 切换标签页；隐藏的专业不能被选中
    pub fn set_tab(&mut self, tab: Tab) -> Result<()> {
        if let Tab::Specialty(specialty) = tab {
            if !self.visible_specialties.contains(&specialty) {
                return Err(RadioError::Validation(format!("专业标签页未显示: {}", specialty)));
            }
        }
        self.tab = tab;
        Ok(())
    }

    /// 更新检索文本；清空时一并清除语义结果
    pub fn set_query(&mut self, query: impl Into<String>) {
        self.search.query = query.into();
        if self.search.query.trim().is_empty() {
            self.search.semantic = None;
        }
    }

    pub fn toggle_anonymized(&mut self) -> bool {
        self.anonymized = !self.anonymized;
        self.anonymized
    }

    /// 展开或收起病例，同一时间最多展开一个
    pub fn toggle_expanded(&mut self, id: &str) -> Option<&str> {
        if self.expanded_case.as_deref() == Some(id) {
            self.expanded_case = None;
        } else if self.case(id).is_some() {
            self.expanded_case = Some(id.to_string());
        }
        self.expanded_case.as_deref()
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        self.theme
    }

    /// 记录持久化部分及受其牵连的会话字段，供写入失败时回滚
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            cases: self.cases.clone(),
            favorites: self.favorites.clone(),
            visible_specialties: self.visible_specialties.clone(),
            theme: self.theme,
            tab: self.tab,
            expanded_case: self.expanded_case.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.cases = checkpoint.cases;
        self.favorites = checkpoint.favorites;
        self.visible_specialties = checkpoint.visible_specialties;
        self.theme = checkpoint.theme;
        self.tab = checkpoint.tab;
        self.expanded_case = checkpoint.expanded_case;
    }

    /// 当前状态对应的视图查询
    pub fn query(&self) -> ViewQuery<'_> {
        ViewQuery {
            tab: self.tab,
            query: &self.search.query,
            semantic: self.search.semantic.as_ref(),
            favorites: &self.favorites,
            visible_specialties: &self.visible_specialties,
            anonymized: self.anonymized,
            expanded: self.expanded_case.as_deref(),
        }
    }

    pub fn view(&self) -> CaseListView<'_> {
        build_view(&self.cases, &self.query())
    }

    /// 开始一次语义检索；检索文本为空或已有检索进行中时返回 `None`
    pub fn begin_semantic_search(&self) -> Option<SemanticSearchJob> {
        let query = self.search.query.trim();
        if query.is_empty() {
            return None;
        }
        let ticket = self.search_site.try_begin()?;
        Some(SemanticSearchJob {
            ticket,
            query: self.search.query.clone(),
            cases: self.cases.iter().map(Case::summary).collect(),
        })
    }

    /// 应用语义检索结果；检索期间文本已改变时丢弃结果并返回 `false`
    pub fn finish_semantic_search(&mut self, outcome: SemanticSearchOutcome) -> bool {
        let SemanticSearchOutcome {
            ticket,
            query,
            result,
        } = outcome;
        drop(ticket);

        if query != self.search.query {
            warn!("Discarding semantic results for stale query '{}'", query);
            return false;
        }

        let applied = result.is_some();
        self.search.semantic = result;
        applied
    }
}

/// 归档状态快照
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    cases: Vec<Case>,
    favorites: Vec<String>,
    visible_specialties: Vec<Specialty>,
    theme: Theme,
    tab: Tab,
    expanded_case: Option<String>,
}

/// 进行中的语义检索，持有检索时刻的文本与病例摘要快照
#[derive(Debug)]
pub struct SemanticSearchJob {
    ticket: CallTicket,
    query: String,
    cases: Vec<CaseSummary>,
}

impl SemanticSearchJob {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn cases(&self) -> &[CaseSummary] {
        &self.cases
    }

    pub async fn run(self, ai: &dyn AiAssistant) -> SemanticSearchOutcome {
        let result = ai.rank(self.query.trim(), &self.cases).await;
        SemanticSearchOutcome {
            ticket: self.ticket,
            query: self.query,
            result,
        }
    }
}

/// 语义检索结果
#[derive(Debug)]
pub struct SemanticSearchOutcome {
    ticket: CallTicket,
    query: String,
    result: Option<SemanticSearchResult>,
}

impl SemanticSearchOutcome {
    pub fn result(&self) -> Option<&SemanticSearchResult> {
        self.result.as_ref()
    }
}
