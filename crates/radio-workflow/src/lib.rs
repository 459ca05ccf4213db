//! # RadioArchive工作流模块
//!
//! 提供病例归档的客户端状态模型，包括：
//! - 影像栈浏览状态机：序列/层面切换、缩放、平移与全屏
//! - 派生视图模型：过滤、排序、标签页计数与统计，纯函数且可重复计算
//! - 归档状态：病例、收藏与偏好的唯一数据源，只通过具名操作修改
//! - 病例编辑表单：必填校验、序列管理与 AI 分类建议
//! - 归档引擎：将状态修改与记录存储的整体写入串联起来

pub mod archive;
pub mod engine;
pub mod form;
pub mod view_model;
pub mod viewer;

// 重新导出主要类型
pub use archive::{
    ArchiveState, Confirmation, Confirmed, Declined, SearchState, SemanticSearchJob, SemanticSearchOutcome,
    DELETE_CONFIRMATION_PROMPT,
};
pub use engine::ArchiveEngine;
pub use form::{validate_case_fields, AnalysisJob, AnalysisOutcome, CaseForm};
pub use view_model::{
    build_view, filter_and_sort, search_matched, statistics, tab_counts, CaseListView, CaseRow,
    CaseStatistics, TabCount, ViewQuery,
};
pub use viewer::{Point, StackViewer, ViewerEvent, ViewerState};
