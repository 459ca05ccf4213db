//! 派生视图模型
//!
//! 由病例集合与瞬时检索状态计算界面所需的列表、标签页计数与统计。
//! 这里的函数都是纯函数：不修改病例、收藏或序列，相同输入得到相同输出。

use radio_core::utils::format_patient_name;
use radio_core::{Case, Difficulty, Modality, SemanticSearchResult, Specialty, Tab};
use serde::Serialize;

/// 视图计算的输入
#[derive(Debug, Clone, Copy)]
pub struct ViewQuery<'a> {
    pub tab: Tab,
    pub query: &'a str,
    pub semantic: Option<&'a SemanticSearchResult>,
    pub favorites: &'a [String],
    pub visible_specialties: &'a [Specialty],
    pub anonymized: bool,
    pub expanded: Option<&'a str>,
}

/// 列表中的一行
#[derive(Debug, Clone, Serialize)]
pub struct CaseRow<'a> {
    pub case: &'a Case,
    pub display_name: String,
    pub is_favorite: bool,
    pub is_expanded: bool,
    /// 语义检索给出的相关原因
    pub match_reason: Option<&'a str>,
}

/// 标签页徽标计数
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabCount {
    #[serde(serialize_with = "serialize_tab")]
    pub tab: Tab,
    /// 通过检索过滤的数量
    pub visible: usize,
    /// 忽略检索时该标签页的总数
    pub total: usize,
}

impl TabCount {
    /// 有检索条件时显示 `visible/total`，否则只显示总数
    pub fn badge(&self, show_ratio: bool) -> String {
        if show_ratio {
            format!("{}/{}", self.visible, self.total)
        } else {
            self.total.to_string()
        }
    }
}

fn serialize_tab<S: serde::Serializer>(tab: &Tab, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(tab.label())
}

/// 全集合的分布统计，各维度按数量降序，数量相同时保持首次出现顺序
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStatistics {
    pub total: usize,
    pub specialty: Vec<(Specialty, usize)>,
    pub difficulty: Vec<(Difficulty, usize)>,
    pub modality: Vec<(Modality, usize)>,
}

/// 界面渲染所需的完整视图
#[derive(Debug, Clone, Serialize)]
pub struct CaseListView<'a> {
    pub rows: Vec<CaseRow<'a>>,
    pub tab_counts: Vec<TabCount>,
    pub statistics: CaseStatistics,
    pub show_ratio: bool,
    pub suggested_keywords: &'a [String],
}

/// 单个病例是否通过检索过滤
///
/// `query_lower` 必须已去除首尾空白并转为小写；空查询匹配所有病例。
fn matches_query(case: &Case, query_lower: &str, semantic: Option<&SemanticSearchResult>) -> bool {
    let literal = [
        &case.patient_id,
        &case.last_name,
        &case.diagnosis,
        &case.clinical_note,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(query_lower));

    literal || semantic.is_some_and(|result| result.contains(&case.id))
}

/// 检索过滤：字面子串匹配或语义命中
pub fn search_matched<'a>(
    cases: &'a [Case],
    query: &str,
    semantic: Option<&SemanticSearchResult>,
) -> Vec<&'a Case> {
    let query_lower = query.trim().to_lowercase();
    cases
        .iter()
        .filter(|case| matches_query(case, &query_lower, semantic))
        .collect()
}

fn in_tab(case: &Case, tab: Tab, favorites: &[String]) -> bool {
    match tab {
        Tab::All => true,
        Tab::Favorites => favorites.contains(&case.id),
        Tab::Specialty(specialty) => case.specialty == specialty,
    }
}

/// 检索过滤 + 标签页过滤 + 按创建时间降序（稳定排序）
pub fn filter_and_sort<'a>(cases: &'a [Case], view: &ViewQuery<'_>) -> Vec<&'a Case> {
    let mut filtered: Vec<&Case> = search_matched(cases, view.query, view.semantic)
        .into_iter()
        .filter(|case| in_tab(case, view.tab, view.favorites))
        .collect();

    filtered.sort_by(|a, b| b.date_added.cmp(&a.date_added));
    filtered
}

/// 所有可见标签页的 (可见数, 总数)
pub fn tab_counts(cases: &[Case], view: &ViewQuery<'_>) -> Vec<TabCount> {
    let matched = search_matched(cases, view.query, view.semantic);

    let mut tabs = vec![Tab::All, Tab::Favorites];
    tabs.extend(view.visible_specialties.iter().copied().map(Tab::Specialty));

    tabs.into_iter()
        .map(|tab| TabCount {
            tab,
            visible: matched
                .iter()
                .filter(|case| in_tab(case, tab, view.favorites))
                .count(),
            total: cases
                .iter()
                .filter(|case| in_tab(case, tab, view.favorites))
                .count(),
        })
        .collect()
}

/// 按出现顺序计数，再按数量稳定降序
fn group_count<T: PartialEq + Copy>(values: impl Iterator<Item = T>) -> Vec<(T, usize)> {
    let mut counts: Vec<(T, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(seen, _)| *seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// 全集合统计（不受检索与标签页影响）
pub fn statistics(cases: &[Case]) -> CaseStatistics {
    CaseStatistics {
        total: cases.len(),
        specialty: group_count(cases.iter().map(|c| c.specialty)),
        difficulty: group_count(cases.iter().map(|c| c.difficulty)),
        modality: group_count(cases.iter().map(|c| c.modality)),
    }
}

/// 计算完整视图
pub fn build_view<'a>(cases: &'a [Case], view: &ViewQuery<'a>) -> CaseListView<'a> {
    let rows = filter_and_sort(cases, view)
        .into_iter()
        .map(|case| CaseRow {
            case,
            display_name: format_patient_name(&case.last_name, &case.first_name, view.anonymized),
            is_favorite: view.favorites.contains(&case.id),
            is_expanded: view.expanded == Some(case.id.as_str()),
            match_reason: view.semantic.and_then(|result| result.reason_for(&case.id)),
        })
        .collect();

    CaseListView {
        rows,
        tab_counts: tab_counts(cases, view),
        statistics: statistics(cases),
        show_ratio: !view.query.trim().is_empty() || view.semantic.is_some(),
        suggested_keywords: view
            .semantic
            .map(|result| result.suggested_keywords.as_slice())
            .unwrap_or(&[]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use radio_core::{CaseFields, SemanticMatch};

    fn case(id: &str, specialty: Specialty, day: u32, diagnosis: &str) -> Case {
        Case::from_fields(
            id.to_string(),
            Utc.with_ymd_and_hms(2024, 1, day, 9, 0, 0).unwrap(),
            CaseFields {
                patient_id: format!("IPP-{}", id),
                last_name: format!("Nom{}", id),
                first_name: "Prénom".into(),
                specialty,
                clinical_note: "Note".into(),
                diagnosis: diagnosis.into(),
                ..CaseFields::default()
            },
        )
    }

    fn query<'a>(tab: Tab, text: &'a str, favorites: &'a [String]) -> ViewQuery<'a> {
        ViewQuery {
            tab,
            query: text,
            semantic: None,
            favorites,
            visible_specialties: &[Specialty::Neuroradiology, Specialty::Thoracic],
            anonymized: false,
            expanded: None,
        }
    }

    fn ids(cases: &[&Case]) -> Vec<String> {
        cases.iter().map(|c| c.id.clone()).collect()
    }

    #[test]
    fn test_specialty_tab_sorted_by_date() {
        let cases = vec![
            case("a", Specialty::Neuroradiology, 1, "Gliome"),
            case("b", Specialty::Thoracic, 2, "Pneumothorax"),
            case("c", Specialty::Neuroradiology, 3, "AVC"),
        ];
        let view = query(Tab::Specialty(Specialty::Neuroradiology), "", &[]);
        assert_eq!(ids(&filter_and_sort(&cases, &view)), vec!["c", "a"]);
    }

    #[test]
    fn test_sort_is_stable_for_equal_timestamps() {
        let cases = vec![
            case("old", Specialty::Other, 1, "x"),
            case("first", Specialty::Other, 5, "x"),
            case("second", Specialty::Other, 5, "x"),
            case("third", Specialty::Other, 5, "x"),
        ];
        let view = query(Tab::All, "", &[]);
        assert_eq!(
            ids(&filter_and_sort(&cases, &view)),
            vec!["first", "second", "third", "old"]
        );
    }

    #[test]
    fn test_query_matches_fields_case_insensitively() {
        let cases = vec![
            case("a", Specialty::Thoracic, 1, "Embolie Pulmonaire"),
            case("b", Specialty::Thoracic, 2, "Pneumopathie"),
        ];
        assert_eq!(ids(&search_matched(&cases, "EMBOLIE", None)), vec!["a"]);
        assert_eq!(ids(&search_matched(&cases, "ipp-b", None)), vec!["b"]);
        assert_eq!(ids(&search_matched(&cases, "nomA", None)), vec!["a"]);
        assert_eq!(search_matched(&cases, "", None).len(), 2);
        assert!(search_matched(&cases, "fracture", None).is_empty());
    }

    #[test]
    fn test_blank_query_behaves_as_cleared() {
        let cases = vec![
            case("a", Specialty::Thoracic, 1, "Embolie"),
            case("b", Specialty::Neuroradiology, 2, "Gliome"),
        ];
        assert_eq!(search_matched(&cases, "   ", None).len(), 2);
        assert_eq!(ids(&search_matched(&cases, " gliome ", None)), vec!["b"]);

        let view = build_view(&cases, &query(Tab::All, " \t", &[]));
        assert_eq!(view.rows.len(), 2);
        assert!(!view.show_ratio);
    }

    #[test]
    fn test_semantic_matches_supplement_literal_search() {
        let cases = vec![
            case("a", Specialty::Thoracic, 1, "Embolie"),
            case("b", Specialty::Neuroradiology, 2, "Gliome"),
        ];
        let semantic = SemanticSearchResult {
            matches: vec![SemanticMatch { id: "b".into(), reason: "Tumeur".into() }],
            suggested_keywords: vec!["glioblastome".into()],
        };
        let mut view = query(Tab::All, "embolie", &[]);
        view.semantic = Some(&semantic);

        let result = build_view(&cases, &view);
        let row_ids: Vec<&str> = result.rows.iter().map(|r| r.case.id.as_str()).collect();
        assert_eq!(row_ids, vec!["b", "a"]);
        assert_eq!(result.rows[0].match_reason, Some("Tumeur"));
        assert_eq!(result.rows[1].match_reason, None);
        assert!(result.show_ratio);
        assert_eq!(result.suggested_keywords, &["glioblastome".to_string()]);
    }

    #[test]
    fn test_favorites_tab() {
        let cases = vec![
            case("a", Specialty::Thoracic, 1, "x"),
            case("b", Specialty::Thoracic, 2, "x"),
        ];
        let favorites = vec!["a".to_string()];
        let view = query(Tab::Favorites, "", &favorites);
        assert_eq!(ids(&filter_and_sort(&cases, &view)), vec!["a"]);
    }

    #[test]
    fn test_tab_counts() {
        let cases = vec![
            case("a", Specialty::Neuroradiology, 1, "Gliome"),
            case("b", Specialty::Thoracic, 2, "Pneumothorax"),
            case("c", Specialty::Neuroradiology, 3, "Méningiome"),
        ];
        let favorites = vec!["b".to_string()];
        let view = query(Tab::All, "gliome", &favorites);
        let counts = tab_counts(&cases, &view);

        let lookup = |tab: Tab| counts.iter().find(|c| c.tab == tab).cloned().unwrap();
        assert_eq!(counts.len(), 4);
        assert_eq!(lookup(Tab::All), TabCount { tab: Tab::All, visible: 1, total: 3 });
        assert_eq!(lookup(Tab::Favorites), TabCount { tab: Tab::Favorites, visible: 0, total: 1 });
        let neuro = lookup(Tab::Specialty(Specialty::Neuroradiology));
        assert_eq!((neuro.visible, neuro.total), (1, 2));
        assert_eq!(neuro.badge(true), "1/2");
        assert_eq!(neuro.badge(false), "2");
    }

    #[test]
    fn test_statistics_order() {
        let mut cases = vec![
            case("a", Specialty::Thoracic, 1, "x"),
            case("b", Specialty::Neuroradiology, 2, "x"),
            case("c", Specialty::Neuroradiology, 3, "x"),
            case("d", Specialty::Orl, 4, "x"),
        ];
        cases[3].modality = Modality::Ct;
        let stats = statistics(&cases);

        assert_eq!(stats.total, 4);
        assert_eq!(
            stats.specialty,
            vec![
                (Specialty::Neuroradiology, 2),
                (Specialty::Thoracic, 1),
                (Specialty::Orl, 1)
            ]
        );
        assert_eq!(stats.difficulty, vec![(Difficulty::Beginner, 4)]);
        assert_eq!(stats.modality, vec![(Modality::Mri, 3), (Modality::Ct, 1)]);
    }

    #[test]
    fn test_anonymized_rows_and_expansion() {
        let cases = vec![case("a", Specialty::Thoracic, 1, "x")];
        let mut view = query(Tab::All, "", &[]);
        view.anonymized = true;
        view.expanded = Some("a");

        let result = build_view(&cases, &view);
        assert_eq!(result.rows[0].display_name, "N*** P***");
        assert!(result.rows[0].is_expanded);
        assert!(!result.show_ratio);
    }

    #[test]
    fn test_view_is_pure() {
        let cases = vec![
            case("a", Specialty::Thoracic, 1, "Embolie"),
            case("b", Specialty::Neuroradiology, 2, "Gliome"),
        ];
        let snapshot = cases.clone();
        let favorites = vec!["b".to_string()];
        let view = query(Tab::All, "o", &favorites);

        let first = serde_json::to_value(build_view(&cases, &view)).unwrap();
        let second = serde_json::to_value(build_view(&cases, &view)).unwrap();
        assert_eq!(first, second);
        assert_eq!(cases, snapshot);
    }

    #[test]
    fn test_empty_collection() {
        let view = query(Tab::All, "x", &[]);
        let result = build_view(&[], &view);
        assert!(result.rows.is_empty());
        assert_eq!(result.statistics.total, 0);
        assert!(result.tab_counts.iter().all(|c| c.total == 0 && c.visible == 0));
    }
}
