//! 病例编辑表单
//!
//! 表单草稿在提交前只存在于内存中；校验失败时拒绝提交，不产生任何持久化或网络副作用。

use radio_core::utils::fuzzy_match_label;
use radio_core::{CaseClassification, CaseFields, Difficulty, RadioError, Result, Series, Specialty};
use radio_integration::{AiAssistant, CallSite, CallTicket};
use std::sync::Arc;
use tracing::{debug, info};

/// 校验必填字段
pub fn validate_case_fields(fields: &CaseFields) -> Result<()> {
    let required = [
        ("lastName", &fields.last_name),
        ("firstName", &fields.first_name),
        ("patientId", &fields.patient_id),
        ("clinicalNote", &fields.clinical_note),
        ("diagnosis", &fields.diagnosis),
    ];

    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(RadioError::Validation(format!("必填字段为空: {}", name))),
        None => Ok(()),
    }
}

/// 病例编辑表单
#[derive(Debug)]
pub struct CaseForm {
    fields: CaseFields,
    analysis_site: Arc<CallSite>,
}

impl Default for CaseForm {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseForm {
    pub fn new() -> Self {
        Self {
            fields: CaseFields::default(),
            analysis_site: CallSite::new("analyze_case"),
        }
    }

    pub fn fields(&self) -> &CaseFields {
        &self.fields
    }

    pub fn fields_mut(&mut self) -> &mut CaseFields {
        &mut self.fields
    }

    /// 追加一个序列，名称为 “Série N”；空图像列表被忽略
    pub fn add_series(&mut self, images: Vec<String>) -> bool {
        if images.is_empty() {
            return false;
        }
        let name = format!("Série {}", self.fields.series.len() + 1);
        debug!("Attaching {} image(s) as {}", images.len(), name);
        self.fields.series.push(Series::new(name, images));
        true
    }

    pub fn remove_series(&mut self, index: usize) -> Option<Series> {
        (index < self.fields.series.len()).then(|| self.fields.series.remove(index))
    }

    pub fn rename_series(&mut self, index: usize, name: impl Into<String>) -> bool {
        match self.fields.series.get_mut(index) {
            Some(series) => {
                series.name = name.into();
                true
            }
            None => false,
        }
    }

    /// 是否有未完成的分析请求（界面据此禁用“分析”按钮）
    pub fn is_analyzing(&self) -> bool {
        self.analysis_site.is_busy()
    }

    /// 开始一次分析；临床记录为空或已有分析进行中时返回 `None`
    pub fn begin_analysis(&self) -> Option<AnalysisJob> {
        let note = self.fields.clinical_note.trim();
        if note.is_empty() {
            return None;
        }
        let ticket = self.analysis_site.try_begin()?;
        Some(AnalysisJob {
            ticket,
            clinical_note: note.to_string(),
        })
    }

    /// 应用分析结果；`None` 表示没有建议，表单保持不变
    pub fn finish_analysis(&mut self, outcome: AnalysisOutcome) {
        let AnalysisOutcome { ticket, result } = outcome;
        if let Some(classification) = result {
            self.apply_classification(&classification);
        }
        drop(ticket);
    }

    /// 将 AI 建议合并到表单：专业与难度做模糊匹配，匹配不到时保留当前值
    pub fn apply_classification(&mut self, classification: &CaseClassification) {
        if let Some(specialty) = fuzzy_match_label::<Specialty>(&classification.specialty) {
            self.fields.specialty = specialty;
        }
        if let Some(difficulty) = fuzzy_match_label::<Difficulty>(&classification.difficulty) {
            self.fields.difficulty = difficulty;
        }
        if !classification.summary.trim().is_empty() {
            self.fields.diagnosis = classification.summary.clone();
        }
        info!(
            "Applied AI suggestion: specialty={}, difficulty={}",
            self.fields.specialty, self.fields.difficulty
        );
    }

    /// 一次性分析并应用结果
    pub async fn analyze(&mut self, ai: &dyn AiAssistant) -> bool {
        let Some(job) = self.begin_analysis() else {
            return false;
        };
        let outcome = job.run(ai).await;
        let applied = outcome.result.is_some();
        self.finish_analysis(outcome);
        applied
    }

    pub fn validate(&self) -> Result<()> {
        validate_case_fields(&self.fields)
    }

    /// 提交表单，返回待创建病例的字段
    pub fn submit(&self) -> Result<CaseFields> {
        self.validate()?;
        Ok(self.fields.clone())
    }
}

/// 进行中的分析请求，持有调用点票据
#[derive(Debug)]
pub struct AnalysisJob {
    ticket: CallTicket,
    clinical_note: String,
}

impl AnalysisJob {
    pub fn clinical_note(&self) -> &str {
        &self.clinical_note
    }

    pub async fn run(self, ai: &dyn AiAssistant) -> AnalysisOutcome {
        let result = ai.classify(&self.clinical_note).await;
        AnalysisOutcome {
            ticket: self.ticket,
            result,
        }
    }
}

/// 分析结果，应用到表单后释放调用点
#[derive(Debug)]
pub struct AnalysisOutcome {
    ticket: CallTicket,
    result: Option<CaseClassification>,
}

impl AnalysisOutcome {
    pub fn result(&self) -> Option<&CaseClassification> {
        self.result.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use radio_core::{CaseSummary, SemanticSearchResult};

    struct FixedAssistant(Option<CaseClassification>);

    #[async_trait]
    impl AiAssistant for FixedAssistant {
        async fn classify(&self, _clinical_note: &str) -> Option<CaseClassification> {
            self.0.clone()
        }

        async fn rank(&self, _query: &str, _cases: &[CaseSummary]) -> Option<SemanticSearchResult> {
            None
        }
    }

    fn classification(specialty: &str, difficulty: &str, summary: &str) -> CaseClassification {
        CaseClassification {
            specialty: specialty.into(),
            difficulty: difficulty.into(),
            summary: summary.into(),
        }
    }

    fn filled_form() -> CaseForm {
        let mut form = CaseForm::new();
        let fields = form.fields_mut();
        fields.last_name = "Bernard".into();
        fields.first_name = "Luc".into();
        fields.patient_id = "IPP-42".into();
        fields.clinical_note = "Céphalées et vomissements".into();
        fields.diagnosis = "À préciser".into();
        form
    }

    #[test]
    fn test_defaults() {
        let form = CaseForm::new();
        assert_eq!(form.fields().specialty, Specialty::Neuroradiology);
        assert_eq!(form.fields().difficulty, Difficulty::Beginner);
        assert!(form.fields().series.is_empty());
    }

    #[test]
    fn test_submit_refuses_missing_fields() {
        let mut form = filled_form();
        form.fields_mut().patient_id = "   ".into();
        match form.submit() {
            Err(RadioError::Validation(message)) => assert!(message.contains("patientId")),
            other => panic!("expected validation error, got {:?}", other),
        }

        form.fields_mut().patient_id = "IPP-42".into();
        assert!(form.submit().is_ok());
    }

    #[test]
    fn test_series_management() {
        let mut form = CaseForm::new();
        assert!(!form.add_series(Vec::new()));
        assert!(form.add_series(vec!["a".into(), "b".into()]));
        assert!(form.add_series(vec!["c".into()]));
        assert_eq!(form.fields().series[1].name, "Série 2");

        assert!(form.rename_series(0, "Axial T2"));
        assert!(!form.rename_series(5, "x"));
        assert_eq!(form.fields().series[0].name, "Axial T2");

        let removed = form.remove_series(0).unwrap();
        assert_eq!(removed.images.len(), 2);
        assert!(form.remove_series(3).is_none());
        assert_eq!(form.fields().series.len(), 1);
    }

    #[test]
    fn test_classification_fuzzy_match() {
        let mut form = filled_form();
        form.apply_classification(&classification("neuro quelque chose", "avancé", "Hématome sous-dural"));
        assert_eq!(form.fields().specialty, Specialty::Neuroradiology);
        assert_eq!(form.fields().difficulty, Difficulty::Advanced);
        assert_eq!(form.fields().diagnosis, "Hématome sous-dural");
    }

    #[test]
    fn test_unmatched_classification_keeps_current_values() {
        let mut form = filled_form();
        form.fields_mut().specialty = Specialty::Thoracic;
        form.apply_classification(&classification("dermatologie", "inconnu", ""));
        assert_eq!(form.fields().specialty, Specialty::Thoracic);
        assert_eq!(form.fields().difficulty, Difficulty::Beginner);
        assert_eq!(form.fields().diagnosis, "À préciser");
    }

    #[test]
    fn test_single_outstanding_analysis() {
        let form = filled_form();
        let job = form.begin_analysis().unwrap();
        assert!(form.is_analyzing());
        assert!(form.begin_analysis().is_none());
        drop(job);
        assert!(!form.is_analyzing());
    }

    #[test]
    fn test_analysis_requires_note() {
        let form = CaseForm::new();
        assert!(form.begin_analysis().is_none());
        assert!(!form.is_analyzing());
    }

    #[tokio::test]
    async fn test_analyze_applies_result() {
        let mut form = filled_form();
        let ai = FixedAssistant(Some(classification("Thoracique", "expert", "Pneumothorax")));
        assert!(form.analyze(&ai).await);
        assert_eq!(form.fields().specialty, Specialty::Thoracic);
        assert_eq!(form.fields().difficulty, Difficulty::Expert);
        assert!(!form.is_analyzing());
    }

    #[tokio::test]
    async fn test_failed_analysis_is_no_suggestion() {
        let mut form = filled_form();
        let before = form.fields().clone();
        assert!(!form.analyze(&FixedAssistant(None)).await);
        assert_eq!(form.fields(), &before);
        assert!(!form.is_analyzing());
    }
}
