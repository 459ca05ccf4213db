//! 核心数据模型定义
//!
//! 持久化格式沿用浏览器端的 JSON 结构：字段名为 camelCase，枚举值为法语标签。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RadioError;

/// 带固定显示标签的枚举
///
/// `ALL` 的顺序即界面顺序，也是模糊匹配时“先匹配者胜出”的顺序。
pub trait EnumLabel: Copy + PartialEq + 'static {
    const ALL: &'static [Self];

    fn label(&self) -> &'static str;

    /// 按标签精确查找（忽略大小写）
    fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|member| member.label().to_lowercase() == wanted)
    }
}

/// 放射科亚专业
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Specialty {
    #[serde(rename = "Neuroradiologie")]
    Neuroradiology,
    #[serde(rename = "Ostéo-articulaire")]
    Osteoradiology,
    #[serde(rename = "Thoracique")]
    Thoracic,
    #[serde(rename = "Abdominale")]
    Abdominal,
    #[serde(rename = "Pelvienne")]
    Pelvic,
    #[serde(rename = "Cardiovasculaire")]
    Cardiovascular,
    #[serde(rename = "Pédiatrique")]
    Pediatric,
    #[serde(rename = "Urgences")]
    Emergency,
    #[serde(rename = "ORL")]
    Orl,
    #[serde(rename = "Ophtalmologie")]
    Ophthalmology,
    #[serde(rename = "Vasculaire")]
    Vascular,
    #[serde(rename = "Sénologie")]
    Senology,
    #[serde(rename = "Urologie")]
    Urology,
    #[serde(rename = "Autre")]
    Other,
}

impl EnumLabel for Specialty {
    const ALL: &'static [Self] = &[
        Specialty::Neuroradiology,
        Specialty::Osteoradiology,
        Specialty::Thoracic,
        Specialty::Abdominal,
        Specialty::Pelvic,
        Specialty::Cardiovascular,
        Specialty::Pediatric,
        Specialty::Emergency,
        Specialty::Orl,
        Specialty::Ophthalmology,
        Specialty::Vascular,
        Specialty::Senology,
        Specialty::Urology,
        Specialty::Other,
    ];

    fn label(&self) -> &'static str {
        match self {
            Specialty::Neuroradiology => "Neuroradiologie",
            Specialty::Osteoradiology => "Ostéo-articulaire",
            Specialty::Thoracic => "Thoracique",
            Specialty::Abdominal => "Abdominale",
            Specialty::Pelvic => "Pelvienne",
            Specialty::Cardiovascular => "Cardiovasculaire",
            Specialty::Pediatric => "Pédiatrique",
            Specialty::Emergency => "Urgences",
            Specialty::Orl => "ORL",
            Specialty::Ophthalmology => "Ophtalmologie",
            Specialty::Vascular => "Vasculaire",
            Specialty::Senology => "Sénologie",
            Specialty::Urology => "Urologie",
            Specialty::Other => "Autre",
        }
    }
}

impl Specialty {
    /// 未保存偏好时默认显示的专业标签页（前六个）
    pub fn default_visible() -> Vec<Specialty> {
        Self::ALL.iter().copied().take(6).collect()
    }
}

/// 教学难度
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Difficulty {
    #[serde(rename = "Débutant")]
    Beginner,
    #[serde(rename = "Intermédiaire")]
    Intermediate,
    #[serde(rename = "Avancé")]
    Advanced,
    #[serde(rename = "Expert")]
    Expert,
}

impl EnumLabel for Difficulty {
    const ALL: &'static [Self] = &[
        Difficulty::Beginner,
        Difficulty::Intermediate,
        Difficulty::Advanced,
        Difficulty::Expert,
    ];

    fn label(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Débutant",
            Difficulty::Intermediate => "Intermédiaire",
            Difficulty::Advanced => "Avancé",
            Difficulty::Expert => "Expert",
        }
    }
}

/// 成像模态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Modality {
    #[serde(rename = "IRM")]
    Mri,
    #[serde(rename = "Scanner")]
    Ct,
    #[serde(rename = "Radiographie")]
    XRay,
    #[serde(rename = "Échographie")]
    Ultrasound,
}

impl EnumLabel for Modality {
    const ALL: &'static [Self] = &[
        Modality::Mri,
        Modality::Ct,
        Modality::XRay,
        Modality::Ultrasound,
    ];

    fn label(&self) -> &'static str {
        match self {
            Modality::Mri => "IRM",
            Modality::Ct => "Scanner",
            Modality::XRay => "Radiographie",
            Modality::Ultrasound => "Échographie",
        }
    }
}

macro_rules! label_display_and_parse {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }

            impl FromStr for $ty {
                type Err = RadioError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty as EnumLabel>::from_label(s).ok_or_else(|| {
                        RadioError::Validation(format!("未知的{}: {}", stringify!($ty), s))
                    })
                }
            }
        )*
    };
}

label_display_and_parse!(Specialty, Difficulty, Modality);

/// 影像序列：有序的图像载荷（base64 或 URL），附加后不可变
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Series {
    pub name: String,
    pub images: Vec<String>,
}

impl Series {
    pub fn new(name: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            name: name.into(),
            images,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// 用户在表单中填写的病例字段（不含 id 与创建时间）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaseFields {
    pub patient_id: String,
    pub last_name: String,
    pub first_name: String,
    pub specialty: Specialty,
    pub difficulty: Difficulty,
    pub modality: Modality,
    pub clinical_note: String,
    pub diagnosis: String,
    #[serde(default)]
    pub series: Vec<Series>,
}

impl Default for CaseFields {
    fn default() -> Self {
        Self {
            patient_id: String::new(),
            last_name: String::new(),
            first_name: String::new(),
            specialty: Specialty::Neuroradiology,
            difficulty: Difficulty::Beginner,
            modality: Modality::Mri,
            clinical_note: String::new(),
            diagnosis: String::new(),
            series: Vec::new(),
        }
    }
}

/// 教学病例
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    pub id: String,
    pub patient_id: String,
    pub last_name: String,
    pub first_name: String,
    pub specialty: Specialty,
    pub difficulty: Difficulty,
    pub modality: Modality,
    pub clinical_note: String,
    pub diagnosis: String,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub series: Vec<Series>,
}

impl Case {
    /// 由表单字段创建病例，id 与时间戳由调用方分配
    pub fn from_fields(id: String, date_added: DateTime<Utc>, fields: CaseFields) -> Self {
        Self {
            id,
            patient_id: fields.patient_id,
            last_name: fields.last_name,
            first_name: fields.first_name,
            specialty: fields.specialty,
            difficulty: fields.difficulty,
            modality: fields.modality,
            clinical_note: fields.clinical_note,
            diagnosis: fields.diagnosis,
            date_added,
            series: fields.series,
        }
    }

    /// 提交给语义检索的摘要
    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            id: self.id.clone(),
            diagnosis: self.diagnosis.clone(),
            note: self.clinical_note.clone(),
        }
    }

    pub fn image_count(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }
}

/// 界面主题
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = RadioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(RadioError::Validation(format!("未知的主题: {}", other))),
        }
    }
}

/// 病例列表标签页
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tab {
    #[default]
    All,
    Favorites,
    Specialty(Specialty),
}

impl Tab {
    pub fn label(&self) -> &'static str {
        match self {
            Tab::All => "Tous",
            Tab::Favorites => "Favoris",
            Tab::Specialty(specialty) => specialty.label(),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tab {
    type Err = RadioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tous" | "all" => Ok(Tab::All),
            "favoris" | "favorites" => Ok(Tab::Favorites),
            _ => s.parse::<Specialty>().map(Tab::Specialty),
        }
    }
}

/// AI 对临床记录的分类建议（自由文本，需要再与枚举匹配）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseClassification {
    pub specialty: String,
    pub difficulty: String,
    pub summary: String,
}

/// 语义检索的输入摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseSummary {
    pub id: String,
    pub diagnosis: String,
    pub note: String,
}

/// 语义检索命中
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticMatch {
    pub id: String,
    pub reason: String,
}

/// 语义检索结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SemanticSearchResult {
    #[serde(default)]
    pub matches: Vec<SemanticMatch>,
    #[serde(default)]
    pub suggested_keywords: Vec<String>,
}

impl SemanticSearchResult {
    pub fn contains(&self, case_id: &str) -> bool {
        self.matches.iter().any(|m| m.id == case_id)
    }

    pub fn reason_for(&self, case_id: &str) -> Option<&str> {
        self.matches
            .iter()
            .find(|m| m.id == case_id)
            .map(|m| m.reason.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_json_uses_browser_field_names() {
        let json = r#"{
            "id": "k3j9x0a1b",
            "patientId": "IPP-001",
            "lastName": "Martin",
            "firstName": "Claire",
            "specialty": "Neuroradiologie",
            "difficulty": "Avancé",
            "modality": "IRM",
            "clinicalNote": "Céphalées brutales",
            "diagnosis": "Hémorragie méningée",
            "dateAdded": "2024-03-01T10:00:00.000Z",
            "series": [{"name": "Série 1", "images": ["data:image/png;base64,AAAA"]}]
        }"#;

        let case: Case = serde_json::from_str(json).unwrap();
        assert_eq!(case.specialty, Specialty::Neuroradiology);
        assert_eq!(case.difficulty, Difficulty::Advanced);
        assert_eq!(case.modality, Modality::Mri);
        assert_eq!(case.series.len(), 1);

        let value = serde_json::to_value(&case).unwrap();
        assert_eq!(value["patientId"], "IPP-001");
        assert_eq!(value["specialty"], "Neuroradiologie");
    }

    #[test]
    fn test_label_parsing() {
        assert_eq!("thoracique".parse::<Specialty>().unwrap(), Specialty::Thoracic);
        assert_eq!("Échographie".parse::<Modality>().unwrap(), Modality::Ultrasound);
        assert!("Cardiologie".parse::<Specialty>().is_err());
        assert_eq!("Favoris".parse::<Tab>().unwrap(), Tab::Favorites);
        assert_eq!("ORL".parse::<Tab>().unwrap(), Tab::Specialty(Specialty::Orl));
    }

    #[test]
    fn test_default_visible_specialties() {
        let visible = Specialty::default_visible();
        assert_eq!(visible.len(), 6);
        assert_eq!(visible[0], Specialty::Neuroradiology);
        assert_eq!(visible[5], Specialty::Cardiovascular);
    }

    #[test]
    fn test_theme_serialization() {
        assert_eq!(serde_json::to_string(&Theme::Dark).unwrap(), "\"dark\"");
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
    }
}
