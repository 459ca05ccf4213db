//! 通用工具函数

use uuid::Uuid;

use crate::models::EnumLabel;

/// 参与第二轮匹配的词最短长度
const MIN_TOKEN_LEN: usize = 3;

/// 生成病例的不透明唯一标识符
pub fn generate_case_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// 将 AI 返回的自由文本与固定枚举进行模糊匹配
///
/// 第一轮：按枚举顺序，取第一个小写标签包含整个建议文本的成员；
/// 第二轮：取第一个标签包含建议中任一词（至少三个字符）的成员。
/// 空白建议不匹配任何成员。
pub fn fuzzy_match_label<T: EnumLabel>(suggestion: &str) -> Option<T> {
    let needle = suggestion.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    if let Some(member) = T::ALL
        .iter()
        .copied()
        .find(|member| member.label().to_lowercase().contains(&needle))
    {
        return Some(member);
    }

    let tokens: Vec<&str> = needle
        .split(|c: char| c.is_whitespace() || c == ',' || c == '/')
        .filter(|token| token.chars().count() >= MIN_TOKEN_LEN)
        .collect();

    T::ALL.iter().copied().find(|member| {
        let label = member.label().to_lowercase();
        tokens.iter().any(|token| label.contains(token))
    })
}

/// 病例列表中的患者姓名显示
///
/// 匿名模式下仅保留姓和名的首字符。
pub fn format_patient_name(last_name: &str, first_name: &str, anonymized: bool) -> String {
    if anonymized {
        let initial = |s: &str| s.chars().next().map(String::from).unwrap_or_default();
        format!("{}*** {}***", initial(last_name), initial(first_name))
    } else {
        format!("{} {}", last_name.to_uppercase(), first_name)
    }
}
