//! 클래스명 정규화.
//!
//! 소문자화 + 공백→밑줄 후 프로파일의 부분 문자열 규칙 테이블을 순서대로
//! 평가한다. 어느 규칙에도 맞지 않으면 정규화된 문자열을 그대로 돌려주며,
//! 어휘 밖 이름은 이후 ID 조회 단계에서 버려진다.

use percept_core::models::rules::RuleTable;
use percept_core::models::vocabulary::ClassVocabulary;

/// 대소문자/공백 정리 (`"Check Call"` → `"check_call"`)
pub fn canonicalize(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

/// 자유 텍스트 클래스명 → 정규 클래스명
pub fn normalize_class_name(raw: &str, rules: &RuleTable<String>) -> String {
    let name = canonicalize(raw);
    match rules.first_match(&name) {
        Some(canonical) => canonical.clone(),
        None => name,
    }
}

/// 클래스명 해석기 (규칙 테이블 + 어휘)
#[derive(Debug, Clone, Copy)]
pub struct ClassResolver<'a> {
    rules: &'a RuleTable<String>,
    vocabulary: &'a ClassVocabulary,
}

impl<'a> ClassResolver<'a> {
    pub fn new(rules: &'a RuleTable<String>, vocabulary: &'a ClassVocabulary) -> Self {
        Self { rules, vocabulary }
    }

    /// 정규화 후 어휘 ID. 어휘 밖이면 `None`.
    pub fn resolve(&self, raw: &str) -> Option<u32> {
        self.vocabulary.id_of(&normalize_class_name(raw, self.rules))
    }
}
