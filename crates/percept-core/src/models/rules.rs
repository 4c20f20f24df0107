//! 부분 문자열 기반 분류 규칙 테이블.
//!
//! 파일명 → 화면 상태, 자유 텍스트 → 정규 클래스명 분류에 공통으로 사용한다.
//! 규칙은 순서대로 평가되며 처음 일치한 규칙이 결과를 결정한다.

use serde::{Deserialize, Serialize};

/// 부분 문자열 술어
///
/// `all_of`의 모든 토큰이 포함되고, `any_of`가 비어 있지 않다면 그중 하나 이상이
/// 포함되어야 일치한다. 두 목록이 모두 비어 있으면 어떤 입력에도 일치하지 않는다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringMatch {
    /// 하나 이상 포함되어야 하는 토큰
    #[serde(default)]
    pub any_of: Vec<String>,
    /// 모두 포함되어야 하는 토큰
    #[serde(default)]
    pub all_of: Vec<String>,
}

impl SubstringMatch {
    /// `any_of` 술어 생성
    pub fn any(tokens: &[&str]) -> Self {
        Self {
            any_of: tokens.iter().map(|t| t.to_string()).collect(),
            all_of: Vec::new(),
        }
    }

    /// `all_of` 술어 생성
    pub fn all(tokens: &[&str]) -> Self {
        Self {
            any_of: Vec::new(),
            all_of: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// `all_of` + `any_of` 복합 술어 생성
    pub fn all_and_any(all: &[&str], any: &[&str]) -> Self {
        Self {
            any_of: any.iter().map(|t| t.to_string()).collect(),
            all_of: all.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// 입력 문자열이 술어를 만족하는지 검사
    pub fn matches(&self, input: &str) -> bool {
        if self.any_of.is_empty() && self.all_of.is_empty() {
            return false;
        }
        let all_ok = self.all_of.iter().all(|t| input.contains(t.as_str()));
        let any_ok = self.any_of.is_empty() || self.any_of.iter().any(|t| input.contains(t.as_str()));
        all_ok && any_ok
    }
}

/// (술어, 결과) 쌍
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstringRule<T> {
    /// 일치 조건
    #[serde(rename = "when")]
    pub predicate: SubstringMatch,
    /// 일치 시 결과
    #[serde(rename = "then")]
    pub result: T,
}

impl<T> SubstringRule<T> {
    /// 새 규칙 생성
    pub fn new(predicate: SubstringMatch, result: T) -> Self {
        Self { predicate, result }
    }
}

/// 순서 있는 규칙 테이블 (first-match-wins)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable<T> {
    rules: Vec<SubstringRule<T>>,
}

impl<T> Default for RuleTable<T> {
    fn default() -> Self {
        Self { rules: Vec::new() }
    }
}

impl<T> RuleTable<T> {
    /// 규칙 목록으로 테이블 생성 (순서 = 우선순위)
    pub fn new(rules: Vec<SubstringRule<T>>) -> Self {
        Self { rules }
    }

    /// 규칙 추가 (가장 낮은 우선순위)
    pub fn push(&mut self, predicate: SubstringMatch, result: T) {
        self.rules.push(SubstringRule::new(predicate, result));
    }

    /// 처음 일치한 규칙의 결과 반환
    pub fn first_match(&self, input: &str) -> Option<&T> {
        self.rules
            .iter()
            .find(|r| r.predicate.matches(input))
            .map(|r| &r.result)
    }

    /// 규칙 결과 목록 (우선순위 순)
    pub fn results(&self) -> impl Iterator<Item = &T> {
        self.rules.iter().map(|r| &r.result)
    }

    /// 규칙 개수
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// 규칙이 비어 있는지
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_single_token() {
        let m = SubstringMatch::any(&["check", "call"]);
        assert!(m.matches("btn_check"));
        assert!(m.matches("call"));
        assert!(!m.matches("raise"));
    }

    #[test]
    fn all_requires_every_token() {
        let m = SubstringMatch::all(&["all", "in"]);
        assert!(m.matches("all_in"));
        assert!(!m.matches("call"));
    }

    #[test]
    fn combined_predicate() {
        let m = SubstringMatch::all_and_any(&["deal"], &["again", "end"]);
        assert!(m.matches("hand_deal_again_004"));
        assert!(m.matches("deal_end"));
        assert!(!m.matches("dealt_012"));
    }

    #[test]
    fn empty_predicate_never_matches() {
        assert!(!SubstringMatch::default().matches("anything"));
    }

    #[test]
    fn first_match_wins() {
        let mut table = RuleTable::default();
        table.push(SubstringMatch::any(&["deal"]), "deal");
        table.push(SubstringMatch::any(&["deal_again"]), "never");
        assert_eq!(table.first_match("deal_again"), Some(&"deal"));
        assert_eq!(table.first_match("flop"), None);
        assert_eq!(table.results().copied().collect::<Vec<_>>(), ["deal", "never"]);
    }

    #[test]
    fn table_deserializes_from_json() {
        let json = r#"[{"when": {"any_of": ["flop"]}, "then": "flop"}]"#;
        let table: RuleTable<String> = serde_json::from_str(json).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.first_match("03_flop").map(String::as_str), Some("flop"));
    }
}
