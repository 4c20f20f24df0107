//! VLM 응답 파서.
//!
//! 모델은 JSON 배열만 반환하도록 지시받지만 실제로는 설명 문장이나
//! 코드 펜스로 감싸서 보내는 경우가 많다. 아래 순서로 시도하고
//! 처음 성공한 단계의 결과를 사용한다:
//!
//! 1. 전체 문자열을 JSON 배열로 파싱
//! 2. 첫 번째 코드 펜스(```json ... ```) 내부를 JSON 배열로 파싱
//! 3. 첫 `[`부터 마지막 `]`까지 (여러 줄 포함) JSON 배열로 파싱
//! 4. 중첩 없는 `{...}` 조각을 개별 파싱, `class`와 `x`/`bbox` 키가 있는 것만 유지
//!
//! 어떤 입력에도 실패하지 않는다. 전부 실패하면 빈 목록 + warn 로그.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// 파싱된 원시 검출 객체 (키 해석은 `bbox` 모듈 책임)
pub type RawObject = Map<String, Value>;

/// 경고 로그에 남길 응답 미리보기 길이 (문자 수)
const PREVIEW_CHARS: usize = 200;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)```").expect("코드 펜스 정규식"));

static FLAT_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[^{}]+\}").expect("객체 정규식"));

/// 응답 텍스트에서 검출 후보 객체 목록 추출
pub fn parse_detections(text: &str) -> Vec<RawObject> {
    if let Some(objects) = parse_array(text) {
        debug!(count = objects.len(), "응답 전체가 JSON 배열");
        return objects;
    }

    if let Some(objects) = FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_array(m.as_str()))
    {
        debug!(count = objects.len(), "코드 펜스에서 JSON 배열 추출");
        return objects;
    }

    if let Some(objects) = outer_brackets(text).and_then(parse_array) {
        debug!(count = objects.len(), "대괄호 범위에서 JSON 배열 추출");
        return objects;
    }

    let objects: Vec<RawObject> = FLAT_OBJECT
        .find_iter(text)
        .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .filter_map(into_object)
        .filter(looks_like_detection)
        .collect();

    if objects.is_empty() {
        warn!(
            preview = %preview(text),
            "VLM 응답에서 검출 결과를 찾지 못함"
        );
    } else {
        debug!(count = objects.len(), "개별 객체 조각에서 검출 추출");
    }
    objects
}

/// JSON 배열이면 객체 원소만 반환.
/// 배열이 아니거나, 비어 있지 않은데 객체 원소가 하나도 없으면 `None`
/// (예: 문장 속 `bbox` 숫자 배열만 잡힌 경우).
fn parse_array(text: &str) -> Option<Vec<RawObject>> {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(Value::Array(items)) => {
            let total = items.len();
            let objects: Vec<RawObject> = items.into_iter().filter_map(into_object).collect();
            (total == 0 || !objects.is_empty()).then_some(objects)
        }
        _ => None,
    }
}

/// 첫 `[`부터 마지막 `]`까지
fn outer_brackets(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (start < end).then(|| &text[start..=end])
}

fn into_object(value: Value) -> Option<RawObject> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn looks_like_detection(obj: &RawObject) -> bool {
    obj.contains_key("class") && (obj.contains_key("x") || obj.contains_key("bbox"))
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(objects: &[RawObject]) -> Vec<&str> {
        objects
            .iter()
            .filter_map(|o| o.get("class").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn plain_array() {
        let objects =
            parse_detections(r#"[{"class":"btn_fold","x":0.1,"y":0.9,"w":0.2,"h":0.05}]"#);
        assert_eq!(classes(&objects), vec!["btn_fold"]);
    }

    #[test]
    fn fenced_block_with_prose() {
        let text = "Here are the elements:\n```json\n[{\"class\":\"pot\",\"x\":0.5,\"y\":0.7,\"w\":0.2,\"h\":0.08}]\n```\nHope this helps!";
        let objects = parse_detections(text);
        assert_eq!(classes(&objects), vec!["pot"]);
    }

    #[test]
    fn fenced_object_extracted_verbatim() {
        let text = "Some text\n```json\n[{\"class\":\"btn_fold\",\"x\":0.1,\"y\":0.9,\"w\":0.2,\"h\":0.05}]\n```\nmore text";
        let objects = parse_detections(text);
        assert_eq!(objects.len(), 1);
        let expected = serde_json::json!({"class":"btn_fold","x":0.1,"y":0.9,"w":0.2,"h":0.05});
        assert_eq!(Value::Object(objects[0].clone()), expected);
    }

    #[test]
    fn fence_without_language_tag() {
        let text = "```\n[{\"class\":\"slider\",\"x\":0.5,\"y\":0.9,\"w\":0.8,\"h\":0.03}]\n```";
        assert_eq!(classes(&parse_detections(text)), vec!["slider"]);
    }

    #[test]
    fn brackets_inside_prose_across_lines() {
        let text = "I found:\n[\n  {\"class\": \"hole_card\", \"x\": 0.42, \"y\": 0.83, \"w\": 0.12, \"h\": 0.13},\n  {\"class\": \"hole_card\", \"x\": 0.58, \"y\": 0.83, \"w\": 0.12, \"h\": 0.13}\n]\nThat is all.";
        assert_eq!(classes(&parse_detections(text)), vec!["hole_card", "hole_card"]);
    }

    #[test]
    fn loose_objects_are_filtered() {
        let text = r#"First {"class": "btn_raise", "x": 0.6, "y": 0.97, "w": 0.2, "h": 0.04}
            then {"note": "ignore me"} and {"class": "button", "bbox": [200, 800, 100, 50]}
            and {"class": "no_coords"}"#;
        assert_eq!(classes(&parse_detections(text)), vec!["btn_raise", "button"]);
    }

    #[test]
    fn array_keeps_only_objects() {
        let objects = parse_detections(r#"[1, "x", {"class":"pot","x":0.5}]"#);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn empty_and_garbage_yield_nothing() {
        assert!(parse_detections("").is_empty());
        assert!(parse_detections("I could not find any elements.").is_empty());
        assert!(parse_detections("[not json]").is_empty());
        assert!(parse_detections("[]").is_empty());
    }

    #[test]
    fn preview_truncates_long_text() {
        let long = "a".repeat(500);
        assert_eq!(preview(&long).chars().count(), PREVIEW_CHARS + 1);
        assert_eq!(preview("short"), "short");
    }
}
