//! 라벨링 프로파일.
//!
//! 어휘, 클래스명 정규화 규칙, VLM 좌표 규약, 프롬프트를 하나로 묶는다.
//! 좌표가 픽셀인지 비율인지는 프로파일이 명시하며 응답에서 추론하지 않는다.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::detection::ImageMeta;
use crate::models::rules::{RuleTable, SubstringMatch};
use crate::models::vocabulary::{ClassVocabulary, VocabularyPreset};

/// VLM 응답 좌표 규약
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
    /// `x`, `y`, `w`, `h` 키: 이미 0~1 비율
    Normalized,
    /// `bbox: [cx, cy, w, h]`: 픽셀 단위
    Pixels,
}

/// 라벨링 프로파일
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelingProfile {
    /// 프로파일 이름
    pub name: String,
    /// 활성 어휘
    pub vocabulary: ClassVocabulary,
    /// 자유 텍스트 → 정규 클래스명 규칙 (순서 = 우선순위)
    #[serde(default)]
    pub class_rules: RuleTable<String>,
    /// VLM 좌표 규약
    pub coordinates: CoordinateMode,
    /// VLM 프롬프트. 픽셀 프로파일은 `{width}`, `{height}` 자리표시자를 사용한다.
    pub prompt: String,
}

impl LabelingProfile {
    /// 내장 프로파일 조회 (`legacy`, `rive`, `widget`)
    pub fn builtin(name: &str) -> Result<Self, CoreError> {
        match VocabularyPreset::from_name(name)? {
            VocabularyPreset::Legacy => Ok(Self::legacy()),
            VocabularyPreset::Rive => Ok(Self::rive()),
            VocabularyPreset::Widget => Ok(Self::widget()),
            other => Err(CoreError::Config(format!(
                "'{}' 어휘에는 VLM 라벨링 프로파일이 없음",
                other.name()
            ))),
        }
    }

    /// 11-클래스 레거시 프로파일 (비율 좌표)
    pub fn legacy() -> Self {
        let rules = vec![
            (SubstringMatch::any(&["fold"]), "btn_fold"),
            (SubstringMatch::any(&["check", "call"]), "btn_check_call"),
            (SubstringMatch::any(&["raise"]), "btn_raise"),
            (SubstringMatch::all(&["all", "in"]), "btn_all_in"),
            (SubstringMatch::any(&["deal"]), "btn_deal_again"),
            (SubstringMatch::any(&["winner", "banner"]), "winner_banner"),
            (SubstringMatch::any(&["hole"]), "hole_card"),
            (SubstringMatch::any(&["board", "community"]), "board_card"),
            (SubstringMatch::any(&["pot"]), "pot_amount"),
            (SubstringMatch::any(&["back"]), "card_back"),
            (SubstringMatch::any(&["slider"]), "bet_slider"),
        ];
        Self {
            name: "legacy".to_string(),
            vocabulary: ClassVocabulary::preset(VocabularyPreset::Legacy),
            class_rules: build_rules(rules),
            coordinates: CoordinateMode::Normalized,
            prompt: LEGACY_PROMPT.to_string(),
        }
    }

    /// 9-클래스 Rive 프로파일 (비율 좌표, check/call 분리)
    pub fn rive() -> Self {
        let rules = vec![
            (SubstringMatch::any(&["fold"]), "btn_fold"),
            (SubstringMatch::any(&["check"]), "btn_check"),
            (SubstringMatch::any(&["call"]), "btn_call"),
            (SubstringMatch::any(&["raise"]), "btn_raise"),
            (SubstringMatch::any(&["deal"]), "btn_deal"),
            (SubstringMatch::any(&["hole"]), "hole_card"),
            (SubstringMatch::any(&["board", "community"]), "board_card"),
            (SubstringMatch::any(&["pot"]), "pot_amount"),
            (SubstringMatch::any(&["slider"]), "bet_slider"),
        ];
        Self {
            name: "rive".to_string(),
            vocabulary: ClassVocabulary::preset(VocabularyPreset::Rive),
            class_rules: build_rules(rules),
            coordinates: CoordinateMode::Normalized,
            prompt: RIVE_PROMPT.to_string(),
        }
    }

    /// 10-클래스 범용 위젯 프로파일 (픽셀 좌표, 정확 일치만 허용)
    pub fn widget() -> Self {
        Self {
            name: "widget".to_string(),
            vocabulary: ClassVocabulary::preset(VocabularyPreset::Widget),
            class_rules: RuleTable::default(),
            coordinates: CoordinateMode::Pixels,
            prompt: WIDGET_PROMPT.to_string(),
        }
    }

    /// 이미지 크기를 반영한 최종 프롬프트
    pub fn render_prompt(&self, meta: Option<ImageMeta>) -> String {
        match meta {
            Some(m) => self
                .prompt
                .replace("{width}", &m.width.to_string())
                .replace("{height}", &m.height.to_string()),
            None => self.prompt.clone(),
        }
    }
}

fn build_rules(rules: Vec<(SubstringMatch, &str)>) -> RuleTable<String> {
    let mut table = RuleTable::default();
    for (predicate, class) in rules {
        table.push(predicate, class.to_string());
    }
    table
}

const LEGACY_PROMPT: &str = r#"Analyze this poker game screenshot and identify UI elements with their bounding boxes.

Return ONLY a JSON array with detected elements. For each element provide:
- "class": one of [btn_fold, btn_check_call, btn_raise, btn_all_in, btn_deal_again, winner_banner, hole_card, board_card, pot_amount, card_back, bet_slider]
- "x": center x coordinate as fraction (0-1) of image width
- "y": center y coordinate as fraction (0-1) of image height
- "w": width as fraction (0-1) of image width
- "h": height as fraction (0-1) of image height

Rules:
- btn_fold: Red FOLD button at bottom
- btn_check_call: Green CHECK or CALL button at bottom
- btn_raise: Orange RAISE button at bottom
- btn_all_in: Purple ALL IN button at bottom
- btn_deal_again: Yellow DEAL AGAIN button (full width at bottom)
- winner_banner: Yellow banner showing "wins $X"
- hole_card: Face-up cards at bottom belonging to YOU (2 cards)
- board_card: Community cards in center (up to 5 cards)
- pot_amount: Chip stack with dollar amount in center
- card_back: Face-down cards (blue/purple backs)
- bet_slider: Horizontal slider with Min/Pot/Max options

Example response:
[
  {"class": "btn_fold", "x": 0.13, "y": 0.95, "w": 0.2, "h": 0.05},
  {"class": "btn_check_call", "x": 0.37, "y": 0.95, "w": 0.2, "h": 0.05},
  {"class": "hole_card", "x": 0.42, "y": 0.82, "w": 0.08, "h": 0.12},
  {"class": "hole_card", "x": 0.58, "y": 0.82, "w": 0.08, "h": 0.12}
]

Return ONLY the JSON array, no other text."#;

const RIVE_PROMPT: &str = r#"Analyze this poker game screenshot and identify UI elements with their bounding boxes.

Return ONLY a JSON array. For each element provide:
- "class": one of [btn_fold, btn_check, btn_call, btn_raise, btn_deal, hole_card, board_card, pot_amount, bet_slider]
- "x", "y": center coordinates as fractions (0-1) of image width/height
- "w", "h": size as fractions (0-1) of image width/height

CHECK and CALL are different classes: label the button by the word it shows.

Return ONLY the JSON array, no other text."#;

const WIDGET_PROMPT: &str = r#"Analyze this poker game screenshot and detect all UI elements.
The image dimensions are {width}x{height} pixels.

For each UI element, provide:
- class: One of: button, card_face, card_back, chip_stack, pot_display, player_badge, slider, community_area, winner_banner, text_label
- bbox: [x_center, y_center, width, height] in PIXELS (not normalized)
- confidence: 0.0 to 1.0

IMPORTANT: Return ONLY a valid JSON array. No explanation, no markdown.

Example response format:
[
  {"class": "button", "bbox": [200, 800, 100, 50], "text": "FOLD", "confidence": 0.95},
  {"class": "card_face", "bbox": [150, 600, 60, 87], "text": "Ace of Hearts", "confidence": 0.9},
  {"class": "player_badge", "bbox": [50, 200, 120, 60], "text": "Player 1 $500", "confidence": 0.85}
]

Detect ALL visible elements including:
- Action buttons (FOLD, CHECK, CALL, RAISE, ALL-IN, DEAL AGAIN)
- Playing cards (face-up and face-down)
- Player info badges (name + chips)
- Pot display
- Bet slider
- Any winner banners

Your JSON response:"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profiles() {
        assert_eq!(LabelingProfile::builtin("legacy").unwrap().coordinates, CoordinateMode::Normalized);
        assert_eq!(LabelingProfile::builtin("widget").unwrap().coordinates, CoordinateMode::Pixels);
        assert!(LabelingProfile::builtin("cards").is_err());
        assert!(LabelingProfile::builtin("nope").is_err());
    }

    #[test]
    fn every_rule_targets_vocabulary() {
        for profile in [LabelingProfile::legacy(), LabelingProfile::rive()] {
            for class in profile.vocabulary.classes.iter() {
                // 정규 클래스명은 자기 자신으로 정규화되어야 한다
                assert_eq!(
                    profile.class_rules.first_match(class).map(String::as_str),
                    Some(class.as_str()),
                    "{} / {}",
                    profile.name,
                    class
                );
            }
        }
    }

    #[test]
    fn pixel_prompt_renders_dimensions() {
        let profile = LabelingProfile::widget();
        let prompt = profile.render_prompt(Some(ImageMeta {
            width: 1290,
            height: 2796,
        }));
        assert!(prompt.contains("1290x2796 pixels"));
        assert!(!prompt.contains("{width}"));
    }
}
