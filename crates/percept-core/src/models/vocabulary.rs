//! 클래스 어휘 (정규 클래스명 → 클래스 ID).
//!
//! 클래스 ID는 목록 내 위치(0부터)이다. 한 번의 파이프라인 실행은
//! 정확히 하나의 어휘를 명시적으로 선택하며, 라벨 파일/classes.txt/데이터셋
//! 디스크립터는 모두 같은 어휘로 생성되어야 한다.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 레거시 11-클래스 포커 어휘 (check/call 통합)
const LEGACY_CLASSES: &[&str] = &[
    "btn_fold",
    "btn_check_call",
    "btn_raise",
    "btn_all_in",
    "btn_deal_again",
    "winner_banner",
    "hole_card",
    "board_card",
    "pot_amount",
    "card_back",
    "bet_slider",
];

/// Rive 포커 UI 9-클래스 어휘 (check/call 분리)
const RIVE_CLASSES: &[&str] = &[
    "btn_fold",
    "btn_check",
    "btn_call",
    "btn_raise",
    "btn_deal",
    "hole_card",
    "board_card",
    "pot_amount",
    "bet_slider",
];

/// 범용 위젯 10-클래스 어휘
const WIDGET_CLASSES: &[&str] = &[
    "button",
    "card_face",
    "card_back",
    "chip_stack",
    "pot_display",
    "player_badge",
    "slider",
    "community_area",
    "winner_banner",
    "text_label",
];

/// Flutter UI 8-클래스 어휘
const FLUTTER_CLASSES: &[&str] = &[
    "button",
    "textfield",
    "label",
    "icon",
    "card_widget",
    "balance_display",
    "canvas_button",
    "game_control",
];

const CARD_RANKS: &[&str] = &[
    "ace", "king", "queen", "jack", "10", "9", "8", "7", "6", "5", "4", "3", "2",
];
const CARD_SUITS: &[&str] = &["spades", "hearts", "diamonds", "clubs"];

/// 뒷면 카드 클래스명 (카드 어휘의 마지막 ID)
pub const CARD_BACK: &str = "card_back";

/// 내장 어휘 프리셋
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyPreset {
    /// 11-클래스 레거시 포커
    Legacy,
    /// 9-클래스 Rive 포커
    Rive,
    /// 10-클래스 범용 위젯
    Widget,
    /// 8-클래스 Flutter UI
    Flutter,
    /// 53-클래스 트럼프 카드 (52장 + 뒷면)
    Cards,
}

impl VocabularyPreset {
    /// 이름으로 프리셋 조회
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name.trim().to_lowercase().as_str() {
            "legacy" => Ok(Self::Legacy),
            "rive" => Ok(Self::Rive),
            "widget" => Ok(Self::Widget),
            "flutter" => Ok(Self::Flutter),
            "cards" => Ok(Self::Cards),
            other => Err(CoreError::not_found("Vocabulary", other)),
        }
    }

    /// 프리셋 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Rive => "rive",
            Self::Widget => "widget",
            Self::Flutter => "flutter",
            Self::Cards => "cards",
        }
    }
}

/// 클래스 어휘: 정규 클래스명 목록 (ID 오름차순)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassVocabulary {
    /// 어휘 이름 (로그/디스크립터 주석용)
    pub name: String,
    /// 정규 클래스명 (인덱스 = 클래스 ID)
    pub classes: Vec<String>,
}

impl ClassVocabulary {
    /// 클래스명 목록으로 어휘 생성
    ///
    /// 빈 목록이나 중복 클래스명은 거부한다.
    pub fn new(name: impl Into<String>, classes: Vec<String>) -> Result<Self, CoreError> {
        if classes.is_empty() {
            return Err(CoreError::validation("classes", "어휘가 비어 있음"));
        }
        for (i, class) in classes.iter().enumerate() {
            if class.trim().is_empty() {
                return Err(CoreError::validation("classes", format!("{i}번 클래스명이 비어 있음")));
            }
            if classes[..i].contains(class) {
                return Err(CoreError::validation("classes", format!("중복 클래스명: {class}")));
            }
        }
        Ok(Self {
            name: name.into(),
            classes,
        })
    }

    /// 내장 프리셋 어휘
    pub fn preset(preset: VocabularyPreset) -> Self {
        let classes: Vec<String> = match preset {
            VocabularyPreset::Legacy => to_owned(LEGACY_CLASSES),
            VocabularyPreset::Rive => to_owned(RIVE_CLASSES),
            VocabularyPreset::Widget => to_owned(WIDGET_CLASSES),
            VocabularyPreset::Flutter => to_owned(FLUTTER_CLASSES),
            VocabularyPreset::Cards => card_classes(),
        };
        Self {
            name: preset.name().to_string(),
            classes,
        }
    }

    /// 이름으로 프리셋 어휘 조회
    pub fn from_preset_name(name: &str) -> Result<Self, CoreError> {
        VocabularyPreset::from_name(name).map(Self::preset)
    }

    /// classes.txt 형식 텍스트에서 어휘 로드 (한 줄에 하나, 빈 줄 무시)
    pub fn from_manifest(name: impl Into<String>, manifest: &str) -> Result<Self, CoreError> {
        let classes = manifest
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect();
        Self::new(name, classes)
    }

    /// 클래스명 → ID
    pub fn id_of(&self, class_name: &str) -> Option<u32> {
        self.classes
            .iter()
            .position(|c| c == class_name)
            .map(|i| i as u32)
    }

    /// ID → 클래스명
    pub fn name_of(&self, class_id: u32) -> Option<&str> {
        self.classes.get(class_id as usize).map(String::as_str)
    }

    /// ID가 어휘에 속하는지
    pub fn contains_id(&self, class_id: u32) -> bool {
        (class_id as usize) < self.classes.len()
    }

    /// 클래스 개수
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// 어휘가 비어 있는지 (생성자 검증상 항상 false)
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// (ID, 클래스명) 순회
    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, c)| (i as u32, c.as_str()))
    }

    /// classes.txt 매니페스트 텍스트 (ID 오름차순, 줄 끝 개행)
    pub fn to_manifest(&self) -> String {
        let mut out = String::new();
        for class in &self.classes {
            out.push_str(class);
            out.push('\n');
        }
        out
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// 52장 카드 + 뒷면 (랭크 우선, 무늬 순서 spades/hearts/diamonds/clubs)
fn card_classes() -> Vec<String> {
    let mut classes = Vec::with_capacity(CARD_RANKS.len() * CARD_SUITS.len() + 1);
    for rank in CARD_RANKS {
        for suit in CARD_SUITS {
            classes.push(format!("{rank}_of_{suit}"));
        }
    }
    classes.push(CARD_BACK.to_string());
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_sizes() {
        assert_eq!(ClassVocabulary::preset(VocabularyPreset::Legacy).len(), 11);
        assert_eq!(ClassVocabulary::preset(VocabularyPreset::Rive).len(), 9);
        assert_eq!(ClassVocabulary::preset(VocabularyPreset::Widget).len(), 10);
        assert_eq!(ClassVocabulary::preset(VocabularyPreset::Flutter).len(), 8);
        assert_eq!(ClassVocabulary::preset(VocabularyPreset::Cards).len(), 53);
    }

    #[test]
    fn card_ids_follow_rank_then_suit() {
        let cards = ClassVocabulary::preset(VocabularyPreset::Cards);
        assert_eq!(cards.id_of("ace_of_spades"), Some(0));
        assert_eq!(cards.id_of("ace_of_clubs"), Some(3));
        assert_eq!(cards.id_of("king_of_spades"), Some(4));
        assert_eq!(cards.id_of("10_of_hearts"), Some(17));
        assert_eq!(cards.id_of("2_of_clubs"), Some(51));
        assert_eq!(cards.id_of(CARD_BACK), Some(52));
    }

    #[test]
    fn legacy_lookup() {
        let vocab = ClassVocabulary::preset(VocabularyPreset::Legacy);
        assert_eq!(vocab.id_of("btn_check_call"), Some(1));
        assert_eq!(vocab.name_of(10), Some("bet_slider"));
        assert!(vocab.contains_id(10));
        assert!(!vocab.contains_id(11));
        assert_eq!(vocab.id_of("spaceship"), None);
    }

    #[test]
    fn rejects_duplicates_and_empty() {
        assert!(ClassVocabulary::new("x", vec![]).is_err());
        assert!(ClassVocabulary::new("x", vec!["a".into(), "a".into()]).is_err());
        assert!(ClassVocabulary::new("x", vec!["a".into(), " ".into()]).is_err());
    }

    #[test]
    fn manifest_roundtrip() {
        let vocab = ClassVocabulary::preset(VocabularyPreset::Rive);
        let manifest = vocab.to_manifest();
        assert!(manifest.starts_with("btn_fold\nbtn_check\n"));
        let loaded = ClassVocabulary::from_manifest("rive", &manifest).unwrap();
        assert_eq!(loaded.classes, vocab.classes);
    }

    #[test]
    fn preset_by_name() {
        assert!(ClassVocabulary::from_preset_name("LEGACY").is_ok());
        assert!(ClassVocabulary::from_preset_name("unknown").is_err());
    }
}
