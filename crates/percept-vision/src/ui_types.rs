//! 검출 라벨 → UI 요소 타입.
//!
//! 범용 COCO 모델은 UI 요소를 직접 알지 못하므로 모양이 비슷한 사물을
//! UI 타입에 대응시킨다 (휴대폰 → 버튼, 키보드 → 입력창 등).
//! 전용 어휘로 학습한 모델은 클래스명을 그대로 쓴다.

use std::path::Path;

use percept_core::error::CoreError;
use percept_core::models::vocabulary::ClassVocabulary;

/// 범용 사전학습 가중치 파일명 접두사 (항상 COCO 체계)
const GENERIC_MODEL_PREFIX: &str = "yolov8";

/// 모델 클래스 체계
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassScheme {
    /// COCO 80-클래스 (사물 → UI 타입 매핑)
    Coco,
    /// 전용 어휘 (클래스명 = 타입)
    Vocabulary(Vec<String>),
}

impl ClassScheme {
    /// 설정값으로 생성: `coco` 또는 어휘 프리셋 이름
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        if name.eq_ignore_ascii_case("coco") {
            return Ok(Self::Coco);
        }
        let vocabulary = ClassVocabulary::from_preset_name(name)?;
        Ok(Self::Vocabulary(vocabulary.classes))
    }

    /// 모델 파일에 맞는 체계. 범용 `yolov8*` 가중치는 설정과 무관하게 COCO.
    pub fn for_model(model: Option<&Path>, classes: &str) -> Result<Self, CoreError> {
        let generic = model
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with(GENERIC_MODEL_PREFIX))
            .unwrap_or(false);
        if generic {
            Ok(Self::Coco)
        } else {
            Self::from_name(classes)
        }
    }

    /// 모델 출력 인덱스 순서의 클래스명
    pub fn class_names(&self) -> Vec<String> {
        match self {
            Self::Coco => COCO_CLASSES.iter().map(|c| c.to_string()).collect(),
            Self::Vocabulary(names) => names.clone(),
        }
    }

    /// 클래스명 → UI 타입. `None`이면 결과에서 제외.
    pub fn ui_type(&self, label: &str) -> Option<String> {
        match self {
            Self::Coco => coco_ui_type(label).map(String::from),
            Self::Vocabulary(_) => Some(label.to_string()),
        }
    }
}

/// COCO 라벨 → UI 타입 (사람은 제외, 미등록은 버튼)
pub fn coco_ui_type(label: &str) -> Option<&'static str> {
    match label {
        "person" => None,
        "cell phone" | "remote" => Some("button"),
        "keyboard" => Some("textbox"),
        "book" => Some("card"),
        "tv" | "laptop" => Some("container"),
        "mouse" => Some("icon"),
        _ => Some("button"),
    }
}

/// COCO 80-클래스 (YOLOv8 출력 순서)
pub const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coco_mapping() {
        assert_eq!(coco_ui_type("person"), None);
        assert_eq!(coco_ui_type("cell phone"), Some("button"));
        assert_eq!(coco_ui_type("keyboard"), Some("textbox"));
        assert_eq!(coco_ui_type("book"), Some("card"));
        assert_eq!(coco_ui_type("laptop"), Some("container"));
        assert_eq!(coco_ui_type("giraffe"), Some("button"));
    }

    #[test]
    fn vocabulary_scheme_passes_through() {
        let scheme = ClassScheme::Vocabulary(vec!["btn_fold".to_string()]);
        assert_eq!(scheme.ui_type("btn_fold").as_deref(), Some("btn_fold"));
        assert_eq!(ClassScheme::Coco.class_names().len(), 80);
    }

    #[test]
    fn scheme_selection() {
        assert_eq!(ClassScheme::from_name("COCO").unwrap(), ClassScheme::Coco);

        let rive = ClassScheme::from_name("rive").unwrap();
        assert_eq!(rive.class_names()[0], "btn_fold");

        let generic = ClassScheme::for_model(Some(Path::new("models/yolov8n.onnx")), "rive").unwrap();
        assert_eq!(generic, ClassScheme::Coco);
        let custom = ClassScheme::for_model(Some(Path::new("rive_poker_model.onnx")), "rive").unwrap();
        assert_eq!(custom, rive);

        assert!(ClassScheme::from_name("nonexistent").is_err());
    }
}
