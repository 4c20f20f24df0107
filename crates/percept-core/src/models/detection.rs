//! 검출 후보와 정규화 라벨.
//!
//! `Detection`은 VLM/모델 호출마다 생성되는 일시적 제안이고,
//! `NormalizedLabel`은 라벨 파일 한 줄로 영속화되는 단위이다.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::models::vocabulary::ClassVocabulary;

/// 검출 좌표 (출처별 좌표계)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "units", rename_all = "snake_case")]
pub enum Geometry {
    /// 이미지 크기 대비 비율 (0~1) 중심점 + 크기
    Normalized { x: f64, y: f64, w: f64, h: f64 },
    /// 픽셀 단위 중심점 + 크기
    Pixels { cx: f64, cy: f64, w: f64, h: f64 },
}

/// 단일 UI 요소 검출 후보
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// 자유 텍스트 클래스명 (정규화 필요)
    pub class_name: String,
    /// 좌표
    pub geometry: Geometry,
    /// 신뢰도 (0.0 ~ 1.0)
    #[serde(default)]
    pub confidence: Option<f64>,
    /// OCR/설명 힌트
    #[serde(default)]
    pub text: Option<String>,
}

/// 이미지 메타데이터 (픽셀 좌표 → 비율 변환용)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// 너비 (px)
    pub width: u32,
    /// 높이 (px)
    pub height: u32,
}

/// YOLO 형식 정규화 라벨
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedLabel {
    /// 활성 어휘 내 클래스 ID
    pub class_id: u32,
    /// 중심 X (0~1)
    pub center_x: f64,
    /// 중심 Y (0~1)
    pub center_y: f64,
    /// 너비 (0 초과 1 이하)
    pub width: f64,
    /// 높이 (0 초과 1 이하)
    pub height: f64,
}

impl NormalizedLabel {
    /// 좌표 범위 불변식 검사 (NaN은 항상 실패)
    pub fn has_valid_geometry(&self) -> bool {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        let size = |v: f64| v > 0.0 && v <= 1.0;
        unit(self.center_x) && unit(self.center_y) && size(self.width) && size(self.height)
    }

    /// 어휘 기준 전체 유효성 검사
    pub fn is_valid_for(&self, vocabulary: &ClassVocabulary) -> bool {
        vocabulary.contains_id(self.class_id) && self.has_valid_geometry()
    }

    /// 라벨 파일 한 줄 (`class x y w h`, 소수점 6자리)
    pub fn to_line(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NormalizedLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:.6} {:.6} {:.6} {:.6}",
            self.class_id, self.center_x, self.center_y, self.width, self.height
        )
    }
}

impl FromStr for NormalizedLabel {
    type Err = CoreError;

    /// 공백 구분 5개 필드 파싱. 범위 검사는 하지 않는다 (검증기 책임).
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(CoreError::validation(
                "label",
                format!("필드 5개 필요, {}개 발견", parts.len()),
            ));
        }
        let class_id = parts[0]
            .parse::<u32>()
            .map_err(|_| CoreError::validation("class_id", format!("정수 아님: {}", parts[0])))?;
        let mut coords = [0.0f64; 4];
        for (slot, raw) in coords.iter_mut().zip(&parts[1..]) {
            *slot = raw
                .parse::<f64>()
                .map_err(|_| CoreError::validation("coords", format!("실수 아님: {raw}")))?;
        }
        Ok(Self {
            class_id,
            center_x: coords[0],
            center_y: coords[1],
            width: coords[2],
            height: coords[3],
        })
    }
}
