//! 추론 백엔드 포트.
//!
//! 객체 검출, 시각 임베딩, 세그멘테이션 모델을 추상화한다.
//! 실제 구현은 `percept-vision`의 ONNX 어댑터(`onnx` feature)이며,
//! 모델을 로드할 수 없으면 서비스는 mock 응답으로 폴백한다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// 검출 결과 (원본 이미지 픽셀 좌표, 좌상단/우하단)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBox {
    /// 좌상단 X
    pub x1: f32,
    /// 좌상단 Y
    pub y1: f32,
    /// 우하단 X
    pub x2: f32,
    /// 우하단 Y
    pub y2: f32,
    /// 신뢰도
    pub confidence: f32,
    /// 모델 클래스 ID
    pub class_id: usize,
}

impl RawBox {
    /// 너비 (음수 방지)
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// 높이 (음수 방지)
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }
}

/// 픽셀 사각형 (좌상단 + 크기)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    /// 좌상단 X
    pub x: i32,
    /// 좌상단 Y
    pub y: i32,
    /// 너비
    pub w: i32,
    /// 높이
    pub h: i32,
}

impl PixelRect {
    /// 사각형 중심 (정수 나눗셈)
    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }
}

/// 세그멘테이션 프롬프트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentPrompt {
    /// 프롬프트 없음: 이미지 중심점 사용
    None,
    /// 대략적 바운딩 박스
    Box(PixelRect),
    /// 전경 포인트
    Point { x: i32, y: i32 },
}

/// 세그멘테이션 마스크 (행 우선 이진 마스크)
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentMask {
    /// 마스크 너비 (= 원본 이미지 너비)
    pub width: u32,
    /// 마스크 높이 (= 원본 이미지 높이)
    pub height: u32,
    /// 행 우선 픽셀 값 (true = 전경)
    pub data: Vec<bool>,
    /// 모델 점수
    pub score: f32,
}

impl SegmentMask {
    /// 전경 픽셀 중심 (정수 내림). 전경이 없으면 `None`.
    pub fn centroid(&self) -> Option<(i32, i32)> {
        let (mut sx, mut sy, mut n) = (0u64, 0u64, 0u64);
        for (i, &on) in self.data.iter().enumerate() {
            if on {
                sx += (i as u64) % self.width as u64;
                sy += (i as u64) / self.width as u64;
                n += 1;
            }
        }
        if n == 0 || self.width == 0 {
            return None;
        }
        Some(((sx / n) as i32, (sy / n) as i32))
    }
}

/// 객체 검출기
#[async_trait]
pub trait ObjectDetector: Send + Sync {
    /// 이미지 바이트(PNG/JPEG)에서 객체 검출
    async fn detect(&self, image: &[u8], conf_threshold: f32) -> Result<Vec<RawBox>, CoreError>;

    /// 모델 클래스명 (인덱스 = 클래스 ID)
    fn class_names(&self) -> &[String];

    /// 모델 이름 (로그/헬스체크용)
    fn model_name(&self) -> &str;
}

/// 시각 임베딩 추출기
#[async_trait]
pub trait ImageEmbedder: Send + Sync {
    /// 이미지 바이트에서 임베딩 벡터 추출
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, CoreError>;

    /// 임베딩 차원
    fn dimensions(&self) -> usize;

    /// 모델 이름
    fn model_name(&self) -> &str;
}

/// 세그멘테이션 모델
#[async_trait]
pub trait Segmenter: Send + Sync {
    /// 프롬프트 기반 최적 마스크 1개 반환
    async fn segment(&self, image: &[u8], prompt: SegmentPrompt) -> Result<SegmentMask, CoreError>;

    /// 모델 이름
    fn model_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centroid_of_block() {
        // 4x3 마스크, (1..=2, 1..=2) 전경
        let mut data = vec![false; 12];
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            data[y * 4 + x] = true;
        }
        let mask = SegmentMask {
            width: 4,
            height: 3,
            data,
            score: 0.9,
        };
        assert_eq!(mask.centroid(), Some((1, 1)));
    }

    #[test]
    fn centroid_empty_mask() {
        let mask = SegmentMask {
            width: 2,
            height: 2,
            data: vec![false; 4],
            score: 0.1,
        };
        assert_eq!(mask.centroid(), None);
    }

    #[test]
    fn rect_center() {
        let rect = PixelRect {
            x: 540,
            y: 383,
            w: 200,
            h: 61,
        };
        assert_eq!(rect.center(), (640, 413));
    }

    #[test]
    fn raw_box_size_never_negative() {
        let b = RawBox {
            x1: 10.0,
            y1: 10.0,
            x2: 5.0,
            y2: 30.0,
            confidence: 0.5,
            class_id: 0,
        };
        assert_eq!(b.width(), 0.0);
        assert_eq!(b.height(), 20.0);
    }
}
