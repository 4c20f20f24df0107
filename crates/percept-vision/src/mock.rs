//! mock 모드 응답 데이터.
//!
//! 모델을 로드할 수 없을 때 서비스가 돌려주는 고정/무작위 결과.
//! 개발 중 클라이언트 연동 테스트에 쓰인다.

use percept_core::ports::inference::SegmentPrompt;

use crate::synth::Sampler;

/// mock 세그멘테이션 신뢰도
pub const MOCK_SEGMENT_CONFIDENCE: f32 = 0.85;

/// mock 검출 요소 (좌상단 픽셀 박스)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockElement {
    pub id: &'static str,
    pub text: &'static str,
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub confidence: f32,
}

const fn element(
    id: &'static str,
    text: &'static str,
    bbox: [i32; 4],
    confidence: f32,
) -> MockElement {
    MockElement {
        id,
        text,
        x: bbox[0],
        y: bbox[1],
        w: bbox[2],
        h: bbox[3],
        confidence,
    }
}

/// 카지노 게임 화면 버튼 6개 (신뢰도 내림차순)
pub const MOCK_ELEMENTS: [MockElement; 6] = [
    element("el_01", "SPIN", [540, 383, 200, 60], 0.95),
    element("el_02", "+", [730, 470, 50, 50], 0.92),
    element("el_03", "-", [490, 470, 50, 50], 0.91),
    element("el_04", "DEAL", [565, 455, 150, 50], 0.90),
    element("el_05", "HIT", [500, 455, 100, 50], 0.89),
    element("el_06", "STAND", [660, 455, 100, 50], 0.88),
];

/// [-1, 1] 균등 분포 임베딩
pub fn mock_embedding<S: Sampler>(dimensions: usize, sampler: &mut S) -> Vec<f32> {
    (0..dimensions).map(|_| sampler.range(-1.0, 1.0)).collect()
}

/// mock 클릭 좌표: 박스 중심 → 포인트 → 기본 좌표
pub fn mock_click_point(prompt: SegmentPrompt, default: (i32, i32)) -> (i32, i32) {
    match prompt {
        SegmentPrompt::Box(rect) => rect.center(),
        SegmentPrompt::Point { x, y } => (x, y),
        SegmentPrompt::None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::ThreadSampler;
    use percept_core::ports::inference::PixelRect;

    #[test]
    fn elements_sorted_by_confidence() {
        assert!(MOCK_ELEMENTS
            .windows(2)
            .all(|w| w[0].confidence >= w[1].confidence));
        assert_eq!(MOCK_ELEMENTS[0].text, "SPIN");
    }

    #[test]
    fn embedding_in_range() {
        let embedding = mock_embedding(768, &mut ThreadSampler);
        assert_eq!(embedding.len(), 768);
        assert!(embedding.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn click_point_priority() {
        let rect = PixelRect {
            x: 100,
            y: 200,
            w: 50,
            h: 21,
        };
        assert_eq!(mock_click_point(SegmentPrompt::Box(rect), (640, 413)), (125, 210));
        assert_eq!(
            mock_click_point(SegmentPrompt::Point { x: 7, y: 9 }, (640, 413)),
            (7, 9)
        );
        assert_eq!(mock_click_point(SegmentPrompt::None, (640, 413)), (640, 413));
    }
}
