//! 모델 출력 후처리.
//!
//! YOLOv8 출력 디코딩 + 클래스별 greedy NMS, SAM 마스크 선택.

use std::cmp::Ordering;

use percept_core::ports::inference::{RawBox, SegmentMask};

use crate::preprocess::Letterbox;

/// YOLOv8 출력 디코딩
///
/// `data`는 `[1, 4 + num_classes, num_preds]` 행 우선 배열.
/// 각 예측의 최고 점수 클래스가 `conf_threshold` 이상이면 원본 픽셀 좌표로 변환한다.
pub fn decode_yolo(
    data: &[f32],
    num_classes: usize,
    num_preds: usize,
    conf_threshold: f32,
    letterbox: &Letterbox,
) -> Vec<RawBox> {
    if data.len() < (4 + num_classes) * num_preds {
        return Vec::new();
    }
    let at = |row: usize, i: usize| data[row * num_preds + i];

    let mut boxes = Vec::new();
    for i in 0..num_preds {
        let (mut best, mut class_id) = (0.0f32, 0usize);
        for c in 0..num_classes {
            let score = at(4 + c, i);
            if score > best {
                best = score;
                class_id = c;
            }
        }
        if best < conf_threshold {
            continue;
        }
        let [x1, y1, x2, y2] = letterbox.unmap(at(0, i), at(1, i), at(2, i), at(3, i));
        boxes.push(RawBox {
            x1,
            y1,
            x2,
            y2,
            confidence: best,
            class_id,
        });
    }
    boxes
}

/// 클래스별 greedy NMS. 결과는 신뢰도 내림차순.
pub fn nms(mut boxes: Vec<RawBox>, iou_threshold: f32) -> Vec<RawBox> {
    boxes.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
    let mut keep: Vec<RawBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        let suppressed = keep
            .iter()
            .any(|k| k.class_id == candidate.class_id && iou(k, &candidate) > iou_threshold);
        if !suppressed {
            keep.push(candidate);
        }
    }
    keep
}

/// 두 박스의 IoU
pub fn iou(a: &RawBox, b: &RawBox) -> f32 {
    let ix1 = a.x1.max(b.x1);
    let iy1 = a.y1.max(b.y1);
    let ix2 = a.x2.min(b.x2);
    let iy2 = a.y2.min(b.y2);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let union = a.width() * a.height() + b.width() * b.height() - inter;
    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// 점수가 가장 높은 마스크 선택 (`masks`: `[k, h, w]` 로짓, 0 초과 = 전경)
pub fn best_mask(masks: &[f32], scores: &[f32], width: u32, height: u32) -> Option<SegmentMask> {
    let plane = width as usize * height as usize;
    if plane == 0 || scores.is_empty() || masks.len() < plane * scores.len() {
        return None;
    }
    let (best, score) = scores
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))?;
    let data = masks[best * plane..(best + 1) * plane]
        .iter()
        .map(|&v| v > 0.0)
        .collect();
    Some(SegmentMask {
        width,
        height,
        data,
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rb(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> RawBox {
        RawBox {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    #[test]
    fn nms_suppresses_same_class_only() {
        let boxes = vec![
            rb(0.0, 0.0, 10.0, 10.0, 0.8, 0),
            rb(1.0, 1.0, 11.0, 11.0, 0.9, 0),
            rb(1.0, 1.0, 11.0, 11.0, 0.7, 1),
            rb(50.0, 50.0, 60.0, 60.0, 0.6, 0),
        ];
        let kept = nms(boxes, 0.45);
        let confs: Vec<f32> = kept.iter().map(|b| b.confidence).collect();
        assert_eq!(confs, vec![0.9, 0.7, 0.6]);
    }

    #[test]
    fn iou_values() {
        let a = rb(0.0, 0.0, 10.0, 10.0, 1.0, 0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &rb(20.0, 20.0, 30.0, 30.0, 1.0, 0)), 0.0);
        let half = iou(&a, &rb(5.0, 0.0, 15.0, 10.0, 1.0, 0));
        assert!((half - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn decode_filters_by_confidence() {
        // 2 클래스, 3 예측, 입력 = 원본 (scale 1, 패딩 0)
        let lb = Letterbox::new(100, 100, 100);
        #[rustfmt::skip]
        let data = vec![
            // cx
            50.0, 20.0, 80.0,
            // cy
            50.0, 20.0, 80.0,
            // w
            20.0, 10.0, 10.0,
            // h
            10.0, 10.0, 10.0,
            // class 0
            0.9, 0.1, 0.2,
            // class 1
            0.05, 0.2, 0.6,
        ];
        let boxes = decode_yolo(&data, 2, 3, 0.3, &lb);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].class_id, 0);
        assert_eq!([boxes[0].x1, boxes[0].y1, boxes[0].x2, boxes[0].y2], [40.0, 45.0, 60.0, 55.0]);
        assert_eq!(boxes[1].class_id, 1);
        assert!(decode_yolo(&data[..5], 2, 3, 0.3, &lb).is_empty());
    }

    #[test]
    fn best_mask_picks_highest_score() {
        // 2개 마스크, 2x2
        let masks = vec![1.0, -1.0, -1.0, -1.0, 1.0, 1.0, 1.0, -1.0];
        let mask = best_mask(&masks, &[0.3, 0.8], 2, 2).unwrap();
        assert_eq!(mask.data, vec![true, true, true, false]);
        assert_eq!(mask.score, 0.8);
        assert!(best_mask(&masks, &[], 2, 2).is_none());
    }
}
