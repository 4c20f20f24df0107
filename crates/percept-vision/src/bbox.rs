//! 바운딩 박스 정규화 및 검증.
//!
//! 원시 응답 객체 → `Detection` → `NormalizedLabel` 변환.
//! 좌표 해석은 프로파일의 `CoordinateMode`가 정한다:
//! - `Normalized`: `x`, `y`, `w`, `h` 키 (이미 0~1 비율)
//! - `Pixels`: `bbox: [cx, cy, w, h]` 픽셀 배열, 이미지 크기로 나눈다
//!
//! 유한하지 않은 값은 버리고, 각 값을 [0, 1]로 clamp한 뒤
//! 너비/높이가 0 이하이거나 클래스가 어휘 밖이면 버린다.

use percept_core::models::detection::{Detection, Geometry, ImageMeta, NormalizedLabel};
use percept_core::models::profile::{CoordinateMode, LabelingProfile};
use serde_json::Value;
use tracing::debug;

use crate::class_normalizer::ClassResolver;
use crate::response_parser::RawObject;

/// 원시 객체에서 검출 후보 추출. 필수 키가 없거나 숫자가 아니면 `None`.
pub fn detection_from_raw(raw: &RawObject, mode: CoordinateMode) -> Option<Detection> {
    let class_name = raw.get("class").and_then(Value::as_str)?.to_string();

    let geometry = match mode {
        CoordinateMode::Normalized => Geometry::Normalized {
            x: number(raw.get("x")?)?,
            y: number(raw.get("y")?)?,
            w: number(raw.get("w")?)?,
            h: number(raw.get("h")?)?,
        },
        CoordinateMode::Pixels => {
            let values = raw.get("bbox").and_then(Value::as_array)?;
            if values.len() != 4 {
                return None;
            }
            Geometry::Pixels {
                cx: number(&values[0])?,
                cy: number(&values[1])?,
                w: number(&values[2])?,
                h: number(&values[3])?,
            }
        }
    };

    Some(Detection {
        class_name,
        geometry,
        confidence: raw.get("confidence").and_then(number),
        text: raw.get("text").and_then(Value::as_str).map(String::from),
    })
}

/// 검출 후보 → 정규화 라벨. 부수 효과 없음.
///
/// 픽셀 좌표인데 `meta`가 없거나 크기가 0이면 버린다.
pub fn normalize(
    detection: &Detection,
    resolver: ClassResolver<'_>,
    meta: Option<ImageMeta>,
) -> Option<NormalizedLabel> {
    let Some(class_id) = resolver.resolve(&detection.class_name) else {
        debug!(class = %detection.class_name, "어휘 밖 클래스 — 제외");
        return None;
    };

    let [x, y, w, h] = match detection.geometry {
        Geometry::Normalized { x, y, w, h } => [x, y, w, h],
        Geometry::Pixels { cx, cy, w, h } => {
            let meta = meta.filter(|m| m.width > 0 && m.height > 0)?;
            let (iw, ih) = (f64::from(meta.width), f64::from(meta.height));
            [cx / iw, cy / ih, w / iw, h / ih]
        }
    };

    if ![x, y, w, h].iter().all(|v| v.is_finite()) {
        debug!(class = %detection.class_name, "유한하지 않은 좌표 — 제외");
        return None;
    }

    let label = NormalizedLabel {
        class_id,
        center_x: x.clamp(0.0, 1.0),
        center_y: y.clamp(0.0, 1.0),
        width: w.clamp(0.0, 1.0),
        height: h.clamp(0.0, 1.0),
    };

    if label.width <= 0.0 || label.height <= 0.0 {
        debug!(class = %detection.class_name, "크기 0 박스 — 제외");
        return None;
    }
    Some(label)
}

/// 파싱된 원시 객체 목록을 프로파일 기준으로 일괄 변환 (순서 유지)
pub fn labels_from_raw(
    raws: &[RawObject],
    profile: &LabelingProfile,
    meta: Option<ImageMeta>,
) -> Vec<NormalizedLabel> {
    let resolver = ClassResolver::new(&profile.class_rules, &profile.vocabulary);
    raws.iter()
        .filter_map(|raw| detection_from_raw(raw, profile.coordinates))
        .filter_map(|det| normalize(&det, resolver, meta))
        .collect()
}

/// 숫자 또는 숫자 문자열
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
