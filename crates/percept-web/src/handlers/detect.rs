//! UI 요소 검출 핸들러.

use std::cmp::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use percept_core::ports::inference::{ObjectDetector, PixelRect, RawBox};
use percept_vision::mock::MOCK_ELEMENTS;
use percept_vision::provider::ModelProvider;
use percept_vision::ui_types::ClassScheme;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{load_image, HealthResponse, RootResponse};
use crate::error::ApiError;

/// 검출 서비스 상태
#[derive(Clone)]
pub struct DetectState {
    /// 검출 모델 제공자
    pub provider: Arc<ModelProvider<dyn ObjectDetector>>,
    /// 클래스 체계 (COCO 매핑 또는 전용 어휘)
    pub scheme: Arc<ClassScheme>,
    /// 요청에 임계값이 없을 때 사용
    pub default_conf: f32,
    /// 응답 최대 요소 수
    pub max_results: usize,
}

/// 검출 요청
#[derive(Debug, Default, Deserialize)]
pub struct DetectRequest {
    pub image_path: Option<String>,
    /// base64 인코딩 이미지
    pub image: Option<String>,
    pub conf_threshold: Option<f32>,
}

/// 검출 후보 요소
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateElement {
    pub id: String,
    #[serde(rename = "type")]
    pub element_type: Option<String>,
    pub text: Option<String>,
    pub role: Option<String>,
    /// 좌상단 픽셀 박스
    pub bbox: PixelRect,
    pub confidence: Option<f32>,
}

/// 검출 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct DetectResponse {
    pub detections: Vec<CandidateElement>,
    pub count: usize,
}

impl DetectResponse {
    fn new(detections: Vec<CandidateElement>) -> Self {
        Self {
            count: detections.len(),
            detections,
        }
    }
}

/// UI 요소 검출
///
/// POST /detect
pub async fn detect(
    State(state): State<DetectState>,
    Json(request): Json<DetectRequest>,
) -> Result<Json<DetectResponse>, ApiError> {
    let image = load_image(request.image_path.as_deref(), request.image.as_deref()).await?;
    let conf = request.conf_threshold.unwrap_or(state.default_conf);

    let Some(detector) = state.provider.get().await else {
        warn!(provider = %state.provider.name(), "검출 모델 없음, mock 응답");
        return Ok(Json(DetectResponse::new(mock_elements())));
    };

    let boxes = detector.detect(&image.bytes, conf).await?;
    let elements = build_elements(
        &boxes,
        detector.class_names(),
        &state.scheme,
        state.max_results,
    );
    debug!(
        raw = boxes.len(),
        returned = elements.len(),
        conf,
        "검출 응답"
    );
    Ok(Json(DetectResponse::new(elements)))
}

/// 헬스체크
///
/// GET /health
pub async fn health(State(state): State<DetectState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.provider.state().is_loaded()))
}

/// 서비스 정보
///
/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse::running("UI Detector"))
}

/// 모델 출력 → 응답 요소 (신뢰도 내림차순, 상위 `max_results`개)
///
/// ID는 정렬 전 출력 순서 기준 `el_00_{j:02}`.
pub fn build_elements(
    boxes: &[RawBox],
    class_names: &[String],
    scheme: &ClassScheme,
    max_results: usize,
) -> Vec<CandidateElement> {
    let mut elements: Vec<CandidateElement> = boxes
        .iter()
        .enumerate()
        .filter_map(|(j, b)| {
            let label = class_names
                .get(b.class_id)
                .map(String::as_str)
                .unwrap_or("unknown");
            let ui_type = scheme.ui_type(label)?;
            Some(CandidateElement {
                id: format!("el_00_{j:02}"),
                element_type: Some(ui_type.clone()),
                text: Some(label.to_string()),
                role: Some(ui_type),
                bbox: PixelRect {
                    x: b.x1 as i32,
                    y: b.y1 as i32,
                    w: b.width() as i32,
                    h: b.height() as i32,
                },
                confidence: Some(b.confidence),
            })
        })
        .collect();

    elements.sort_by(|a, b| {
        b.confidence
            .unwrap_or(0.0)
            .partial_cmp(&a.confidence.unwrap_or(0.0))
            .unwrap_or(Ordering::Equal)
    });
    elements.truncate(max_results);
    elements
}

/// mock 모드 고정 요소
pub fn mock_elements() -> Vec<CandidateElement> {
    MOCK_ELEMENTS
        .iter()
        .map(|m| CandidateElement {
            id: m.id.to_string(),
            element_type: Some("button".to_string()),
            text: Some(m.text.to_string()),
            role: Some("button".to_string()),
            bbox: PixelRect {
                x: m.x,
                y: m.y,
                w: m.w,
                h: m.h,
            },
            confidence: Some(m.confidence),
        })
        .collect()
}
