//! 요소 세그멘테이션 핸들러.
//!
//! 대략적 박스/포인트 프롬프트로 요소 마스크를 구하고 정밀 클릭 좌표를 돌려준다.
//! 클릭 좌표 우선순위:
//! - 실제 모델: 마스크 무게중심 → 박스 중심 → 이미지 중심
//! - mock: 박스 중심 → 포인트 → 설정 기본 좌표

use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use base64::Engine;
use image::{GrayImage, ImageFormat, Luma};
use percept_core::error::CoreError;
use percept_core::ports::inference::{PixelRect, SegmentMask, SegmentPrompt, Segmenter};
use percept_vision::mock::{mock_click_point, MOCK_SEGMENT_CONFIDENCE};
use percept_vision::provider::ModelProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{load_image, HealthResponse, RootResponse};
use crate::error::ApiError;

/// 세그멘테이션 서비스 상태
#[derive(Clone)]
pub struct SegmentState {
    pub provider: Arc<ModelProvider<dyn Segmenter>>,
    /// 보고용 모델 타입 (`vit_b` 등)
    pub model_type: String,
    /// 마스크 PNG 출력 디렉토리
    pub output_dir: PathBuf,
    /// mock 모드 기본 클릭 좌표
    pub mock_click_point: (i32, i32),
}

/// 클릭 좌표
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: i32,
    pub y: i32,
}

impl From<(i32, i32)> for ClickPoint {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// 세그멘테이션 요청
#[derive(Debug, Default, Deserialize)]
pub struct SegmentRequest {
    pub image_path: Option<String>,
    /// base64 인코딩 이미지
    pub image: Option<String>,
    /// 텍스트 프롬프트 (현재 모델은 사용하지 않음)
    pub prompt_text: Option<String>,
    pub coarse_bbox: Option<PixelRect>,
    pub point: Option<ClickPoint>,
}

impl SegmentRequest {
    /// 박스 > 포인트 > 없음
    fn prompt(&self) -> SegmentPrompt {
        match (self.coarse_bbox, self.point) {
            (Some(rect), _) => SegmentPrompt::Box(rect),
            (None, Some(p)) => SegmentPrompt::Point { x: p.x, y: p.y },
            (None, None) => SegmentPrompt::None,
        }
    }
}

/// 세그멘테이션 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub mask_path: Option<String>,
    /// base64 PNG 마스크
    pub mask: Option<String>,
    pub click_point: ClickPoint,
    pub confidence: Option<f32>,
}

/// 모델 정보 응답
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentInfo {
    pub model: String,
    pub status: String,
}

/// 요소 세그멘테이션
///
/// POST /segment
pub async fn segment(
    State(state): State<SegmentState>,
    Json(request): Json<SegmentRequest>,
) -> Result<Json<SegmentResponse>, ApiError> {
    let image = load_image(request.image_path.as_deref(), request.image.as_deref()).await?;
    let prompt = request.prompt();
    let mask_path = state.output_dir.join(format!("{}_mask.png", image.stem));
    if let Some(text) = &request.prompt_text {
        debug!(prompt_text = %text, "텍스트 프롬프트 무시");
    }

    let Some(segmenter) = state.provider.get().await else {
        warn!(provider = %state.provider.name(), "세그멘테이션 모델 없음, mock 응답");
        return Ok(Json(SegmentResponse {
            mask_path: Some(mask_path.display().to_string()),
            mask: None,
            click_point: mock_click_point(prompt, state.mock_click_point).into(),
            confidence: Some(MOCK_SEGMENT_CONFIDENCE),
        }));
    };

    let mask = segmenter.segment(&image.bytes, prompt).await?;
    let click = click_point(&mask, request.coarse_bbox);

    let png = mask_png(&mask)?;
    tokio::fs::write(&mask_path, &png)
        .await
        .map_err(|e| ApiError::Internal(format!("마스크 저장 실패: {e}")))?;
    debug!(path = %mask_path.display(), score = mask.score, "마스크 저장");

    Ok(Json(SegmentResponse {
        mask_path: Some(mask_path.display().to_string()),
        mask: Some(base64::engine::general_purpose::STANDARD.encode(&png)),
        click_point: click.into(),
        confidence: Some(mask.score),
    }))
}

/// 마스크 무게중심 → 박스 중심 → 이미지 중심
pub fn click_point(mask: &SegmentMask, coarse_bbox: Option<PixelRect>) -> (i32, i32) {
    mask.centroid()
        .or_else(|| coarse_bbox.map(|rect| rect.center()))
        .unwrap_or(((mask.width / 2) as i32, (mask.height / 2) as i32))
}

/// 이진 마스크 → 흑백 PNG (전경 255)
pub fn mask_png(mask: &SegmentMask) -> Result<Vec<u8>, CoreError> {
    let img = GrayImage::from_fn(mask.width, mask.height, |x, y| {
        let idx = (y * mask.width + x) as usize;
        Luma([if mask.data.get(idx).copied().unwrap_or(false) { 255 } else { 0 }])
    });
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CoreError::Image(format!("마스크 PNG 인코딩 실패: {e}")))?;
    Ok(buffer.into_inner())
}

/// 헬스체크
///
/// GET /health
pub async fn health(State(state): State<SegmentState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.provider.state().is_loaded()))
}

/// 모델 정보 (로드를 시도한다)
///
/// GET /info
pub async fn info(State(state): State<SegmentState>) -> Json<SegmentInfo> {
    let info = if state.provider.ensure_loaded().await.is_loaded() {
        SegmentInfo {
            model: state.model_type.clone(),
            status: "loaded".to_string(),
        }
    } else {
        SegmentInfo {
            model: "mock".to_string(),
            status: "mock mode".to_string(),
        }
    };
    Json(info)
}

/// GET /
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse::running("SAM Segmentation"))
}
