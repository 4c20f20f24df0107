//! 추론 서비스 핸들러.

pub mod detect;
pub mod embed;
pub mod segment;

use std::path::Path;

use base64::Engine;
use serde::Serialize;

use crate::error::ApiError;

/// 서비스 API 버전
pub const API_VERSION: &str = "0.1.0";

/// 헬스체크 응답
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// 실제 모델 로드 여부 (mock이면 false)
    pub model_loaded: bool,
}

impl HealthResponse {
    pub fn healthy(model_loaded: bool) -> Self {
        Self {
            status: "healthy",
            model_loaded,
        }
    }
}

/// 루트 응답 (서비스 정보)
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

impl RootResponse {
    pub fn running(service: &'static str) -> Self {
        Self {
            service,
            version: API_VERSION,
            status: "running",
        }
    }
}

/// 요청 이미지 (바이트 + 출력 파일명 stem)
#[derive(Debug)]
pub(crate) struct LoadedImage {
    pub bytes: Vec<u8>,
    pub stem: String,
}

/// 요청 이미지 로드. base64가 경로보다 우선한다.
///
/// - base64 디코딩 실패 → 400
/// - 경로 미존재 → 404
/// - 둘 다 없음 → 400
pub(crate) async fn load_image(
    image_path: Option<&str>,
    image_b64: Option<&str>,
) -> Result<LoadedImage, ApiError> {
    if let Some(encoded) = image_b64 {
        // data URL 접두사 허용 (`data:image/png;base64,`)
        let payload = encoded
            .split_once("base64,")
            .map(|(_, rest)| rest)
            .unwrap_or(encoded);
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ApiError::BadRequest(format!("base64 이미지 디코딩 실패: {e}")))?;
        return Ok(LoadedImage {
            bytes,
            stem: format!("upload_{}", uuid::Uuid::new_v4().simple()),
        });
    }

    let Some(path) = image_path else {
        return Err(ApiError::BadRequest(
            "image_path 또는 image(base64) 중 하나가 필요합니다".to_string(),
        ));
    };
    let path = Path::new(path);
    if !path.exists() {
        return Err(ApiError::NotFound(format!("Image not found: {}", path.display())));
    }
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ApiError::Internal(format!("이미지 읽기 실패: {e}")))?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    Ok(LoadedImage { bytes, stem })
}
