//! ONNX Runtime 추론 어댑터 (`onnx` feature).
//!
//! - [`OnnxDetector`]: YOLOv8 UI 요소 검출
//! - [`OnnxEmbedder`]: DINOv2 CLS 임베딩
//! - [`OnnxSegmenter`]: SAM 인코더/디코더 세그멘테이션
//!
//! `Session::run`은 `&mut`를 요구하므로 세션을 `Mutex`로 감싸고
//! 추론은 `spawn_blocking`에서 수행한다.

mod dino;
mod sam;
mod yolo;

pub use dino::OnnxEmbedder;
pub use sam::OnnxSegmenter;
pub use yolo::OnnxDetector;

use std::fmt;
use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use percept_core::error::CoreError;
use tracing::info;

/// 모델 파일에서 세션 생성
pub(crate) fn load_session(path: &Path) -> Result<Session, CoreError> {
    if !path.exists() {
        return Err(CoreError::ModelUnavailable(format!(
            "모델 파일 없음: {}",
            path.display()
        )));
    }
    let session = Session::builder()
        .map_err(|e| CoreError::ModelUnavailable(format!("ort session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| CoreError::ModelUnavailable(format!("ort opt-level: {e}")))?
        .commit_from_file(path)
        .map_err(|e| CoreError::ModelUnavailable(format!("ort load model: {e}")))?;
    info!(path = %path.display(), "ONNX 모델 로드");
    Ok(session)
}

/// 추론 단계 에러 변환
pub(crate) fn inference_err<E: fmt::Display>(stage: &'static str) -> impl Fn(E) -> CoreError {
    move |e| CoreError::Inference(format!("{stage}: {e}"))
}

/// 이미지 바이트 디코딩
pub(crate) fn decode_image(bytes: &[u8]) -> Result<image::DynamicImage, CoreError> {
    image::load_from_memory(bytes).map_err(|e| CoreError::Image(e.to_string()))
}

/// 블로킹 태스크 조인 에러 변환
pub(crate) fn join_err(e: tokio::task::JoinError) -> CoreError {
    CoreError::Internal(format!("추론 태스크 실패: {e}"))
}

/// 파일명 (모델 이름 표시용)
pub(crate) fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
