//! 추론 서비스 조립.
//!
//! 설정에서 모델 제공자와 핸들러 상태를 만들고 서버를 띄운다.
//! `onnx` 기능 없이 빌드하면 모든 제공자가 `Unavailable`이 되어
//! 서비스는 mock 응답만 돌려준다.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ValueEnum;
use percept_core::config::{AppConfig, DetectorConfig, EmbeddingConfig, SegmentationConfig};
use percept_core::error::CoreError;
use percept_core::ports::inference::{ImageEmbedder, ObjectDetector, Segmenter};
use percept_vision::provider::ModelProvider;
use percept_vision::ui_types::ClassScheme;
use percept_web::{routes, DetectState, EmbedState, InferenceServer, SegmentState};
use tracing::{info, warn};

use crate::lifecycle::{os_signal, ServiceLifecycle};

#[cfg(not(feature = "onnx"))]
const ONNX_DISABLED: &str = "onnx 기능 없이 빌드됨";

/// 추론 서비스 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServiceKind {
    /// YOLO UI 요소 검출
    Detect,
    /// DINO 시각 임베딩
    Embed,
    /// SAM 세그멘테이션
    Segment,
}

impl ServiceKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Detect => "detect",
            Self::Embed => "embed",
            Self::Segment => "segment",
        }
    }

    /// 설정상 포트
    pub fn port(self, config: &AppConfig) -> u16 {
        match self {
            Self::Detect => config.detector.port,
            Self::Embed => config.embedding.port,
            Self::Segment => config.segmentation.port,
        }
    }
}

// ============================================================
// 상태 조립
// ============================================================

/// 검출 서비스 상태
///
/// 후보 모델 중 존재하는 첫 파일을 고르고, 그 파일에 맞는 클래스 체계를 정한다.
pub fn detect_state(config: &DetectorConfig) -> Result<DetectState, CoreError> {
    let model = config.candidate_models().into_iter().find(|p| p.exists());
    let scheme = ClassScheme::for_model(model.as_deref(), &config.classes)?;
    match &model {
        Some(path) => info!(model = %path.display(), classes = scheme.class_names().len(), "검출 모델 선택"),
        None => warn!(candidates = ?config.candidate_models(), "검출 모델 파일 없음"),
    }
    let provider = detector_provider(config, model, &scheme);
    Ok(DetectState {
        provider: Arc::new(provider),
        scheme: Arc::new(scheme),
        default_conf: config.default_conf,
        max_results: config.max_results,
    })
}

/// 임베딩 서비스 상태
pub fn embed_state(config: &EmbeddingConfig) -> EmbedState {
    EmbedState {
        provider: Arc::new(embedder_provider(config)),
        model_name: config.model_name.clone(),
        dimensions: config.dimensions,
    }
}

/// 세그멘테이션 서비스 상태 (마스크 출력 디렉토리 생성 포함)
pub fn segment_state(config: &SegmentationConfig) -> Result<SegmentState, CoreError> {
    std::fs::create_dir_all(&config.output_dir)?;
    let [x, y] = config.mock_click_point;
    Ok(SegmentState {
        provider: Arc::new(segmenter_provider(config)),
        model_type: config.model_type.clone(),
        output_dir: config.output_dir.clone(),
        mock_click_point: (x, y),
    })
}

#[cfg(feature = "onnx")]
fn detector_provider(
    config: &DetectorConfig,
    model: Option<PathBuf>,
    scheme: &ClassScheme,
) -> ModelProvider<dyn ObjectDetector> {
    use percept_vision::onnx::OnnxDetector;

    let Some(path) = model else {
        return ModelProvider::unavailable("yolo", "후보 모델 파일 없음");
    };
    let class_names = scheme.class_names();
    let (input_size, iou) = (config.input_size, config.iou_threshold);
    ModelProvider::lazy(path.display().to_string(), move || {
        let detector = OnnxDetector::load(&path, class_names.clone(), input_size, iou)?;
        Ok(Arc::new(detector) as Arc<dyn ObjectDetector>)
    })
}

#[cfg(not(feature = "onnx"))]
fn detector_provider(
    _config: &DetectorConfig,
    _model: Option<PathBuf>,
    _scheme: &ClassScheme,
) -> ModelProvider<dyn ObjectDetector> {
    ModelProvider::unavailable("yolo", ONNX_DISABLED)
}

#[cfg(feature = "onnx")]
fn embedder_provider(config: &EmbeddingConfig) -> ModelProvider<dyn ImageEmbedder> {
    use percept_vision::onnx::OnnxEmbedder;

    let Some(path) = config.model_path.clone() else {
        return ModelProvider::unavailable("dino", "embedding.model_path 미설정");
    };
    let (name, input_size, dimensions) =
        (config.model_name.clone(), config.input_size, config.dimensions);
    ModelProvider::lazy(config.model_name.clone(), move || {
        let embedder = OnnxEmbedder::load(&path, name.clone(), input_size, dimensions)?;
        Ok(Arc::new(embedder) as Arc<dyn ImageEmbedder>)
    })
}

#[cfg(not(feature = "onnx"))]
fn embedder_provider(_config: &EmbeddingConfig) -> ModelProvider<dyn ImageEmbedder> {
    ModelProvider::unavailable("dino", ONNX_DISABLED)
}

#[cfg(feature = "onnx")]
fn segmenter_provider(config: &SegmentationConfig) -> ModelProvider<dyn Segmenter> {
    use percept_vision::onnx::OnnxSegmenter;

    let (Some(encoder), Some(decoder)) = (config.encoder_path.clone(), config.decoder_path.clone())
    else {
        return ModelProvider::unavailable("sam", "encoder_path/decoder_path 미설정");
    };
    let model_type = config.model_type.clone();
    ModelProvider::lazy(format!("sam_{model_type}"), move || {
        let segmenter = OnnxSegmenter::load(&encoder, &decoder, &model_type)?;
        Ok(Arc::new(segmenter) as Arc<dyn Segmenter>)
    })
}

#[cfg(not(feature = "onnx"))]
fn segmenter_provider(_config: &SegmentationConfig) -> ModelProvider<dyn Segmenter> {
    ModelProvider::unavailable("sam", ONNX_DISABLED)
}

// ============================================================
// 실행
// ============================================================

/// 서비스 하나를 띄우고 시그널까지 대기
pub async fn serve(kind: ServiceKind, config: &AppConfig) -> Result<()> {
    let router = match kind {
        ServiceKind::Detect => routes::detect_routes(
            detect_state(&config.detector).context("검출 서비스 상태 생성 실패")?,
        ),
        ServiceKind::Embed => routes::embed_routes(embed_state(&config.embedding)),
        ServiceKind::Segment => routes::segment_routes(
            segment_state(&config.segmentation).context("세그멘테이션 서비스 상태 생성 실패")?,
        ),
    };

    let server = InferenceServer::new(
        kind.name(),
        config.server.host.clone(),
        kind.port(config),
        router,
    );
    info!(service = kind.name(), url = %server.url(), "서비스 기동");

    let lifecycle = ServiceLifecycle::new(kind.name());
    let shutdown_rx = lifecycle.subscribe();
    lifecycle.run(server.run(shutdown_rx), os_signal()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_state_without_weights_is_mock() {
        let config = DetectorConfig {
            fallback_models: vec![PathBuf::from("/nonexistent/rive_poker_model.onnx")],
            ..DetectorConfig::default()
        };
        let state = detect_state(&config).unwrap();
        assert!(matches!(
            state.provider.state(),
            percept_vision::provider::ProviderState::Unavailable(_)
        ));
        assert_eq!(state.scheme.class_names()[0], "btn_fold");
        assert_eq!(state.max_results, 20);
    }

    #[test]
    fn generic_weights_use_coco_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let weights = dir.path().join("yolov8n.onnx");
        std::fs::write(&weights, b"not a model").unwrap();

        let config = DetectorConfig {
            model_path: Some(weights),
            ..DetectorConfig::default()
        };
        let state = detect_state(&config).unwrap();
        assert_eq!(*state.scheme, ClassScheme::Coco);
    }

    #[test]
    fn unknown_class_setting_is_rejected() {
        let config = DetectorConfig {
            classes: "nonexistent".to_string(),
            fallback_models: vec![],
            ..DetectorConfig::default()
        };
        assert!(detect_state(&config).is_err());
    }

    #[test]
    fn embed_and_segment_states() {
        let embed = embed_state(&EmbeddingConfig::default());
        assert_eq!(embed.dimensions, 768);
        assert!(!embed.provider.state().is_loaded());

        let dir = tempfile::tempdir().unwrap();
        let config = SegmentationConfig {
            output_dir: dir.path().join("masks"),
            ..SegmentationConfig::default()
        };
        let segment = segment_state(&config).unwrap();
        assert!(config.output_dir.is_dir());
        assert_eq!(segment.mock_click_point, (640, 413));
    }

    #[test]
    fn service_ports_follow_config() {
        let config = AppConfig::default();
        assert_eq!(ServiceKind::Detect.port(&config), 8001);
        assert_eq!(ServiceKind::Embed.port(&config), 8002);
        assert_eq!(ServiceKind::Segment.port(&config), 8003);
    }
}
