//! 애플리케이션 설정 구조체.
//!
//! VLM 엔드포인트, 라벨링 경로, 추론 서비스, 학습, 캡처, 합성 데이터 설정을
//! 정의한다. `config` crate로 기본값 ← 설정 파일 ← 환경변수 순으로 병합한다.
//!
//! 환경변수 형식: `PERCEPT_<섹션>__<필드>` (예: `PERCEPT_VLM__MODEL=llava:7b`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;

/// 환경변수 접두사
const ENV_PREFIX: &str = "PERCEPT";

/// 기본 설정 파일 이름
const CONFIG_FILE_NAME: &str = "percept.toml";

/// 최상위 애플리케이션 설정
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// VLM(Ollama) 설정
    pub vlm: VlmConfig,
    /// 라벨링 배치 설정
    pub labeling: LabelingConfig,
    /// 검출 서비스 설정
    pub detector: DetectorConfig,
    /// 임베딩 서비스 설정
    pub embedding: EmbeddingConfig,
    /// 세그멘테이션 서비스 설정
    pub segmentation: SegmentationConfig,
    /// 서비스 공통 바인드 설정
    pub server: ServerConfig,
    /// YOLO 학습 설정
    pub training: TrainingConfig,
    /// 시뮬레이터 캡처 설정
    pub capture: CaptureConfig,
    /// 합성 카드 데이터셋 설정
    pub synth: SynthConfig,
}

// ============================================================
// VLM 설정
// ============================================================

/// VLM 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VlmConfig {
    /// Ollama 서버 주소
    pub endpoint: String,
    /// 모델 이름
    pub model: String,
    /// 모델 미설치 시 대체 모델
    pub fallback_model: Option<String>,
    /// 샘플링 온도 (낮을수록 일관된 출력)
    pub temperature: f32,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
    /// 이미지 간 고정 대기 (밀리초)
    pub request_delay_ms: u64,
}

impl Default for VlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "openbmb/minicpm-v2.6:latest".to_string(),
            fallback_model: Some("llava:7b".to_string()),
            temperature: 0.1,
            timeout_secs: 120,
            request_delay_ms: 500,
        }
    }
}

impl VlmConfig {
    /// 요청 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 이미지 간 대기 시간
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

// ============================================================
// 라벨링 설정
// ============================================================

/// 라벨링 배치 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// 라벨링 프로파일 (`legacy`, `rive`, `widget`)
    pub profile: String,
    /// 입력 이미지 디렉토리
    pub images_dir: PathBuf,
    /// 라벨 출력 디렉토리
    pub labels_dir: PathBuf,
    /// 데이터셋 디스크립터 경로
    pub dataset_descriptor: PathBuf,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        Self {
            profile: "legacy".to_string(),
            images_dir: PathBuf::from("training_data/poker_images"),
            labels_dir: PathBuf::from("training_data/poker_labels"),
            dataset_descriptor: PathBuf::from("training_data/poker_data.yaml"),
        }
    }
}

// ============================================================
// 추론 서비스 설정
// ============================================================

/// 서비스 공통 바인드 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인드 호스트 (컨테이너 배포 기준 0.0.0.0)
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
        }
    }
}

/// 검출 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// 서비스 포트
    pub port: u16,
    /// 명시적 모델 경로 (ONNX). 없으면 `fallback_models` 순서대로 탐색
    pub model_path: Option<PathBuf>,
    /// 후보 모델 경로 (우선순위 순)
    pub fallback_models: Vec<PathBuf>,
    /// 모델 클래스 체계: 어휘 프리셋 이름 또는 `coco`
    pub classes: String,
    /// 기본 신뢰도 임계값
    pub default_conf: f32,
    /// NMS IoU 임계값
    pub iou_threshold: f32,
    /// 응답 최대 요소 수
    pub max_results: usize,
    /// 모델 입력 크기 (정사각형)
    pub input_size: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            model_path: None,
            fallback_models: vec![
                PathBuf::from("rive_poker_model.onnx"),
                PathBuf::from("poker_model.onnx"),
                PathBuf::from("yolov8n.onnx"),
            ],
            classes: "rive".to_string(),
            default_conf: 0.3,
            iou_threshold: 0.45,
            max_results: 20,
            input_size: 640,
        }
    }
}

impl DetectorConfig {
    /// 후보 모델 경로 목록 (명시 경로 우선)
    pub fn candidate_models(&self) -> Vec<PathBuf> {
        match &self.model_path {
            Some(path) => vec![path.clone()],
            None => self.fallback_models.clone(),
        }
    }
}

/// 임베딩 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// 서비스 포트
    pub port: u16,
    /// ONNX 모델 경로
    pub model_path: Option<PathBuf>,
    /// 보고용 모델 이름
    pub model_name: String,
    /// 임베딩 차원
    pub dimensions: usize,
    /// 모델 입력 크기 (정사각형)
    pub input_size: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            port: 8002,
            model_path: None,
            model_name: "facebook/dinov2-base".to_string(),
            dimensions: 768,
            input_size: 224,
        }
    }
}

/// 세그멘테이션 서비스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// 서비스 포트
    pub port: u16,
    /// SAM 이미지 인코더 ONNX 경로
    pub encoder_path: Option<PathBuf>,
    /// SAM 마스크 디코더 ONNX 경로
    pub decoder_path: Option<PathBuf>,
    /// 보고용 모델 타입
    pub model_type: String,
    /// 마스크 PNG 출력 디렉토리
    pub output_dir: PathBuf,
    /// mock 모드 기본 클릭 좌표 [x, y]
    pub mock_click_point: [i32; 2],
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            port: 8003,
            encoder_path: None,
            decoder_path: None,
            model_type: "vit_b".to_string(),
            output_dir: std::env::temp_dir(),
            mock_click_point: [640, 413],
        }
    }
}

// ============================================================
// 학습 설정
// ============================================================

/// YOLO 학습 설정 (외부 `yolo` CLI 인자)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// ultralytics CLI 실행 파일
    pub yolo_bin: String,
    /// 시작 가중치
    pub base_model: String,
    /// 에폭 수
    pub epochs: u32,
    /// 입력 이미지 크기
    pub image_size: u32,
    /// 배치 크기
    pub batch: u32,
    /// 결과 루트 디렉토리
    pub project: PathBuf,
    /// 실행 이름
    pub name: String,
    /// 조기 종료 patience
    pub patience: u32,
    /// 디바이스 (`cpu`, `mps`, `0`)
    pub device: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            yolo_bin: "yolo".to_string(),
            base_model: "yolov8n.pt".to_string(),
            epochs: 100,
            image_size: 640,
            batch: 16,
            project: PathBuf::from("runs"),
            name: "poker_ui_v2".to_string(),
            patience: 10,
            device: "cpu".to_string(),
        }
    }
}

// ============================================================
// 캡처 설정
// ============================================================

/// 시뮬레이터 캡처 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// 시뮬레이터 디바이스 UDID (`booted` = 실행 중인 디바이스)
    pub device_id: String,
    /// 스크린샷 출력 디렉토리
    pub output_dir: PathBuf,
    /// 시뮬레이터 창 내부 화면 오프셋 X (포인트)
    pub window_offset_x: i32,
    /// 시뮬레이터 창 내부 화면 오프셋 Y (포인트)
    pub window_offset_y: i32,
    /// 화면 너비 (포인트)
    pub screen_width: u32,
    /// 화면 높이 (포인트)
    pub screen_height: u32,
    /// 입력 후 대기 (밀리초)
    pub action_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: "booted".to_string(),
            output_dir: PathBuf::from("training_data/poker_images"),
            window_offset_x: 50,
            window_offset_y: 80,
            screen_width: 430,
            screen_height: 932,
            action_delay_ms: 500,
        }
    }
}

// ============================================================
// 합성 데이터 설정
// ============================================================

/// 합성 카드 데이터셋 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// 카드 PNG 디렉토리 (`<card_name>.png`)
    pub cards_dir: PathBuf,
    /// 출력 루트 (images/, labels/, card_data.yaml)
    pub output_dir: PathBuf,
    /// 생성 이미지 수
    pub num_images: usize,
    /// 캔버스 너비
    pub canvas_width: u32,
    /// 캔버스 높이
    pub canvas_height: u32,
    /// 이미지당 최소 카드 수
    pub min_cards: usize,
    /// 이미지당 최대 카드 수
    pub max_cards: usize,
    /// 카드당 비겹침 배치 시도 횟수
    pub max_placement_attempts: usize,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            cards_dir: PathBuf::from("assets/cards"),
            output_dir: PathBuf::from("training_data/card_detection"),
            num_images: 2000,
            canvas_width: 640,
            canvas_height: 960,
            min_cards: 2,
            max_cards: 7,
            max_placement_attempts: 20,
        }
    }
}

// ============================================================
// 로드 / 검증
// ============================================================

impl AppConfig {
    /// 기본값 ← 설정 파일 ← 환경변수 순으로 병합하여 로드
    ///
    /// `path`가 주어지면 해당 파일은 반드시 존재해야 한다.
    /// 없으면 플랫폼 설정 디렉토리의 `percept.toml`을 선택적으로 읽는다.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut builder = config::Config::builder();

        match path {
            Some(p) => {
                debug!(path = %p.display(), "설정 파일 로드");
                builder = builder.add_source(config::File::from(p.to_path_buf()).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let merged = builder
            .build()
            .map_err(|e| CoreError::Config(format!("설정 병합 실패: {e}")))?;
        let config: AppConfig = merged
            .try_deserialize()
            .map_err(|e| CoreError::Config(format!("설정 역직렬화 실패: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// 플랫폼별 기본 설정 파일 경로
    ///
    /// - macOS: `~/Library/Application Support/dev.percept.percept/percept.toml`
    /// - Linux: `~/.config/percept/percept.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "percept", "percept").map(|p| p.config_dir().join(CONFIG_FILE_NAME))
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=2.0).contains(&self.vlm.temperature) {
            return Err(CoreError::validation("vlm.temperature", "0.0 ~ 2.0 범위여야 함"));
        }
        if self.vlm.timeout_secs == 0 {
            return Err(CoreError::validation("vlm.timeout_secs", "0보다 커야 함"));
        }
        if !(0.0..=1.0).contains(&self.detector.default_conf) {
            return Err(CoreError::validation("detector.default_conf", "0.0 ~ 1.0 범위여야 함"));
        }
        if self.detector.max_results == 0 {
            return Err(CoreError::validation("detector.max_results", "0보다 커야 함"));
        }
        if self.embedding.dimensions == 0 {
            return Err(CoreError::validation("embedding.dimensions", "0보다 커야 함"));
        }
        if self.training.epochs == 0 || self.training.batch == 0 {
            return Err(CoreError::validation("training", "epochs/batch는 0보다 커야 함"));
        }
        if self.synth.min_cards > self.synth.max_cards {
            return Err(CoreError::validation("synth.min_cards", "max_cards 이하여야 함"));
        }
        if self.synth.canvas_width == 0 || self.synth.canvas_height == 0 {
            return Err(CoreError::validation("synth.canvas", "캔버스 크기는 0보다 커야 함"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.port, 8001);
        assert_eq!(config.embedding.port, 8002);
        assert_eq!(config.segmentation.port, 8003);
        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.vlm.timeout_secs, 120);
    }

    #[test]
    fn explicit_model_path_wins() {
        let mut config = DetectorConfig::default();
        assert_eq!(config.candidate_models().len(), 3);
        config.model_path = Some(PathBuf::from("/models/custom.onnx"));
        assert_eq!(config.candidate_models(), vec![PathBuf::from("/models/custom.onnx")]);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[vlm]\nmodel = \"llava:7b\"\n\n[training]\nepochs = 5").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.vlm.model, "llava:7b");
        assert_eq!(config.vlm.endpoint, "http://localhost:11434");
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch, 16);
    }

    #[test]
    fn missing_explicit_file_is_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/percept.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn invalid_values_rejected() {
        let mut config = AppConfig::default();
        config.synth.min_cards = 9;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.detector.default_conf = 1.5;
        assert!(config.validate().is_err());
    }
}
