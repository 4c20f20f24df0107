//! YOLO 학습 실행기.
//!
//! 외부 `yolo` CLI를 실행한다. 학습 전 사전 점검:
//! 1. 데이터셋 디스크립터 존재
//! 2. 라벨 파일 1개 이상 (이미지 대비 50% 미만이면 경고)
//! 3. 라벨 형식 검증 통과 (`--force`면 경고만)
//! 4. 라벨을 이미지 디렉토리로 스테이징

use std::path::{Path, PathBuf};
use std::process::Stdio;

use percept_core::config::{LabelingConfig, TrainingConfig};
use percept_core::error::CoreError;
use percept_core::models::vocabulary::ClassVocabulary;
use percept_vision::dataset::{census, stage_labels, DatasetCensus};
use percept_vision::label_store::CLASSES_FILE;
use percept_vision::validator::{LabelValidator, ValidationReport};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// 학습 실패 시 안내
pub const REMEDIATION: [&str; 3] = [
    "학습 데이터가 충분한지 확인하세요 (라벨된 이미지 50장 이상)",
    "메모리 부족이면 배치 크기를 줄이세요 (training.batch)",
    "라벨이 올바른 YOLO 형식인지 확인하세요 (percept validate)",
];

/// 사전 점검 결과
#[derive(Debug)]
pub struct Preflight {
    pub census: DatasetCensus,
    pub validation: ValidationReport,
    /// 이미지 디렉토리로 복사한 라벨 수
    pub staged: usize,
}

/// 검증용 어휘: 라벨 디렉토리의 `classes.txt` 우선, 없으면 프로파일 프리셋
pub fn dataset_vocabulary(labeling: &LabelingConfig) -> Result<ClassVocabulary, CoreError> {
    let manifest = labeling.labels_dir.join(CLASSES_FILE);
    if manifest.is_file() {
        let text = std::fs::read_to_string(&manifest)?;
        debug!(path = %manifest.display(), "classes.txt로 어휘 로드");
        return ClassVocabulary::from_manifest(labeling.profile.clone(), &text);
    }
    ClassVocabulary::from_preset_name(&labeling.profile)
}

/// 학습 전 사전 점검 + 라벨 스테이징
pub fn preflight(labeling: &LabelingConfig, force: bool) -> Result<Preflight, CoreError> {
    if !labeling.dataset_descriptor.is_file() {
        return Err(CoreError::not_found(
            "Dataset descriptor",
            labeling.dataset_descriptor.display().to_string(),
        ));
    }

    let census = census(&labeling.images_dir, &labeling.labels_dir)?;
    if census.labeled == 0 {
        return Err(CoreError::validation(
            "labels",
            format!("{}에 라벨 파일 없음", labeling.labels_dir.display()),
        ));
    }
    info!(
        images = census.images,
        labeled = census.labeled,
        coverage = format!("{:.0}%", census.coverage() * 100.0),
        "데이터셋 현황"
    );

    let vocabulary = dataset_vocabulary(labeling)?;
    let validation = LabelValidator::new(vocabulary).validate_dir(&labeling.labels_dir)?;
    if !validation.is_clean() {
        if !force {
            return Err(CoreError::validation(
                "labels",
                format!("잘못된 라벨 {}줄 (--force로 무시 가능)", validation.invalid),
            ));
        }
        warn!(invalid = validation.invalid, "라벨 검증 실패 무시 (--force)");
    }

    let staged = stage_labels(&labeling.labels_dir, &labeling.images_dir)?;
    Ok(Preflight {
        census,
        validation,
        staged,
    })
}

/// `yolo detect train` 인자
pub fn train_args(settings: &TrainingConfig, descriptor: &Path) -> Vec<String> {
    vec![
        "detect".to_string(),
        "train".to_string(),
        format!("data={}", descriptor.display()),
        format!("model={}", settings.base_model),
        format!("epochs={}", settings.epochs),
        format!("imgsz={}", settings.image_size),
        format!("batch={}", settings.batch),
        format!("project={}", settings.project.display()),
        format!("name={}", settings.name),
        format!("patience={}", settings.patience),
        format!("device={}", settings.device),
        "exist_ok=True".to_string(),
    ]
}

/// `yolo detect val` 인자
pub fn val_args(weights: &Path, descriptor: &Path) -> Vec<String> {
    vec![
        "detect".to_string(),
        "val".to_string(),
        format!("model={}", weights.display()),
        format!("data={}", descriptor.display()),
    ]
}

/// 학습 완료 후 최고 가중치 경로
pub fn best_weights(settings: &TrainingConfig) -> PathBuf {
    settings
        .project
        .join(&settings.name)
        .join("weights")
        .join("best.pt")
}

/// 외부 CLI 실행 (출력은 그대로 터미널로)
pub async fn run_yolo(program: &str, args: &[String]) -> Result<(), CoreError> {
    info!(program, args = %args.join(" "), "외부 학습 도구 실행");
    let status = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
        .map_err(|e| CoreError::process(program, format!("실행 실패: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(CoreError::process(program, format!("비정상 종료 ({status})")))
    }
}
