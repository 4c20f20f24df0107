//! 배치 파이프라인 명령.
//!
//! 각 명령은 설정에서 어댑터를 조립해 실행하고, 끝나면 요약을 출력한다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use percept_core::config::AppConfig;
use percept_core::models::profile::LabelingProfile;
use percept_core::models::vocabulary::{ClassVocabulary, VocabularyPreset};
use percept_network::ollama_client::OllamaVlmClient;
use percept_vision::auto_labeler::{AutoLabelSummary, AutoLabeler};
use percept_vision::capture::{CaptureRunner, CaptureScript, XcrunSimulator};
use percept_vision::dataset::{census, stage_labels, DatasetCensus, DatasetDescriptor};
use percept_vision::label_store::LabelStore;
use percept_vision::synth::{load_cards, CardSynthesizer, SynthSummary, ThreadSampler};
use percept_vision::template::{TemplateLabeler, TemplateLayout, TemplateSummary};
use percept_vision::validator::{LabelValidator, ValidationReport};
use tracing::{info, warn};

use crate::trainer;

/// 검증 결과에서 출력할 최대 문제 수
const MAX_PRINTED_ISSUES: usize = 20;

// ============================================================
// 라벨링
// ============================================================

/// VLM 자동 라벨링
pub async fn label(config: &AppConfig, overwrite: bool) -> Result<AutoLabelSummary> {
    let labeling = &config.labeling;
    let profile = LabelingProfile::builtin(&labeling.profile)
        .with_context(|| format!("라벨링 프로파일 '{}' 로드 실패", labeling.profile))?;

    let mut client = OllamaVlmClient::new(&config.vlm).context("VLM 클라이언트 생성 실패")?;
    match client.resolve_model().await {
        Ok(model) => info!(model = %model, endpoint = %config.vlm.endpoint, "VLM 모델 확인"),
        Err(e) => {
            println!("VLM 서버에 연결할 수 없습니다: {e}");
            println!("  ollama serve");
            println!("  ollama pull {}", config.vlm.model);
            bail!("VLM 서버 사용 불가");
        }
    }

    let store = LabelStore::open(&labeling.labels_dir)?.with_overwrite(overwrite);
    let vocabulary = profile.vocabulary.clone();
    let labeler = AutoLabeler::new(Arc::new(client), profile, store)
        .with_delay(config.vlm.request_delay());
    let summary = labeler
        .run(&labeling.images_dir)
        .await
        .with_context(|| format!("라벨링 실패: {}", labeling.images_dir.display()))?;

    write_descriptor(&labeling.images_dir, vocabulary, &labeling.dataset_descriptor)?;
    print_label_summary(&summary);
    Ok(summary)
}

/// 파일명 기반 템플릿 라벨링
pub fn template_label(
    config: &AppConfig,
    layout_file: Option<&Path>,
    force: bool,
) -> Result<TemplateSummary> {
    let labeling = &config.labeling;
    let layout = match layout_file {
        Some(path) => TemplateLayout::from_file(path)
            .with_context(|| format!("레이아웃 파일 로드 실패: {}", path.display()))?,
        None => TemplateLayout::builtin(&labeling.profile)
            .with_context(|| format!("내장 레이아웃 '{}' 없음", labeling.profile))?,
    };
    let vocabulary = ClassVocabulary::preset(layout.vocabulary);

    let store = LabelStore::open(&labeling.labels_dir)?.with_overwrite(force);
    let summary = TemplateLabeler::new(layout, store)?.run(&labeling.images_dir)?;
    write_descriptor(&labeling.images_dir, vocabulary, &labeling.dataset_descriptor)?;

    println!();
    println!("템플릿 라벨링 완료");
    println!("  이미지: {}", summary.total);
    println!("  기록:   {}", summary.written);
    println!("  건너뜀: {} (--force로 덮어쓰기)", summary.skipped);
    for (state, count) in &summary.per_state {
        println!("  [{state}] {count}");
    }
    if summary.defaulted > 0 {
        println!("  기본 상태로 분류: {}", summary.defaulted);
    }
    if summary.failed > 0 {
        println!("  실패:   {}", summary.failed);
    }
    Ok(summary)
}

fn write_descriptor(images_dir: &Path, vocabulary: ClassVocabulary, out: &Path) -> Result<()> {
    DatasetDescriptor::for_images_dir(images_dir, vocabulary)
        .write(out)
        .with_context(|| format!("디스크립터 기록 실패: {}", out.display()))
}

fn print_label_summary(summary: &AutoLabelSummary) {
    println!();
    println!("자동 라벨링 완료");
    println!("  이미지:   {}", summary.total);
    println!("  라벨링:   {}", summary.labeled);
    println!("  건너뜀:   {}", summary.skipped);
    println!("  검출 없음: {}", summary.empty);
    println!("  실패:     {}", summary.failed);
    println!("  총 검출:  {}", summary.detections);
}

// ============================================================
// 검증 / 데이터셋
// ============================================================

/// 라벨 디렉토리 검증
pub fn validate(config: &AppConfig) -> Result<ValidationReport> {
    let vocabulary = trainer::dataset_vocabulary(&config.labeling)?;
    let classes = vocabulary.len();
    let report = LabelValidator::new(vocabulary).validate_dir(&config.labeling.labels_dir)?;

    println!();
    println!("라벨 검증: {}", config.labeling.labels_dir.display());
    println!("  파일:     {} (빈 파일 {})", report.files, report.empty_files);
    println!("  유효 줄:  {}", report.valid);
    println!("  잘못된 줄: {}", report.invalid);
    println!("  클래스 수: {classes}");
    for issue in report.issues.iter().take(MAX_PRINTED_ISSUES) {
        println!("  {}:{}: {}", issue.file.display(), issue.line, issue.reason);
    }
    if report.issues.len() > MAX_PRINTED_ISSUES {
        println!("  ... 외 {}건", report.issues.len() - MAX_PRINTED_ISSUES);
    }
    Ok(report)
}

/// 디스크립터/`classes.txt` 생성과 현황 출력
pub fn dataset(config: &AppConfig, stage: bool) -> Result<DatasetCensus> {
    let labeling = &config.labeling;
    let vocabulary = trainer::dataset_vocabulary(labeling)?;

    let store = LabelStore::open(&labeling.labels_dir)?;
    store.write_manifest(&vocabulary)?;
    write_descriptor(&labeling.images_dir, vocabulary, &labeling.dataset_descriptor)?;

    let staged = if stage {
        stage_labels(&labeling.labels_dir, &labeling.images_dir)?
    } else {
        0
    };
    let census = census(&labeling.images_dir, &labeling.labels_dir)?;

    println!();
    println!("데이터셋: {}", labeling.dataset_descriptor.display());
    println!("  이미지:    {}", census.images);
    println!(
        "  라벨:      {} ({:.0}%)",
        census.labeled,
        census.coverage() * 100.0
    );
    println!("  빈 라벨:   {}", census.empty_labels);
    if stage {
        println!("  스테이징:  {staged}");
    }
    if census.is_sparse() {
        println!("  경고: 라벨이 이미지의 50% 미만입니다");
    }
    Ok(census)
}

// ============================================================
// 학습
// ============================================================

/// YOLO 학습 또는 가중치 검증
pub async fn train(config: &AppConfig, force: bool, validate_model: Option<&Path>) -> Result<()> {
    let descriptor = &config.labeling.dataset_descriptor;
    let settings = &config.training;

    if let Some(weights) = validate_model {
        trainer::run_yolo(&settings.yolo_bin, &trainer::val_args(weights, descriptor))
            .await
            .context("모델 검증 실패")?;
        return Ok(());
    }

    let preflight = trainer::preflight(&config.labeling, force).context("학습 사전 점검 실패")?;
    info!(
        labeled = preflight.census.labeled,
        staged = preflight.staged,
        "사전 점검 통과"
    );

    let args = trainer::train_args(settings, descriptor);
    if let Err(e) = trainer::run_yolo(&settings.yolo_bin, &args).await {
        println!();
        println!("학습 실패: {e}");
        for hint in trainer::REMEDIATION {
            println!("  - {hint}");
        }
        return Err(e).context("학습 실패");
    }

    let best = trainer::best_weights(settings);
    println!();
    println!("학습 완료");
    println!("  모델: {}", best.display());
    println!("  ONNX 변환: {} export model={} format=onnx", settings.yolo_bin, best.display());
    println!("  배포: detector.model_path 설정 후 `percept serve detect`");
    Ok(())
}

// ============================================================
// 합성 / 캡처
// ============================================================

/// 합성 카드 데이터셋 생성
pub fn synth(config: &AppConfig) -> Result<SynthSummary> {
    let settings = &config.synth;
    let vocabulary = ClassVocabulary::preset(VocabularyPreset::Cards);
    let cards = load_cards(&settings.cards_dir, &vocabulary)
        .with_context(|| format!("카드 이미지 로드 실패: {}", settings.cards_dir.display()))?;
    if cards.len() < vocabulary.len() {
        warn!(found = cards.len(), expected = vocabulary.len(), "일부 카드 이미지 없음");
    }

    let summary = CardSynthesizer::new(settings.clone(), cards, ThreadSampler)
        .generate(&settings.output_dir)?;

    println!();
    println!("합성 데이터셋 생성 완료");
    println!("  이미지:     {}", summary.images);
    println!("  배치 카드:  {}", summary.cards_placed);
    println!("  배치 실패:  {}", summary.cards_skipped);
    println!("  디스크립터: {}", summary.descriptor.display());
    Ok(summary)
}

/// 시뮬레이터 캡처 스크립트 실행
pub async fn capture(config: &AppConfig, script_file: Option<&Path>) -> Result<Vec<PathBuf>> {
    let settings = &config.capture;
    let script = match script_file {
        Some(path) => CaptureScript::from_file(path)
            .with_context(|| format!("캡처 스크립트 로드 실패: {}", path.display()))?,
        None => CaptureScript::login_to_game(),
    };

    let driver = XcrunSimulator::from_config(settings)?;
    let runner = CaptureRunner::new(
        Arc::new(driver),
        (settings.screen_width, settings.screen_height),
    );
    let shots = runner.run(&script).await.context("캡처 실패")?;

    println!();
    println!("캡처 완료: {}장 → {}", shots.len(), settings.output_dir.display());
    Ok(shots)
}
