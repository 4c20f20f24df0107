//! VLM 자동 라벨링 배치.
//!
//! 이미지마다 순서대로: 기존 라벨 확인 → (픽셀 프로파일이면) 이미지 크기 읽기
//! → VLM 호출 → 응답 파싱 → 좌표 정규화 → 라벨 기록.
//!
//! VLM 호출 실패(연결/타임아웃/오류 응답)는 검출 0개로 취급하여 빈 라벨 파일을
//! 남긴다. 로컬 I/O 실패만 `Failed`로 집계한다.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use percept_core::error::CoreError;
use percept_core::models::detection::ImageMeta;
use percept_core::models::profile::{CoordinateMode, LabelingProfile};
use percept_core::ports::vlm_client::VlmClient;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bbox::labels_from_raw;
use crate::dataset::list_images;
use crate::label_store::{image_stem, LabelStore, WriteOutcome};
use crate::response_parser::parse_detections;

/// 이미지 한 장의 처리 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelOutcome {
    /// 라벨 N개 기록
    Labeled(usize),
    /// 기존 라벨 존재
    Skipped,
    /// 유효 검출 없음 (빈 파일 기록)
    Empty,
    /// 로컬 처리 실패
    Failed(String),
}

/// 배치 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoLabelSummary {
    pub total: usize,
    pub labeled: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
    /// 기록된 라벨 총 수
    pub detections: usize,
}

impl AutoLabelSummary {
    fn record(&mut self, outcome: &LabelOutcome) {
        match outcome {
            LabelOutcome::Labeled(n) => {
                self.labeled += 1;
                self.detections += n;
            }
            LabelOutcome::Skipped => self.skipped += 1,
            LabelOutcome::Empty => self.empty += 1,
            LabelOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// VLM 자동 라벨러
pub struct AutoLabeler {
    vlm: Arc<dyn VlmClient>,
    profile: LabelingProfile,
    store: LabelStore,
    delay: Duration,
}

impl AutoLabeler {
    pub fn new(vlm: Arc<dyn VlmClient>, profile: LabelingProfile, store: LabelStore) -> Self {
        Self {
            vlm,
            profile,
            store,
            delay: Duration::ZERO,
        }
    }

    /// 처리한 이미지 사이 고정 대기 시간
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 라벨 저장소
    pub fn store(&self) -> &LabelStore {
        &self.store
    }

    /// 디렉토리 전체 라벨링 후 `classes.txt` 기록
    pub async fn run(&self, images_dir: &Path) -> Result<AutoLabelSummary, CoreError> {
        let images = list_images(images_dir)?;
        let total = images.len();
        info!(
            images = total,
            profile = %self.profile.name,
            model = self.vlm.model(),
            "자동 라벨링 시작"
        );

        let mut summary = AutoLabelSummary {
            total,
            ..Default::default()
        };
        let mut processed_any = false;

        for (idx, image) in images.iter().enumerate() {
            let name = image.file_name().and_then(|n| n.to_str()).unwrap_or("?");
            let will_skip = image_stem(image)
                .map(|stem| self.store.should_skip(&stem))
                .unwrap_or(false);
            if !will_skip && processed_any && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let outcome = self.label_image(image).await;
            match &outcome {
                LabelOutcome::Labeled(n) => info!("[{}/{}] {} → 라벨 {}개", idx + 1, total, name, n),
                LabelOutcome::Skipped => debug!("[{}/{}] {} → 건너뜀", idx + 1, total, name),
                LabelOutcome::Empty => info!("[{}/{}] {} → 검출 없음", idx + 1, total, name),
                LabelOutcome::Failed(reason) => {
                    warn!("[{}/{}] {} → 실패: {}", idx + 1, total, name, reason)
                }
            }
            if outcome != LabelOutcome::Skipped {
                processed_any = true;
            }
            summary.record(&outcome);
        }

        self.store.write_manifest(&self.profile.vocabulary)?;
        info!(
            labeled = summary.labeled,
            skipped = summary.skipped,
            empty = summary.empty,
            failed = summary.failed,
            detections = summary.detections,
            "자동 라벨링 완료"
        );
        Ok(summary)
    }

    /// 이미지 한 장 라벨링
    pub async fn label_image(&self, image: &Path) -> LabelOutcome {
        let Some(stem) = image_stem(image) else {
            return LabelOutcome::Failed(format!("파일명 해석 불가: {}", image.display()));
        };
        if self.store.should_skip(&stem) {
            return LabelOutcome::Skipped;
        }

        let bytes = match tokio::fs::read(image).await {
            Ok(b) => b,
            Err(e) => return LabelOutcome::Failed(format!("이미지 읽기 실패: {e}")),
        };

        let meta = match self.profile.coordinates {
            CoordinateMode::Normalized => None,
            CoordinateMode::Pixels => match image::load_from_memory(&bytes) {
                Ok(img) => Some(ImageMeta {
                    width: img.width(),
                    height: img.height(),
                }),
                Err(e) => return LabelOutcome::Failed(format!("이미지 디코딩 실패: {e}")),
            },
        };

        let prompt = self.profile.render_prompt(meta);
        let response = match self.vlm.complete(&bytes, &prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(stem = %stem, error = %e, "VLM 호출 실패 — 검출 0개로 처리");
                String::new()
            }
        };

        let raws = parse_detections(&response);
        let labels = labels_from_raw(&raws, &self.profile, meta);
        debug!(stem = %stem, raw = raws.len(), kept = labels.len(), "검출 정규화");

        match self.store.write(&stem, &labels) {
            Ok(WriteOutcome::Written(0)) => LabelOutcome::Empty,
            Ok(WriteOutcome::Written(n)) => LabelOutcome::Labeled(n),
            Ok(WriteOutcome::Skipped) => LabelOutcome::Skipped,
            Err(e) => LabelOutcome::Failed(format!("라벨 기록 실패: {e}")),
        }
    }
}
