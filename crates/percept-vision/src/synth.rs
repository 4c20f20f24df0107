//! 합성 카드 데이터셋 생성기.
//!
//! 카드 PNG(`<card_name>.png`)를 노이즈 섞인 포커 테이블 초록 배경에 합성한다.
//! 이미지당 2~7장, 약 70% 확률로 뒷면 카드 제외, 회전/스케일/밝기/대비 증강,
//! 겹치지 않는 위치를 최대 N회 시도 (실패 시 해당 카드 생략).
//!
//! 난수는 [`Sampler`] trait으로 주입하므로 테스트에서 결정적으로 재현된다.

use std::fs;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{RgbImage, Rgba, RgbaImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use percept_core::config::SynthConfig;
use percept_core::error::CoreError;
use percept_core::models::detection::NormalizedLabel;
use percept_core::models::vocabulary::{ClassVocabulary, VocabularyPreset, CARD_BACK};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::DatasetDescriptor;
use crate::label_store::LabelStore;

/// 포커 테이블 초록 계열
const TABLE_GREENS: [[u8; 3]; 5] = [
    [34, 139, 34],
    [0, 100, 0],
    [46, 139, 87],
    [60, 120, 60],
    [35, 100, 35],
];

/// 배경 픽셀 노이즈 폭 (±)
const NOISE: f32 = 10.0;

/// 회전 증강 최대 각도 (±도)
const MAX_ROTATION_DEG: f32 = 15.0;

/// 뒷면 카드를 후보에 남길 확률
const CARD_BACK_CHANCE: f32 = 0.3;

/// 데이터셋 디스크립터 파일 이름
pub const DESCRIPTOR_FILE: &str = "card_data.yaml";

/// 난수 공급원
pub trait Sampler {
    /// [0, 1) 균등 분포
    fn next_f32(&mut self) -> f32;

    /// [lo, hi) 균등 분포
    fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    /// [0, n) 정수. `n == 0`이면 0.
    fn index(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        ((self.next_f32() * n as f32) as usize).min(n - 1)
    }

    /// [lo, hi] 정수
    fn between(&mut self, lo: usize, hi: usize) -> usize {
        lo + self.index(hi.saturating_sub(lo) + 1)
    }

    /// 확률 `p`로 true
    fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }
}

/// 스레드 로컬 RNG 기반 샘플러
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSampler;

impl Sampler for ThreadSampler {
    fn next_f32(&mut self) -> f32 {
        rand::random::<f32>()
    }
}

/// 카드 이미지 자산
#[derive(Debug, Clone)]
pub struct CardAsset {
    pub class_id: u32,
    pub name: String,
    pub image: RgbaImage,
}

/// 카드 디렉토리에서 어휘 순서대로 `<name>.png` 로드. 없는 카드는 경고 후 생략.
pub fn load_cards(dir: &Path, vocabulary: &ClassVocabulary) -> Result<Vec<CardAsset>, CoreError> {
    let mut cards = Vec::new();
    for (class_id, name) in vocabulary.iter() {
        let path = dir.join(format!("{name}.png"));
        if !path.is_file() {
            warn!(card = name, "카드 이미지 없음 — 생략");
            continue;
        }
        let image = image::open(&path)
            .map_err(|e| CoreError::Image(format!("{}: {e}", path.display())))?
            .to_rgba8();
        cards.push(CardAsset {
            class_id,
            name: name.to_string(),
            image,
        });
    }
    if cards.is_empty() {
        return Err(CoreError::not_found("CardImages", dir.display().to_string()));
    }
    debug!(count = cards.len(), "카드 이미지 로드");
    Ok(cards)
}

/// 생성 결과 요약
#[derive(Debug, Clone, Default, Serialize)]
pub struct SynthSummary {
    pub images: usize,
    /// 배치된 카드 총 수
    pub cards_placed: usize,
    /// 자리를 못 찾아 생략된 카드 수
    pub cards_skipped: usize,
    pub descriptor: PathBuf,
}

/// 배치된 카드 사각형 (픽셀, 좌상단 포함 / 우하단 제외)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
}

impl Rect {
    fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.w
            && self.x + self.w > other.x
            && self.y < other.y + other.h
            && self.y + self.h > other.y
    }
}

/// 합성기
pub struct CardSynthesizer<S: Sampler> {
    settings: SynthConfig,
    cards: Vec<CardAsset>,
    vocabulary: ClassVocabulary,
    sampler: S,
}

impl<S: Sampler> CardSynthesizer<S> {
    pub fn new(settings: SynthConfig, cards: Vec<CardAsset>, sampler: S) -> Self {
        Self {
            settings,
            cards,
            vocabulary: ClassVocabulary::preset(VocabularyPreset::Cards),
            sampler,
        }
    }

    /// 이미지 한 장 생성: (RGB 이미지, 라벨, 생략된 카드 수)
    pub fn generate_one(&mut self) -> (RgbImage, Vec<NormalizedLabel>, usize) {
        let (width, height) = (self.settings.canvas_width, self.settings.canvas_height);
        let mut canvas = self.background(width, height);

        let count = self
            .sampler
            .between(self.settings.min_cards, self.settings.max_cards);
        let keep_back = self.sampler.chance(CARD_BACK_CHANCE);
        let candidates: Vec<usize> = (0..self.cards.len())
            .filter(|&i| keep_back || self.cards[i].name != CARD_BACK)
            .collect();

        let mut placed: Vec<Rect> = Vec::new();
        let mut labels = Vec::new();
        let mut skipped = 0;

        for _ in 0..count {
            if candidates.is_empty() {
                break;
            }
            let card_idx = candidates[self.sampler.index(candidates.len())];
            let card = self.augment(card_idx);

            let Some(rect) = self.find_slot(&card, width, height, &placed) else {
                skipped += 1;
                continue;
            };
            imageops::overlay(&mut canvas, &card, i64::from(rect.x), i64::from(rect.y));
            placed.push(rect);

            let (fw, fh) = (f64::from(width), f64::from(height));
            labels.push(NormalizedLabel {
                class_id: self.cards[card_idx].class_id,
                center_x: (f64::from(rect.x) + f64::from(rect.w) / 2.0) / fw,
                center_y: (f64::from(rect.y) + f64::from(rect.h) / 2.0) / fh,
                width: f64::from(rect.w) / fw,
                height: f64::from(rect.h) / fh,
            });
        }

        (image::DynamicImage::ImageRgba8(canvas).to_rgb8(), labels, skipped)
    }

    /// `num_images`장 생성하여 `images/`, `labels/`, `card_data.yaml` 기록
    pub fn generate(&mut self, out_dir: &Path) -> Result<SynthSummary, CoreError> {
        let images_dir = out_dir.join("images");
        fs::create_dir_all(&images_dir)?;
        let store = LabelStore::open(out_dir.join("labels"))?.with_overwrite(true);

        let total = self.settings.num_images;
        let mut summary = SynthSummary::default();
        for i in 0..total {
            let (image, labels, skipped) = self.generate_one();
            let stem = format!("cards_{i:05}");
            image
                .save(images_dir.join(format!("{stem}.png")))
                .map_err(|e| CoreError::Image(e.to_string()))?;
            store.write(&stem, &labels)?;

            summary.images += 1;
            summary.cards_placed += labels.len();
            summary.cards_skipped += skipped;
            if (i + 1) % 100 == 0 {
                info!("합성 진행: {}/{}", i + 1, total);
            }
        }

        let descriptor = DatasetDescriptor {
            path: out_dir.to_path_buf(),
            train: "images".to_string(),
            val: "images".to_string(),
            vocabulary: self.vocabulary.clone(),
        };
        let descriptor_path = out_dir.join(DESCRIPTOR_FILE);
        descriptor.write(&descriptor_path)?;
        summary.descriptor = descriptor_path;

        info!(
            images = summary.images,
            placed = summary.cards_placed,
            skipped = summary.cards_skipped,
            "합성 데이터셋 생성 완료"
        );
        Ok(summary)
    }

    /// 노이즈 섞인 단색 초록 배경
    fn background(&mut self, width: u32, height: u32) -> RgbaImage {
        let base = TABLE_GREENS[self.sampler.index(TABLE_GREENS.len())];
        let mut canvas = RgbaImage::new(width, height);
        for pixel in canvas.pixels_mut() {
            let mut rgba = [0u8, 0, 0, 255];
            for (slot, &channel) in rgba.iter_mut().zip(base.iter()) {
                let noise = self.sampler.range(-NOISE, NOISE);
                *slot = (f32::from(channel) + noise).clamp(0.0, 255.0) as u8;
            }
            *pixel = Rgba(rgba);
        }
        canvas
    }

    /// 회전 ±15°(캔버스 확장), 스케일 0.8~1.2, 50% 확률 밝기 0.8~1.2, 50% 확률 대비 0.9~1.1
    fn augment(&mut self, card_idx: usize) -> RgbaImage {
        let angle = self.sampler.range(-MAX_ROTATION_DEG, MAX_ROTATION_DEG);
        let rotated = rotate_expanded(&self.cards[card_idx].image, angle);
        let scale = self.sampler.range(0.8, 1.2);
        let w = ((rotated.width() as f32 * scale) as u32).max(1);
        let h = ((rotated.height() as f32 * scale) as u32).max(1);
        let mut card = imageops::resize(&rotated, w, h, FilterType::Lanczos3);

        if self.sampler.chance(0.5) {
            let factor = self.sampler.range(0.8, 1.2);
            adjust_brightness(&mut card, factor);
        }
        if self.sampler.chance(0.5) {
            let factor = self.sampler.range(0.9, 1.1);
            adjust_contrast(&mut card, factor);
        }
        card
    }

    /// 기존 카드와 겹치지 않는 위치 탐색
    fn find_slot(
        &mut self,
        card: &RgbaImage,
        width: u32,
        height: u32,
        placed: &[Rect],
    ) -> Option<Rect> {
        if card.width() > width || card.height() > height {
            return None;
        }
        let (max_x, max_y) = (width - card.width(), height - card.height());
        for _ in 0..self.settings.max_placement_attempts {
            let rect = Rect {
                x: self.sampler.between(0, max_x as usize) as u32,
                y: self.sampler.between(0, max_y as usize) as u32,
                w: card.width(),
                h: card.height(),
            };
            if !placed.iter().any(|p| p.overlaps(&rect)) {
                return Some(rect);
            }
        }
        None
    }
}

/// 투명 캔버스를 회전 외접 사각형 크기로 넓힌 뒤 중심 기준 회전
///
/// 결과 이미지 경계가 회전된 카드 전체를 덮으므로 배치 사각형이 곧 라벨 박스가 된다.
fn rotate_expanded(source: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees == 0.0 {
        return source.clone();
    }
    let theta = degrees.to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (source.width() as f32, source.height() as f32);
    let out_w = (w * cos + h * sin).ceil() as u32;
    let out_h = (w * sin + h * cos).ceil() as u32;

    let mut padded = RgbaImage::new(out_w, out_h);
    imageops::overlay(
        &mut padded,
        source,
        i64::from((out_w - source.width()) / 2),
        i64::from((out_h - source.height()) / 2),
    );
    rotate_about_center(&padded, theta, Interpolation::Bicubic, Rgba([0, 0, 0, 0]))
}

/// RGB 채널 배율
fn adjust_brightness(image: &mut RgbaImage, factor: f32) {
    for pixel in image.pixels_mut() {
        for c in pixel.0.iter_mut().take(3) {
            *c = (f32::from(*c) * factor).clamp(0.0, 255.0) as u8;
        }
    }
}

/// 평균 휘도 기준 대비 조정
fn adjust_contrast(image: &mut RgbaImage, factor: f32) {
    let count = (image.width() * image.height()).max(1) as f32;
    let mean = image
        .pixels()
        .map(|p| 0.299 * f32::from(p[0]) + 0.587 * f32::from(p[1]) + 0.114 * f32::from(p[2]))
        .sum::<f32>()
        / count;
    for pixel in image.pixels_mut() {
        for c in pixel.0.iter_mut().take(3) {
            *c = (mean + (f32::from(*c) - mean) * factor).clamp(0.0, 255.0) as u8;
        }
    }
}
