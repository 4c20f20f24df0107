//! 모델 입력 전처리.
//!
//! 이미지 → NCHW f32 텐서 데이터 (배치 1). 텐서 래핑은 ONNX 어댑터가 한다.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use percept_core::ports::inference::SegmentPrompt;

/// ImageNet 정규화 평균/표준편차 (0~1 스케일)
const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// SAM 정규화 평균/표준편차 (0~255 스케일)
const SAM_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const SAM_STD: [f32; 3] = [58.395, 57.12, 57.375];

/// SAM 인코더 입력 한 변
pub const SAM_INPUT_SIZE: u32 = 1024;

/// 레터박스 변환 정보
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    /// 원본 너비
    pub orig_w: u32,
    /// 원본 높이
    pub orig_h: u32,
}

impl Letterbox {
    /// 원본 크기 → 정사각 입력 크기 변환 계산
    pub fn new(orig_w: u32, orig_h: u32, input: u32) -> Self {
        let (ow, oh) = (orig_w.max(1) as f32, orig_h.max(1) as f32);
        let scale = (input as f32 / ow).min(input as f32 / oh);
        let nw = (ow * scale).round();
        let nh = (oh * scale).round();
        Self {
            scale,
            pad_x: (input as f32 - nw) / 2.0,
            pad_y: (input as f32 - nh) / 2.0,
            orig_w,
            orig_h,
        }
    }

    /// 입력 좌표계 중심/크기 → 원본 픽셀 좌상단/우하단 (원본 범위로 clamp)
    pub fn unmap(&self, cx: f32, cy: f32, w: f32, h: f32) -> [f32; 4] {
        let x1 = ((cx - w / 2.0) - self.pad_x) / self.scale;
        let y1 = ((cy - h / 2.0) - self.pad_y) / self.scale;
        let x2 = ((cx + w / 2.0) - self.pad_x) / self.scale;
        let y2 = ((cy + h / 2.0) - self.pad_y) / self.scale;
        let (mw, mh) = (self.orig_w as f32, self.orig_h as f32);
        [
            x1.clamp(0.0, mw),
            y1.clamp(0.0, mh),
            x2.clamp(0.0, mw),
            y2.clamp(0.0, mh),
        ]
    }
}

/// YOLO 입력: 레터박스(회색 114 패딩) + [0, 1] 스케일
pub fn letterbox_tensor(img: &DynamicImage, input: u32) -> (Vec<f32>, Letterbox) {
    let lb = Letterbox::new(img.width(), img.height(), input);
    let nw = ((img.width() as f32 * lb.scale).round() as u32).max(1);
    let nh = ((img.height() as f32 * lb.scale).round() as u32).max(1);
    let resized = img.resize_exact(nw, nh, FilterType::CatmullRom).to_rgb8();

    let mut canvas = RgbImage::from_pixel(input, input, Rgb([114, 114, 114]));
    imageops::overlay(
        &mut canvas,
        &resized,
        lb.pad_x.round() as i64,
        lb.pad_y.round() as i64,
    );
    (chw(&canvas, |_, v| v as f32 / 255.0), lb)
}

/// DINO 입력: 짧은 변 256 리사이즈 → 중앙 `size` 크롭 → ImageNet 정규화
pub fn imagenet_tensor(img: &DynamicImage, size: u32) -> Vec<f32> {
    let short = img.width().min(img.height()).max(1) as f32;
    let resize_to = (size as f32 * 256.0 / 224.0).round();
    let scale = resize_to / short;
    let nw = ((img.width() as f32 * scale).round() as u32).max(size);
    let nh = ((img.height() as f32 * scale).round() as u32).max(size);
    let resized = img.resize_exact(nw, nh, FilterType::CatmullRom).to_rgb8();
    let (x0, y0) = ((nw - size) / 2, (nh - size) / 2);
    let cropped = imageops::crop_imm(&resized, x0, y0, size, size).to_image();

    chw(&cropped, |c, v| {
        (v as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c]
    })
}

/// SAM 인코더 입력: 긴 변 1024 리사이즈 → 정규화 → 우하단 0 패딩. 스케일 반환.
pub fn sam_tensor(img: &DynamicImage) -> (Vec<f32>, f32) {
    let long = img.width().max(img.height()).max(1) as f32;
    let scale = SAM_INPUT_SIZE as f32 / long;
    let nw = ((img.width() as f32 * scale).round() as u32).clamp(1, SAM_INPUT_SIZE);
    let nh = ((img.height() as f32 * scale).round() as u32).clamp(1, SAM_INPUT_SIZE);
    let resized = img.resize_exact(nw, nh, FilterType::Triangle).to_rgb8();

    let side = SAM_INPUT_SIZE as usize;
    let mut data = vec![0.0f32; 3 * side * side];
    for (x, y, p) in resized.enumerate_pixels() {
        for c in 0..3 {
            data[c * side * side + y as usize * side + x as usize] =
                (p[c] as f32 - SAM_MEAN[c]) / SAM_STD[c];
        }
    }
    (data, scale)
}

/// SAM 디코더 프롬프트: (좌표 [N*2], 라벨 [N])
///
/// - 박스: 좌상단(2) + 우하단(3)
/// - 포인트: 전경(1) + 패딩(-1)
/// - 없음: 이미지 중심 전경(1) + 패딩(-1)
pub fn sam_prompt(prompt: SegmentPrompt, orig_w: u32, orig_h: u32, scale: f32) -> (Vec<f32>, Vec<f32>) {
    match prompt {
        SegmentPrompt::Box(rect) => (
            vec![
                rect.x as f32 * scale,
                rect.y as f32 * scale,
                (rect.x + rect.w) as f32 * scale,
                (rect.y + rect.h) as f32 * scale,
            ],
            vec![2.0, 3.0],
        ),
        SegmentPrompt::Point { x, y } => (
            vec![x as f32 * scale, y as f32 * scale, 0.0, 0.0],
            vec![1.0, -1.0],
        ),
        SegmentPrompt::None => (
            vec![
                (orig_w / 2) as f32 * scale,
                (orig_h / 2) as f32 * scale,
                0.0,
                0.0,
            ],
            vec![1.0, -1.0],
        ),
    }
}

/// HWC RGB → CHW f32 (채널별 변환 함수 적용)
fn chw(img: &RgbImage, f: impl Fn(usize, u8) -> f32) -> Vec<f32> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let plane = w * h;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, p) in img.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            data[c * plane + offset] = f(c, p[c]);
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use percept_core::ports::inference::PixelRect;

    #[test]
    fn letterbox_geometry() {
        // 1280x720 → 640: scale 0.5, 세로 패딩 140
        let lb = Letterbox::new(1280, 720, 640);
        assert!((lb.scale - 0.5).abs() < 1e-6);
        assert_eq!(lb.pad_x, 0.0);
        assert_eq!(lb.pad_y, 140.0);

        // 입력 좌표 (320, 320) 중심 100x50 박스 → 원본
        let [x1, y1, x2, y2] = lb.unmap(320.0, 320.0, 100.0, 50.0);
        assert_eq!([x1, y1, x2, y2], [540.0, 310.0, 740.0, 410.0]);
    }

    #[test]
    fn unmap_clamps_to_image() {
        let lb = Letterbox::new(100, 100, 100);
        assert_eq!(lb.unmap(0.0, 0.0, 40.0, 40.0), [0.0, 0.0, 20.0, 20.0]);
    }

    #[test]
    fn tensor_sizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(64, 32));
        let (data, lb) = letterbox_tensor(&img, 32);
        assert_eq!(data.len(), 3 * 32 * 32);
        assert_eq!(lb.pad_y, 8.0);
        // 패딩 영역은 114/255
        assert!((data[0] - 114.0 / 255.0).abs() < 1e-6);

        assert_eq!(imagenet_tensor(&img, 16).len(), 3 * 16 * 16);

        let (sam, scale) = sam_tensor(&img);
        assert_eq!(sam.len(), 3 * 1024 * 1024);
        assert_eq!(scale, 16.0);
    }

    #[test]
    fn sam_prompt_variants() {
        let rect = PixelRect {
            x: 10,
            y: 20,
            w: 30,
            h: 40,
        };
        let (coords, labels) = sam_prompt(SegmentPrompt::Box(rect), 100, 100, 2.0);
        assert_eq!(coords, vec![20.0, 40.0, 80.0, 120.0]);
        assert_eq!(labels, vec![2.0, 3.0]);

        let (coords, labels) = sam_prompt(SegmentPrompt::None, 100, 60, 1.0);
        assert_eq!(&coords[..2], &[50.0, 30.0]);
        assert_eq!(labels, vec![1.0, -1.0]);
    }
}
