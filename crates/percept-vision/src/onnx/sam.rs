//! SAM ONNX 세그멘터 (이미지 인코더 + 프롬프트 디코더).
//!
//! 디코더 입력:
//! - `image_embeddings`: 인코더 출력 `[1, 256, 64, 64]`
//! - `point_coords` `[1, N, 2]`, `point_labels` `[1, N]` (1024 입력 좌표계)
//! - `mask_input` `[1, 1, 256, 256]` (0), `has_mask_input` `[1]` (0)
//! - `orig_im_size` `[2]` = (높이, 너비)
//!
//! 출력 `masks` `[1, K, H, W]` 로짓과 `iou_predictions` `[1, K]` 중
//! 점수가 가장 높은 마스크를 고른다.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::{Array, Array1, Array2, Array3, Array4};
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use percept_core::error::CoreError;
use percept_core::ports::inference::{SegmentMask, SegmentPrompt, Segmenter};
use tracing::debug;

use super::{decode_image, inference_err, join_err, load_session};
use crate::postprocess::best_mask;
use crate::preprocess::{sam_prompt, sam_tensor, SAM_INPUT_SIZE};

/// SAM 세그멘터
pub struct OnnxSegmenter {
    encoder: Arc<Mutex<Session>>,
    decoder: Arc<Mutex<Session>>,
    model_name: String,
}

impl OnnxSegmenter {
    /// 인코더/디코더 모델 로드
    pub fn load(encoder: &Path, decoder: &Path, model_type: &str) -> Result<Self, CoreError> {
        Ok(Self {
            encoder: Arc::new(Mutex::new(load_session(encoder)?)),
            decoder: Arc::new(Mutex::new(load_session(decoder)?)),
            model_name: format!("sam_{model_type}"),
        })
    }
}

#[async_trait]
impl Segmenter for OnnxSegmenter {
    async fn segment(&self, image: &[u8], prompt: SegmentPrompt) -> Result<SegmentMask, CoreError> {
        let img = decode_image(image)?;
        let encoder = self.encoder.clone();
        let decoder = self.decoder.clone();

        let mask = tokio::task::spawn_blocking(move || -> Result<SegmentMask, CoreError> {
            let (orig_w, orig_h) = (img.width(), img.height());
            let (pixels, scale) = sam_tensor(&img);
            let side = SAM_INPUT_SIZE as usize;

            // 1. 이미지 임베딩
            let array = Array4::from_shape_vec((1, 3, side, side), pixels)
                .map_err(inference_err("encoder input shape"))?;
            let input = Tensor::from_array(array).map_err(inference_err("ort tensor"))?;
            let embeddings = {
                let mut encoder = encoder.lock();
                let outputs = encoder
                    .run(ort::inputs![input])
                    .map_err(inference_err("encoder run"))?;
                outputs[0]
                    .try_extract_array::<f32>()
                    .map_err(inference_err("extract embeddings"))?
                    .to_owned()
            };

            // 2. 프롬프트 디코딩
            let (coords, labels) = sam_prompt(prompt, orig_w, orig_h, scale);
            let points = labels.len();
            let point_coords = Array3::from_shape_vec((1, points, 2), coords)
                .map_err(inference_err("point_coords shape"))?;
            let point_labels = Array2::from_shape_vec((1, points), labels)
                .map_err(inference_err("point_labels shape"))?;
            let mask_input = Array4::<f32>::zeros((1, 1, 256, 256));
            let has_mask_input = Array1::<f32>::zeros(1);
            let orig_im_size = Array::from_vec(vec![orig_h as f32, orig_w as f32]);

            let mut decoder = decoder.lock();
            let outputs = decoder
                .run(ort::inputs![
                    "image_embeddings" => Tensor::from_array(embeddings).map_err(inference_err("ort tensor"))?,
                    "point_coords" => Tensor::from_array(point_coords).map_err(inference_err("ort tensor"))?,
                    "point_labels" => Tensor::from_array(point_labels).map_err(inference_err("ort tensor"))?,
                    "mask_input" => Tensor::from_array(mask_input).map_err(inference_err("ort tensor"))?,
                    "has_mask_input" => Tensor::from_array(has_mask_input).map_err(inference_err("ort tensor"))?,
                    "orig_im_size" => Tensor::from_array(orig_im_size).map_err(inference_err("ort tensor"))?,
                ])
                .map_err(inference_err("decoder run"))?;

            let masks = outputs["masks"]
                .try_extract_array::<f32>()
                .map_err(inference_err("extract masks"))?;
            let scores = outputs["iou_predictions"]
                .try_extract_array::<f32>()
                .map_err(inference_err("extract scores"))?;

            let shape = masks.shape().to_vec();
            if shape.len() < 2 {
                return Err(CoreError::Inference(format!(
                    "unexpected mask shape: {shape:?}"
                )));
            }
            let (h, w) = (shape[shape.len() - 2] as u32, shape[shape.len() - 1] as u32);
            let flat: Vec<f32> = masks.iter().copied().collect();
            let scores: Vec<f32> = scores.iter().copied().collect();
            best_mask(&flat, &scores, w, h)
                .ok_or_else(|| CoreError::Inference("마스크 출력 없음".to_string()))
        })
        .await
        .map_err(join_err)??;

        debug!(model = %self.model_name, score = mask.score, "SAM 세그멘테이션 완료");
        Ok(mask)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
