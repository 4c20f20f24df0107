//! DINOv2 ONNX 임베딩 추출기.
//!
//! 출력 `[1, tokens, dims]`의 첫 토큰(CLS)을 임베딩으로 쓴다.
//! 풀링된 `[1, dims]` 출력도 그대로 받는다.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use percept_core::error::CoreError;
use percept_core::ports::inference::ImageEmbedder;
use tracing::warn;

use super::{decode_image, inference_err, join_err, load_session};
use crate::preprocess::imagenet_tensor;

/// DINOv2 임베딩 추출기
pub struct OnnxEmbedder {
    session: Arc<Mutex<Session>>,
    input_size: u32,
    dimensions: usize,
    model_name: String,
}

impl OnnxEmbedder {
    pub fn load(
        path: &Path,
        model_name: impl Into<String>,
        input_size: u32,
        dimensions: usize,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            session: Arc::new(Mutex::new(load_session(path)?)),
            input_size,
            dimensions,
            model_name: model_name.into(),
        })
    }
}

#[async_trait]
impl ImageEmbedder for OnnxEmbedder {
    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>, CoreError> {
        let img = decode_image(image)?;
        let session = self.session.clone();
        let size = self.input_size;

        let embedding = tokio::task::spawn_blocking(move || -> Result<Vec<f32>, CoreError> {
            let side = size as usize;
            let array = Array4::from_shape_vec((1, 3, side, side), imagenet_tensor(&img, size))
                .map_err(inference_err("input shape"))?;
            let input = Tensor::from_array(array).map_err(inference_err("ort tensor"))?;

            let mut session = session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(inference_err("ort run"))?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .map_err(inference_err("extract tensor"))?;

            let dims = output.shape().last().copied().unwrap_or(0);
            if dims == 0 {
                return Err(CoreError::Inference("빈 임베딩 출력".to_string()));
            }
            // 행 우선 순서에서 첫 dims개 = 첫 토큰
            Ok(output.iter().take(dims).copied().collect())
        })
        .await
        .map_err(join_err)??;

        if embedding.len() != self.dimensions {
            warn!(
                expected = self.dimensions,
                actual = embedding.len(),
                "임베딩 차원이 설정과 다름"
            );
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
