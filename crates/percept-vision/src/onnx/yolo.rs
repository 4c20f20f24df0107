//! YOLOv8 ONNX 검출기.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Tensor;
use parking_lot::Mutex;
use percept_core::error::CoreError;
use percept_core::ports::inference::{ObjectDetector, RawBox};
use tracing::debug;

use super::{decode_image, file_label, inference_err, join_err, load_session};
use crate::postprocess::{decode_yolo, nms};
use crate::preprocess::letterbox_tensor;

/// YOLOv8 검출기
pub struct OnnxDetector {
    session: Arc<Mutex<Session>>,
    class_names: Vec<String>,
    input_size: u32,
    iou_threshold: f32,
    model_name: String,
}

impl OnnxDetector {
    /// 모델 로드. `class_names`는 모델 출력 순서.
    pub fn load(
        path: &Path,
        class_names: Vec<String>,
        input_size: u32,
        iou_threshold: f32,
    ) -> Result<Self, CoreError> {
        let session = load_session(path)?;
        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            class_names,
            input_size,
            iou_threshold,
            model_name: file_label(path),
        })
    }
}

#[async_trait]
impl ObjectDetector for OnnxDetector {
    async fn detect(&self, image: &[u8], conf_threshold: f32) -> Result<Vec<RawBox>, CoreError> {
        let img = decode_image(image)?;
        let session = self.session.clone();
        let size = self.input_size;
        let iou_threshold = self.iou_threshold;

        let boxes = tokio::task::spawn_blocking(move || -> Result<Vec<RawBox>, CoreError> {
            let (data, letterbox) = letterbox_tensor(&img, size);
            let side = size as usize;
            let array = Array4::from_shape_vec((1, 3, side, side), data)
                .map_err(inference_err("input shape"))?;
            let input = Tensor::from_array(array).map_err(inference_err("ort tensor"))?;

            let mut session = session.lock();
            let outputs = session
                .run(ort::inputs![input])
                .map_err(inference_err("ort run"))?;
            let output = outputs[0]
                .try_extract_array::<f32>()
                .map_err(inference_err("extract tensor"))?;

            // [1, 4 + num_classes, num_preds]
            let shape = output.shape().to_vec();
            if shape.len() < 3 || shape[1] < 4 {
                return Err(CoreError::Inference(format!(
                    "unexpected output shape: {shape:?}"
                )));
            }
            let flat: Vec<f32> = output.iter().copied().collect();
            let decoded = decode_yolo(&flat, shape[1] - 4, shape[2], conf_threshold, &letterbox);
            Ok(nms(decoded, iou_threshold))
        })
        .await
        .map_err(join_err)??;

        debug!(model = %self.model_name, count = boxes.len(), "YOLO 검출 완료");
        Ok(boxes)
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
