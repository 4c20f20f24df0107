//! # percept-vision
//!
//! UI 인식 데이터 파이프라인 크레이트.
//! VLM 응답 파싱, 클래스/좌표 정규화, 라벨 저장과 검증, 템플릿 라벨링,
//! 합성 카드 데이터, 시뮬레이터 캡처, 추론 전처리/후처리를 담당한다.

pub mod auto_labeler;
pub mod bbox;
pub mod capture;
pub mod class_normalizer;
pub mod dataset;
pub mod label_store;
pub mod mock;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod postprocess;
pub mod preprocess;
pub mod provider;
pub mod response_parser;
pub mod synth;
pub mod template;
pub mod ui_types;
pub mod validator;
