//! Percept 도메인 모델.
//!
//! 검출/라벨, 클래스 어휘, 분류 규칙 테이블, 라벨링 프로파일을 정의한다.

pub mod detection;
pub mod profile;
pub mod rules;
pub mod vocabulary;
