//! 디바이스 시뮬레이터 드라이버 포트.
//!
//! 스크린샷 캡처와 탭/텍스트 입력을 추상화한다.
//! 구현체: `XcrunSimulator` (`percept-vision::capture`)

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::CoreError;

/// 시뮬레이터 드라이버
#[async_trait]
pub trait SimulatorDriver: Send + Sync {
    /// 스크린샷 저장 후 파일 경로 반환
    async fn screenshot(&self, name: &str) -> Result<PathBuf, CoreError>;

    /// 시뮬레이터 화면 좌표(포인트)로 탭
    async fn tap(&self, x: i32, y: i32) -> Result<(), CoreError>;

    /// 키보드 텍스트 입력
    async fn type_text(&self, text: &str) -> Result<(), CoreError>;

    /// Return 키 입력
    async fn press_return(&self) -> Result<(), CoreError>;
}
