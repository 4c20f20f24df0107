//! 라벨 파일 저장소.
//!
//! 이미지 파일 stem당 `<stem>.txt` 하나. 이미 존재하는 라벨은 덮어쓰기 모드가
//! 아니면 다시 만들지 않는다. 유효 라벨이 없으면 빈 파일을 쓴다
//! (재실행 시 같은 이미지를 다시 처리하지 않도록).

use std::fs;
use std::path::{Path, PathBuf};

use percept_core::error::CoreError;
use percept_core::models::detection::NormalizedLabel;
use percept_core::models::vocabulary::ClassVocabulary;
use tracing::debug;

/// 클래스 매니페스트 파일 이름 (라벨 스캔 시 제외 대상)
pub const CLASSES_FILE: &str = "classes.txt";

/// 라벨 쓰기 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 라벨 N줄 기록 (0이면 빈 파일)
    Written(usize),
    /// 기존 파일 유지
    Skipped,
}

/// 디렉토리 기반 라벨 저장소
#[derive(Debug, Clone)]
pub struct LabelStore {
    dir: PathBuf,
    overwrite: bool,
}

impl LabelStore {
    /// 저장소 열기 (디렉토리가 없으면 생성)
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            overwrite: false,
        })
    }

    /// 기존 라벨 덮어쓰기 여부 설정
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// 저장소 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// stem에 해당하는 라벨 파일 경로
    pub fn label_path(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{stem}.txt"))
    }

    /// 라벨 파일 존재 여부
    pub fn exists(&self, stem: &str) -> bool {
        self.label_path(stem).exists()
    }

    /// 쓰기를 건너뛸지 (기존 파일 + 덮어쓰기 아님)
    pub fn should_skip(&self, stem: &str) -> bool {
        !self.overwrite && self.exists(stem)
    }

    /// 라벨 기록. 줄 구분은 `\n`, 마지막 줄 뒤 개행 없음.
    pub fn write(&self, stem: &str, labels: &[NormalizedLabel]) -> Result<WriteOutcome, CoreError> {
        if self.should_skip(stem) {
            debug!(stem, "기존 라벨 존재 — 건너뜀");
            return Ok(WriteOutcome::Skipped);
        }
        let body = labels
            .iter()
            .map(NormalizedLabel::to_line)
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(self.label_path(stem), body)?;
        debug!(stem, count = labels.len(), "라벨 기록");
        Ok(WriteOutcome::Written(labels.len()))
    }

    /// 라벨 읽기 (빈 줄 무시, 마지막 개행 허용)
    pub fn read(&self, stem: &str) -> Result<Vec<NormalizedLabel>, CoreError> {
        let path = self.label_path(stem);
        if !path.exists() {
            return Err(CoreError::not_found("Label", path.display().to_string()));
        }
        parse_label_text(&fs::read_to_string(path)?)
    }

    /// 저장소의 라벨 파일 stem 목록 (정렬, `classes.txt` 제외)
    pub fn stems(&self) -> Result<Vec<String>, CoreError> {
        let mut stems: Vec<String> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_label_file(p))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        stems.sort();
        Ok(stems)
    }

    /// `classes.txt` 매니페스트 기록 (항상 덮어씀)
    pub fn write_manifest(&self, vocabulary: &ClassVocabulary) -> Result<PathBuf, CoreError> {
        let path = self.dir.join(CLASSES_FILE);
        fs::write(&path, vocabulary.to_manifest())?;
        Ok(path)
    }
}

/// 라벨 파일 본문 파싱
pub fn parse_label_text(text: &str) -> Result<Vec<NormalizedLabel>, CoreError> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::parse)
        .collect()
}

/// `.txt` 라벨 파일인지 (`classes.txt` 제외)
pub fn is_label_file(path: &Path) -> bool {
    path.is_file()
        && path.extension().and_then(|e| e.to_str()) == Some("txt")
        && path.file_name().and_then(|n| n.to_str()) != Some(CLASSES_FILE)
}

/// 이미지 경로의 파일 stem
pub fn image_stem(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(String::from)
}
