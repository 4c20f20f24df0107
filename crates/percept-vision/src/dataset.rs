//! 데이터셋 도구.
//!
//! - 이미지 목록 (png/jpg, 이름순)
//! - YOLO 데이터셋 디스크립터 (YAML) 생성
//! - 라벨 스테이징: 라벨 파일을 이미지 옆으로 복사 (YOLO 학습기는 같은 위치를 기대)
//! - 데이터셋 현황 집계

use std::fs;
use std::path::{Path, PathBuf};

use percept_core::error::CoreError;
use percept_core::models::vocabulary::ClassVocabulary;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::label_store::{image_stem, is_label_file};

/// 라벨링 대상 이미지 확장자
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// 라벨 비율이 이 값 미만이면 경고
const SPARSE_LABEL_RATIO: f64 = 0.5;

/// 디렉토리의 이미지 파일 목록 (이름순)
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>, CoreError> {
    if !dir.is_dir() {
        return Err(CoreError::not_found("ImageDir", dir.display().to_string()));
    }
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_image(p))
        .collect();
    images.sort();
    Ok(images)
}

/// 확장자 기준 이미지 여부 (대소문자 무시)
pub fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// YOLO 데이터셋 디스크립터
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    /// 데이터셋 루트
    pub path: PathBuf,
    /// 학습 이미지 (루트 기준 상대 경로)
    pub train: String,
    /// 검증 이미지 (루트 기준 상대 경로)
    pub val: String,
    pub vocabulary: ClassVocabulary,
}

impl DatasetDescriptor {
    /// 이미지 디렉토리 하나를 학습/검증 겸용으로 쓰는 디스크립터
    pub fn for_images_dir(images_dir: &Path, vocabulary: ClassVocabulary) -> Self {
        let root = images_dir
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let split = images_dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("images")
            .to_string();
        Self {
            path: root,
            train: split.clone(),
            val: split,
            vocabulary,
        }
    }

    /// YAML 본문 (`names`는 ID → 이름 매핑)
    pub fn to_yaml(&self) -> String {
        let mut out = format!(
            "# percept dataset ({})\npath: {}\ntrain: {}\nval: {}\n\nnc: {}\nnames:\n",
            self.vocabulary.name,
            quote(&self.path.display().to_string()),
            quote(&self.train),
            quote(&self.val),
            self.vocabulary.len()
        );
        for (id, name) in self.vocabulary.iter() {
            out.push_str(&format!("  {id}: {}\n", quote(name)));
        }
        out
    }

    /// 디스크립터 파일 기록
    pub fn write(&self, out: &Path) -> Result<(), CoreError> {
        if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(out, self.to_yaml())?;
        info!(path = %out.display(), nc = self.vocabulary.len(), "데이터셋 디스크립터 기록");
        Ok(())
    }
}

/// YAML 큰따옴표 스칼라 (JSON 문자열 표기와 호환)
fn quote(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// 라벨 파일을 이미지 디렉토리로 복사 (대상이 없을 때만). 복사한 파일 수 반환.
pub fn stage_labels(labels_dir: &Path, images_dir: &Path) -> Result<usize, CoreError> {
    if labels_dir == images_dir {
        return Ok(0);
    }
    fs::create_dir_all(images_dir)?;
    let mut copied = 0;
    for entry in fs::read_dir(labels_dir)? {
        let path = entry?.path();
        if !is_label_file(&path) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = images_dir.join(name);
        if dest.exists() {
            continue;
        }
        fs::copy(&path, &dest)?;
        copied += 1;
    }
    debug!(copied, from = %labels_dir.display(), to = %images_dir.display(), "라벨 스테이징");
    Ok(copied)
}

/// 데이터셋 현황
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetCensus {
    /// 이미지 수
    pub images: usize,
    /// 대응 라벨 파일이 있는 이미지 수
    pub labeled: usize,
    /// 그중 빈 라벨 파일 수
    pub empty_labels: usize,
}

impl DatasetCensus {
    /// 라벨 커버리지 (0~1)
    pub fn coverage(&self) -> f64 {
        if self.images == 0 {
            0.0
        } else {
            self.labeled as f64 / self.images as f64
        }
    }

    /// 라벨이 이미지의 절반 미만인지
    pub fn is_sparse(&self) -> bool {
        self.coverage() < SPARSE_LABEL_RATIO
    }
}

/// 이미지/라벨 디렉토리 현황 집계
pub fn census(images_dir: &Path, labels_dir: &Path) -> Result<DatasetCensus, CoreError> {
    let images = list_images(images_dir)?;
    let mut result = DatasetCensus {
        images: images.len(),
        ..Default::default()
    };
    for image in &images {
        let Some(stem) = image_stem(image) else {
            continue;
        };
        let label = labels_dir.join(format!("{stem}.txt"));
        if label.is_file() {
            result.labeled += 1;
            if fs::metadata(&label)?.len() == 0 {
                result.empty_labels += 1;
            }
        }
    }
    if result.is_sparse() {
        warn!(
            images = result.images,
            labeled = result.labeled,
            "라벨이 이미지의 50% 미만 — 라벨링을 먼저 실행하세요"
        );
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use percept_core::models::vocabulary::VocabularyPreset;

    #[test]
    fn lists_only_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "c.jpeg", "d.txt", "e.gif"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JPG", "b.png", "c.jpeg"]);
    }

    #[test]
    fn descriptor_yaml() {
        let descriptor = DatasetDescriptor::for_images_dir(
            Path::new("/data/training/poker_images"),
            ClassVocabulary::preset(VocabularyPreset::Rive),
        );
        let yaml = descriptor.to_yaml();
        assert!(yaml.contains("path: \"/data/training\""));
        assert!(yaml.contains("train: \"poker_images\""));
        assert!(yaml.contains("nc: 9\n"));
        assert!(yaml.contains("  0: \"btn_fold\"\n"));
        assert!(yaml.contains("  8: \"bet_slider\"\n"));
    }

    #[test]
    fn staging_copies_missing_only() {
        let labels = tempfile::tempdir().unwrap();
        let images = tempfile::tempdir().unwrap();
        fs::write(labels.path().join("a.txt"), "new").unwrap();
        fs::write(labels.path().join("b.txt"), "new").unwrap();
        fs::write(labels.path().join("classes.txt"), "btn_fold").unwrap();
        fs::write(images.path().join("b.txt"), "existing").unwrap();

        assert_eq!(stage_labels(labels.path(), images.path()).unwrap(), 1);
        assert_eq!(fs::read_to_string(images.path().join("b.txt")).unwrap(), "existing");
        assert!(!images.path().join("classes.txt").exists());
    }

    #[test]
    fn census_counts_and_sparsity() {
        let images = tempfile::tempdir().unwrap();
        let labels = tempfile::tempdir().unwrap();
        for name in ["a.png", "b.png", "c.png", "d.png"] {
            fs::write(images.path().join(name), b"").unwrap();
        }
        fs::write(labels.path().join("a.txt"), "0 0.5 0.5 0.1 0.1").unwrap();
        fs::write(labels.path().join("b.txt"), "").unwrap();

        let c = census(images.path(), labels.path()).unwrap();
        assert_eq!(c.images, 4);
        assert_eq!(c.labeled, 2);
        assert_eq!(c.empty_labels, 1);
        assert!(!c.is_sparse());

        fs::remove_file(labels.path().join("b.txt")).unwrap();
        assert!(census(images.path(), labels.path()).unwrap().is_sparse());
    }
}
