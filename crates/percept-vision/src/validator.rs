//! 라벨 파일 검증.
//!
//! 각 줄은 공백 구분 5개 필드, 어휘 범위 안의 정수 클래스 ID,
//! [0, 1] 범위 좌표여야 한다. 너비/높이는 0보다 커야 한다.

use std::fs;
use std::path::{Path, PathBuf};

use percept_core::error::CoreError;
use percept_core::models::vocabulary::ClassVocabulary;
use serde::Serialize;
use tracing::{debug, warn};

use crate::label_store::is_label_file;

/// 한 줄의 검증 실패
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelIssue {
    /// 라벨 파일
    pub file: PathBuf,
    /// 1부터 시작하는 줄 번호
    pub line: usize,
    /// 실패 사유
    pub reason: String,
}

/// 검증 리포트
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// 검사한 파일 수
    pub files: usize,
    /// 빈 라벨 파일 수
    pub empty_files: usize,
    /// 유효한 라벨 줄 수
    pub valid: usize,
    /// 무효 라벨 줄 수
    pub invalid: usize,
    /// 무효 줄 상세
    pub issues: Vec<LabelIssue>,
}

impl ValidationReport {
    /// 무효 줄이 하나도 없는지
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

/// 어휘 기준 라벨 검증기
#[derive(Debug, Clone)]
pub struct LabelValidator {
    vocabulary: ClassVocabulary,
}

impl LabelValidator {
    pub fn new(vocabulary: ClassVocabulary) -> Self {
        Self { vocabulary }
    }

    /// 디렉토리의 모든 라벨 파일 검증 (`classes.txt` 제외)
    pub fn validate_dir(&self, dir: &Path) -> Result<ValidationReport, CoreError> {
        if !dir.is_dir() {
            return Err(CoreError::not_found("LabelDir", dir.display().to_string()));
        }
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_label_file(p))
            .collect();
        files.sort();

        let mut report = ValidationReport::default();
        for file in files {
            let text = fs::read_to_string(&file)?;
            self.validate_text(&file, &text, &mut report);
        }

        if report.is_clean() {
            debug!(files = report.files, valid = report.valid, "라벨 검증 통과");
        } else {
            warn!(
                files = report.files,
                valid = report.valid,
                invalid = report.invalid,
                "무효 라벨 발견"
            );
        }
        Ok(report)
    }

    /// 라벨 파일 본문 하나를 검증하여 리포트에 누적
    pub fn validate_text(&self, file: &Path, text: &str, report: &mut ValidationReport) {
        report.files += 1;
        if text.trim().is_empty() {
            report.empty_files += 1;
            return;
        }
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match self.check_line(line) {
                Ok(()) => report.valid += 1,
                Err(reason) => {
                    report.invalid += 1;
                    report.issues.push(LabelIssue {
                        file: file.to_path_buf(),
                        line: idx + 1,
                        reason,
                    });
                }
            }
        }
    }

    /// 한 줄 검사
    pub fn check_line(&self, line: &str) -> Result<(), String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 5 {
            return Err(format!("필드 5개 필요, {}개 발견", parts.len()));
        }

        let class_id: u32 = parts[0]
            .parse()
            .map_err(|_| format!("클래스 ID가 정수가 아님: {}", parts[0]))?;
        if !self.vocabulary.contains_id(class_id) {
            return Err(format!(
                "클래스 ID {class_id} 범위 밖 (0..{})",
                self.vocabulary.len()
            ));
        }

        let mut coords = [0.0f64; 4];
        for (slot, raw) in coords.iter_mut().zip(&parts[1..]) {
            *slot = raw.parse().map_err(|_| format!("좌표가 실수가 아님: {raw}"))?;
        }
        if coords.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err("좌표가 [0, 1] 범위 밖".to_string());
        }
        if coords[2] <= 0.0 || coords[3] <= 0.0 {
            return Err("너비/높이가 0 이하".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percept_core::models::vocabulary::VocabularyPreset;

    fn validator() -> LabelValidator {
        LabelValidator::new(ClassVocabulary::preset(VocabularyPreset::Legacy))
    }

    #[test]
    fn line_checks() {
        let v = validator();
        assert!(v.check_line("0 0.5 0.5 0.1 0.1").is_ok());
        assert!(v.check_line("10 0.0 1.0 1.0 0.01").is_ok());
        assert!(v.check_line("11 0.5 0.5 0.1 0.1").is_err());
        assert!(v.check_line("-1 0.5 0.5 0.1 0.1").is_err());
        assert!(v.check_line("0 0.5 0.5 0.1").is_err());
        assert!(v.check_line("0 1.5 0.5 0.1 0.1").is_err());
        assert!(v.check_line("0 0.5 0.5 0.0 0.1").is_err());
        assert!(v.check_line("0 a 0.5 0.1 0.1").is_err());
    }

    #[test]
    fn directory_report() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "0 0.5 0.5 0.1 0.1\n8 0.5 0.72 0.2 0.08").unwrap();
        fs::write(dir.path().join("b.txt"), "0 0.5 0.5 0.1 0.1\n42 0.5 0.5 0.1 0.1\n").unwrap();
        fs::write(dir.path().join("c.txt"), "").unwrap();
        fs::write(dir.path().join("classes.txt"), "btn_fold\n").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let report = validator().validate_dir(dir.path()).unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.empty_files, 1);
        assert_eq!(report.valid, 3);
        assert_eq!(report.invalid, 1);
        assert!(!report.is_clean());
        assert_eq!(report.issues[0].line, 2);
        assert!(report.issues[0].file.ends_with("b.txt"));
    }

    #[test]
    fn missing_dir_is_error() {
        assert!(validator().validate_dir(Path::new("/nonexistent/labels")).is_err());
    }
}
