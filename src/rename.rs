use crate::error::HarvestError;
use crate::filename::normalize_filename;
use crate::types::has_audio_extension;
use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// リネーム結果の集計
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenameReport {
    /// リネームしたファイル数
    pub renamed: usize,
    /// 既に正規化済みだったファイル数
    pub already_normalized: usize,
    /// リネーム先が既に存在したため飛ばしたファイル
    pub conflicts: Vec<PathBuf>,
    /// リネームに失敗したファイル数
    pub errors: usize,
}

/// 既存の音声ファイルにファイル名の正規化を適用する
///
/// `recursive` が true ならレッスンディレクトリ配下も対象にする。
/// リネーム先に別のファイルがある場合は上書きせずに衝突として報告する。
/// オーディオルートが存在しない場合は空の結果を返す。
pub fn rename_existing_files(audio_root: &Path, recursive: bool) -> Result<RenameReport> {
    let mut report = RenameReport::default();

    if !audio_root.is_dir() {
        log::warn!("フォルダ {:?} が存在しません", audio_root);
        return Ok(report);
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    // 走査中にリネームしないよう、先に一覧を作る
    let mut files = Vec::new();
    for entry in WalkDir::new(audio_root).min_depth(1).max_depth(max_depth) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::warn!("走査エラー: {}", e);
                continue;
            }
        };
        if entry.file_type().is_file() && has_audio_extension(&entry.file_name().to_string_lossy())
        {
            files.push(entry.into_path());
        }
    }
    files.sort();

    for old_path in files {
        let Some(name) = old_path.file_name().and_then(|n| n.to_str()) else {
            log::warn!("ファイル名をUTF-8として扱えません: {:?}", old_path);
            continue;
        };

        let formatted = normalize_filename(name);
        if formatted == name {
            log::info!("正規化済み: {}", name);
            report.already_normalized += 1;
            continue;
        }

        let new_path = old_path.with_file_name(&formatted);
        if new_path.exists() {
            log::warn!(
                "{}、ファイルを飛ばします: {}",
                HarvestError::FilesystemConflict(new_path.clone()),
                name
            );
            report.conflicts.push(old_path);
            continue;
        }

        match fs::rename(&old_path, &new_path) {
            Ok(()) => {
                log::info!("リネーム: {} → {}", name, formatted);
                report.renamed += 1;
            }
            Err(e) => {
                log::error!("{} のリネームに失敗: {}", name, e);
                report.errors += 1;
            }
        }
    }

    log::info!("リネーム完了: {} ファイルをリネームしました", report.renamed);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_renames_top_level_and_lesson_dirs() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("lesson_26"))?;
        fs::write(root.join("Lesson26v1.mp3"), b"a")?;
        fs::write(root.join("lesson_26").join("Lesson26v2.mp3"), b"b")?;
        fs::write(root.join("lesson_26").join("Lesson26v10.mp3"), b"c")?;
        fs::write(root.join("notes.txt"), b"d")?;

        let report = rename_existing_files(root, true)?;

        assert_eq!(report.renamed, 2);
        assert_eq!(report.already_normalized, 1);
        assert!(report.conflicts.is_empty());
        assert!(root.join("Lesson26v01.mp3").exists());
        assert!(root.join("lesson_26").join("Lesson26v02.mp3").exists());
        assert!(!root.join("lesson_26").join("Lesson26v2.mp3").exists());
        assert!(root.join("notes.txt").exists());

        Ok(())
    }

    #[test]
    fn test_flat_scan_ignores_subdirectories() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::create_dir_all(root.join("lesson_26"))?;
        fs::write(root.join("Lesson26v1.mp3"), b"a")?;
        fs::write(root.join("lesson_26").join("Lesson26v2.mp3"), b"b")?;

        let report = rename_existing_files(root, false)?;

        assert_eq!(report.renamed, 1);
        assert!(root.join("lesson_26").join("Lesson26v2.mp3").exists());

        Ok(())
    }

    #[test]
    fn test_conflict_is_reported_and_not_renamed() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let root = temp_dir.path();
        fs::write(root.join("Lesson30v1.mp3"), b"single")?;
        fs::write(root.join("Lesson30v01.mp3"), b"padded")?;

        let report = rename_existing_files(root, true)?;

        assert_eq!(report.renamed, 0);
        assert_eq!(report.conflicts, vec![root.join("Lesson30v1.mp3")]);
        assert_eq!(fs::read(root.join("Lesson30v1.mp3"))?, b"single");
        assert_eq!(fs::read(root.join("Lesson30v01.mp3"))?, b"padded");

        Ok(())
    }

    #[test]
    fn test_missing_root() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let report = rename_existing_files(&temp_dir.path().join("absent"), true)?;
        assert_eq!(report, RenameReport::default());
        Ok(())
    }
}
