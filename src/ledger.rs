use crate::types::DownloadOutcome;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// 台帳および文字起こしCSVのヘッダ
pub const LEDGER_HEADER: [&str; 2] = ["filepath", "korean_word"];

/// ダウンロード済みファイルと単語の対応を記録する追記専用CSV
///
/// ヘッダはファイルが存在しなかった場合に一度だけ書く。
/// 既存の行は書き換えない。
pub struct LedgerWriter {
    path: PathBuf,
}

impl LedgerWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 成功した作業を台帳に追記
    ///
    /// 結果の並び順（重複排除後のリンク順）のまま書き込む。
    ///
    /// # Returns
    ///
    /// 追記した行数
    ///
    /// # Errors
    ///
    /// 台帳を開けない、または書き込めない場合にエラーを返す。
    pub fn append(&self, outcomes: &[DownloadOutcome]) -> Result<usize> {
        let is_new_file = !self.path.exists();

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("台帳ディレクトリの作成に失敗: {:?}", dir))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("台帳を開けません: {:?}", self.path))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new_file {
            writer
                .write_record(LEDGER_HEADER)
                .with_context(|| "台帳ヘッダの書き込みに失敗")?;
        }

        let mut rows = 0;
        for outcome in outcomes.iter().filter(|o| o.success) {
            let filepath = outcome.task.target.to_string_lossy();
            writer
                .write_record([&*filepath, outcome.task.link.word.as_str()])
                .with_context(|| format!("台帳への書き込みに失敗: {}", filepath))?;
            rows += 1;
        }

        writer
            .flush()
            .with_context(|| format!("台帳の書き込みに失敗: {:?}", self.path))?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AudioLinkRecord, DownloadTask};
    use std::fs;
    use tempfile::TempDir;
    use url::Url;

    fn outcome(target: &str, word: &str, success: bool) -> DownloadOutcome {
        DownloadOutcome {
            task: DownloadTask {
                link: AudioLinkRecord {
                    url: Url::parse("https://example.com/a.mp3").unwrap(),
                    lesson: "1".to_string(),
                    word: word.to_string(),
                },
                target: PathBuf::from(target),
            },
            success,
        }
    }

    #[test]
    fn test_writes_only_successes_with_header() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let ledger = LedgerWriter::new(temp_dir.path().join("vocabulary.csv"));

        let rows = ledger.append(&[
            outcome("audios/lesson_1/Lesson1v01.mp3", "안녕", true),
            outcome("audios/lesson_1/Lesson1v02.mp3", "실패", false),
            outcome("audios/lesson_1/Lesson1v03.mp3", "물, 불", true),
        ])?;

        assert_eq!(rows, 2);
        let content = fs::read_to_string(ledger.path())?;
        assert_eq!(
            content,
            "filepath,korean_word\n\
             audios/lesson_1/Lesson1v01.mp3,안녕\n\
             audios/lesson_1/Lesson1v03.mp3,\"물, 불\"\n"
        );

        Ok(())
    }

    #[test]
    fn test_append_keeps_existing_rows_and_header_once() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let ledger = LedgerWriter::new(temp_dir.path().join("vocabulary.csv"));

        ledger.append(&[outcome("a.mp3", "가", true)])?;
        ledger.append(&[outcome("b.mp3", "나", true)])?;

        let content = fs::read_to_string(ledger.path())?;
        assert_eq!(content, "filepath,korean_word\na.mp3,가\nb.mp3,나\n");

        Ok(())
    }

    #[test]
    fn test_existing_file_without_header_gets_none() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("vocabulary.csv");
        fs::write(&path, "old.mp3,옛날\n")?;

        let rows = LedgerWriter::new(&path).append(&[outcome("new.mp3", "새", true)])?;

        assert_eq!(rows, 1);
        assert_eq!(fs::read_to_string(&path)?, "old.mp3,옛날\nnew.mp3,새\n");

        Ok(())
    }

    #[test]
    fn test_no_successes_creates_header_only() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let ledger = LedgerWriter::new(temp_dir.path().join("nested").join("ledger.csv"));

        let rows = ledger.append(&[outcome("a.mp3", "가", false)])?;

        assert_eq!(rows, 0);
        assert_eq!(fs::read_to_string(ledger.path())?, "filepath,korean_word\n");

        Ok(())
    }
}
