use anyhow::{Context, Result};
use regex_lite::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use url::Url;

/// レッスン番号が見つからない場合の値
pub const UNKNOWN_LESSON: &str = "unknown";

/// 音声ファイルの拡張子（比較は大文字小文字を区別しない）
pub const AUDIO_EXTENSION: &str = ".mp3";

static LESSON_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"lesson-(\d+)").expect("レッスン番号パターンが不正"));

/// ページURLからレッスン番号を取り出す
///
/// `lesson-` の直後に続く数字列を返す。見つからなければ `"unknown"`。
///
/// # Examples
///
/// ```
/// # use vocab_harvest::types::lesson_id_from_url;
/// assert_eq!(lesson_id_from_url("https://example.com/unit-2/lesson-37/"), "37");
/// assert_eq!(lesson_id_from_url("https://example.com/about/"), "unknown");
/// ```
pub fn lesson_id_from_url(url: &str) -> String {
    LESSON_ID_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| UNKNOWN_LESSON.to_string())
}

/// ファイル名が音声ファイルの拡張子で終わるか
pub fn has_audio_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(AUDIO_EXTENSION)
}

/// 解析対象のページ
///
/// パイプライン開始時に一度だけ作られ、以降は変更されない。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageTarget {
    /// ページURL
    pub url: Url,

    /// URLから導出したレッスン番号（または `"unknown"`）
    pub lesson: String,
}

impl PageTarget {
    /// URL文字列からページを作成
    ///
    /// # Errors
    ///
    /// URLとして解釈できない場合にエラーを返す。
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url.trim()).with_context(|| format!("不正なページURL: {}", url))?;
        let lesson = lesson_id_from_url(url.as_str());
        Ok(Self { url, lesson })
    }
}

/// ページから抽出した音声リンク
///
/// `url` が重複排除のキー。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioLinkRecord {
    /// 絶対URL
    pub url: Url,

    /// レッスン番号
    pub lesson: String,

    /// リンクに対応する単語（空文字列にはならない）
    pub word: String,
}

/// ダウンロード1件分の作業
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadTask {
    pub link: AudioLinkRecord,

    /// 保存先（レッスンディレクトリ + 正規化済みファイル名）
    pub target: PathBuf,
}

/// ダウンロード結果
#[derive(Clone, Debug)]
pub struct DownloadOutcome {
    pub task: DownloadTask,
    pub success: bool,
}

/// 1回の実行の集計
///
/// 実行終了時にログへ出力される。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// 対象ページ数
    pub pages_total: usize,

    /// 取得に失敗したページ数
    pub pages_failed: usize,

    /// 抽出したリンク数（重複を含む）
    pub links_found: usize,

    /// 重複排除後のリンク数
    pub unique_links: usize,

    /// ダウンロードを試みた数
    pub downloads_attempted: usize,

    /// ダウンロードに成功した数
    pub downloads_succeeded: usize,

    /// 台帳に追記した行数
    pub ledger_rows: usize,
}
