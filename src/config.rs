use crate::types::PageTarget;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub rename: RenameConfig,
    #[serde(default)]
    pub transcribe: TranscribeConfig,
    #[serde(default)]
    pub anki: AnkiConfig,
}

/// HTTPクライアント設定
///
/// # デフォルト値
///
/// - `user_agent`: "Mozilla/5.0" (既定のクライアントを拒否するサイトがある)
/// - `timeout_seconds`: なし (タイムアウトしない)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// 解析対象ページの設定
///
/// `pages` に列挙したURLの後に、`ranges` から生成したURLが続く。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub pages: Vec<String>,
    #[serde(default = "default_ranges")]
    pub ranges: Vec<PageRange>,
}

/// 連番ページの生成規則
///
/// `template` 中の `{n}` を `start..=end` の各値で置き換える。
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PageRange {
    pub template: String,
    pub start: u32,
    pub end: u32,
}

/// ダウンロード設定
///
/// # デフォルト値
///
/// - `audio_root`: "audios"
/// - `ledger_path`: "vocabulary.csv"
/// - `concurrency`: 8 (ページ取得とダウンロードの同時実行数)
/// - `chunk_size`: 8192 バイト
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    #[serde(default = "default_audio_root")]
    pub audio_root: PathBuf,
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

/// リネーム設定
///
/// `recursive = false` でオーディオルート直下のみを対象にする。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenameConfig {
    #[serde(default = "default_recursive")]
    pub recursive: bool,
}

/// 文字起こし設定（OpenAI互換 Whisper API）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranscribeConfig {
    /// API Key。未設定なら環境変数 `OPENAI_API_KEY` を使う
    #[serde(default)]
    pub api_key: Option<String>,
    /// APIのベースURL
    #[serde(default = "default_whisper_base_url")]
    pub base_url: String,
    /// Whisper モデル名（通常 "whisper-1"）
    #[serde(default = "default_whisper_model")]
    pub model: String,
    /// 言語コード（"ko" など）。省略可能
    #[serde(default = "default_whisper_language")]
    pub language: Option<String>,
    /// 文字起こし結果のCSV
    #[serde(default = "default_transcriptions_path")]
    pub output_path: PathBuf,
}

/// AnkiConnect 設定
///
/// # デフォルト値
///
/// - `endpoint`: "http://127.0.0.1:8765"
/// - `version`: 6
/// - `word_field`: "Korean"
/// - `sound_field`: "Sound"
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnkiConfig {
    #[serde(default = "default_anki_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_anki_version")]
    pub version: u32,
    #[serde(default = "default_anki_query")]
    pub query: String,
    #[serde(default = "default_word_field")]
    pub word_field: String,
    #[serde(default = "default_sound_field")]
    pub sound_field: String,
}

// Default functions
fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}

fn default_ranges() -> Vec<PageRange> {
    let base = "https://www.howtostudykorean.com/unit-2-lower-intermediate-korean-grammar";
    vec![
        PageRange {
            template: format!("{}/unit-2-lessons-26-33/lesson-{{n}}/", base),
            start: 26,
            end: 33,
        },
        PageRange {
            template: format!("{}/unit-2-lessons-34-41/lesson-{{n}}/", base),
            start: 34,
            end: 41,
        },
        PageRange {
            template: format!("{}/unit-2-lessons-42-50/lesson-{{n}}/", base),
            start: 42,
            end: 50,
        },
    ]
}

fn default_audio_root() -> PathBuf {
    PathBuf::from("audios")
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("vocabulary.csv")
}

fn default_concurrency() -> usize {
    8
}

fn default_chunk_size() -> usize {
    8192
}

fn default_recursive() -> bool {
    true // ダウンロード先のレッスンディレクトリも対象にする
}

fn default_whisper_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_whisper_model() -> String {
    "whisper-1".to_string()
}

fn default_whisper_language() -> Option<String> {
    Some("ko".to_string())
}

fn default_transcriptions_path() -> PathBuf {
    PathBuf::from("transcriptions.csv")
}

fn default_anki_endpoint() -> String {
    "http://127.0.0.1:8765".to_string()
}

fn default_anki_version() -> u32 {
    6
}

fn default_anki_query() -> String {
    r#""deck:Korean::HTSK Vocab - Unit 2""#.to_string()
}

fn default_word_field() -> String {
    "Korean".to_string()
}

fn default_sound_field() -> String {
    "Sound".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            source: SourceConfig::default(),
            download: DownloadConfig::default(),
            rename: RenameConfig::default(),
            transcribe: TranscribeConfig::default(),
            anki: AnkiConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_seconds: None,
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            ranges: default_ranges(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            audio_root: default_audio_root(),
            ledger_path: default_ledger_path(),
            concurrency: default_concurrency(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            recursive: default_recursive(),
        }
    }
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_whisper_base_url(),
            model: default_whisper_model(),
            language: default_whisper_language(),
            output_path: default_transcriptions_path(),
        }
    }
}

impl Default for AnkiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_anki_endpoint(),
            version: default_anki_version(),
            query: default_anki_query(),
            word_field: default_word_field(),
            sound_field: default_sound_field(),
        }
    }
}

impl PageRange {
    /// 連番URLを生成
    pub fn urls(&self) -> impl Iterator<Item = String> + '_ {
        (self.start..=self.end).map(|n| self.template.replace("{n}", &n.to_string()))
    }
}

impl SourceConfig {
    /// 解析対象のページ一覧を作成
    ///
    /// 明示指定のURL、続いて連番から生成したURLの順に並ぶ。
    ///
    /// # Errors
    ///
    /// URLとして解釈できないものがあればエラーを返す。
    pub fn page_targets(&self) -> Result<Vec<PageTarget>> {
        self.pages
            .iter()
            .cloned()
            .chain(self.ranges.iter().flat_map(|r| r.urls()))
            .map(|url| PageTarget::parse(&url))
            .collect()
    }
}

impl DownloadConfig {
    /// 同時実行数（0 は 1 として扱う）
    pub fn concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

impl Config {
    /// 設定ファイルから読み込み
    ///
    /// TOML形式の設定ファイルをパースしてConfig構造体を生成する。
    ///
    /// # Errors
    ///
    /// ファイルの読み込みまたはパースに失敗した場合にエラーを返す。
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use vocab_harvest::config::Config;
    /// let config = Config::from_file("config.toml").unwrap();
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("設定ファイルの読み込みに失敗: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "設定ファイルのパースに失敗")?;
        Ok(config)
    }

    /// デフォルト設定をファイルに書き出し
    ///
    /// 既存のファイルは上書きされる。
    ///
    /// # Errors
    ///
    /// ファイルの書き込みに失敗した場合にエラーを返す。
    pub fn write_default<P: AsRef<Path>>(path: P) -> Result<()> {
        let config = Config::default();
        let content =
            toml::to_string_pretty(&config).with_context(|| "設定のシリアライズに失敗")?;
        fs::write(path.as_ref(), content)
            .with_context(|| format!("設定ファイルの書き込みに失敗: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// 設定ファイルがあれば読み込み、なければデフォルトを使用
    ///
    /// # Errors
    ///
    /// ファイルが存在するがパースに失敗した場合にエラーを返す。
    /// ファイルが存在しない場合はエラーにならず、デフォルト設定を返す。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            log::warn!(
                "設定ファイルが見つかりません。デフォルト設定を使用します: {:?}",
                path.as_ref()
            );
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.http.user_agent, "Mozilla/5.0");
        assert_eq!(config.http.timeout_seconds, None);
        assert_eq!(config.download.audio_root, PathBuf::from("audios"));
        assert_eq!(config.download.ledger_path, PathBuf::from("vocabulary.csv"));
        assert_eq!(config.download.chunk_size, 8192);
        assert!(config.rename.recursive);
        assert_eq!(config.anki.version, 6);
        assert_eq!(config.source.ranges.len(), 3);
    }

    #[test]
    fn test_default_page_targets() {
        let targets = Config::default().source.page_targets().unwrap();
        // 26..=33, 34..=41, 42..=50
        assert_eq!(targets.len(), 25);
        assert_eq!(targets[0].lesson, "26");
        assert_eq!(targets[24].lesson, "50");
        assert!(targets[8].url.as_str().ends_with("/unit-2-lessons-34-41/lesson-34/"));
    }

    #[test]
    fn test_explicit_pages_come_first() {
        let source = SourceConfig {
            pages: vec!["https://example.com/unit1/lesson-17/".to_string()],
            ranges: vec![PageRange {
                template: "https://example.com/lesson-{n}/".to_string(),
                start: 1,
                end: 2,
            }],
        };
        let lessons: Vec<String> = source
            .page_targets()
            .unwrap()
            .into_iter()
            .map(|t| t.lesson)
            .collect();
        assert_eq!(lessons, vec!["17", "1", "2"]);
    }

    #[test]
    fn test_invalid_page_url() {
        let source = SourceConfig {
            pages: vec!["::nope::".to_string()],
            ranges: vec![],
        };
        assert!(source.page_targets().is_err());
    }

    #[test]
    fn test_write_and_read_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path();

        Config::write_default(path).unwrap();

        let config = Config::from_file(path).unwrap();
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.source.ranges, default_ranges());
        assert_eq!(config.transcribe.language.as_deref(), Some("ko"));
    }

    #[test]
    fn test_partial_config() {
        // 一部の設定のみ記述した場合、残りはデフォルト値が使われる
        let toml_content = r#"
[source]
pages = ["https://example.com/lesson-1/"]
ranges = []

[download]
audio_root = "/tmp/audio"
concurrency = 0

[anki]
word_field = "Front"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();

        // 指定した値
        assert_eq!(config.download.audio_root, PathBuf::from("/tmp/audio"));
        assert_eq!(config.source.page_targets().unwrap().len(), 1);
        assert_eq!(config.anki.word_field, "Front");
        assert_eq!(config.download.concurrency(), 1);

        // デフォルト値
        assert_eq!(config.download.ledger_path, PathBuf::from("vocabulary.csv"));
        assert_eq!(config.http.user_agent, "Mozilla/5.0");
        assert_eq!(config.anki.sound_field, "Sound");
    }

    #[test]
    fn test_load_or_default_nonexistent() {
        let config = Config::load_or_default("nonexistent_file.toml").unwrap();
        assert_eq!(config.download.chunk_size, 8192);
    }
}
