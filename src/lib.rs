//! vocab-harvest - レッスンページの語彙音声を収集するツール
//!
//! レッスンページから音声ファイルへのリンクを抽出し、重複を除いて並行に
//! ダウンロードし、保存したファイルと単語の対応をCSV台帳に追記する。
//!
//! # 主な機能
//!
//! - **リンク抽出**: `.mp3` へのアンカーとその表示テキスト（単語）を取得
//! - **重複排除**: URLが同じリンクは最初に現れたものだけを残す
//! - **並行ダウンロード**: 同時実行数を制限し、一時ファイル経由で保存
//! - **台帳**: `filepath,korean_word` 形式の追記専用CSV
//! - **リネーム**: 既存ファイルにファイル名の正規化を適用
//! - **文字起こし / Anki連携**: Whisper API と AnkiConnect へのアダプタ
//!
//! # アーキテクチャ
//!
//! ```text
//! [PageTarget] → [PageFetcher] → [LinkExtractor] → [dedup_links]
//!                                                       ↓
//!                                   [normalize_filename + DownloadManager]
//!                                                       ↓
//!                                                [LedgerWriter]
//! ```
//!
//! # 使用例
//!
//! ```no_run
//! use vocab_harvest::config::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_or_default("config.toml")?;
//! let summary = vocab_harvest::pipeline::run(&config).await?;
//! println!("{}/{}", summary.downloads_succeeded, summary.downloads_attempted);
//! # Ok(())
//! # }
//! ```

pub mod anki;
pub mod config;
pub mod dedup;
pub mod downloader;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod filename;
pub mod ledger;
pub mod pipeline;
pub mod rename;
pub mod transcribe;
pub mod types;
