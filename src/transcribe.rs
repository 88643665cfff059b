use crate::config::TranscribeConfig;
use crate::ledger::LEDGER_HEADER;
use crate::types::has_audio_extension;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use reqwest::multipart;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 文字起こしの共通トレイト
///
/// 入力の音声ファイル一覧と同じ順序・同じ件数のテキストを返す。
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, files: &[PathBuf]) -> Result<Vec<String>>;
}

/// オーディオルート以下の音声ファイルを再帰的に列挙（パス順）
pub fn discover_audio_files(audio_root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(audio_root) {
        let entry = entry.with_context(|| format!("走査エラー: {:?}", audio_root))?;
        if entry.file_type().is_file() && has_audio_extension(&entry.file_name().to_string_lossy())
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// 文字起こし結果をCSVに書き出し（既存ファイルは上書き）
///
/// 空のテキストは書かない。書き込んだ行数を返す。
pub fn write_transcriptions(path: &Path, files: &[PathBuf], texts: &[String]) -> Result<usize> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("文字起こしCSVを開けません: {:?}", path))?;
    writer.write_record(LEDGER_HEADER)?;

    let mut rows = 0;
    for (file, text) in files.iter().zip(texts) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        writer.write_record([&*file.to_string_lossy(), text])?;
        rows += 1;
    }
    writer
        .flush()
        .with_context(|| format!("文字起こしCSVの書き込みに失敗: {:?}", path))?;

    Ok(rows)
}

/// OpenAI Whisper API レスポンス
#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// OpenAI互換 Whisper API による文字起こし
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    model: String,
    language: Option<String>,
    concurrency: usize,
}

impl WhisperTranscriber {
    /// API Key は設定ファイル、なければ環境変数 `OPENAI_API_KEY` から取る
    pub fn new(config: &TranscribeConfig, concurrency: usize) -> Result<Self> {
        let api_key = match &config.api_key {
            Some(key) => key.clone(),
            None => std::env::var("OPENAI_API_KEY")
                .context("Whisper API Key がありません（transcribe.api_key または OPENAI_API_KEY）")?,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .context("Whisper API HTTPクライアント作成失敗")?;

        Ok(Self {
            client,
            api_key,
            endpoint: format!(
                "{}/v1/audio/transcriptions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            language: config.language.clone(),
            concurrency: concurrency.max(1),
        })
    }

    /// 1ファイルを文字起こし
    async fn transcribe_file(&self, file: &Path) -> Result<String> {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("音声ファイルの読み込みに失敗: {:?}", file))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone());

        if let Some(ref language) = self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .context("Whisper API リクエスト失敗")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Whisper API エラー: {} - {}", status, error_text);
        }

        let whisper_response: WhisperResponse = response
            .json::<WhisperResponse>()
            .await
            .context("Whisper API レスポンスパース失敗")?;

        Ok(whisper_response.text)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, files: &[PathBuf]) -> Result<Vec<String>> {
        let texts: Vec<String> = stream::iter(files.iter().cloned())
            .map(|file| async move {
                match self.transcribe_file(&file).await {
                    Ok(text) => {
                        log::debug!("文字起こし結果: {:?} - {}", file, text);
                        text
                    }
                    Err(e) => {
                        log::error!("{:?} の文字起こしに失敗: {:#}", file, e);
                        String::new()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;
        Ok(texts)
    }
}

/// 音声ファイルを列挙して文字起こしし、CSVに保存する
///
/// # Returns
///
/// 書き込んだ行数
pub async fn run_transcription(
    transcriber: &dyn Transcriber,
    audio_root: &Path,
    output_path: &Path,
) -> Result<usize> {
    let files = discover_audio_files(audio_root)?;
    log::info!("{} 件の音声ファイルを文字起こしします", files.len());

    let texts = transcriber.transcribe(&files).await?;
    if texts.len() != files.len() {
        anyhow::bail!(
            "文字起こし結果の件数が一致しません: {} ファイルに対して {} 件",
            files.len(),
            texts.len()
        );
    }

    let rows = write_transcriptions(output_path, &files, &texts)?;
    log::info!("文字起こし結果を {:?} に保存しました ({} 行)", output_path, rows);
    Ok(rows)
}
