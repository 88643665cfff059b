use crate::config::DownloadConfig;
use crate::error::HarvestError;
use crate::filename::normalize_filename;
use crate::types::{AudioLinkRecord, DownloadOutcome, DownloadTask};
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

/// URLの最後のパス要素をファイル名として返す
fn remote_file_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// レッスン毎のディレクトリ
pub fn lesson_dir(audio_root: &Path, lesson: &str) -> PathBuf {
    audio_root.join(format!("lesson_{}", lesson))
}

/// 重複排除済みリンクからダウンロード作業を作成
///
/// 保存先は `<audio_root>/lesson_<番号>/<正規化済みファイル名>`。
/// 異なるURLが同じ保存先になる場合は警告し、後に完了した方が残る。
pub fn plan_tasks(links: &[AudioLinkRecord], audio_root: &Path) -> Vec<DownloadTask> {
    let mut targets = HashSet::new();
    links
        .iter()
        .enumerate()
        .map(|(i, link)| {
            let name = remote_file_name(&link.url).unwrap_or_else(|| format!("audio_{}.mp3", i));
            let target = lesson_dir(audio_root, &link.lesson).join(normalize_filename(&name));
            if !targets.insert(target.clone()) {
                log::warn!("保存先が重複しています: {:?} ({})", target, link.url);
            }
            DownloadTask {
                link: link.clone(),
                target,
            }
        })
        .collect()
}

/// 書き込み途中のファイルのパス
///
/// 保存先が同じ作業同士でも衝突しないよう、URLのハッシュを名前に含める。
fn part_path(task: &DownloadTask) -> PathBuf {
    let mut hasher = DefaultHasher::new();
    task.link.url.as_str().hash(&mut hasher);

    let mut name = task.target.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".{:016x}.part", hasher.finish()));
    task.target.with_file_name(name)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 同時実行数を制限したダウンロード
///
/// 各作業は独立しており、1件の失敗は他に影響しない。
/// 結果は作業と同じ順序で返る。
pub struct DownloadManager {
    client: reqwest::Client,
    concurrency: usize,
    chunk_size: usize,
}

impl DownloadManager {
    pub fn new(client: reqwest::Client, config: &DownloadConfig) -> Self {
        Self {
            client,
            concurrency: config.concurrency(),
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// すべての作業を実行し、作業毎の結果を返す
    pub async fn download_all(&self, tasks: Vec<DownloadTask>) -> Vec<DownloadOutcome> {
        stream::iter(tasks)
            .map(|task| async move {
                let success = match self.download(&task).await {
                    Ok(()) => {
                        log::info!("{} ダウンロード完了", display_name(&task.target));
                        true
                    }
                    Err(e) => {
                        log::error!("{}", e);
                        false
                    }
                };
                DownloadOutcome { task, success }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// 1件をダウンロード
    ///
    /// 一時ファイルに書き込み、完了後に保存先へリネームする。
    /// 失敗時は一時ファイルを削除し、既存の保存先には触れない。
    pub async fn download(&self, task: &DownloadTask) -> Result<(), HarvestError> {
        log::info!("ダウンロード中: {}", display_name(&task.target));

        let tmp = part_path(task);
        match self.transfer(&task.link.url, &task.target, &tmp).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Err(rm) = fs::remove_file(&tmp).await {
                    if rm.kind() != std::io::ErrorKind::NotFound {
                        log::warn!("一時ファイルの削除に失敗: {:?}: {}", tmp, rm);
                    }
                }
                Err(HarvestError::DownloadFailed {
                    url: task.link.url.to_string(),
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    async fn transfer(&self, url: &Url, target: &Path, tmp: &Path) -> Result<()> {
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("ディレクトリの作成に失敗: {:?}", dir))?;
        }

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .context("リクエスト失敗")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status);
        }

        let file = fs::File::create(tmp)
            .await
            .with_context(|| format!("一時ファイルの作成に失敗: {:?}", tmp))?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);

        while let Some(chunk) = response.chunk().await.context("受信失敗")? {
            writer
                .write_all(&chunk)
                .await
                .with_context(|| format!("書き込み失敗: {:?}", tmp))?;
        }
        writer
            .flush()
            .await
            .with_context(|| format!("書き込み失敗: {:?}", tmp))?;
        drop(writer);

        fs::rename(tmp, target)
            .await
            .with_context(|| format!("リネーム失敗: {:?} → {:?}", tmp, target))?;

        Ok(())
    }
}
