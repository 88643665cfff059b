use crate::config::Config;
use crate::dedup::dedup_links;
use crate::downloader::{plan_tasks, DownloadManager};
use crate::error::HarvestError;
use crate::extractor::LinkExtractor;
use crate::fetcher::{build_client, PageFetcher};
use crate::ledger::LedgerWriter;
use crate::types::{AudioLinkRecord, PageTarget, RunSummary};
use anyhow::{Context, Result};
use futures_util::stream::{self, StreamExt};

/// 1ページを取得して音声リンクを抽出
async fn links_from_page(
    fetcher: &PageFetcher,
    extractor: &LinkExtractor,
    page: &PageTarget,
) -> Result<Vec<AudioLinkRecord>, HarvestError> {
    log::info!("URLを解析中: {}", page.url);
    let html = fetcher.fetch(page).await?;
    let links = extractor.extract(&html, page);
    log::info!(
        "{} 件の音声ファイルを発見: {} (レッスン {})",
        links.len(),
        page.url,
        page.lesson
    );
    Ok(links)
}

/// すべてのページからリンクを集める
///
/// ページは並行に処理するが、結果は投入順に並ぶ。
/// 取得に失敗したページは空として扱い、失敗数を返す。
pub async fn collect_links(
    fetcher: &PageFetcher,
    extractor: &LinkExtractor,
    pages: &[PageTarget],
    concurrency: usize,
) -> (Vec<Vec<AudioLinkRecord>>, usize) {
    let results: Vec<_> = stream::iter(pages)
        .map(|page| links_from_page(fetcher, extractor, page))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut failures = 0;
    let per_page: Vec<Vec<AudioLinkRecord>> = results
        .into_iter()
        .map(|result| match result {
            Ok(links) => links,
            Err(e) => {
                log::error!("{}", e);
                failures += 1;
                Vec::new()
            }
        })
        .collect();

    (per_page, failures)
}

/// 取得・抽出・重複排除・ダウンロード・台帳追記を一通り実行
///
/// 項目単位の失敗は集計に反映するだけで中断しない。
///
/// # Errors
///
/// 設定が不正な場合、オーディオルートを作成できない場合、
/// 台帳に書き込めない場合にエラーを返す。
pub async fn run(config: &Config) -> Result<RunSummary> {
    let pages = config.source.page_targets()?;
    let client = build_client(&config.http)?;
    let audio_root = &config.download.audio_root;

    std::fs::create_dir_all(audio_root)
        .with_context(|| format!("オーディオルートの作成に失敗: {:?}", audio_root))?;

    let fetcher = PageFetcher::new(client.clone());
    let extractor = LinkExtractor::new()?;

    let mut summary = RunSummary {
        pages_total: pages.len(),
        ..RunSummary::default()
    };

    let (per_page, failures) =
        collect_links(&fetcher, &extractor, &pages, config.download.concurrency()).await;
    summary.pages_failed = failures;
    summary.links_found = per_page.iter().map(Vec::len).sum();

    let unique = dedup_links(per_page);
    summary.unique_links = unique.len();
    log::info!(
        "合計: {} 件中 {} 件のユニークな音声ファイルをダウンロードします",
        summary.links_found,
        summary.unique_links
    );

    if unique.is_empty() {
        log::info!("音声ファイルが見つかりませんでした");
        return Ok(summary);
    }

    let tasks = plan_tasks(&unique, audio_root);
    let manager = DownloadManager::new(client, &config.download);
    let outcomes = manager.download_all(tasks).await;
    summary.downloads_attempted = outcomes.len();
    summary.downloads_succeeded = outcomes.iter().filter(|o| o.success).count();

    let ledger = LedgerWriter::new(&config.download.ledger_path);
    summary.ledger_rows = ledger.append(&outcomes)?;

    log::info!(
        "ダウンロード完了: {}/{} ファイル成功",
        summary.downloads_succeeded,
        summary.downloads_attempted
    );
    log::info!(
        "{} 行を {:?} に追記しました",
        summary.ledger_rows,
        ledger.path()
    );

    Ok(summary)
}
