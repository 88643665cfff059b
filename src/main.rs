use anyhow::Result;
use env_logger::Env;
use vocab_harvest::anki::{sync_sound_fields, AnkiClient};
use vocab_harvest::config::Config;
use vocab_harvest::pipeline;
use vocab_harvest::rename::rename_existing_files;
use vocab_harvest::transcribe::{run_transcription, WhisperTranscriber};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 実行モード
enum Mode {
    Harvest,
    Rename,
    Transcribe,
    SyncAnki,
}

#[tokio::main]
async fn main() -> Result<()> {
    // ロガーを初期化
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    // コマンドライン引数をパース
    let args: Vec<String> = std::env::args().collect();

    // 設定ファイル生成モード
    if args.len() > 1 && args[1] == "--generate-config" {
        let config_path = if args.len() > 2 {
            &args[2]
        } else {
            DEFAULT_CONFIG_PATH
        };
        Config::write_default(config_path)?;
        println!("設定ファイルを生成しました: {}", config_path);
        return Ok(());
    }

    let (mode, rest) = match args.get(1).map(String::as_str) {
        Some("--rename") => (Mode::Rename, &args[2..]),
        Some("--transcribe") => (Mode::Transcribe, &args[2..]),
        Some("--sync-anki") => (Mode::SyncAnki, &args[2..]),
        Some(flag) if flag.starts_with("--") => {
            anyhow::bail!(
                "不明なオプション: {} (--rename, --transcribe, --sync-anki, --generate-config)",
                flag
            );
        }
        _ => (Mode::Harvest, args.get(1..).unwrap_or_default()),
    };

    // 設定ファイルのパス
    let config_path = rest.first().map(String::as_str).unwrap_or(DEFAULT_CONFIG_PATH);
    let config = Config::load_or_default(config_path)?;
    log::debug!("設定: {:?}", config);

    match mode {
        Mode::Harvest => {
            let summary = pipeline::run(&config).await?;
            log::info!(
                "完了: ページ {}/{} 件成功, リンク {} 件 (ユニーク {} 件), ダウンロード {}/{} 件成功, 台帳 {} 行追記",
                summary.pages_total - summary.pages_failed,
                summary.pages_total,
                summary.links_found,
                summary.unique_links,
                summary.downloads_succeeded,
                summary.downloads_attempted,
                summary.ledger_rows
            );
        }
        Mode::Rename => {
            let report = rename_existing_files(&config.download.audio_root, config.rename.recursive)?;
            if !report.conflicts.is_empty() || report.errors > 0 {
                log::warn!(
                    "衝突 {} 件, エラー {} 件",
                    report.conflicts.len(),
                    report.errors
                );
            }
        }
        Mode::Transcribe => {
            let transcriber =
                WhisperTranscriber::new(&config.transcribe, config.download.concurrency())?;
            run_transcription(
                &transcriber,
                &config.download.audio_root,
                &config.transcribe.output_path,
            )
            .await?;
        }
        Mode::SyncAnki => {
            let anki = AnkiClient::new(&config.anki);
            let updated =
                sync_sound_fields(&anki, &config.anki, &config.transcribe.output_path).await?;
            log::info!("{} 件のノートを更新しました", updated);
        }
    }

    Ok(())
}
