use crate::config::HttpConfig;
use crate::error::HarvestError;
use crate::types::PageTarget;
use anyhow::{Context, Result};
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

/// 共通ヘッダ付きのHTTPクライアントを作成
///
/// ブラウザ相当の User-Agent を付ける（既定のクライアントを拒否するサイトがある）。
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_str(&config.user_agent)
            .with_context(|| format!("不正な User-Agent: {}", config.user_agent))?,
    );

    let mut builder = reqwest::Client::builder().default_headers(headers);
    if let Some(secs) = config.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(secs));
    }

    builder.build().context("HTTPクライアント作成失敗")
}

/// ページ本文の取得
pub struct PageFetcher {
    client: reqwest::Client,
}

impl PageFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// ページを取得して本文を返す
    ///
    /// # Errors
    ///
    /// 2xx 以外のステータス、通信エラー、本文のデコード失敗はすべて
    /// `PageUnavailable` になる。
    pub async fn fetch(&self, page: &PageTarget) -> Result<String, HarvestError> {
        let unavailable = |reason: String| HarvestError::PageUnavailable {
            url: page.url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(page.url.clone())
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unavailable(format!("HTTP {}", status)));
        }

        response.text().await.map_err(|e| unavailable(e.to_string()))
    }
}
