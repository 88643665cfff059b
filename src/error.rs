use std::path::PathBuf;
use thiserror::Error;

/// 項目単位のエラー
///
/// いずれもバッチ全体を中断させない。呼び出し側で捕捉してログと集計に変換する。
#[derive(Debug, Error)]
pub enum HarvestError {
    /// ページの取得またはパースに失敗（そのページのリンクは0件として扱う）
    #[error("ページを取得できません: {url}: {reason}")]
    PageUnavailable { url: String, reason: String },

    /// 1ファイルの転送に失敗（台帳には書き込まない）
    #[error("ダウンロード失敗: {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    /// リネーム先が既に存在する
    #[error("リネーム先が既に存在します: {0:?}")]
    FilesystemConflict(PathBuf),

    /// AnkiConnect が不正な応答またはエラーを返した
    #[error("AnkiConnect エラー: {0}")]
    RemoteProtocolError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_item() {
        let err = HarvestError::PageUnavailable {
            url: "https://example.com/lesson-1/".to_string(),
            reason: "404 Not Found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/lesson-1/"));
        assert!(msg.contains("404"));

        let err = HarvestError::FilesystemConflict(PathBuf::from("audios/Lesson1v01.mp3"));
        assert!(err.to_string().contains("Lesson1v01.mp3"));
    }
}
