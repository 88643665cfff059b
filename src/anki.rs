use crate::config::AnkiConfig;
use crate::error::HarvestError;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

/// ノートのフィールド値
#[derive(Debug, Clone, Deserialize)]
pub struct NoteField {
    pub value: String,
}

/// `notesInfo` の1件分
#[derive(Debug, Clone, Deserialize)]
pub struct NoteInfo {
    #[serde(rename = "noteId")]
    pub note_id: i64,
    #[serde(default)]
    pub fields: HashMap<String, NoteField>,
}

/// `updateNoteFields` に渡す更新内容
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoteUpdate {
    pub id: i64,
    pub fields: HashMap<String, String>,
}

/// AnkiConnect クライアント
///
/// 応答は `error` と `result` の2フィールドのみを持つJSONオブジェクトでなければならない。
pub struct AnkiClient {
    client: reqwest::Client,
    endpoint: String,
    version: u32,
}

impl AnkiClient {
    pub fn new(config: &AnkiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
            version: config.version,
        }
    }

    /// アクションを呼び出して `result` を返す
    ///
    /// # Errors
    ///
    /// 通信エラー、応答形式の不一致、`error` が null でない場合に
    /// `RemoteProtocolError` を返す。
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        action: &str,
        params: Value,
    ) -> Result<T, HarvestError> {
        let request = json!({
            "action": action,
            "version": self.version,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| HarvestError::RemoteProtocolError(format!("{}: {}", action, e)))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| HarvestError::RemoteProtocolError(format!("{}: {}", action, e)))?;

        let result = unwrap_envelope(body)
            .map_err(|reason| HarvestError::RemoteProtocolError(format!("{}: {}", action, reason)))?;

        serde_json::from_value(result)
            .map_err(|e| HarvestError::RemoteProtocolError(format!("{}: {}", action, e)))
    }

    /// 検索クエリに一致するノートIDを返す
    pub async fn find_notes(&self, query: &str) -> Result<Vec<i64>, HarvestError> {
        self.invoke("findNotes", json!({ "query": query })).await
    }

    /// ノートの詳細を返す
    pub async fn notes_info(&self, ids: &[i64]) -> Result<Vec<NoteInfo>, HarvestError> {
        self.invoke("notesInfo", json!({ "notes": ids })).await
    }

    /// ノートのフィールドを更新
    pub async fn update_note_fields(&self, update: &NoteUpdate) -> Result<(), HarvestError> {
        let _: Value = self
            .invoke("updateNoteFields", json!({ "note": update }))
            .await?;
        Ok(())
    }
}

/// `{"error": ..., "result": ...}` から `result` を取り出す
fn unwrap_envelope(body: Value) -> Result<Value, String> {
    let Value::Object(mut map) = body else {
        return Err("応答がJSONオブジェクトではありません".to_string());
    };
    if map.len() != 2 {
        return Err("応答のフィールド数が想定外です".to_string());
    }
    let error = map
        .remove("error")
        .ok_or_else(|| "応答に error フィールドがありません".to_string())?;
    let result = map
        .remove("result")
        .ok_or_else(|| "応答に result フィールドがありません".to_string())?;

    match error {
        Value::Null => Ok(result),
        Value::String(message) => Err(message),
        other => Err(other.to_string()),
    }
}

/// 照合用にテキストを正規化（小文字化し、両端の空白と ` .?!` を除く）
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .trim_matches(|c: char| matches!(c, ' ' | '.' | '?' | '!'))
        .to_string()
}

/// 文字起こしCSVを読み込み、正規化テキスト → 音声ファイル名 の対応を作る
///
/// 同じテキストが複数ある場合は後の行を優先する。
pub fn load_transcriptions(path: &Path) -> Result<HashMap<String, String>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("文字起こしCSVを開けません: {:?}", path))?;

    let mut map = HashMap::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("文字起こしCSVの読み込みに失敗: {:?}", path))?;
        let (Some(filepath), Some(text)) = (record.get(0), record.get(1)) else {
            log::warn!("不正な行を飛ばします: {:?}", record);
            continue;
        };
        let file_name = Path::new(filepath)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| filepath.to_string());
        map.insert(normalize_text(text), file_name);
    }
    Ok(map)
}

/// 更新が必要なノートを求める
///
/// 単語フィールドが文字起こしと一致し、音声フィールドが `[sound:<ファイル名>]` と
/// 異なるノートだけを返す。単語フィールドのないノートは飛ばす。
pub fn plan_updates(
    notes: &[NoteInfo],
    text_to_audio: &HashMap<String, String>,
    word_field: &str,
    sound_field: &str,
) -> Vec<NoteUpdate> {
    let mut updates = Vec::new();

    for note in notes {
        let Some(word) = note.fields.get(word_field) else {
            log::warn!(
                "ノート {} には '{}' フィールドがないため飛ばします",
                note.note_id,
                word_field
            );
            continue;
        };

        let Some(sound_file) = text_to_audio.get(&normalize_text(&word.value)) else {
            continue;
        };

        let new_tag = format!("[sound:{}]", sound_file);
        let current = note
            .fields
            .get(sound_field)
            .map(|f| f.value.as_str())
            .unwrap_or_default();

        if current != new_tag {
            updates.push(NoteUpdate {
                id: note.note_id,
                fields: HashMap::from([(sound_field.to_string(), new_tag)]),
            });
        }
    }

    updates
}

/// 文字起こし結果に基づいてノートの音声フィールドを更新
///
/// # Returns
///
/// 更新したノート数
///
/// # Errors
///
/// AnkiConnect がエラーを返した時点で中断する。
pub async fn sync_sound_fields(
    anki: &AnkiClient,
    config: &AnkiConfig,
    transcriptions: &Path,
) -> Result<usize> {
    let text_to_audio = load_transcriptions(transcriptions)?;

    let note_ids = anki.find_notes(&config.query).await?;
    let notes = anki.notes_info(&note_ids).await?;
    log::info!("{} 件のノートを確認します", notes.len());

    let updates = plan_updates(&notes, &text_to_audio, &config.word_field, &config.sound_field);
    if updates.is_empty() {
        log::info!("更新が必要なノートはありません");
        return Ok(0);
    }

    log::info!("{} 件のノートを更新します", updates.len());
    for update in &updates {
        anki.update_note_fields(update).await?;
    }
    log::info!("ノートの更新が完了しました");

    Ok(updates.len())
}
