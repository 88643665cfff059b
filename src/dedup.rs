use crate::types::AudioLinkRecord;
use std::collections::HashSet;

/// ページ毎のリンクを連結し、URLの重複を取り除く
///
/// ページの投入順、ページ内の抽出順に走査し、最初に現れたものだけを残す。
/// 後から現れた重複は単語やレッスン番号が異なっていても捨てる。
pub fn dedup_links<I>(per_page: I) -> Vec<AudioLinkRecord>
where
    I: IntoIterator<Item = Vec<AudioLinkRecord>>,
{
    let mut seen = HashSet::new();
    per_page
        .into_iter()
        .flatten()
        .filter(|link| seen.insert(link.url.clone()))
        .collect()
}
