use crate::types::{has_audio_extension, AudioLinkRecord, PageTarget};
use anyhow::Result;
use scraper::{Html, Selector};

/// HTMLから音声リンクを抽出する
///
/// 対象は `href` が `.mp3` で終わる（大文字小文字を区別しない）アンカー。
/// 表示テキストをトリムしたものを単語とし、空になるアンカー（アイコン等）は除外する。
pub struct LinkExtractor {
    anchor: Selector,
}

impl LinkExtractor {
    pub fn new() -> Result<Self> {
        let anchor = Selector::parse("a[href]")
            .map_err(|e| anyhow::anyhow!("セレクタのパースに失敗: {:?}", e))?;
        Ok(Self { anchor })
    }

    /// ページ内の音声リンクを出現順に返す
    ///
    /// 相対URLはページURLを基準に絶対URLへ解決する。
    pub fn extract(&self, html: &str, page: &PageTarget) -> Vec<AudioLinkRecord> {
        let doc = Html::parse_document(html);
        let mut links = Vec::new();

        for a in doc.select(&self.anchor) {
            let href = match a.value().attr("href") {
                Some(h) => h.trim(),
                None => continue,
            };
            if !has_audio_extension(href) {
                continue;
            }

            let text: String = a.text().collect();
            let word = text.trim();
            if word.is_empty() {
                continue;
            }

            match page.url.join(href) {
                Ok(url) => links.push(AudioLinkRecord {
                    url,
                    lesson: page.lesson.clone(),
                    word: word.to_string(),
                }),
                Err(e) => {
                    log::debug!("リンクを解決できません: {} ({}): {}", href, page.url, e);
                }
            }
        }

        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<html><body>
  <p>Vocabulary</p>
  <a href="/wp-content/uploads/Lesson37v1.mp3">안녕</a>
  <a href="https://cdn.example.com/audio/Lesson37v2.MP3">  감사합니다 </a>
  <a href="Lesson37v3.mp3"><img src="speaker.png"></a>
  <a href="Lesson37v4.mp3">   </a>
  <a href="/lesson-38/">next lesson</a>
  <a href="notes.pdf">notes</a>
  <a>no href</a>
  <a href="sub/Lesson37v5.mp3"><b>학교</b></a>
</body></html>
"#;

    fn page() -> PageTarget {
        PageTarget::parse("https://example.com/unit-2/lesson-37/").unwrap()
    }

    #[test]
    fn test_extracts_audio_links_in_order() {
        let extractor = LinkExtractor::new().unwrap();
        let links = extractor.extract(PAGE, &page());

        let got: Vec<(&str, &str)> = links
            .iter()
            .map(|l| (l.url.as_str(), l.word.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("https://example.com/wp-content/uploads/Lesson37v1.mp3", "안녕"),
                ("https://cdn.example.com/audio/Lesson37v2.MP3", "감사합니다"),
                ("https://example.com/unit-2/lesson-37/sub/Lesson37v5.mp3", "학교"),
            ]
        );
        assert!(links.iter().all(|l| l.lesson == "37"));
    }

    #[test]
    fn test_excludes_anchors_without_text() {
        let extractor = LinkExtractor::new().unwrap();
        let html = r#"<a href="a.mp3"> </a><a href="b.mp3"><span></span></a>"#;
        assert!(extractor.extract(html, &page()).is_empty());
    }

    #[test]
    fn test_unknown_lesson() {
        let extractor = LinkExtractor::new().unwrap();
        let page = PageTarget::parse("https://example.com/vocab/").unwrap();
        let links = extractor.extract(r#"<a href="x.mp3">물</a>"#, &page);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].lesson, "unknown");
    }
}
