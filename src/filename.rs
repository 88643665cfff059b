use regex_lite::Regex;
use std::sync::LazyLock;

static SINGLE_DIGIT_VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(Lesson\d+v)(\d)(\.mp3)$").expect("ファイル名パターンが不正")
});

/// ファイル名を正規化
///
/// `Lesson<数字>v<1桁>.mp3` のバージョン番号を2桁にゼロ埋めする。
/// それ以外の名前（既に2桁、別の命名規則など）はそのまま返す。
/// 2回適用しても結果は変わらない。
///
/// # Examples
///
/// ```
/// # use vocab_harvest::filename::normalize_filename;
/// assert_eq!(normalize_filename("Lesson26v1.mp3"), "Lesson26v01.mp3");
/// assert_eq!(normalize_filename("Lesson26v10.mp3"), "Lesson26v10.mp3");
/// assert_eq!(normalize_filename("intro.mp3"), "intro.mp3");
/// ```
pub fn normalize_filename(name: &str) -> String {
    match SINGLE_DIGIT_VERSION_RE.captures(name) {
        Some(caps) => format!("{}0{}{}", &caps[1], &caps[2], &caps[3]),
        None => name.to_string(),
    }
}
