//! Pure path-shape matchers
//!
//! Each matcher inspects a path string and returns a structured match or
//! `None`. No lookups happen here; `resolver` combines these with the
//! directories.

/// Second segment of item-identifier paths (`node/<id>`)
pub const ITEM_SEGMENT: &str = "node";

/// Language code meaning "undetermined"
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// `node/<id>` or `<lang>/node/<id>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemPathMatch {
    pub item_id: i64,
    /// Two-letter segment in front of the item path, if any
    pub language_segment: Option<String>,
}

/// `<lang>/<rest>` where `<lang>` is two non-numeric characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePrefixedMatch {
    pub language: String,
    pub rest: String,
}

pub fn item_path(item_id: i64) -> String {
    format!("{}/{}", ITEM_SEGMENT, item_id)
}

/// Remove a single leading slash
pub fn strip_leading_slash(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// Empty, bare slash, or a bare language code all mean the front page
pub fn is_front_page_alias(path: &str, languages: &[String]) -> bool {
    path.is_empty() || path == "/" || languages.iter().any(|l| l == path)
}

pub fn match_item_path(path: &str) -> Option<ItemPathMatch> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();

    match segments.as_slice() {
        [lang, item, id] if is_two_letter(lang) && *item == ITEM_SEGMENT => {
            parse_id(id).map(|item_id| ItemPathMatch {
                item_id,
                language_segment: Some(lang.to_string()),
            })
        }
        [item, id] if *item == ITEM_SEGMENT => parse_id(id).map(|item_id| ItemPathMatch {
            item_id,
            language_segment: None,
        }),
        _ => None,
    }
}

pub fn match_language_prefixed(path: &str) -> Option<LanguagePrefixedMatch> {
    let trimmed = path.trim_matches('/');
    let (first, rest) = trimmed.split_once('/')?;

    if !is_two_letter(first) || is_numeric(first) || rest.is_empty() {
        return None;
    }

    Some(LanguagePrefixedMatch {
        language: first.to_string(),
        rest: rest.to_string(),
    })
}

/// A language code worth recording as a prefix
pub fn is_meaningful_language(code: &str) -> bool {
    !code.is_empty() && code != UNDETERMINED_LANGUAGE
}

fn is_two_letter(segment: &str) -> bool {
    segment.chars().count() == 2
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit())
}

fn parse_id(segment: &str) -> Option<i64> {
    if is_numeric(segment) {
        segment.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_leading_slash_once() {
        assert_eq!(strip_leading_slash("/node/5"), "node/5");
        assert_eq!(strip_leading_slash("//node/5"), "/node/5");
        assert_eq!(strip_leading_slash("node/5"), "node/5");
        assert_eq!(strip_leading_slash("/"), "");
    }

    #[test]
    fn test_front_page_aliases() {
        let langs = vec!["en".to_string(), "nl".to_string()];
        assert!(is_front_page_alias("", &langs));
        assert!(is_front_page_alias("/", &langs));
        assert!(is_front_page_alias("nl", &langs));
        assert!(!is_front_page_alias("fr", &langs));
        assert!(!is_front_page_alias("node", &langs));
    }

    #[test]
    fn test_item_paths() {
        assert_eq!(
            match_item_path("node/5"),
            Some(ItemPathMatch { item_id: 5, language_segment: None })
        );
        assert_eq!(
            match_item_path("en/node/55/"),
            Some(ItemPathMatch { item_id: 55, language_segment: Some("en".to_string()) })
        );
        assert_eq!(match_item_path("node/5/edit"), None);
        assert_eq!(match_item_path("node/abc"), None);
        assert_eq!(match_item_path("eng/node/5"), None);
        assert_eq!(match_item_path("en/page/5"), None);
    }

    #[test]
    fn test_language_prefixed() {
        assert_eq!(
            match_language_prefixed("nl/my/view"),
            Some(LanguagePrefixedMatch {
                language: "nl".to_string(),
                rest: "my/view".to_string()
            })
        );
        assert_eq!(match_language_prefixed("12/archive"), None);
        assert_eq!(match_language_prefixed("about/team"), None);
        assert_eq!(match_language_prefixed("en"), None);
        assert_eq!(match_language_prefixed("en/"), None);
    }

    #[test]
    fn test_meaningful_language() {
        assert!(is_meaningful_language("en"));
        assert!(!is_meaningful_language(""));
        assert!(!is_meaningful_language("und"));
    }
}
