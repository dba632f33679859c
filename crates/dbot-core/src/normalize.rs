use std::sync::OnceLock;

use regex::Regex;

// Order matters: token removal leaves extra whitespace behind, which the
// collapse step then cleans up.
const LINK_PATTERN: &str = r"http\S+";
const MENTION_PATTERN: &str = r"@\w+";
const WHITESPACE_PATTERN: &str = r"\s+";
const DISALLOWED_PATTERN: &str = r"[^A-Za-z0-9\s.,:;?!\-']";

struct Patterns {
    link: Regex,
    mention: Regex,
    whitespace: Regex,
    disallowed: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        link: Regex::new(LINK_PATTERN).expect("valid regex"),
        mention: Regex::new(MENTION_PATTERN).expect("valid regex"),
        whitespace: Regex::new(WHITESPACE_PATTERN).expect("valid regex"),
        disallowed: Regex::new(DISALLOWED_PATTERN).expect("valid regex"),
    })
}

/// Clean raw user text before it is handed to the classifier.
///
/// Strips links and `@mentions`, drops `#` markers (keeping the tagged word),
/// collapses whitespace, removes anything outside plain ASCII letters/digits and
/// basic punctuation, then trims.
///
/// Filtering can leave double spaces behind (`"a € b"` becomes `"a  b"`) or
/// splice a new link together (`"ht€tpfoo"` becomes `"httpfoo"`), so the steps
/// are repeated until the text stops changing. The result is idempotent.
pub fn normalize(raw: &str) -> String {
    let mut text = normalize_once(raw);
    loop {
        // Every pass after the first either leaves the text alone or shortens it.
        let next = normalize_once(&text);
        if next == text {
            return text;
        }
        text = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let p = patterns();

    let text = p.link.replace_all(raw, "");
    let text = p.mention.replace_all(&text, "");
    let text = text.replace('#', "");
    let text = p.whitespace.replace_all(&text, " ");
    let text = p.disallowed.replace_all(&text, "");
    let text = p.whitespace.replace_all(&text, " ");

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_links_and_collapses_whitespace() {
        assert_eq!(normalize("check http://x.co now"), "check now");
        assert_eq!(normalize("https://t.co/abc"), "");
    }

    #[test]
    fn removes_mentions_and_hash_markers() {
        assert_eq!(
            normalize("@bob said #breaking news!!"),
            "said breaking news!!"
        );
    }

    #[test]
    fn drops_non_ascii_noise_but_keeps_punctuation() {
        assert_eq!(
            normalize("Forest fire near La Ronge – Sask. Canada 🔥"),
            "Forest fire near La Ronge Sask. Canada"
        );
        assert_eq!(normalize("it's: ok; right? yes! a-b, c."), "it's: ok; right? yes! a-b, c.");
    }

    #[test]
    fn collapses_tabs_and_newlines() {
        assert_eq!(normalize("  flood\n\n\twarning  "), "flood warning");
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            "",
            "   ",
            "check http://x.co now",
            "@bob said #breaking news!!",
            "a € b",
            "Évacuation   #now @mayor http://a.b/c?d=e ...",
            "日本語のテキスト",
            "#### @@@ ",
            "earthquake\u{00a0}magnitude 7",
            "ht€tpfoo bar",
            "h#ttps://x.co flood",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input: {s:?}");
        }
    }

    #[test]
    fn links_spliced_by_filtering_are_removed() {
        assert_eq!(normalize("ht€tpfoo bar"), "bar");
        assert_eq!(normalize("h#ttps://x.co flood"), "flood");
        assert_eq!(normalize("alert ht\u{00e9}tp://t.co/x"), "alert");
    }
}
