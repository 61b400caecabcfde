//! Small text helpers over `scraper` documents.

use scraper::{ElementRef, Html, Selector};

use super::ScrapeError;

/// Collapses runs of whitespace into single spaces.
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text under `el`, whitespace-collapsed.
pub fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text under `el` skipping subtrees rooted at any tag in `skip`.
/// Text nodes are joined with `separator`.
pub fn text_excluding(el: ElementRef<'_>, skip: &[&str], separator: &str) -> String {
    let mut chunks = Vec::new();
    collect_text(el, skip, &mut chunks);
    chunks.join(separator)
}

fn collect_text(el: ElementRef<'_>, skip: &[&str], out: &mut Vec<String>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let text = clean_text(text);
            if !text.is_empty() {
                out.push(text);
            }
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if !skip.contains(&child_el.value().name()) {
                collect_text(child_el, skip, out);
            }
        }
    }
}

pub fn selector(css: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Parse(format!("bad selector '{css}': {e}")))
}

/// Text of the first element matching any of `selectors` (tried in order)
/// whose text is longer than `min_len` characters.
pub fn first_text(doc: &Html, selectors: &[&str], min_len: usize) -> Option<String> {
    for css in selectors {
        let Ok(sel) = Selector::parse(css) else {
            continue;
        };
        for el in doc.select(&sel) {
            let text = element_text(el);
            if text.chars().count() > min_len {
                return Some(text);
            }
        }
    }
    None
}

/// Truncates on a character boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Senior \n\t Engineer  "), "Senior Engineer");
    }

    #[test]
    fn test_text_excluding_skips_nav_and_script() {
        let doc = Html::parse_document(
            "<html><body><nav>Menu</nav><main><p>Build APIs</p><script>var x;</script>\
             <p>in Rust</p></main></body></html>",
        );
        let body = doc.select(&selector("body").unwrap()).next().unwrap();
        assert_eq!(text_excluding(body, &["nav", "script"], " "), "Build APIs in Rust");
    }

    #[test]
    fn test_first_text_respects_min_len() {
        let doc = Html::parse_document(
            "<div class='a'>short</div><div class='b'>a considerably longer text</div>",
        );
        assert_eq!(
            first_text(&doc, &[".a", ".b"], 10).as_deref(),
            Some("a considerably longer text")
        );
        assert_eq!(first_text(&doc, &[".missing"], 0), None);
    }

    #[test]
    fn test_truncate_chars_multibyte() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
