//! Title → slug derivation.
//!
//! The title is lowercased and decomposed (NFD) so combining marks can be stripped
//! (`ą` → `a`). Everything still outside `[a-z0-9]`, whitespace and `-` is dropped,
//! including letters without a decomposition such as `ł`, `ß` or Cyrillic. Whitespace
//! and hyphen runs collapse into a single `-` and edge separators are trimmed, so the
//! output never starts, ends or doubles up on hyphens.

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Derive a URL-safe slug from a post title.
///
/// The function is total: titles made only of punctuation yield an empty slug.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase();

    let mut slug = String::with_capacity(lowered.len());
    let mut pending_separator = false;

    for ch in lowered.nfd().filter(|ch| !is_combining_mark(*ch)) {
        match ch {
            'a'..='z' | '0'..='9' => {
                if pending_separator && !slug.is_empty() {
                    slug.push('-');
                }
                pending_separator = false;
                slug.push(ch);
            }
            '-' => pending_separator = true,
            other if other.is_whitespace() => pending_separator = true,
            // Removed characters do not separate words: "don't" → "dont".
            _ => {}
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_strips_polish_diacritics() {
        assert_eq!(derive_slug("Związki i Relacje!"), "zwiazki-i-relacje");
    }

    #[test]
    fn derive_slug_drops_letters_without_ascii_base() {
        assert_eq!(derive_slug("Привет mir"), "mir");
        assert_eq!(derive_slug("Привет мир"), "");
        assert_eq!(derive_slug("łódź"), "odz");
        assert_eq!(derive_slug("Straße"), "strae");
        assert_eq!(derive_slug("Æther"), "ther");
        assert_eq!(derive_slug("北京 2024"), "2024");
    }

    #[test]
    fn derive_slug_collapses_whitespace_and_hyphens() {
        assert_eq!(derive_slug("  Hello \t  --  World  "), "hello-world");
        assert_eq!(derive_slug("a - b"), "a-b");
    }

    #[test]
    fn derive_slug_drops_punctuation_without_separating() {
        assert_eq!(derive_slug("Don't stop"), "dont-stop");
        assert_eq!(derive_slug("a ! b"), "a-b");
    }

    #[test]
    fn derive_slug_trims_edge_hyphens() {
        assert_eq!(derive_slug("-leading and trailing-"), "leading-and-trailing");
        assert_eq!(derive_slug("!!!"), "");
        assert_eq!(derive_slug(""), "");
    }

    #[test]
    fn derive_slug_drops_symbols_and_combining_marks() {
        assert_eq!(derive_slug("Cafe\u{301} 😀 au lait"), "cafe-au-lait");
    }

    #[test]
    fn derive_slug_is_idempotent() {
        let samples = [
            "Związki i Relacje!",
            "  --Mixed   CASE_and_underscores-- ",
            "Ünïcödé — dashes – everywhere",
            "1 2 3 go",
            "żółć gęślą jaźń",
            "",
        ];

        for sample in samples {
            let once = derive_slug(sample);
            assert_eq!(derive_slug(&once), once, "sample `{sample}`");
        }
    }

    #[test]
    fn derive_slug_never_emits_bad_hyphens() {
        let samples = [
            "- a -- b --",
            "???x???",
            "łódź   —   kraków",
            "trailing space ",
            "\u{a0}nbsp\u{a0}separated\u{a0}",
        ];

        for sample in samples {
            let slug = derive_slug(sample);
            assert!(!slug.starts_with('-'), "`{slug}` starts with a hyphen");
            assert!(!slug.ends_with('-'), "`{slug}` ends with a hyphen");
            assert!(!slug.contains("--"), "`{slug}` has consecutive hyphens");
            assert!(
                slug.chars()
                    .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-'),
                "`{slug}` has characters outside the slug alphabet"
            );
        }
    }
}
