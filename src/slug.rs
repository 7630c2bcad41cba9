use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^\w\s-]").unwrap();
    static ref SEPARATORS: Regex = Regex::new(r"[-\s]+").unwrap();
    static ref VALID_SLUG: Regex = Regex::new(r"^[-a-zA-Z0-9_]+$").unwrap();
}

/// Lowercase, hyphenated, ASCII-only form of `name`.
///
/// Input is NFKD-decomposed first so accented letters keep their base letter
/// (`"Crème"` becomes `"creme"`); whatever is still non-ASCII after that is
/// dropped. Characters outside `[a-z0-9_-]` and whitespace are dropped, runs of
/// whitespace and hyphens collapse into one hyphen, and leading/trailing
/// hyphens and underscores are stripped. `"Home Appliances"` becomes
/// `"home-appliances"`.
pub fn slugify(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .collect::<String>()
        .to_lowercase();
    let cleaned = DISALLOWED.replace_all(&ascii, "");
    let hyphenated = SEPARATORS.replace_all(cleaned.trim(), "-");
    hyphenated.trim_matches(|c: char| c == '-' || c == '_').to_string()
}

/// Slug derived from `name`, cut to `max_len` without leaving a trailing hyphen.
pub fn derive(name: &str, max_len: usize) -> String {
    let mut slug = slugify(name);
    if slug.len() > max_len {
        slug.truncate(max_len);
        slug = slug.trim_end_matches(|c: char| c == '-' || c == '_').to_string();
    }
    slug
}

pub fn is_valid(slug: &str) -> bool {
    VALID_SLUG.is_match(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Home Appliances"), "home-appliances");
        assert_eq!(slugify("  Garden   & Outdoor "), "garden-outdoor");
        assert_eq!(slugify("USB-C -- Cables"), "usb-c-cables");
        assert_eq!(slugify("snake_case_name"), "snake_case_name");
    }

    #[test]
    fn slugify_strips_punctuation_and_edges() {
        assert_eq!(slugify("Books!"), "books");
        assert_eq!(slugify("--Toys--"), "toys");
        assert_eq!(slugify("_private_"), "private");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn slugify_folds_accents_to_ascii() {
        assert_eq!(slugify("Crème Brûlée"), "creme-brulee");
        assert_eq!(slugify("Caffè Crema"), "caffe-crema");
        assert_eq!(slugify("Ｆｕｌｌ Width"), "full-width");
    }

    #[test]
    fn slugify_drops_what_has_no_ascii_form() {
        assert_eq!(slugify("Tea 茶 Set"), "tea-set");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn derive_truncates_without_trailing_hyphen() {
        assert_eq!(derive("abc def", 4), "abc");
        assert_eq!(derive("Home Appliances", 100), "home-appliances");
    }

    #[test]
    fn slug_syntax() {
        assert!(is_valid("home-appliances"));
        assert!(is_valid("Item_42"));
        assert!(!is_valid("has space"));
        assert!(!is_valid("slash/path"));
        assert!(!is_valid(""));
    }
}
