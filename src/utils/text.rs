// src/utils/text.rs

use std::sync::LazyLock;

use regex::Regex;

static NON_SLUG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

const MAX_SLUG_LEN: usize = 80;

/// Whitelist HTML sanitizing for post bodies (ammonia): keeps formatting
/// tags, drops scripts, iframes and event-handler attributes.
pub fn sanitize_html(input: &str) -> String {
    ammonia::clean(input)
}

/// Comments are plain text: every tag goes, the text between them stays.
pub fn strip_tags(input: &str) -> String {
    ammonia::Builder::empty().clean(input).to_string()
}

/// Lowercase ASCII words joined by '-'. Never empty.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let joined = NON_SLUG.replace_all(&lowered, "-");
    let mut slug: String = joined.trim_matches('-').chars().take(MAX_SLUG_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        "post".to_string()
    } else {
        slug
    }
}
