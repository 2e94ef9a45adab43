use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static COMMAS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*,)+").unwrap());
static SPACE_COMMA_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+,").unwrap());
static POSTAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s,]*\b\d{5}$").unwrap());
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:doctora?|dr\(a\)|dra|dr|psic[oó]log[oa]|psic|ps|lic|mg|mtra|mtro|obst|nutr|nut|odont|prof|c\.d)(?:\.\s*|\s+|$))+",
    )
    .unwrap()
});
static TITLE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:doctora?|dr\(a\)|dra|dr|psic|ps|lic|mg|mtra|mtro|obst|nutr|nut|odont|prof|c\.d)\.?\s+\S")
        .unwrap()
});

/// Collapses every whitespace run (newlines and tabs included) to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    SPACES_RE.replace_all(s.trim(), " ").to_string()
}

/// Cleans a raw address string: single spaces, no doubled or dangling commas,
/// no trailing postal code.
pub fn normalize_address(raw: &str) -> String {
    let s = collapse_whitespace(raw);
    let s = SPACE_COMMA_RE.replace_all(&s, ",");
    let s = COMMAS_RE.replace_all(&s, ",");
    let s = s.trim_matches(|c: char| c == ',' || c.is_whitespace());
    let s = POSTAL_RE.replace(s, "");
    s.trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Strips any number of leading professional titles ("Dr.", "Psic.", "Lic." ...).
pub fn strip_titles(name: &str) -> String {
    let collapsed = collapse_whitespace(name);
    TITLE_RE.replace(&collapsed, "").trim().to_string()
}

pub fn has_title_prefix(s: &str) -> bool {
    TITLE_PREFIX_RE.is_match(s.trim())
}

/// Drops whitespace and separators, then the country-code prefix when the
/// remainder would be longer than a local number.
pub fn clean_phone(raw: &str, country_code: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix(country_code) {
        Some(local) if local.len() >= 7 && digits.len() > 9 => local.to_string(),
        _ => digits,
    }
}

/// Lowercases and removes Spanish diacritics so category matching is stable.
pub fn fold(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' => 'a',
            'é' | 'è' | 'ë' => 'e',
            'í' | 'ì' | 'ï' => 'i',
            'ó' | 'ò' | 'ö' => 'o',
            'ú' | 'ù' | 'ü' => 'u',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

/// URL path segment for a category or locality label.
pub fn slugify(s: &str) -> String {
    fold(s)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Absolute URL with query, fragment and trailing slash removed.
pub fn canonical_url(base: &str, href: &str) -> Option<String> {
    let base = Url::parse(base).ok()?;
    let mut url = base.join(href.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_query(None);
    url.set_fragment(None);
    let s = url.to_string();
    Some(s.trim_end_matches('/').to_string())
}

/// Parses "4,8" or "4.8"; anything outside [0, 5] is treated as absent.
pub fn parse_rating(raw: &str) -> Option<f32> {
    let value: f32 = raw.trim().replace(',', ".").parse().ok()?;
    (0.0..=5.0).contains(&value).then_some(value)
}

pub fn parse_count(raw: &str) -> Option<u32> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}
