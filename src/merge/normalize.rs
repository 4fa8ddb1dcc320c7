//! Title, platform, rating and price normalization.
//!
//! These functions define what "the same game" means across storefronts, so
//! the token lists here are load-bearing: loosening them merges distinct
//! titles, tightening them splits listings that should collide.

use once_cell::sync::Lazy;
use regex_lite::Regex;

static MARK_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[™®©]").unwrap());

static EDITION_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(deluxe|definitive|gold|ultimate|goty|complete|remastered|hd|bundle|collection|director'?s cut|edition|standard|launch|classic)\b",
    )
    .unwrap()
});

static PLATFORM_NOISE_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(ps\s*4|ps\s*5|playstation\s*4|playstation\s*5|xbox(\s+one|\s+series\s+x\|?s)?|series\s+x\|?s|nintendo\s+switch|switch)\b",
    )
    .unwrap()
});

static MULTI_SPACE_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

static PRICE_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+(?:[.,][0-9]{2})?").unwrap());

/// Strips trademark marks and collapses runs of whitespace.
pub fn clean_title(name: &str) -> String {
    let t = MARK_RX.replace_all(name, "");
    MULTI_SPACE_RX.replace_all(t.trim(), " ").into_owned()
}

/// Removes platform names and edition marketing tokens from a title.
///
/// Falls back to the cleaned title when stripping would leave nothing, so a
/// game literally named "Collection" keeps its name.
pub fn strip_edition_noise(name: &str) -> String {
    let t = clean_title(name);
    let t = PLATFORM_NOISE_RX.replace_all(&t, "");
    let t = EDITION_RX.replace_all(&t, "");
    let t = MULTI_SPACE_RX.replace_all(&t, " ");
    let t = t
        .trim_matches(|c: char| c == ' ' || c == '-' || c == '\u{2013}' || c == '\u{2014}')
        .to_string();
    if t.is_empty() {
        clean_title(name)
    } else {
        t
    }
}

/// The clustering key: equivalent titles across stores must collide under
/// this function even when decorated differently.
///
/// Casefold, strip platform/edition tokens, drop punctuation, collapse
/// whitespace.
pub fn canonical_key(name: &str) -> String {
    let stripped = strip_edition_noise(name).to_lowercase();
    let mut key = String::with_capacity(stripped.len());
    for ch in stripped.chars() {
        if ch.is_alphanumeric() {
            key.push(ch);
        } else {
            key.push(' ');
        }
    }
    MULTI_SPACE_RX.replace_all(&key, " ").trim().to_string()
}

/// Maps a store's platform label onto the canonical name, passing unknown
/// labels through trimmed.
pub fn normalize_platform(value: &str) -> String {
    let trimmed = value.trim();
    let canonical = match trimmed.to_lowercase().as_str() {
        "ps4" | "playstation 4" => "PS4",
        "ps5" | "playstation 5" => "PS5",
        "ps4 & ps5" | "ps5|ps4" => "PS4/PS5",
        "xbox one" => "Xbox One",
        "xbox series x|s" | "xbox series x" | "xbox series s" | "xbox series" => "Xbox Series X|S",
        "xbox" => "Xbox",
        "windows" | "win32" => "Windows",
        "pc" | "steam" => "PC",
        "switch" | "nintendo switch" => "Switch",
        "xbox play anywhere" => "Xbox Play Anywhere",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}

/// Normalizes a platform list: canonical names, case-insensitive dedupe,
/// first-seen casing, insertion order preserved.
pub fn normalize_platforms<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();
    for value in values {
        let norm = normalize_platform(value.as_ref());
        if norm.is_empty() {
            continue;
        }
        let key = norm.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(norm);
    }
    out
}

/// Maps a raw rating label onto the closed ESRB-style vocabulary, or `None`
/// for anything unrecognized.
pub fn normalize_rating(value: &str) -> Option<&'static str> {
    let cleaned: String = value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '+' || *c == ' ')
        .collect();
    let tier = match cleaned.trim() {
        "everyone" | "e for everyone" | "esrb everyone" | "pegi 3" | "cero a" => "everyone",
        "everyone 10+" | "e10+" | "e 10+" | "e 10 plus" | "esrb everyone 10+" | "pegi 7" => {
            "everyone 10+"
        }
        "rating pending" | "rp" => "rating pending",
        "teen" | "t" | "esrb teen" | "pegi 12" | "cero b" => "teen",
        "mature" | "mature 17+" | "m" | "esrb mature" | "pegi 16" | "pegi 18" | "cero c"
        | "cero d" | "cero z" => "mature 17+",
        _ => return None,
    };
    Some(tier)
}

/// Parses a display price into a comparable amount.
///
/// `"Free"` is exactly 0, `"Unavailable"` has no value, anything else yields
/// its first numeric group. A comma before two trailing digits is read as a
/// decimal separator ("19,99" is 19.99).
pub fn parse_price(value: &str) -> Option<f64> {
    if value.is_empty() {
        return None;
    }
    let lower = value.to_lowercase();
    if lower == "free" {
        return Some(0.0);
    }
    if lower == "unavailable" {
        return None;
    }
    let m = PRICE_RX.find(value)?;
    m.as_str().replace(',', ".").parse().ok()
}

/// Formats an amount as a display price. A flag string ("Free",
/// "Announced", ...) takes precedence over any amount.
pub fn price_to_string(amount: Option<f64>, currency: Option<&str>, flags: Option<&str>) -> String {
    if let Some(flag) = flags {
        if !flag.is_empty() {
            return flag.to_string();
        }
    }
    let (amount, currency) = match (amount, currency) {
        (Some(a), Some(c)) => (a, c),
        _ => return "Unavailable".to_string(),
    };
    let cur = currency.to_uppercase();
    let symbol = match cur.as_str() {
        "USD" | "CAD" | "AUD" | "NZD" | "HKD" | "TWD" => Some("$"),
        "EUR" => Some("\u{20ac}"),
        "GBP" => Some("\u{a3}"),
        "JPY" | "CNY" => Some("\u{a5}"),
        "KRW" => Some("\u{20a9}"),
        _ => None,
    };
    match symbol {
        // Zero-decimal currencies.
        Some(s @ ("\u{a5}" | "\u{20a9}")) => format!("{s}{}", amount.round() as i64),
        Some(s) => format!("{s}{amount:.2}"),
        None => format!("{cur} {amount:.2}").trim().to_string(),
    }
}

/// The catalog file bucket for a title: its first letter, or `_` for
/// anything outside `a`-`z`.
pub fn letter_bucket(name: &str) -> char {
    match name.trim().chars().next() {
        Some(ch) if ch.is_ascii_alphabetic() => ch.to_ascii_lowercase(),
        _ => '_',
    }
}
