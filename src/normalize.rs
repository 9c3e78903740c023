//! Filename normalization
//!
//! Turns a release-style file name such as `Movie.2020.BRRip.XviD-GROUP.mkv`
//! into a title suitable for a free-text lookup (`Movie`).

use once_cell::sync::Lazy;
use regex::Regex;

static EMBEDDED_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)www\.[^.]*\.(com|fr|net|org)").unwrap());

static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

static TRAILING_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\s)(avi|mp4|mkv)\s*$").unwrap());

static NOISE_TOKENS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\d{4}",
        r"^vost",
        r"^(webrip|dvdrip|brrip|dvd|bluray|divx|hd)$",
        r"^(xvid|utt|ac3|aac|rarbg|h\d{3}|x\d{3})$",
        r"^(yify|french|truefrench|fastsub|remastered)$",
        r"^(cd\d|\d{3,4}p)$",
    ]
    .iter()
    .map(|pattern| Regex::new(&format!("(?i){}", pattern)).unwrap())
    .collect()
});

/// Whether a single token is release noise (year, source, codec, group, resolution)
pub fn is_noise_token(token: &str) -> bool {
    NOISE_TOKENS.iter().any(|re| re.is_match(token))
}

/// Normalize a raw file or directory name into a search title
pub fn normalize_filename(raw: &str) -> String {
    let without_url = EMBEDDED_URL.replace(raw, "");
    let without_group = strip_release_group(&without_url);
    let spaced = without_group.replace(['.', '-', '_'], " ");
    let without_brackets = BRACKETED.replace_all(&spaced, "");
    let without_parens = PARENTHESIZED.replace_all(&without_brackets, "");
    let without_ext = TRAILING_EXTENSION.replace(&without_parens, "");

    without_ext
        .split(' ')
        .filter(|token| !token.is_empty() && !is_noise_token(token))
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

/// Drop a `-GROUP` suffix glued to a release tag (`XviD-GROUP.mkv` -> `XviD.mkv`)
fn strip_release_group(name: &str) -> String {
    let (stem, ext) = match name.rfind('.') {
        Some(idx) if TRAILING_EXTENSION.is_match(&name[idx + 1..]) => name.split_at(idx),
        _ => (name, ""),
    };

    let Some(dash) = stem.rfind('-') else {
        return name.to_string();
    };
    let (head, group) = (&stem[..dash], &stem[dash + 1..]);
    if group.is_empty() || group.contains(|c: char| c == '.' || c == '_' || c.is_whitespace()) {
        return name.to_string();
    }

    let preceding = head
        .rsplit(|c: char| c == '.' || c == '_' || c == '-' || c.is_whitespace())
        .next()
        .unwrap_or("");
    if preceding.is_empty() || !is_noise_token(preceding) {
        return name.to_string();
    }

    format!("{}{}", head, ext)
}
