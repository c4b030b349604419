//! Path normalization
//!
//! Turns an inbound URL into the string the classifier works on: the relay's
//! own prefix (and any pasted copies of the relay URL) stripped off, and any
//! leading scheme collapsed to exactly `https://`.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static LEADING_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^https?:/+").expect("valid scheme regex"));

/// The `?q=` entry shorthand, if present and non-empty.
pub fn redirect_shorthand(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Normalize an inbound URL against the relay's origin and prefix.
pub fn normalize(url: &Url, prefix: &str) -> String {
    let mut raw = url.path().to_string();
    if let Some(query) = url.query() {
        raw.push('?');
        raw.push_str(query);
    }
    if let Some(fragment) = url.fragment() {
        raw.push('#');
        raw.push_str(fragment);
    }

    normalize_path(&raw, &url.origin().ascii_serialization(), prefix)
}

/// Normalize `raw` until it reaches a fixed point, so the result is stable
/// under re-normalization.
pub fn normalize_path(raw: &str, origin: &str, prefix: &str) -> String {
    let self_prefix = format!("{}{}", origin, prefix);
    let mut path = raw.to_string();

    loop {
        let mut next = path.as_str();
        while let Some(rest) =
            strip_prefix_ci(next, &self_prefix).or_else(|| strip_prefix_ci(next, prefix))
        {
            next = rest;
        }
        let next = LEADING_SCHEME.replace(next, "https://").into_owned();

        if next == path {
            return path;
        }
        path = next;
    }
}

/// Whether the path already carries a scheme.
pub fn has_scheme(path: &str) -> bool {
    path.starts_with("https://") || path.starts_with("http://")
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}
